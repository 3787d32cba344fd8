//! Bayesian ridge regression fitted by evidence maximisation.
//!
//! Weights get an isotropic Gaussian prior with precision `lambda` and the
//! noise has precision `alpha`; both precisions carry Gamma hyper-priors and
//! are re-estimated each iteration from the eigendecomposition of `XᵀX`.

use linfa::traits::{Fit, PredictInplace};
use linfa::DatasetBase;
use nalgebra::DMatrix;
use ndarray::{Array1, Array2, ArrayBase, ArrayView1, Axis, Data, Ix2};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{MlError, Result};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct BayesianRidgeParams {
    pub max_iter: usize,
    pub tol: f64,
    /// Shape parameter of the Gamma prior over `alpha`.
    pub alpha_1: f64,
    /// Rate parameter of the Gamma prior over `alpha`.
    pub alpha_2: f64,
    pub lambda_1: f64,
    pub lambda_2: f64,
}

impl Default for BayesianRidgeParams {
    fn default() -> Self {
        Self {
            max_iter: 300,
            tol: 1e-3,
            alpha_1: 1e-6,
            alpha_2: 1e-6,
            lambda_1: 1e-6,
            lambda_2: 1e-6,
        }
    }
}

impl BayesianRidgeParams {
    pub fn max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FittedBayesianRidge {
    coef: Array1<f64>,
    intercept: f64,
    x_mean: Array1<f64>,
    /// Posterior covariance of the weights.
    sigma: Array2<f64>,
    alpha: f64,
    lambda: f64,
    n_iter: usize,
}

impl Fit<Array2<f64>, Array1<f64>, MlError> for BayesianRidgeParams {
    type Object = FittedBayesianRidge;

    fn fit(&self, dataset: &DatasetBase<Array2<f64>, Array1<f64>>) -> Result<FittedBayesianRidge> {
        let x = dataset.records();
        let y = dataset.targets();
        let (n_samples, n_features) = x.dim();

        if n_samples == 0 || n_features == 0 {
            return Err(MlError::Shape(format!(
                "bayesian ridge needs samples and features, got {n_samples}x{n_features}"
            )));
        }
        if y.len() != n_samples {
            return Err(MlError::Shape(format!(
                "{} targets for {n_samples} samples",
                y.len()
            )));
        }

        let x_mean = x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(n_features));
        let y_mean = y.mean().unwrap_or(0.0);
        let xc = x - &x_mean;
        let yc = y - y_mean;

        let xtx = xc.t().dot(&xc);
        let xty = xc.t().dot(&yc);

        let eigen = DMatrix::from_fn(n_features, n_features, |i, j| xtx[[i, j]]).symmetric_eigen();
        let eigen_vals: Array1<f64> = eigen.eigenvalues.iter().map(|v| v.max(0.0)).collect();
        let vectors = Array2::from_shape_fn((n_features, n_features), |(i, j)| eigen.eigenvectors[(i, j)]);
        if eigen_vals.iter().any(|v| !v.is_finite()) {
            return Err(MlError::Decomposition("non-finite eigenvalues of XᵀX".to_string()));
        }
        let projected_xty = vectors.t().dot(&xty);

        let coef_for = |alpha: f64, lambda: f64| -> Array1<f64> {
            let shrink = eigen_vals.mapv(|e| 1.0 / (e + lambda / alpha));
            vectors.dot(&(&projected_xty * &shrink))
        };

        let n = n_samples as f64;
        let mut alpha = 1.0 / (yc.mapv(|v| v * v).sum() / n + f64::EPSILON);
        let mut lambda = 1.0;
        let mut coef_old: Option<Array1<f64>> = None;
        let mut n_iter = 0;

        for iter in 0..self.max_iter {
            n_iter = iter + 1;
            let coef = coef_for(alpha, lambda);

            let residual = &yc - &xc.dot(&coef);
            let sse = residual.mapv(|r| r * r).sum();
            let gamma = eigen_vals.mapv(|e| alpha * e / (lambda + alpha * e)).sum();

            lambda = (gamma + 2.0 * self.lambda_1) / (coef.mapv(|c| c * c).sum() + 2.0 * self.lambda_2);
            alpha = (n - gamma + 2.0 * self.alpha_1) / (sse + 2.0 * self.alpha_2);

            if let Some(old) = &coef_old {
                if (old - &coef).mapv(f64::abs).sum() < self.tol {
                    debug!("Bayesian ridge converged after {} iterations", n_iter);
                    break;
                }
            }
            coef_old = Some(coef);
        }

        let coef = coef_for(alpha, lambda);
        let intercept = y_mean - x_mean.dot(&coef);
        let shrink = Array2::from_diag(&eigen_vals.mapv(|e| 1.0 / (e + lambda / alpha)));
        let sigma = vectors.dot(&shrink).dot(&vectors.t()) / alpha;

        Ok(FittedBayesianRidge { coef, intercept, x_mean, sigma, alpha, lambda, n_iter })
    }
}

impl FittedBayesianRidge {
    pub fn coefficients(&self) -> &Array1<f64> {
        &self.coef
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    /// Estimated noise precision.
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Estimated weight precision.
    pub fn lambda(&self) -> f64 {
        self.lambda
    }

    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    pub fn n_features(&self) -> usize {
        self.coef.len()
    }

    /// Mean and standard deviation of the predictive distribution for one row.
    pub fn predict_with_std(&self, row: ArrayView1<'_, f64>) -> (f64, f64) {
        let mean = row.dot(&self.coef) + self.intercept;
        let centred = &row - &self.x_mean;
        let variance = centred.dot(&self.sigma.dot(&centred)) + 1.0 / self.alpha;
        (mean, variance.max(0.0).sqrt())
    }
}

impl<D: Data<Elem = f64>> PredictInplace<ArrayBase<D, Ix2>, Array1<f64>> for FittedBayesianRidge {
    fn predict_inplace(&self, x: &ArrayBase<D, Ix2>, y: &mut Array1<f64>) {
        assert_eq!(x.ncols(), self.coef.len(), "feature count mismatch");
        assert_eq!(x.nrows(), y.len(), "target buffer has wrong length");
        y.assign(&(x.dot(&self.coef) + self.intercept));
    }

    fn default_target(&self, x: &ArrayBase<D, Ix2>) -> Array1<f64> {
        Array1::zeros(x.nrows())
    }
}
