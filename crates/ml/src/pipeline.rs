use std::collections::HashMap;

use gpc_models::ModelKind;
use linfa::traits::{Fit, Predict, PredictInplace, Transformer};
use linfa::{Dataset, DatasetBase};
use linfa_preprocessing::linear_scaling::LinearScaler;
use ndarray::{Array1, Array2, ArrayBase, ArrayView1, Axis, Data, Ix2};
use serde::{Deserialize, Serialize};

use crate::bayesian_ridge::{BayesianRidgeParams, FittedBayesianRidge};
use crate::boosting::{FittedGradientBoosting, GradientBoostingParams};
use crate::error::{MlError, Result};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RegressorParams {
    BayesianRidge(BayesianRidgeParams),
    GradientBoosting(GradientBoostingParams),
}

impl RegressorParams {
    pub fn kind(&self) -> ModelKind {
        match self {
            Self::BayesianRidge(_) => ModelKind::BayesianRidge,
            Self::GradientBoosting(_) => ModelKind::GradientBoosting,
        }
    }
}

/// Standard scaler (zero mean, unit population variance) followed by a
/// regressor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PipelineParams {
    pub regressor: RegressorParams,
}

impl PipelineParams {
    pub fn new(regressor: RegressorParams) -> Self {
        Self { regressor }
    }

    pub fn bayesian_ridge(params: BayesianRidgeParams) -> Self {
        Self::new(RegressorParams::BayesianRidge(params))
    }

    pub fn gradient_boosting(params: GradientBoostingParams) -> Self {
        Self::new(RegressorParams::GradientBoosting(params))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum FittedRegressor {
    BayesianRidge(FittedBayesianRidge),
    GradientBoosting(FittedGradientBoosting),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedPipeline {
    scaler: LinearScaler<f64>,
    regressor: FittedRegressor,
    feature_columns: Vec<String>,
}

impl Fit<Array2<f64>, Array1<f64>, MlError> for PipelineParams {
    type Object = FittedPipeline;

    fn fit(&self, dataset: &DatasetBase<Array2<f64>, Array1<f64>>) -> Result<FittedPipeline> {
        let scaler = LinearScaler::standard().fit(dataset)?;
        let scaled = Dataset::new(scaler.transform(dataset.records().clone()), dataset.targets().clone());

        let regressor = match &self.regressor {
            RegressorParams::BayesianRidge(params) => FittedRegressor::BayesianRidge(params.fit(&scaled)?),
            RegressorParams::GradientBoosting(params) => {
                FittedRegressor::GradientBoosting(params.fit(&scaled)?)
            }
        };

        Ok(FittedPipeline {
            scaler,
            regressor,
            feature_columns: dataset.feature_names(),
        })
    }
}

impl FittedPipeline {
    pub fn kind(&self) -> ModelKind {
        match self.regressor {
            FittedRegressor::BayesianRidge(_) => ModelKind::BayesianRidge,
            FittedRegressor::GradientBoosting(_) => ModelKind::GradientBoosting,
        }
    }

    pub fn regressor(&self) -> &FittedRegressor {
        &self.regressor
    }

    pub fn scaler(&self) -> &LinearScaler<f64> {
        &self.scaler
    }

    /// Column names in the order the model expects them.
    pub fn feature_columns(&self) -> &[String] {
        &self.feature_columns
    }

    /// Arranges named values into the model's column order.
    pub fn row_from_features(&self, values: &HashMap<String, f64>) -> Result<Array1<f64>> {
        self.feature_columns
            .iter()
            .map(|column| {
                values
                    .get(column)
                    .copied()
                    .ok_or_else(|| MlError::MissingColumn(column.clone()))
            })
            .collect()
    }

    /// Prediction for one unscaled row, with the predictive standard deviation
    /// when the regressor provides one.
    pub fn predict_row(&self, row: ArrayView1<'_, f64>) -> Result<(f64, Option<f64>)> {
        if row.len() != self.feature_columns.len() {
            return Err(MlError::Shape(format!(
                "expected {} features, got {}",
                self.feature_columns.len(),
                row.len()
            )));
        }

        let scaled = self.scaler.transform(row.insert_axis(Axis(0)).to_owned());
        let scaled = scaled.row(0);
        Ok(match &self.regressor {
            FittedRegressor::BayesianRidge(model) => {
                let (mean, std) = model.predict_with_std(scaled);
                (mean, Some(std))
            }
            FittedRegressor::GradientBoosting(model) => (model.predict_row(scaled), None),
        })
    }

    /// Feature importances keyed by column, for regressors that expose them.
    /// Bayesian ridge reports the absolute standardised coefficients instead.
    pub fn feature_importances(&self) -> Vec<(String, f64)> {
        let weights = match &self.regressor {
            FittedRegressor::BayesianRidge(model) => {
                model.coefficients().iter().map(|c| c.abs()).collect()
            }
            FittedRegressor::GradientBoosting(model) => model.feature_importances(),
        };
        self.feature_columns.iter().cloned().zip(weights).collect()
    }
}

impl<D: Data<Elem = f64>> PredictInplace<ArrayBase<D, Ix2>, Array1<f64>> for FittedPipeline {
    fn predict_inplace(&self, x: &ArrayBase<D, Ix2>, y: &mut Array1<f64>) {
        let scaled = self.scaler.transform(x.to_owned());
        let predictions = match &self.regressor {
            FittedRegressor::BayesianRidge(model) => model.predict(&scaled),
            FittedRegressor::GradientBoosting(model) => model.predict(&scaled),
        };
        y.assign(&predictions);
    }

    fn default_target(&self, x: &ArrayBase<D, Ix2>) -> Array1<f64> {
        Array1::zeros(x.nrows())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use proptest::prelude::*;

    fn dataset() -> DatasetBase<Array2<f64>, Array1<f64>> {
        let x = Array2::from_shape_fn((30, 2), |(i, j)| {
            if j == 0 { 0.2 + 0.01 * i as f64 } else { 6.0 + (i % 5) as f64 * 2.0 }
        });
        let y = x.rows().into_iter().map(|r| 40.0 * r[0] + 0.5 * r[1]).collect::<Array1<f64>>();
        Dataset::new(x, y).with_feature_names(vec!["w", "m"])
    }

    #[test]
    fn test_bayesian_pipeline_predicts_raw_units() {
        let dataset = dataset();
        let pipeline = PipelineParams::bayesian_ridge(BayesianRidgeParams::default())
            .fit(&dataset)
            .unwrap();

        assert_eq!(pipeline.kind(), ModelKind::BayesianRidge);
        assert_eq!(pipeline.feature_columns(), ["w".to_string(), "m".to_string()]);

        let (value, std) = pipeline.predict_row(array![0.3, 10.0].view()).unwrap();
        assert!((value - 17.0).abs() < 1e-2, "value = {value}");
        assert!(std.unwrap() > 0.0);
    }

    #[test]
    fn test_row_and_batch_agree() {
        let dataset = dataset();
        let pipeline = PipelineParams::gradient_boosting(GradientBoostingParams::default().n_estimators(50))
            .fit(&dataset)
            .unwrap();

        let batch = pipeline.predict(dataset.records());
        let (single, std) = pipeline.predict_row(dataset.records().row(7)).unwrap();
        assert!((batch[7] - single).abs() < 1e-12);
        assert_eq!(std, None);
    }

    #[test]
    fn test_row_from_features() {
        let pipeline = PipelineParams::bayesian_ridge(BayesianRidgeParams::default())
            .fit(&dataset())
            .unwrap();

        let mut values = HashMap::new();
        values.insert("m".to_string(), 8.0);
        values.insert("w".to_string(), 0.25);
        values.insert("unused".to_string(), 1.0);
        assert_eq!(pipeline.row_from_features(&values).unwrap(), array![0.25, 8.0]);

        values.remove("w");
        assert!(matches!(
            pipeline.row_from_features(&values),
            Err(MlError::MissingColumn(c)) if c == "w"
        ));
    }

    #[test]
    fn test_wrong_width_rejected() {
        let pipeline = PipelineParams::bayesian_ridge(BayesianRidgeParams::default())
            .fit(&dataset())
            .unwrap();
        assert!(matches!(pipeline.predict_row(array![1.0].view()), Err(MlError::Shape(_))));
    }

    #[test]
    fn test_importances_cover_every_column() {
        let pipeline = PipelineParams::gradient_boosting(GradientBoostingParams::default().n_estimators(20))
            .fit(&dataset())
            .unwrap();
        let importances = pipeline.feature_importances();
        assert_eq!(importances.len(), 2);
        assert_eq!(importances[0].0, "w");
    }

    #[test]
    fn test_scaler_standardises_columns() {
        let x = array![[1.0_f64, 10.0], [2.0, 20.0], [3.0, 30.0], [4.0, 40.0]];
        let y = Array1::<f64>::zeros(4);
        let scaler = LinearScaler::standard().fit(&Dataset::new(x.clone(), y)).unwrap();
        let scaled = scaler.transform(x);

        // Population standard deviation: the mean square of a scaled column is 1.
        for column in scaled.columns() {
            assert!(column.mean().unwrap().abs() < 1e-12);
            let std = column.mapv(|v| v * v).mean().unwrap().sqrt();
            assert!((std - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_constant_column_maps_to_zero() {
        let x = array![[5.0, 1.0], [5.0, 2.0], [5.0, 3.0]];
        let y = Array1::<f64>::zeros(3);
        let scaler = LinearScaler::standard().fit(&Dataset::new(x.clone(), y)).unwrap();

        assert!(scaler.transform(x).column(0).iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_empty_dataset_rejected() {
        let dataset = Dataset::new(Array2::<f64>::zeros((0, 2)), Array1::<f64>::zeros(0));
        let params = PipelineParams::bayesian_ridge(BayesianRidgeParams::default());
        assert!(params.fit(&dataset).is_err());
    }

    proptest! {
        #[test]
        fn prop_scaled_columns_are_centred(
            values in proptest::collection::vec(-1000.0f64..1000.0, 6..40)
        ) {
            let n = values.len() / 2;
            let x = Array2::from_shape_vec((n, 2), values[..n * 2].to_vec()).unwrap();
            let scaler = LinearScaler::standard().fit(&Dataset::new(x.clone(), Array1::<f64>::zeros(n))).unwrap();
            for column in scaler.transform(x).columns() {
                prop_assert!(column.mean().unwrap().abs() < 1e-9);
            }
        }
    }
}
