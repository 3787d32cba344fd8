use linfa::prelude::SingleTargetRegression;
use linfa::traits::{Fit, Predict};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::dataset::{train_test_split, RegressionDataset};
use crate::error::Result;
use crate::pipeline::{FittedPipeline, PipelineParams};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationSplit {
    HoldOut,
    /// Too few rows to hold any out; scores are on the training data.
    Training,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegressionMetrics {
    pub r2: f64,
    pub rmse: f64,
    pub mae: f64,
    pub n_train: usize,
    pub n_test: usize,
    pub split: EvaluationSplit,
}

pub fn score(
    predicted: &Array1<f64>,
    actual: &Array1<f64>,
    n_train: usize,
    split: EvaluationSplit,
) -> Result<RegressionMetrics> {
    Ok(RegressionMetrics {
        r2: predicted.r2(actual)?,
        rmse: predicted.mean_squared_error(actual)?.sqrt(),
        mae: predicted.mean_absolute_error(actual)?,
        n_train,
        n_test: actual.len(),
        split,
    })
}

/// Scores `params` on a seeded hold-out split, then refits on every row so
/// the returned pipeline has seen the whole table.
pub fn fit_and_evaluate(
    params: &PipelineParams,
    dataset: &RegressionDataset,
    test_fraction: f64,
    seed: u64,
) -> Result<(FittedPipeline, RegressionMetrics)> {
    let metrics = match train_test_split(dataset, test_fraction, seed) {
        Some((train, test)) => {
            let holdout_model = params.fit(&train)?;
            let predicted = holdout_model.predict(test.records());
            score(&predicted, test.targets(), train.targets().len(), EvaluationSplit::HoldOut)?
        }
        None => {
            info!("Only {} rows, scoring on the training set", dataset.targets().len());
            let pipeline = params.fit(dataset)?;
            let predicted = pipeline.predict(dataset.records());
            let n = dataset.targets().len();
            let metrics = score(&predicted, dataset.targets(), n, EvaluationSplit::Training)?;
            return Ok((pipeline, metrics));
        }
    };

    let pipeline = params.fit(dataset)?;
    Ok((pipeline, metrics))
}
