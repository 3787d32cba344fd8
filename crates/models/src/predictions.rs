use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::targets::Target;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    BayesianRidge,
    GradientBoosting,
}

impl ModelKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::BayesianRidge => "BayesianRidge",
            Self::GradientBoosting => "GradientBoosting",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PropertyPrediction {
    pub id: Uuid,
    pub target: Target,
    pub value: f64,
    /// Predictive standard deviation, for models that provide one.
    pub std_dev: Option<f64>,
    pub unit: String,
    pub model_kind: ModelKind,
    pub predicted_at: DateTime<Utc>,
}

impl PropertyPrediction {
    pub fn new(target: Target, value: f64, model_kind: ModelKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            target,
            value,
            std_dev: None,
            unit: target.unit().to_string(),
            model_kind,
            predicted_at: Utc::now(),
        }
    }

    pub fn with_std_dev(mut self, std_dev: f64) -> Self {
        self.std_dev = Some(std_dev);
        self
    }

    /// Value rounded to two decimals, the way the result metrics display it.
    pub fn display_value(&self) -> String {
        format!("{:.2}", self.value)
    }
}

/// Result of running the whole cascade for one mix design.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MixPrediction {
    pub porosity: PropertyPrediction,
    pub permeability: PropertyPrediction,
    pub clogging_rate: PropertyPrediction,
}

impl MixPrediction {
    pub fn porosity_percent(&self) -> f64 {
        self.porosity.value
    }

    pub fn permeability_mm_hr(&self) -> f64 {
        self.permeability.value
    }

    pub fn clogging_rate_percent_per_year(&self) -> f64 {
        self.clogging_rate.value
    }

    pub fn iter(&self) -> impl Iterator<Item = &PropertyPrediction> {
        [&self.porosity, &self.permeability, &self.clogging_rate].into_iter()
    }
}
