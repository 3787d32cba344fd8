// Prediction service

use std::collections::HashMap;
use std::sync::Arc;

use gpc_ml::{MlError, ModelArtifact};
use gpc_models::{
    validate_feature_map, CloggingInput, GpcError, MixDesign, MixPrediction, PropertyPrediction,
    Result, Target, PERMEABILITY_MM_HR, POROSITY_PERCENT,
};
use tracing::debug;

use crate::registry::ModelRegistry;

#[derive(Debug, Clone)]
pub struct PredictorService {
    registry: Arc<ModelRegistry>,
}

impl PredictorService {
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    fn model(&self, target: Target) -> Result<Arc<ModelArtifact>> {
        self.registry
            .get(target)
            .ok_or(GpcError::ModelUnavailable { target })
    }

    /// Runs one model on column-keyed inputs. Inputs are not validated here.
    fn run(&self, target: Target, features: &HashMap<String, f64>) -> Result<PropertyPrediction> {
        let artifact = self.model(target)?;
        let pipeline = &artifact.pipeline;

        let row = pipeline.row_from_features(features).map_err(|e| match e {
            MlError::MissingColumn(column) => GpcError::MissingField(column),
            other => GpcError::PredictionFailed { reason: other.to_string() },
        })?;
        let (value, std_dev) = pipeline
            .predict_row(row.view())
            .map_err(|e| GpcError::PredictionFailed { reason: e.to_string() })?;

        if !value.is_finite() {
            return Err(GpcError::PredictionFailed {
                reason: format!("{target} model returned {value}"),
            });
        }

        debug!("🔮 {} = {:.4} ({})", target, value, artifact.kind().name());
        let prediction = PropertyPrediction::new(target, value, artifact.kind());
        Ok(match std_dev {
            Some(std) if std.is_finite() => prediction.with_std_dev(std),
            _ => prediction,
        })
    }

    /// Predicts a single target from named feature values. Every value must
    /// be a known field within its range; extra fields the model does not use
    /// are ignored.
    pub fn predict_target(&self, target: Target, features: &HashMap<String, f64>) -> Result<PropertyPrediction> {
        validate_feature_map(features)?;
        self.run(target, features)
    }

    /// Predicts porosity, then permeability from it, then the clogging rate
    /// from both. Intermediate predictions are fed forward as-is, even when
    /// they fall outside the form ranges.
    pub fn predict_mix(&self, mix: &MixDesign) -> Result<MixPrediction> {
        mix.validate()?;
        let mut features = mix.to_feature_map();

        let porosity = self.run(Target::Porosity, &features)?;
        features.insert(POROSITY_PERCENT.to_string(), porosity.value);

        let permeability = self.run(Target::Permeability, &features)?;
        features.insert(PERMEABILITY_MM_HR.to_string(), permeability.value);

        let clogging_rate = self.run(Target::CloggingRate, &features)?;

        Ok(MixPrediction { porosity, permeability, clogging_rate })
    }

    /// Clogging rate from a mix design with measured permeability and porosity.
    pub fn predict_clogging(&self, input: &CloggingInput) -> Result<PropertyPrediction> {
        input.validate()?;
        self.run(Target::CloggingRate, &input.to_feature_map())
    }
}
