use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{GpcError, Result};
use crate::fields::*;

/// Mix-design parameters entered on the form.
///
/// JSON keys are the column names of the training table, so a row copied
/// from the spreadsheet deserializes directly. Missing keys fall back to the
/// form defaults; unknown keys are rejected.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(try_from = "HashMap<String, f64>")]
pub struct MixDesign {
    #[serde(rename = "Water_Binder_Ratio")]
    pub water_binder_ratio: f64,
    #[serde(rename = "NaOH_Molarity")]
    pub naoh_molarity: f64,
    #[serde(rename = "Ns_Nh_Ratio")]
    pub ns_nh_ratio: f64,
    #[serde(rename = "Fine_Aggregate_percent")]
    pub fine_aggregate_percent: f64,
    #[serde(rename = "Compressive_Strength_MPa")]
    pub compressive_strength_mpa: f64,
    #[serde(rename = "Predicted_Lifespan_years")]
    pub predicted_lifespan_years: f64,
}

impl Default for MixDesign {
    fn default() -> Self {
        Self {
            water_binder_ratio: WATER_BINDER_RATIO_FIELD.default,
            naoh_molarity: NAOH_MOLARITY_FIELD.default,
            ns_nh_ratio: NS_NH_RATIO_FIELD.default,
            fine_aggregate_percent: FINE_AGGREGATE_FIELD.default,
            compressive_strength_mpa: COMPRESSIVE_STRENGTH_FIELD.default,
            predicted_lifespan_years: LIFESPAN_FIELD.default,
        }
    }
}

impl MixDesign {
    fn values(&self) -> [(&'static FieldSpec, f64); 6] {
        [
            (&WATER_BINDER_RATIO_FIELD, self.water_binder_ratio),
            (&NAOH_MOLARITY_FIELD, self.naoh_molarity),
            (&NS_NH_RATIO_FIELD, self.ns_nh_ratio),
            (&FINE_AGGREGATE_FIELD, self.fine_aggregate_percent),
            (&COMPRESSIVE_STRENGTH_FIELD, self.compressive_strength_mpa),
            (&LIFESPAN_FIELD, self.predicted_lifespan_years),
        ]
    }

    pub fn validate(&self) -> Result<()> {
        for (spec, value) in self.values() {
            spec.validate(value)?;
        }
        Ok(())
    }

    /// Values keyed by column name.
    pub fn to_feature_map(&self) -> HashMap<String, f64> {
        self.values()
            .into_iter()
            .map(|(spec, value)| (spec.column.to_string(), value))
            .collect()
    }

    /// Builds a design from column-keyed values, rejecting unknown keys and
    /// filling absent ones with the form defaults.
    pub fn from_feature_map(values: &HashMap<String, f64>) -> Result<Self> {
        let mut design = Self::default();
        for (column, &value) in values {
            match column.as_str() {
                WATER_BINDER_RATIO => design.water_binder_ratio = value,
                NAOH_MOLARITY => design.naoh_molarity = value,
                NS_NH_RATIO => design.ns_nh_ratio = value,
                FINE_AGGREGATE_PERCENT => design.fine_aggregate_percent = value,
                COMPRESSIVE_STRENGTH_MPA => design.compressive_strength_mpa = value,
                PREDICTED_LIFESPAN_YEARS => design.predicted_lifespan_years = value,
                other => return Err(GpcError::UnknownField(other.to_string())),
            }
        }
        Ok(design)
    }
}

impl TryFrom<HashMap<String, f64>> for MixDesign {
    type Error = GpcError;

    fn try_from(values: HashMap<String, f64>) -> Result<Self> {
        Self::from_feature_map(&values)
    }
}

/// Inputs of the clogging-only form: the mix design plus measured
/// permeability and porosity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(try_from = "HashMap<String, f64>")]
pub struct CloggingInput {
    #[serde(flatten)]
    pub mix: MixDesign,
    #[serde(rename = "Permeability_mm_hr")]
    pub permeability_mm_hr: f64,
    #[serde(rename = "Porosity_percent")]
    pub porosity_percent: f64,
}

impl Default for CloggingInput {
    fn default() -> Self {
        Self {
            mix: MixDesign::default(),
            permeability_mm_hr: PERMEABILITY_FIELD.default,
            porosity_percent: POROSITY_FIELD.default,
        }
    }
}

impl CloggingInput {
    /// Splits the measured permeability and porosity out of column-keyed
    /// values; the rest must be mix-design columns.
    pub fn from_feature_map(values: &HashMap<String, f64>) -> Result<Self> {
        let mut mix_values = values.clone();
        let permeability_mm_hr = mix_values
            .remove(PERMEABILITY_MM_HR)
            .unwrap_or(PERMEABILITY_FIELD.default);
        let porosity_percent = mix_values.remove(POROSITY_PERCENT).unwrap_or(POROSITY_FIELD.default);

        Ok(Self {
            mix: MixDesign::from_feature_map(&mix_values)?,
            permeability_mm_hr,
            porosity_percent,
        })
    }

    pub fn validate(&self) -> Result<()> {
        self.mix.validate()?;
        PERMEABILITY_FIELD.validate(self.permeability_mm_hr)?;
        POROSITY_FIELD.validate(self.porosity_percent)?;
        Ok(())
    }

    pub fn to_feature_map(&self) -> HashMap<String, f64> {
        let mut features = self.mix.to_feature_map();
        features.insert(PERMEABILITY_MM_HR.to_string(), self.permeability_mm_hr);
        features.insert(POROSITY_PERCENT.to_string(), self.porosity_percent);
        features
    }
}

impl TryFrom<HashMap<String, f64>> for CloggingInput {
    type Error = GpcError;

    fn try_from(values: HashMap<String, f64>) -> Result<Self> {
        Self::from_feature_map(&values)
    }
}

/// Validates every value of a free-form feature map against its field range.
pub fn validate_feature_map(values: &HashMap<String, f64>) -> Result<()> {
    for (column, &value) in values {
        let spec = field_spec(column).ok_or_else(|| GpcError::UnknownField(column.clone()))?;
        spec.validate(value)?;
    }
    Ok(())
}
