use std::fmt;

use serde::{Deserialize, Serialize};

use crate::fields::*;

/// A predicted property. Each target has its own trained pipeline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    Porosity,
    Permeability,
    CloggingRate,
}

const POROSITY_FEATURES: [&str; 6] = [
    WATER_BINDER_RATIO,
    NAOH_MOLARITY,
    NS_NH_RATIO,
    FINE_AGGREGATE_PERCENT,
    COMPRESSIVE_STRENGTH_MPA,
    PREDICTED_LIFESPAN_YEARS,
];

const PERMEABILITY_FEATURES: [&str; 7] = [
    WATER_BINDER_RATIO,
    NAOH_MOLARITY,
    NS_NH_RATIO,
    FINE_AGGREGATE_PERCENT,
    COMPRESSIVE_STRENGTH_MPA,
    POROSITY_PERCENT,
    PREDICTED_LIFESPAN_YEARS,
];

const CLOGGING_FEATURES: [&str; 8] = [
    WATER_BINDER_RATIO,
    NAOH_MOLARITY,
    NS_NH_RATIO,
    FINE_AGGREGATE_PERCENT,
    COMPRESSIVE_STRENGTH_MPA,
    PERMEABILITY_MM_HR,
    POROSITY_PERCENT,
    PREDICTED_LIFESPAN_YEARS,
];

impl Target {
    /// Cascade order: each target may depend on the ones before it.
    pub const ALL: [Target; 3] = [Target::Porosity, Target::Permeability, Target::CloggingRate];

    pub fn column(self) -> &'static str {
        match self {
            Self::Porosity => POROSITY_PERCENT,
            Self::Permeability => PERMEABILITY_MM_HR,
            Self::CloggingRate => CLOGGING_RATE_PERCENT_PER_YEAR,
        }
    }

    pub fn feature_columns(self) -> &'static [&'static str] {
        match self {
            Self::Porosity => &POROSITY_FEATURES,
            Self::Permeability => &PERMEABILITY_FEATURES,
            Self::CloggingRate => &CLOGGING_FEATURES,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Porosity => "Porosity",
            Self::Permeability => "Permeability",
            Self::CloggingRate => "Clogging Rate",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            Self::Porosity => "%",
            Self::Permeability => "mm/hr",
            Self::CloggingRate => "% per year",
        }
    }

    /// File stem of the persisted model, e.g. `clogging` for `clogging_model.bin`.
    pub fn artifact_stem(self) -> &'static str {
        match self {
            Self::Porosity => "porosity",
            Self::Permeability => "permeability",
            Self::CloggingRate => "clogging",
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
