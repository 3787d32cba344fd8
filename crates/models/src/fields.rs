//! Column names of the historical sample table and the ranges the input form
//! accepts for each of them.

use serde::Serialize;

use crate::error::{GpcError, Result};

pub const WATER_BINDER_RATIO: &str = "Water_Binder_Ratio";
pub const NAOH_MOLARITY: &str = "NaOH_Molarity";
pub const NS_NH_RATIO: &str = "Ns_Nh_Ratio";
pub const FINE_AGGREGATE_PERCENT: &str = "Fine_Aggregate_percent";
pub const COMPRESSIVE_STRENGTH_MPA: &str = "Compressive_Strength_MPa";
pub const PERMEABILITY_MM_HR: &str = "Permeability_mm_hr";
pub const POROSITY_PERCENT: &str = "Porosity_percent";
pub const PREDICTED_LIFESPAN_YEARS: &str = "Predicted_Lifespan_years";
pub const CLOGGING_RATE_PERCENT_PER_YEAR: &str = "Clogging_Rate_percent_per_year";

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct FieldSpec {
    pub column: &'static str,
    pub label: &'static str,
    pub unit: &'static str,
    pub min: f64,
    pub max: f64,
    pub default: f64,
    pub step: f64,
    pub integer: bool,
}

pub const WATER_BINDER_RATIO_FIELD: FieldSpec = FieldSpec {
    column: WATER_BINDER_RATIO,
    label: "Water–Binder Ratio",
    unit: "",
    min: 0.20,
    max: 0.60,
    default: 0.35,
    step: 0.01,
    integer: false,
};

pub const NAOH_MOLARITY_FIELD: FieldSpec = FieldSpec {
    column: NAOH_MOLARITY,
    label: "NaOH Molarity",
    unit: "M",
    min: 6.0,
    max: 16.0,
    default: 10.0,
    step: 0.5,
    integer: false,
};

pub const NS_NH_RATIO_FIELD: FieldSpec = FieldSpec {
    column: NS_NH_RATIO,
    label: "Ns/Nh Ratio",
    unit: "",
    min: 0.5,
    max: 3.0,
    default: 1.5,
    step: 0.1,
    integer: false,
};

pub const FINE_AGGREGATE_FIELD: FieldSpec = FieldSpec {
    column: FINE_AGGREGATE_PERCENT,
    label: "Fine Aggregate",
    unit: "%",
    min: 0.0,
    max: 40.0,
    default: 15.0,
    step: 1.0,
    integer: false,
};

pub const COMPRESSIVE_STRENGTH_FIELD: FieldSpec = FieldSpec {
    column: COMPRESSIVE_STRENGTH_MPA,
    label: "Compressive Strength",
    unit: "MPa",
    min: 5.0,
    max: 60.0,
    default: 25.0,
    step: 0.5,
    integer: false,
};

pub const PERMEABILITY_FIELD: FieldSpec = FieldSpec {
    column: PERMEABILITY_MM_HR,
    label: "Permeability",
    unit: "mm/hr",
    min: 10.0,
    max: 5000.0,
    default: 1000.0,
    step: 10.0,
    integer: false,
};

pub const POROSITY_FIELD: FieldSpec = FieldSpec {
    column: POROSITY_PERCENT,
    label: "Porosity",
    unit: "%",
    min: 5.0,
    max: 35.0,
    default: 20.0,
    step: 0.5,
    integer: false,
};

pub const LIFESPAN_FIELD: FieldSpec = FieldSpec {
    column: PREDICTED_LIFESPAN_YEARS,
    label: "Design Lifespan",
    unit: "years",
    min: 1.0,
    max: 100.0,
    default: 25.0,
    step: 1.0,
    integer: true,
};

/// Mix-design parameters a user always supplies.
pub static MIX_FIELDS: [FieldSpec; 6] = [
    WATER_BINDER_RATIO_FIELD,
    NAOH_MOLARITY_FIELD,
    NS_NH_RATIO_FIELD,
    FINE_AGGREGATE_FIELD,
    COMPRESSIVE_STRENGTH_FIELD,
    LIFESPAN_FIELD,
];

/// Inputs of the clogging form, in the order the form shows them.
pub static CLOGGING_FIELDS: [FieldSpec; 8] = [
    WATER_BINDER_RATIO_FIELD,
    NAOH_MOLARITY_FIELD,
    NS_NH_RATIO_FIELD,
    FINE_AGGREGATE_FIELD,
    COMPRESSIVE_STRENGTH_FIELD,
    PERMEABILITY_FIELD,
    POROSITY_FIELD,
    LIFESPAN_FIELD,
];

pub fn field_spec(column: &str) -> Option<&'static FieldSpec> {
    CLOGGING_FIELDS.iter().find(|spec| spec.column == column)
}

impl FieldSpec {
    pub fn validate(&self, value: f64) -> Result<f64> {
        if !value.is_finite() {
            return Err(GpcError::NotFinite { field: self.column.to_string() });
        }
        if value < self.min || value > self.max {
            return Err(GpcError::OutOfRange {
                field: self.column.to_string(),
                value,
                min: self.min,
                max: self.max,
            });
        }
        if self.integer && value.fract() != 0.0 {
            return Err(GpcError::NotInteger { field: self.column.to_string(), value });
        }
        Ok(value)
    }

    /// Label with the unit appended, as shown next to the form input.
    pub fn display_label(&self) -> String {
        if self.unit.is_empty() {
            self.label.to_string()
        } else {
            format!("{} ({})", self.label, self.unit)
        }
    }
}
