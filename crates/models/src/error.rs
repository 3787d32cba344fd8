use thiserror::Error;

use crate::targets::Target;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GpcError {
    #[error("{field} = {value} is outside the allowed range [{min}, {max}]")]
    OutOfRange { field: String, value: f64, min: f64, max: f64 },

    #[error("{field} must be a finite number")]
    NotFinite { field: String },

    #[error("{field} must be a whole number, got {value}")]
    NotInteger { field: String, value: f64 },

    #[error("Unknown input field: {0}")]
    UnknownField(String),

    #[error("Missing input field: {0}")]
    MissingField(String),

    #[error("No trained model available for {target}")]
    ModelUnavailable { target: Target },

    #[error("Model prediction failed: {reason}")]
    PredictionFailed { reason: String },
}

impl GpcError {
    /// True for errors caused by the caller's input rather than the model.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::OutOfRange { .. }
                | Self::NotFinite { .. }
                | Self::NotInteger { .. }
                | Self::UnknownField(_)
                | Self::MissingField(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, GpcError>;
