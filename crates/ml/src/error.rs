use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MlError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Workbook has no worksheets")]
    NoWorksheet,

    #[error("Unsupported table format: {0}")]
    UnsupportedFormat(String),

    #[error("Required column missing: {0}")]
    MissingColumn(String),

    #[error("Invalid value {value:?} in column {column}, row {row}")]
    InvalidCell { column: String, row: usize, value: String },

    #[error("Table has no data rows")]
    EmptyTable,

    #[error("Shape mismatch: {0}")]
    Shape(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Matrix decomposition failed: {0}")]
    Decomposition(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("Incompatible model artifact: {0}")]
    IncompatibleArtifact(String),

    #[error("Scaling failed: {0}")]
    Preprocessing(#[from] linfa_preprocessing::PreprocessingError),

    #[error(transparent)]
    Linfa(#[from] linfa::Error),
}

pub type Result<T> = std::result::Result<T, MlError>;
