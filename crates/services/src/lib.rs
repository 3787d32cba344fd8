pub mod registry;
pub mod training;
pub mod predictor;

pub use registry::*;
pub use training::*;
pub use predictor::*;
