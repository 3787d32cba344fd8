pub mod error;
pub mod dataset;
pub mod bayesian_ridge;
pub mod boosting;
pub mod pipeline;
pub mod evaluation;
pub mod artifact;

pub use error::*;
pub use dataset::*;
pub use bayesian_ridge::*;
pub use boosting::*;
pub use pipeline::*;
pub use evaluation::*;
pub use artifact::*;
