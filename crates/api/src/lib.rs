pub mod error;
pub mod html;
pub mod metrics;
pub mod routes;

pub use error::*;
pub use metrics::*;
pub use routes::*;
