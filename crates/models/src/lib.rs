pub mod fields;
pub mod targets;
pub mod mix;
pub mod predictions;
pub mod error;

pub use fields::*;
pub use targets::*;
pub use mix::*;
pub use predictions::*;
pub use error::*;
