pub mod error_classifier;
pub mod error_recovery;
pub mod executor;

pub use error_classifier::*;
pub use error_recovery::*;
pub use executor::*;
