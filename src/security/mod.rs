pub mod access_control;
pub mod policy;
pub mod query_guards;

pub use access_control::*;
pub use policy::*;
pub use query_guards::*;
