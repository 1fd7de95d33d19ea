pub mod formatter;
pub mod result;

pub use formatter::*;
pub use result::*;
