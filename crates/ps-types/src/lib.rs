pub mod config;
pub mod errors;
pub mod metric;
pub mod parameter;

pub use config::*;
pub use errors::*;
pub use metric::*;
pub use parameter::*;
