pub mod analyze;
pub mod config;
pub mod error;
pub mod ids;
pub mod methods;
pub mod model;
pub mod query;
pub mod tree;

pub use error::{Result, TrylensError};
