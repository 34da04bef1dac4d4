//! Centralized validation helpers
//!
//! - Configuration validation (thresholds, timeouts, sampling)
//! - Path validation (traversal, NUL bytes, relativity)

pub mod config;
pub mod path;

pub use crate::error::ValidationError;
pub use config::*;
pub use path::*;


// vim: ts=4
