/// Core Module for sqlfront
///
/// This module contains the shared infrastructure every other layer builds
/// on: the error taxonomy and the protocol-neutral data types.

pub mod error;
pub mod types;

// Re-export commonly used types for convenience
pub use error::{Result, SqlFrontError};
pub use types::{DataType, Value};
