//! Shared types for the pairpool engine
//!
//! This crate provides the data model, constants and error taxonomy
//! that are used across the math crate, the SDK and the CLI.

pub mod amount;
pub mod constants;
pub mod errors;
pub mod operation;
pub mod pool;
pub mod token;

// Re-export all public types
pub use amount::*;
pub use constants::*;
pub use errors::*;
pub use operation::*;
pub use pool::*;
pub use token::*;

/// Result type alias using the shared error type
pub type PoolResult<T> = std::result::Result<T, PoolError>;
