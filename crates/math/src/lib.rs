//! Exact integer accounting for the pairpool engine
//!
//! This crate provides checked 256-bit arithmetic, decimal scaling,
//! pool share and redeemable-pair accounting, and the allowance gate
//! used by the SDK and the CLI. Nothing here performs I/O.

pub mod accounting;
pub mod allowance;
pub mod amount;
pub mod safe;

// Re-export commonly used functions
pub use accounting::*;
pub use allowance::*;
pub use amount::*;
pub use safe::*;
