//! Pairpool SDK
//!
//! Transaction orchestration and state tracking for a two-asset liquidity
//! pool. Provides:
//! - Ports for the token contract, pool contract, signer and broadcaster
//! - Bounded confirmation polling
//! - A versioned pool state store
//! - The single-flight transaction pipeline
//! - Pool view projection and engine configuration

pub mod config;
pub mod confirmation;
pub mod errors;
pub mod operation;
pub mod pipeline;
pub mod ports;
pub mod store;
pub mod view;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use config::*;
pub use confirmation::*;
pub use errors::*;
pub use operation::*;
pub use pipeline::*;
pub use ports::*;
pub use store::*;
pub use view::*;
