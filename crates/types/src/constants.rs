//! Engine constants

// ============================================================================
// Percentages
// ============================================================================

/// Upper bound of a percentage argument (inclusive)
pub const MAX_PERCENT: u32 = 100;

/// Fractional digits carried by share percentages
pub const SHARE_DECIMALS: u32 = 6;

/// Scale applied to share percentages: 10^SHARE_DECIMALS
pub const SHARE_SCALE: u128 = 1_000_000;

/// Basis points denominator (10,000 = 100%)
pub const BPS_DENOMINATOR: u64 = 10_000;

// ============================================================================
// Tokens
// ============================================================================

/// Largest decimal precision whose scale factor 10^d fits in 256 bits
pub const MAX_TOKEN_DECIMALS: u8 = 77;

// ============================================================================
// Confirmation
// ============================================================================

/// Default number of finality polls before a wait times out
pub const DEFAULT_CONFIRMATION_ROUNDS: u32 = 4;

/// Default delay between finality polls
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;
