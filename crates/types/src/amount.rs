//! Atomic-unit amounts
//!
//! Every on-chain quantity (balances, reserves, allowances, pool-token
//! supplies) is an exact unsigned 256-bit integer in the token's atomic
//! units, i.e. a human amount scaled by `10^decimals`.

use crate::{PoolError, PoolResult, MAX_TOKEN_DECIMALS};

/// Atomic-unit token amount
pub type Amount = ethnum::U256;

/// Parse a base-10 atomic amount
pub fn parse_amount(value: &str) -> PoolResult<Amount> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(PoolError::invalid_amount(value, "empty string"));
    }
    Amount::from_str_radix(trimmed, 10)
        .map_err(|e| PoolError::invalid_amount(value, &e.to_string()))
}

/// Scale factor `10^decimals`
pub fn pow10(decimals: u8) -> PoolResult<Amount> {
    if decimals > MAX_TOKEN_DECIMALS {
        return Err(PoolError::invalid_parameter(
            "decimals",
            &decimals.to_string(),
            "at most 77",
        ));
    }
    let ten = Amount::new(10);
    let mut factor = Amount::ONE;
    for _ in 0..decimals {
        factor = factor
            .checked_mul(ten)
            .ok_or_else(|| PoolError::math_overflow("pow10", &[&decimals]))?;
    }
    Ok(factor)
}

/// Serde adapter storing amounts as base-10 strings
///
/// 256-bit values do not survive a round trip through JSON or TOML numbers.
pub mod amount_serde {
    use super::Amount;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(amount: &Amount, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&amount.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Amount, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        super::parse_amount(&s).map_err(serde::de::Error::custom)
    }
}
