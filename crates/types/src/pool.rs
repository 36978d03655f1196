//! Pool state types

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::amount::amount_serde;
use crate::{pow10, Address, Amount, PoolError, PoolResult, Side, TokenId, SHARE_DECIMALS, SHARE_SCALE};

/// Ordered pair of atomic amounts, one per constituent token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Reserves {
    #[serde(with = "amount_serde")]
    pub a: Amount,
    #[serde(with = "amount_serde")]
    pub b: Amount,
}

impl Reserves {
    pub fn new(a: Amount, b: Amount) -> Self {
        Self { a, b }
    }

    pub fn get(&self, side: Side) -> Amount {
        match side {
            Side::A => self.a,
            Side::B => self.b,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.a == Amount::ZERO || self.b == Amount::ZERO
    }
}

/// A user's pool-token balance against the total minted supply
///
/// `user_balance <= total_minted` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolTokenSupply {
    user_balance: Amount,
    total_minted: Amount,
}

impl PoolTokenSupply {
    pub fn new(user_balance: Amount, total_minted: Amount) -> PoolResult<Self> {
        if user_balance > total_minted {
            return Err(PoolError::InconsistentSupply {
                user_balance,
                total_minted,
            });
        }
        Ok(Self {
            user_balance,
            total_minted,
        })
    }

    pub fn user_balance(&self) -> Amount {
        self.user_balance
    }

    pub fn total_minted(&self) -> Amount {
        self.total_minted
    }
}

/// Amount a spender may move on behalf of an owner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allowance {
    pub token: TokenId,
    pub owner: Address,
    pub spender: Address,
    pub amount: Amount,
}

/// Exact rate of atomic A per atomic B
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rate {
    numerator: Amount,
    denominator: Amount,
}

impl Rate {
    /// Build a rate; a zero denominator is rejected
    pub fn new(numerator: Amount, denominator: Amount) -> PoolResult<Self> {
        if denominator == Amount::ZERO {
            return Err(PoolError::division_by_zero("rate denominator"));
        }
        Ok(Self {
            numerator,
            denominator,
        })
    }

    /// Rate implied by pool-wide balances; undefined when either side is empty
    pub fn from_pool_balances(balances: &Reserves) -> Option<Self> {
        if balances.is_empty() {
            return None;
        }
        Some(Self {
            numerator: balances.a,
            denominator: balances.b,
        })
    }

    /// Convert a human-unit rate (`numerator / denominator` whole A per whole B)
    /// into atomic units using both tokens' decimals
    pub fn from_decimal_units(
        numerator: Amount,
        denominator: Amount,
        decimals_a: u8,
        decimals_b: u8,
    ) -> PoolResult<Self> {
        let (numerator, denominator) = if decimals_a >= decimals_b {
            let factor = pow10(decimals_a - decimals_b)?;
            let scaled = numerator
                .checked_mul(factor)
                .ok_or_else(|| PoolError::math_overflow("rate scaling", &[&numerator, &factor]))?;
            (scaled, denominator)
        } else {
            let factor = pow10(decimals_b - decimals_a)?;
            let scaled = denominator
                .checked_mul(factor)
                .ok_or_else(|| PoolError::math_overflow("rate scaling", &[&denominator, &factor]))?;
            (numerator, scaled)
        };
        Self::new(numerator, denominator)
    }

    pub fn numerator(&self) -> Amount {
        self.numerator
    }

    pub fn denominator(&self) -> Amount {
        self.denominator
    }

    /// A zero rate cannot price either side
    pub fn is_degenerate(&self) -> bool {
        self.numerator == Amount::ZERO
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

/// Largest proportional pair a user can redeem into liquidity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedeemablePair {
    #[serde(with = "amount_serde")]
    pub out_a: Amount,
    #[serde(with = "amount_serde")]
    pub out_b: Amount,
}

impl RedeemablePair {
    pub fn get(&self, side: Side) -> Amount {
        match side {
            Side::A => self.out_a,
            Side::B => self.out_b,
        }
    }
}

/// Rule for choosing between two valid redeemable candidates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedeemTieBreak {
    /// Take the candidate with the smaller first output
    #[default]
    MinimizeClaim,
    /// Take the candidate with the larger first output
    MaximizeClaim,
}

/// Percentage with six fractional digits, stored scaled by 10^6
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct SharePercent(Amount);

impl SharePercent {
    pub const ZERO: SharePercent = SharePercent(Amount::ZERO);

    /// Wrap a value already scaled by 10^6
    pub fn from_scaled(scaled: Amount) -> Self {
        Self(scaled)
    }

    pub fn scaled(&self) -> Amount {
        self.0
    }

    /// Exactly one hundred percent
    pub fn full() -> Self {
        Self(Amount::new(100 * SHARE_SCALE))
    }
}

impl fmt::Display for SharePercent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scale = Amount::new(SHARE_SCALE);
        let whole = self.0 / scale;
        let fraction = self.0 % scale;
        write!(
            f,
            "{}.{:0>width$}",
            whole,
            fraction.to_string(),
            width = SHARE_DECIMALS as usize
        )
    }
}

/// Pool-wide state returned by the pool contract's `info` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolInfo {
    /// Pool tokens minted so far
    pub total_minted: Amount,
    /// Balances of both constituents held by the pool
    pub pool_balances: Reserves,
    /// Protocol fee balances accrued by the pool
    pub protocol_balances: Reserves,
    pub token_a: TokenId,
    pub token_b: TokenId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supply_invariant() {
        assert!(PoolTokenSupply::new(Amount::new(250), Amount::new(1000)).is_ok());
        assert!(PoolTokenSupply::new(Amount::new(1000), Amount::new(1000)).is_ok());
        assert!(PoolTokenSupply::new(Amount::ZERO, Amount::ZERO).is_ok());

        let err = PoolTokenSupply::new(Amount::new(1001), Amount::new(1000)).unwrap_err();
        assert!(matches!(err, PoolError::InconsistentSupply { .. }));
    }

    #[test]
    fn test_rate_construction() {
        assert!(Rate::new(Amount::new(2), Amount::ZERO).is_err());
        assert!(Rate::new(Amount::ZERO, Amount::ONE).unwrap().is_degenerate());

        let balances = Reserves::new(Amount::new(2_000), Amount::ZERO);
        assert!(Rate::from_pool_balances(&balances).is_none());

        let balances = Reserves::new(Amount::new(2_000), Amount::new(1_000));
        let rate = Rate::from_pool_balances(&balances).unwrap();
        assert_eq!(rate.to_string(), "2000/1000");

        let rate = Rate::from_decimal_units(Amount::new(2), Amount::ONE, 6, 6).unwrap();
        assert_eq!(rate.to_string(), "2/1");
        let rate = Rate::from_decimal_units(Amount::new(2), Amount::ONE, 8, 6).unwrap();
        assert_eq!(rate.to_string(), "200/1");
        let rate = Rate::from_decimal_units(Amount::new(2), Amount::ONE, 0, 2).unwrap();
        assert_eq!(rate.to_string(), "2/100");
    }

    #[test]
    fn test_share_percent_display() {
        assert_eq!(SharePercent::ZERO.to_string(), "0.000000");
        assert_eq!(SharePercent::full().to_string(), "100.000000");
        assert_eq!(
            SharePercent::from_scaled(Amount::new(25_000_000)).to_string(),
            "25.000000"
        );
        assert_eq!(
            SharePercent::from_scaled(Amount::new(33_333_333)).to_string(),
            "33.333333"
        );
        assert_eq!(SharePercent::from_scaled(Amount::new(42)).to_string(), "0.000042");
    }
}
