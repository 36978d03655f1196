//! Token and pool identity

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::amount::amount_serde;
use crate::Amount;

/// Ledger identifier of a token contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenId(pub u64);

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ledger identifier of a pool contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PoolId(pub u64);

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Account address on the ledger
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(pub String);

impl Address {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Immutable reference data for a token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub id: TokenId,
    pub name: String,
    pub symbol: String,
    /// Decimal precision; atomic amounts are scaled by 10^decimals
    pub decimals: u8,
    #[serde(with = "amount_serde")]
    pub total_supply: Amount,
}

/// A two-asset pool and the addresses needed to operate on it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolPair {
    pub pool_id: PoolId,
    /// Account of the pool contract; spender for every allowance
    pub pool_address: Address,
    /// Liquidity token minted by the pool
    pub pool_token: TokenId,
    pub token_a: TokenId,
    pub token_b: TokenId,
}

impl PoolPair {
    /// Token held on the given side of the pool
    pub fn token(&self, side: Side) -> TokenId {
        match side {
            Side::A => self.token_a,
            Side::B => self.token_b,
        }
    }

    /// Token contract backing an asset
    pub fn asset_token(&self, asset: Asset) -> TokenId {
        match asset {
            Asset::Token(side) => self.token(side),
            Asset::PoolToken => self.pool_token,
        }
    }
}

/// Which constituent of the pool an amount refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    A,
    B,
}

impl Side {
    pub fn other(self) -> Self {
        match self {
            Side::A => Side::B,
            Side::B => Side::A,
        }
    }

    /// Side flag passed to the pool contract (`true` for A)
    pub fn is_a(self) -> bool {
        matches!(self, Side::A)
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::A => f.write_str("A"),
            Side::B => f.write_str("B"),
        }
    }
}

/// Anything the user can hold or approve: either constituent or the pool token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Asset {
    Token(Side),
    PoolToken,
}

/// Direction of a swap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SwapDirection {
    AForB,
    BForA,
}

impl SwapDirection {
    pub fn input_side(self) -> Side {
        match self {
            SwapDirection::AForB => Side::A,
            SwapDirection::BForA => Side::B,
        }
    }

    pub fn output_side(self) -> Side {
        self.input_side().other()
    }

    /// Direction flag passed to the pool contract (`true` for A into B)
    pub fn is_a_for_b(self) -> bool {
        matches!(self, SwapDirection::AForB)
    }
}
