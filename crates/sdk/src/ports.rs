//! Core trait abstractions (ports) for the ledger-facing collaborators
//!
//! The engine never talks to a ledger directly. Token and pool contracts,
//! the signer and the broadcaster are consumed through these traits and
//! held as `Arc<dyn …>`.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use pairpool_types::{Address, Amount, PoolId, PoolInfo, Reserves, Side, SwapDirection, TokenId};

/// Failure reported by a contract or broadcast port
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PortError {
    /// The transport failed; the request may not have reached the ledger
    #[error("RPC error: {0}")]
    Rpc(String),

    /// The ledger or contract refused the request
    #[error("Rejected: {0}")]
    Rejected(String),
}

pub type PortResult<T> = Result<T, PortError>;

/// Failure reported by the signer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignerError {
    #[error("signature rejected: {0}")]
    Rejected(String),

    #[error("signer unavailable: {0}")]
    Unavailable(String),
}

// ============================================================================
// Payloads
// ============================================================================

/// Opaque unsigned transaction bytes produced by a contract port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedTransaction(pub Vec<u8>);

/// Opaque signed transaction bytes produced by the signer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction(pub Vec<u8>);

/// Group of transactions that must be signed and broadcast together
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TransactionPayload {
    pub transactions: Vec<UnsignedTransaction>,
}

impl TransactionPayload {
    pub fn new(transactions: Vec<UnsignedTransaction>) -> Self {
        Self { transactions }
    }
}

/// Payload plus the value the contract call returns when simulated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolCall<T> {
    pub payload: TransactionPayload,
    pub return_value: T,
}

/// Ledger identifier of a broadcast transaction group
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TxId(pub String);

impl TxId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Answer of one finality poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalityStatus {
    /// Included in the ledger at `confirmed_round`
    Confirmed { confirmed_round: u64 },
    Pending,
}

// ============================================================================
// Ports
// ============================================================================

/// Fungible token contract
#[async_trait]
pub trait TokenContract: Send + Sync {
    async fn balance_of(&self, token: TokenId, owner: &Address) -> PortResult<Amount>;

    async fn allowance(&self, token: TokenId, owner: &Address, spender: &Address) -> PortResult<Amount>;

    /// Build a transaction that sets `spender`'s allowance to exactly `amount`
    async fn approve(
        &self,
        token: TokenId,
        owner: &Address,
        spender: &Address,
        amount: Amount,
    ) -> PortResult<TransactionPayload>;

    async fn transfer(
        &self,
        token: TokenId,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> PortResult<TransactionPayload>;
}

/// Two-asset pool contract
#[async_trait]
pub trait PoolContract: Send + Sync {
    /// Reserves the pool holds on behalf of `owner`
    async fn reserves(&self, pool: PoolId, owner: &Address) -> PortResult<Reserves>;

    async fn info(&self, pool: PoolId) -> PortResult<PoolInfo>;

    async fn deposit_reserve(
        &self,
        pool: PoolId,
        owner: &Address,
        amount: Amount,
        side: Side,
    ) -> PortResult<TransactionPayload>;

    async fn withdraw_reserve(
        &self,
        pool: PoolId,
        owner: &Address,
        amount: Amount,
        side: Side,
    ) -> PortResult<TransactionPayload>;

    /// Turn reserves into pool tokens; returns the pool tokens minted
    async fn deposit_liquidity(
        &self,
        pool: PoolId,
        owner: &Address,
        amounts: Reserves,
        min_out: Amount,
    ) -> PortResult<PoolCall<Amount>>;

    /// Burn pool tokens back into reserves; returns both amounts released
    async fn withdraw_liquidity(
        &self,
        pool: PoolId,
        owner: &Address,
        amount: Amount,
        min_out: Reserves,
    ) -> PortResult<PoolCall<Reserves>>;

    /// Swap wallet tokens; returns the output amount
    async fn swap(
        &self,
        pool: PoolId,
        owner: &Address,
        amount: Amount,
        direction: SwapDirection,
        min_out: Amount,
    ) -> PortResult<PoolCall<Amount>>;
}

/// External signer; key management lives behind it
#[async_trait]
pub trait TransactionSigner: Send + Sync {
    async fn sign(&self, transactions: &[UnsignedTransaction]) -> Result<Vec<SignedTransaction>, SignerError>;
}

/// Broadcast and finality oracle
#[async_trait]
pub trait Broadcaster: Send + Sync {
    async fn submit(&self, transactions: &[SignedTransaction]) -> PortResult<TxId>;

    async fn poll_finality(&self, tx_id: &TxId) -> PortResult<FinalityStatus>;
}

/// Bundle of every port an engine needs
#[derive(Clone)]
pub struct Ports {
    pub tokens: Arc<dyn TokenContract>,
    pub pool: Arc<dyn PoolContract>,
    pub signer: Arc<dyn TransactionSigner>,
    pub broadcaster: Arc<dyn Broadcaster>,
}

impl fmt::Debug for Ports {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ports").finish_non_exhaustive()
    }
}
