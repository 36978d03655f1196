//! In-memory ledger for tests and demos
//!
//! `InMemoryLedger` implements every port. Contract calls are validated and
//! simulated when built, but only change balances once the broadcast group
//! is reported final. Failure points can be armed to make the next matching
//! call fail.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

use pairpool_math::{mul_div_floor, safe_add, safe_sub};
use pairpool_types::{
    Address, Amount, PoolId, PoolInfo, PoolPair, Reserves, Side, SwapDirection, TokenId,
};

use crate::ports::{
    Broadcaster, FinalityStatus, PoolCall, PoolContract, PortError, PortResult, Ports,
    SignedTransaction, SignerError, TokenContract, TransactionPayload, TransactionSigner, TxId,
    UnsignedTransaction,
};

/// Call that fails when armed; each arming fails exactly one matching call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    /// `TokenContract::balance_of` returns an RPC error
    BalanceQuery,
    /// `TokenContract::allowance` returns an RPC error
    AllowanceQuery,
    /// `TokenContract::approve` is rejected
    Approve,
    /// `TokenContract::transfer` is rejected
    Transfer,
    /// The next state-changing pool contract call is rejected
    PoolCall,
    /// The signer refuses
    SignRejected,
    /// The signer cannot be reached
    SignUnavailable,
    /// `Broadcaster::submit` fails
    Submit,
    /// The next finality poll returns a transport error
    FinalityTransport,
    /// The next submitted group never becomes final
    NeverFinal,
}

/// A state change recorded on the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerCall {
    Approve {
        token: TokenId,
        owner: Address,
        spender: Address,
        amount: Amount,
    },
    Transfer {
        token: TokenId,
        from: Address,
        to: Address,
        amount: Amount,
    },
    DepositReserve {
        pool: PoolId,
        owner: Address,
        side: Side,
        amount: Amount,
    },
    WithdrawReserve {
        pool: PoolId,
        owner: Address,
        side: Side,
        amount: Amount,
    },
    DepositLiquidity {
        pool: PoolId,
        owner: Address,
        amounts: Reserves,
        minted: Amount,
    },
    WithdrawLiquidity {
        pool: PoolId,
        owner: Address,
        burned: Amount,
        released: Reserves,
    },
    Swap {
        pool: PoolId,
        owner: Address,
        direction: SwapDirection,
        amount_in: Amount,
        amount_out: Amount,
    },
}

struct PoolLedger {
    pair: PoolPair,
    balances: Reserves,
    total_minted: Amount,
    reserves: HashMap<Address, Reserves>,
}

struct BroadcastGroup {
    calls: Vec<LedgerCall>,
    polls: u32,
    never_final: bool,
    confirmed_round: Option<u64>,
}

#[derive(Default)]
struct LedgerState {
    round: u64,
    balances: HashMap<(TokenId, Address), Amount>,
    allowances: HashMap<(TokenId, Address, Address), Amount>,
    pools: HashMap<PoolId, PoolLedger>,
    drafts: HashMap<u64, LedgerCall>,
    next_draft: u64,
    next_tx: u64,
    groups: HashMap<TxId, BroadcastGroup>,
    applied: Vec<LedgerCall>,
    /// Matching calls still allowed to succeed before each armed failure
    armed: HashMap<FailPoint, u32>,
    /// Allowance zeroed once the counted number of further reads are served
    revocation: Option<(u32, (TokenId, Address, Address))>,
    pending_rounds: u32,
    signatures: usize,
}

/// Scripted fake ledger implementing every port
#[derive(Default)]
pub struct InMemoryLedger {
    state: Mutex<LedgerState>,
}

fn rejected(error: impl std::fmt::Display) -> PortError {
    PortError::Rejected(error.to_string())
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// All four ports backed by this ledger
    pub fn ports(self: &Arc<Self>) -> Ports {
        Ports {
            tokens: self.clone(),
            pool: self.clone(),
            signer: self.clone(),
            broadcaster: self.clone(),
        }
    }

    fn state(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ========================================================================
    // Setup
    // ========================================================================

    /// Credit `amount` of `token` to `owner`'s wallet
    pub fn mint(&self, token: TokenId, owner: &Address, amount: Amount) {
        let mut state = self.state();
        let balance = state.balances.entry((token, owner.clone())).or_default();
        *balance = balance.saturating_add(amount);
    }

    /// Register a pool with existing liquidity
    pub fn create_pool(&self, pair: &PoolPair, balances: Reserves, total_minted: Amount) {
        self.state().pools.insert(
            pair.pool_id,
            PoolLedger {
                pair: pair.clone(),
                balances,
                total_minted,
                reserves: HashMap::new(),
            },
        );
    }

    pub fn set_reserves(&self, pool: PoolId, owner: &Address, reserves: Reserves) {
        if let Some(ledger) = self.state().pools.get_mut(&pool) {
            ledger.reserves.insert(owner.clone(), reserves);
        }
    }

    pub fn set_allowance(&self, token: TokenId, owner: &Address, spender: &Address, amount: Amount) {
        self.state()
            .allowances
            .insert((token, owner.clone(), spender.clone()), amount);
    }

    /// Make the next call matching `point` fail
    pub fn arm(&self, point: FailPoint) {
        self.arm_after(point, 0);
    }

    /// Let `skip` calls matching `point` succeed, then fail the next one
    pub fn arm_after(&self, point: FailPoint, skip: u32) {
        self.state().armed.insert(point, skip);
    }

    /// Zero an allowance after `reads` more allowance queries are served
    pub fn revoke_allowance_after(&self, token: TokenId, owner: &Address, spender: &Address, reads: u32) {
        self.state().revocation = Some((reads, (token, owner.clone(), spender.clone())));
    }

    /// Pending polls each broadcast group answers before it is final
    pub fn set_pending_rounds(&self, rounds: u32) {
        self.state().pending_rounds = rounds;
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    pub fn balance(&self, token: TokenId, owner: &Address) -> Amount {
        self.state()
            .balances
            .get(&(token, owner.clone()))
            .copied()
            .unwrap_or_default()
    }

    pub fn allowance_amount(&self, token: TokenId, owner: &Address, spender: &Address) -> Amount {
        self.state()
            .allowances
            .get(&(token, owner.clone(), spender.clone()))
            .copied()
            .unwrap_or_default()
    }

    pub fn user_reserves(&self, pool: PoolId, owner: &Address) -> Reserves {
        self.state()
            .pools
            .get(&pool)
            .and_then(|ledger| ledger.reserves.get(owner).copied())
            .unwrap_or_default()
    }

    pub fn pool_balances(&self, pool: PoolId) -> Reserves {
        self.state()
            .pools
            .get(&pool)
            .map(|ledger| ledger.balances)
            .unwrap_or_default()
    }

    pub fn total_minted(&self, pool: PoolId) -> Amount {
        self.state()
            .pools
            .get(&pool)
            .map(|ledger| ledger.total_minted)
            .unwrap_or_default()
    }

    /// Calls that reached finality, in order
    pub fn applied_calls(&self) -> Vec<LedgerCall> {
        self.state().applied.clone()
    }

    /// Number of broadcast groups submitted
    pub fn submitted_groups(&self) -> usize {
        self.state().groups.len()
    }

    /// Number of signing requests served
    pub fn signatures(&self) -> usize {
        self.state().signatures
    }
}

impl LedgerState {
    fn take_armed(&mut self, point: FailPoint) -> bool {
        match self.armed.get_mut(&point) {
            Some(0) => {
                self.armed.remove(&point);
                true
            }
            Some(skip) => {
                *skip -= 1;
                false
            }
            None => false,
        }
    }

    fn draft(&mut self, call: LedgerCall) -> TransactionPayload {
        self.next_draft += 1;
        let id = self.next_draft;
        self.drafts.insert(id, call);
        TransactionPayload::new(vec![UnsignedTransaction(id.to_be_bytes().to_vec())])
    }

    fn balance(&self, token: TokenId, owner: &Address) -> Amount {
        self.balances
            .get(&(token, owner.clone()))
            .copied()
            .unwrap_or_default()
    }

    fn pool(&self, pool: PoolId) -> PortResult<&PoolLedger> {
        self.pools
            .get(&pool)
            .ok_or_else(|| rejected(format!("unknown pool {}", pool)))
    }

    fn pool_mut(&mut self, pool: PoolId) -> PortResult<&mut PoolLedger> {
        self.pools
            .get_mut(&pool)
            .ok_or_else(|| rejected(format!("unknown pool {}", pool)))
    }

    fn reserves(&self, pool: PoolId, owner: &Address) -> PortResult<Reserves> {
        Ok(self.pool(pool)?.reserves.get(owner).copied().unwrap_or_default())
    }

    fn debit_balance(&mut self, token: TokenId, owner: &Address, amount: Amount) -> PortResult<()> {
        let balance = self.balances.entry((token, owner.clone())).or_default();
        *balance = safe_sub(*balance, amount).map_err(rejected)?;
        Ok(())
    }

    fn credit_balance(&mut self, token: TokenId, owner: &Address, amount: Amount) -> PortResult<()> {
        let balance = self.balances.entry((token, owner.clone())).or_default();
        *balance = safe_add(*balance, amount).map_err(rejected)?;
        Ok(())
    }

    fn spend_allowance(&mut self, token: TokenId, owner: &Address, spender: &Address, amount: Amount) -> PortResult<()> {
        let allowance = self
            .allowances
            .entry((token, owner.clone(), spender.clone()))
            .or_default();
        let current = *allowance;
        *allowance = safe_sub(current, amount)
            .map_err(|_| rejected(format!("allowance of {} short of {}", current, amount)))?;
        Ok(())
    }

    fn adjust_reserve(&mut self, pool: PoolId, owner: &Address, side: Side, amount: Amount, credit: bool) -> PortResult<()> {
        let ledger = self.pool_mut(pool)?;
        let reserves = ledger.reserves.entry(owner.clone()).or_default();
        let slot = match side {
            Side::A => &mut reserves.a,
            Side::B => &mut reserves.b,
        };
        *slot = if credit {
            safe_add(*slot, amount)
        } else {
            safe_sub(*slot, amount)
        }
        .map_err(rejected)?;
        Ok(())
    }

    fn adjust_pool_balance(&mut self, pool: PoolId, side: Side, amount: Amount, credit: bool) -> PortResult<()> {
        let ledger = self.pool_mut(pool)?;
        let slot = match side {
            Side::A => &mut ledger.balances.a,
            Side::B => &mut ledger.balances.b,
        };
        *slot = if credit {
            safe_add(*slot, amount)
        } else {
            safe_sub(*slot, amount)
        }
        .map_err(rejected)?;
        Ok(())
    }

    /// Apply a confirmed call; validation already ran when it was built
    fn apply(&mut self, call: &LedgerCall) -> PortResult<()> {
        match call {
            LedgerCall::Approve {
                token,
                owner,
                spender,
                amount,
            } => {
                self.allowances
                    .insert((*token, owner.clone(), spender.clone()), *amount);
            }
            LedgerCall::Transfer {
                token,
                from,
                to,
                amount,
            } => {
                self.debit_balance(*token, from, *amount)?;
                self.credit_balance(*token, to, *amount)?;
            }
            LedgerCall::DepositReserve {
                pool,
                owner,
                side,
                amount,
            } => {
                let pair = self.pool(*pool)?.pair.clone();
                let token = pair.token(*side);
                self.spend_allowance(token, owner, &pair.pool_address, *amount)?;
                self.debit_balance(token, owner, *amount)?;
                self.adjust_reserve(*pool, owner, *side, *amount, true)?;
            }
            LedgerCall::WithdrawReserve {
                pool,
                owner,
                side,
                amount,
            } => {
                let token = self.pool(*pool)?.pair.token(*side);
                self.adjust_reserve(*pool, owner, *side, *amount, false)?;
                self.credit_balance(token, owner, *amount)?;
            }
            LedgerCall::DepositLiquidity {
                pool,
                owner,
                amounts,
                minted,
            } => {
                let pool_token = self.pool(*pool)?.pair.pool_token;
                self.adjust_reserve(*pool, owner, Side::A, amounts.a, false)?;
                self.adjust_reserve(*pool, owner, Side::B, amounts.b, false)?;
                self.adjust_pool_balance(*pool, Side::A, amounts.a, true)?;
                self.adjust_pool_balance(*pool, Side::B, amounts.b, true)?;
                let ledger = self.pool_mut(*pool)?;
                ledger.total_minted = safe_add(ledger.total_minted, *minted).map_err(rejected)?;
                self.credit_balance(pool_token, owner, *minted)?;
            }
            LedgerCall::WithdrawLiquidity {
                pool,
                owner,
                burned,
                released,
            } => {
                let pair = self.pool(*pool)?.pair.clone();
                self.spend_allowance(pair.pool_token, owner, &pair.pool_address, *burned)?;
                self.debit_balance(pair.pool_token, owner, *burned)?;
                let ledger = self.pool_mut(*pool)?;
                ledger.total_minted = safe_sub(ledger.total_minted, *burned).map_err(rejected)?;
                self.adjust_pool_balance(*pool, Side::A, released.a, false)?;
                self.adjust_pool_balance(*pool, Side::B, released.b, false)?;
                self.adjust_reserve(*pool, owner, Side::A, released.a, true)?;
                self.adjust_reserve(*pool, owner, Side::B, released.b, true)?;
            }
            LedgerCall::Swap {
                pool,
                owner,
                direction,
                amount_in,
                amount_out,
            } => {
                let pair = self.pool(*pool)?.pair.clone();
                let token_in = pair.token(direction.input_side());
                self.spend_allowance(token_in, owner, &pair.pool_address, *amount_in)?;
                self.debit_balance(token_in, owner, *amount_in)?;
                self.adjust_pool_balance(*pool, direction.input_side(), *amount_in, true)?;
                self.adjust_pool_balance(*pool, direction.output_side(), *amount_out, false)?;
                // Output lands in the trader's pool reserve
                self.adjust_reserve(*pool, owner, direction.output_side(), *amount_out, true)?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl TokenContract for InMemoryLedger {
    async fn balance_of(&self, token: TokenId, owner: &Address) -> PortResult<Amount> {
        let mut state = self.state();
        if state.take_armed(FailPoint::BalanceQuery) {
            return Err(PortError::Rpc("balance query failed".to_string()));
        }
        Ok(state.balance(token, owner))
    }

    async fn allowance(&self, token: TokenId, owner: &Address, spender: &Address) -> PortResult<Amount> {
        let mut state = self.state();
        if state.take_armed(FailPoint::AllowanceQuery) {
            return Err(PortError::Rpc("allowance query failed".to_string()));
        }
        if let Some((reads, key)) = state.revocation.take() {
            if reads == 0 {
                state.allowances.insert(key, Amount::ZERO);
            } else {
                state.revocation = Some((reads - 1, key));
            }
        }
        Ok(state
            .allowances
            .get(&(token, owner.clone(), spender.clone()))
            .copied()
            .unwrap_or_default())
    }

    async fn approve(
        &self,
        token: TokenId,
        owner: &Address,
        spender: &Address,
        amount: Amount,
    ) -> PortResult<TransactionPayload> {
        let mut state = self.state();
        if state.take_armed(FailPoint::Approve) {
            return Err(rejected("approve rejected"));
        }
        Ok(state.draft(LedgerCall::Approve {
            token,
            owner: owner.clone(),
            spender: spender.clone(),
            amount,
        }))
    }

    async fn transfer(
        &self,
        token: TokenId,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> PortResult<TransactionPayload> {
        let mut state = self.state();
        if state.take_armed(FailPoint::Transfer) {
            return Err(rejected("transfer rejected"));
        }
        if state.balance(token, from) < amount {
            return Err(rejected("transfer exceeds balance"));
        }
        Ok(state.draft(LedgerCall::Transfer {
            token,
            from: from.clone(),
            to: to.clone(),
            amount,
        }))
    }
}

#[async_trait]
impl PoolContract for InMemoryLedger {
    async fn reserves(&self, pool: PoolId, owner: &Address) -> PortResult<Reserves> {
        self.state().reserves(pool, owner)
    }

    async fn info(&self, pool: PoolId) -> PortResult<PoolInfo> {
        let state = self.state();
        let ledger = state.pool(pool)?;
        Ok(PoolInfo {
            total_minted: ledger.total_minted,
            pool_balances: ledger.balances,
            protocol_balances: Reserves::default(),
            token_a: ledger.pair.token_a,
            token_b: ledger.pair.token_b,
        })
    }

    async fn deposit_reserve(
        &self,
        pool: PoolId,
        owner: &Address,
        amount: Amount,
        side: Side,
    ) -> PortResult<TransactionPayload> {
        let mut state = self.state();
        if state.take_armed(FailPoint::PoolCall) {
            return Err(rejected("deposit reserve rejected"));
        }
        let token = state.pool(pool)?.pair.token(side);
        if state.balance(token, owner) < amount {
            return Err(rejected("deposit exceeds balance"));
        }
        Ok(state.draft(LedgerCall::DepositReserve {
            pool,
            owner: owner.clone(),
            side,
            amount,
        }))
    }

    async fn withdraw_reserve(
        &self,
        pool: PoolId,
        owner: &Address,
        amount: Amount,
        side: Side,
    ) -> PortResult<TransactionPayload> {
        let mut state = self.state();
        if state.take_armed(FailPoint::PoolCall) {
            return Err(rejected("withdraw reserve rejected"));
        }
        if state.reserves(pool, owner)?.get(side) < amount {
            return Err(rejected("withdrawal exceeds reserve"));
        }
        Ok(state.draft(LedgerCall::WithdrawReserve {
            pool,
            owner: owner.clone(),
            side,
            amount,
        }))
    }

    async fn deposit_liquidity(
        &self,
        pool: PoolId,
        owner: &Address,
        amounts: Reserves,
        min_out: Amount,
    ) -> PortResult<PoolCall<Amount>> {
        let mut state = self.state();
        if state.take_armed(FailPoint::PoolCall) {
            return Err(rejected("deposit liquidity rejected"));
        }
        let reserves = state.reserves(pool, owner)?;
        if reserves.a < amounts.a || reserves.b < amounts.b {
            return Err(rejected("deposit exceeds reserves"));
        }

        let ledger = state.pool(pool)?;
        let minted = if ledger.total_minted == Amount::ZERO || ledger.balances.is_empty() {
            amounts.a
        } else {
            let via_a = mul_div_floor(amounts.a, ledger.total_minted, ledger.balances.a).map_err(rejected)?;
            let via_b = mul_div_floor(amounts.b, ledger.total_minted, ledger.balances.b).map_err(rejected)?;
            via_a.min(via_b)
        };
        if minted < min_out {
            return Err(rejected(format!("minted {} below minimum {}", minted, min_out)));
        }

        let payload = state.draft(LedgerCall::DepositLiquidity {
            pool,
            owner: owner.clone(),
            amounts,
            minted,
        });
        Ok(PoolCall {
            payload,
            return_value: minted,
        })
    }

    async fn withdraw_liquidity(
        &self,
        pool: PoolId,
        owner: &Address,
        amount: Amount,
        min_out: Reserves,
    ) -> PortResult<PoolCall<Reserves>> {
        let mut state = self.state();
        if state.take_armed(FailPoint::PoolCall) {
            return Err(rejected("withdraw liquidity rejected"));
        }
        let pool_token = state.pool(pool)?.pair.pool_token;
        if state.balance(pool_token, owner) < amount {
            return Err(rejected("burn exceeds pool-token balance"));
        }

        let ledger = state.pool(pool)?;
        let released = Reserves::new(
            mul_div_floor(amount, ledger.balances.a, ledger.total_minted).map_err(rejected)?,
            mul_div_floor(amount, ledger.balances.b, ledger.total_minted).map_err(rejected)?,
        );
        if released.a < min_out.a || released.b < min_out.b {
            return Err(rejected("released amounts below minimum"));
        }

        let payload = state.draft(LedgerCall::WithdrawLiquidity {
            pool,
            owner: owner.clone(),
            burned: amount,
            released,
        });
        Ok(PoolCall {
            payload,
            return_value: released,
        })
    }

    async fn swap(
        &self,
        pool: PoolId,
        owner: &Address,
        amount: Amount,
        direction: SwapDirection,
        min_out: Amount,
    ) -> PortResult<PoolCall<Amount>> {
        let mut state = self.state();
        if state.take_armed(FailPoint::PoolCall) {
            return Err(rejected("swap rejected"));
        }
        let ledger = state.pool(pool)?;
        let token_in = ledger.pair.token(direction.input_side());
        let reserve_in = ledger.balances.get(direction.input_side());
        let reserve_out = ledger.balances.get(direction.output_side());

        // Constant product without fees
        let denominator = safe_add(reserve_in, amount).map_err(rejected)?;
        let amount_out = mul_div_floor(reserve_out, amount, denominator).map_err(rejected)?;
        if amount_out < min_out {
            return Err(rejected(format!("output {} below minimum {}", amount_out, min_out)));
        }
        if state.balance(token_in, owner) < amount {
            return Err(rejected("swap exceeds balance"));
        }

        let payload = state.draft(LedgerCall::Swap {
            pool,
            owner: owner.clone(),
            direction,
            amount_in: amount,
            amount_out,
        });
        Ok(PoolCall {
            payload,
            return_value: amount_out,
        })
    }
}

#[async_trait]
impl TransactionSigner for InMemoryLedger {
    async fn sign(&self, transactions: &[UnsignedTransaction]) -> Result<Vec<SignedTransaction>, SignerError> {
        let mut state = self.state();
        if state.take_armed(FailPoint::SignRejected) {
            return Err(SignerError::Rejected("user declined".to_string()));
        }
        if state.take_armed(FailPoint::SignUnavailable) {
            return Err(SignerError::Unavailable("wallet disconnected".to_string()));
        }
        state.signatures += 1;
        Ok(transactions
            .iter()
            .map(|tx| SignedTransaction(tx.0.clone()))
            .collect())
    }
}

#[async_trait]
impl Broadcaster for InMemoryLedger {
    async fn submit(&self, transactions: &[SignedTransaction]) -> PortResult<TxId> {
        let mut state = self.state();
        if state.take_armed(FailPoint::Submit) {
            return Err(PortError::Rpc("broadcast failed".to_string()));
        }

        let mut calls = Vec::with_capacity(transactions.len());
        for tx in transactions {
            let bytes: [u8; 8] = tx
                .0
                .as_slice()
                .try_into()
                .map_err(|_| rejected("malformed transaction"))?;
            let call = state
                .drafts
                .remove(&u64::from_be_bytes(bytes))
                .ok_or_else(|| rejected("unknown or already submitted transaction"))?;
            calls.push(call);
        }

        state.next_tx += 1;
        let tx_id = TxId::new(format!("TX{}", state.next_tx));
        let never_final = state.take_armed(FailPoint::NeverFinal);
        debug!("Ledger accepted {} with {} calls", tx_id, calls.len());
        state.groups.insert(
            tx_id.clone(),
            BroadcastGroup {
                calls,
                polls: 0,
                never_final,
                confirmed_round: None,
            },
        );
        Ok(tx_id)
    }

    async fn poll_finality(&self, tx_id: &TxId) -> PortResult<FinalityStatus> {
        let mut state = self.state();
        if state.take_armed(FailPoint::FinalityTransport) {
            return Err(PortError::Rpc("finality oracle unreachable".to_string()));
        }

        let pending_rounds = state.pending_rounds;
        let group = state
            .groups
            .get_mut(tx_id)
            .ok_or_else(|| rejected(format!("unknown transaction {}", tx_id)))?;
        if let Some(confirmed_round) = group.confirmed_round {
            return Ok(FinalityStatus::Confirmed { confirmed_round });
        }
        group.polls += 1;
        if group.never_final || group.polls <= pending_rounds {
            return Ok(FinalityStatus::Pending);
        }
        let calls = group.calls.clone();

        for call in &calls {
            state.apply(call)?;
        }
        state.applied.extend(calls);
        state.round += 1;
        let confirmed_round = state.round;
        if let Some(group) = state.groups.get_mut(tx_id) {
            group.confirmed_round = Some(confirmed_round);
        }
        Ok(FinalityStatus::Confirmed { confirmed_round })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair() -> PoolPair {
        PoolPair {
            pool_id: PoolId(1),
            pool_address: Address::new("POOL"),
            pool_token: TokenId(1),
            token_a: TokenId(10),
            token_b: TokenId(20),
        }
    }

    async fn settle(ledger: &InMemoryLedger, payload: TransactionPayload) -> FinalityStatus {
        let signed = ledger.sign(&payload.transactions).await.unwrap();
        let tx_id = ledger.submit(&signed).await.unwrap();
        ledger.poll_finality(&tx_id).await.unwrap()
    }

    #[tokio::test]
    async fn test_effects_apply_only_at_finality() {
        let ledger = InMemoryLedger::new();
        let owner = Address::new("ME");
        let pair = pair();
        ledger.create_pool(&pair, Reserves::default(), Amount::ZERO);
        ledger.mint(pair.token_a, &owner, Amount::new(100));
        ledger.set_allowance(pair.token_a, &owner, &pair.pool_address, Amount::new(100));
        ledger.set_pending_rounds(1);

        let payload = ledger
            .deposit_reserve(pair.pool_id, &owner, Amount::new(40), Side::A)
            .await
            .unwrap();
        let signed = ledger.sign(&payload.transactions).await.unwrap();
        let tx_id = ledger.submit(&signed).await.unwrap();

        assert_eq!(ledger.poll_finality(&tx_id).await.unwrap(), FinalityStatus::Pending);
        assert_eq!(ledger.balance(pair.token_a, &owner), Amount::new(100));

        assert!(matches!(
            ledger.poll_finality(&tx_id).await.unwrap(),
            FinalityStatus::Confirmed { .. }
        ));
        assert_eq!(ledger.balance(pair.token_a, &owner), Amount::new(60));
        assert_eq!(ledger.user_reserves(pair.pool_id, &owner).a, Amount::new(40));
        assert_eq!(
            ledger.allowance_amount(pair.token_a, &owner, &pair.pool_address),
            Amount::new(60)
        );
    }

    #[tokio::test]
    async fn test_approve_replaces_allowance() {
        let ledger = InMemoryLedger::new();
        let owner = Address::new("ME");
        let spender = Address::new("POOL");
        ledger.set_allowance(TokenId(10), &owner, &spender, Amount::new(70));

        let payload = ledger
            .approve(TokenId(10), &owner, &spender, Amount::new(30))
            .await
            .unwrap();
        settle(&ledger, payload).await;

        assert_eq!(ledger.allowance_amount(TokenId(10), &owner, &spender), Amount::new(30));
    }

    #[tokio::test]
    async fn test_armed_failures_fire_once() {
        let ledger = InMemoryLedger::new();
        let owner = Address::new("ME");
        ledger.arm(FailPoint::BalanceQuery);

        assert!(ledger.balance_of(TokenId(10), &owner).await.is_err());
        assert!(ledger.balance_of(TokenId(10), &owner).await.is_ok());

        ledger.arm_after(FailPoint::BalanceQuery, 2);
        assert!(ledger.balance_of(TokenId(10), &owner).await.is_ok());
        assert!(ledger.balance_of(TokenId(10), &owner).await.is_ok());
        assert!(ledger.balance_of(TokenId(10), &owner).await.is_err());
        assert!(ledger.balance_of(TokenId(10), &owner).await.is_ok());
    }

    #[tokio::test]
    async fn test_scheduled_revocation() {
        let ledger = InMemoryLedger::new();
        let owner = Address::new("ME");
        let spender = Address::new("POOL");
        ledger.set_allowance(TokenId(10), &owner, &spender, Amount::new(5));
        ledger.revoke_allowance_after(TokenId(10), &owner, &spender, 1);

        assert_eq!(ledger.allowance(TokenId(10), &owner, &spender).await.unwrap(), Amount::new(5));
        assert_eq!(ledger.allowance(TokenId(10), &owner, &spender).await.unwrap(), Amount::ZERO);
    }

    #[tokio::test]
    async fn test_payload_cannot_be_submitted_twice() {
        let ledger = InMemoryLedger::new();
        let owner = Address::new("ME");
        let payload = ledger
            .approve(TokenId(10), &owner, &Address::new("POOL"), Amount::ONE)
            .await
            .unwrap();
        let signed = ledger.sign(&payload.transactions).await.unwrap();

        assert!(ledger.submit(&signed).await.is_ok());
        assert!(ledger.submit(&signed).await.is_err());
    }
}
