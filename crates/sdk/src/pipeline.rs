//! Transaction pipeline
//!
//! One `TransactionPipeline` drives every operation on one pool. An
//! operation is validated against a fresh snapshot, then moves through a
//! fixed sequence of statuses: optional allowance check and approval,
//! primary submission, signing, broadcast and confirmation. Only a
//! confirmed primary transaction commits, and only a commit moves the
//! refresh version.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex, OwnedMutexGuard};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

use pairpool_math::{
    compute_proportional_withdrawal, required_approval, scale_pair, validate_percent,
};
use pairpool_types::{
    Address, Amount, Asset, OperationRequest, PipelineStatus, PoolError, PoolId, PoolPair, PoolResult,
    RedeemTieBreak, Reserves, Side, SwapDirection, TokenId, TokenMetadata, BPS_DENOMINATOR,
    DEFAULT_CONFIRMATION_ROUNDS, DEFAULT_POLL_INTERVAL_MS,
};

use crate::config::EngineConfig;
use crate::confirmation::{ConfirmationError, ConfirmationOutcome, ConfirmationWaiter};
use crate::errors::{ConfirmationFailure, FailureReason, SdkError, SdkResult};
use crate::operation::{OperationSummary, PendingOperation, PipelineEvent, SummaryLeg};
use crate::ports::{Ports, SignedTransaction, TransactionPayload, TxId};
use crate::store::{PoolSnapshot, PoolStateStore};
use crate::view::{project_pool_view, PoolView};

/// Capacity of the event channel behind `run_operation`
const EVENT_BUFFER: usize = 32;

/// Tunables for one pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    pub confirmation_rounds: u32,
    pub poll_interval: Duration,
    pub slippage_bps: u64,
    pub auto_approve: bool,
    pub tie_break: RedeemTieBreak,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            confirmation_rounds: DEFAULT_CONFIRMATION_ROUNDS,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            slippage_bps: 0,
            auto_approve: true,
            tie_break: RedeemTieBreak::default(),
        }
    }
}

impl PipelineSettings {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            confirmation_rounds: config.confirmation_rounds,
            poll_interval: config.poll_interval(),
            slippage_bps: config.slippage_bps,
            auto_approve: config.auto_approve,
            tie_break: config.redeem_tie_break,
        }
    }
}

/// Validated form of a request, with every amount resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Plan {
    Approve {
        asset: Asset,
        amount: Amount,
    },
    DepositReserve {
        side: Side,
        amount: Amount,
    },
    WithdrawReserve {
        side: Side,
        amount: Amount,
        /// Wallet holds none of the token; a zero self-transfer opts in first
        needs_opt_in: bool,
    },
    AddLiquidity {
        amounts: Reserves,
    },
    RemoveLiquidity {
        burn: Amount,
    },
    Swap {
        direction: SwapDirection,
        amount: Amount,
    },
}

impl Plan {
    /// Asset and amount the pool contract will pull under an allowance
    fn gated_spend(&self) -> Option<(Asset, Amount)> {
        match *self {
            Plan::DepositReserve { side, amount } => Some((Asset::Token(side), amount)),
            Plan::Swap { direction, amount } => {
                Some((Asset::Token(direction.input_side()), amount))
            }
            Plan::RemoveLiquidity { burn } => Some((Asset::PoolToken, burn)),
            Plan::Approve { .. } | Plan::WithdrawReserve { .. } | Plan::AddLiquidity { .. } => {
                None
            }
        }
    }
}

/// What the primary contract call reported when it was built
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CallOutput {
    Nothing,
    Minted(Amount),
    Released(Reserves),
    Received(Amount),
}

struct Inner {
    pair: PoolPair,
    owner: Address,
    registry: HashMap<TokenId, TokenMetadata>,
    ports: Ports,
    waiter: ConfirmationWaiter,
    store: Arc<PoolStateStore>,
    settings: PipelineSettings,
    version: watch::Sender<u64>,
    in_flight: Arc<Mutex<()>>,
    next_id: AtomicU64,
}

/// Single-flight operation driver for one pool
#[derive(Clone)]
pub struct TransactionPipeline {
    inner: Arc<Inner>,
}

impl TransactionPipeline {
    pub fn new(
        pair: PoolPair,
        owner: Address,
        registry: HashMap<TokenId, TokenMetadata>,
        ports: Ports,
        settings: PipelineSettings,
    ) -> Self {
        let (version, version_rx) = watch::channel(0);
        let store = Arc::new(PoolStateStore::new(
            pair.clone(),
            owner.clone(),
            ports.tokens.clone(),
            ports.pool.clone(),
            settings.tie_break,
            version_rx,
        ));
        let waiter = ConfirmationWaiter::new(ports.broadcaster.clone(), settings.poll_interval);

        Self {
            inner: Arc::new(Inner {
                pair,
                owner,
                registry,
                ports,
                waiter,
                store,
                settings,
                version,
                in_flight: Arc::new(Mutex::new(())),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Build the pipeline for one configured pool
    pub fn from_config(config: &EngineConfig, pool_id: PoolId, ports: Ports) -> SdkResult<Self> {
        let pair = config.pool(pool_id)?.pool_pair();
        Ok(Self::new(
            pair,
            config.owner.clone(),
            config.registry(),
            ports,
            PipelineSettings::from_config(config),
        ))
    }

    pub fn pair(&self) -> &PoolPair {
        &self.inner.pair
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.inner.settings
    }

    pub fn store(&self) -> &Arc<PoolStateStore> {
        &self.inner.store
    }

    /// Current refresh version
    pub fn version(&self) -> u64 {
        *self.inner.version.borrow()
    }

    pub fn subscribe_version(&self) -> watch::Receiver<u64> {
        self.inner.version.subscribe()
    }

    /// Pool view over a snapshot at least as new as the current version
    pub async fn view(&self) -> SdkResult<PoolView> {
        let snapshot = self.inner.store.sync().await?;
        Ok(project_pool_view(&snapshot.view_query(self.inner.settings.tie_break))?)
    }

    /// Expected output of a swap, simulated without signing
    pub async fn quote_swap(&self, direction: SwapDirection, amount: Amount) -> SdkResult<Amount> {
        if amount == Amount::ZERO {
            return Err(PoolError::invalid_amount("0", "swap amount must be positive").into());
        }
        let call = self
            .inner
            .ports
            .pool
            .swap(self.inner.pair.pool_id, &self.inner.owner, amount, direction, Amount::ZERO)
            .await?;
        Ok(call.return_value)
    }

    /// Run an operation to a terminal status
    ///
    /// Validation problems and a busy pipeline are returned as errors and
    /// nothing is submitted. Every later failure ends in a `Failed`
    /// operation carrying its reason.
    pub async fn run(&self, request: OperationRequest) -> SdkResult<PendingOperation> {
        let (guard, plan) = self.prepare(&request).await?;
        let operation = self.execute(request, plan, None).await;
        drop(guard);
        Ok(operation)
    }

    /// Start an operation in the background and stream its progress
    ///
    /// The stream yields each status transition, then exactly one
    /// `Committed` or `Failed` event. Dropping the stream does not stop the
    /// operation.
    pub async fn run_operation(
        &self,
        request: OperationRequest,
    ) -> SdkResult<ReceiverStream<PipelineEvent>> {
        let (guard, plan) = self.prepare(&request).await?;
        let (events, receiver) = mpsc::channel(EVENT_BUFFER);

        let pipeline = self.clone();
        tokio::spawn(async move {
            let _guard = guard;
            pipeline.execute(request, plan, Some(events)).await;
        });

        Ok(ReceiverStream::new(receiver))
    }

    async fn prepare(&self, request: &OperationRequest) -> SdkResult<(OwnedMutexGuard<()>, Plan)> {
        if let Some(percent) = request.percent() {
            validate_percent(percent)?;
        }

        let guard = self
            .inner
            .in_flight
            .clone()
            .try_lock_owned()
            .map_err(|_| SdkError::OperationInFlight {
                pool_id: self.inner.pair.pool_id,
            })?;

        // Live state can move without a commit, e.g. after an unconfirmed
        // submission lands late, so every run validates against a refetch.
        let snapshot = self.inner.store.refresh().await?;
        let plan = self.plan(request, &snapshot)?;
        Ok((guard, plan))
    }

    // ========================================================================
    // Validation
    // ========================================================================

    fn plan(&self, request: &OperationRequest, snapshot: &PoolSnapshot) -> PoolResult<Plan> {
        let plan = match *request {
            OperationRequest::Approve { asset, amount } => Plan::Approve { asset, amount },
            OperationRequest::DepositReserve { side, amount } => {
                require_positive(amount, "deposit amount")?;
                self.require_balance(Asset::Token(side), amount, snapshot.balances.get(Asset::Token(side)))?;
                Plan::DepositReserve { side, amount }
            }
            OperationRequest::WithdrawReserve { side, amount } => {
                require_positive(amount, "withdrawal amount")?;
                self.require_balance(Asset::Token(side), amount, snapshot.user_reserves.get(side))?;
                Plan::WithdrawReserve {
                    side,
                    amount,
                    needs_opt_in: snapshot.balances.get(Asset::Token(side)) == Amount::ZERO,
                }
            }
            OperationRequest::AddLiquidity { percent } => {
                let redeemable = snapshot.redeemable.ok_or_else(|| {
                    PoolError::invalid_amount("0", "no reserve pair can be added at the pool rate")
                })?;
                let scaled = scale_pair(&redeemable, percent)?;
                if scaled.out_a == Amount::ZERO || scaled.out_b == Amount::ZERO {
                    return Err(PoolError::invalid_amount(
                        &format!("{}%", percent),
                        "share of the redeemable pair rounds to zero",
                    ));
                }
                self.require_balance(Asset::Token(Side::A), scaled.out_a, snapshot.user_reserves.a)?;
                self.require_balance(Asset::Token(Side::B), scaled.out_b, snapshot.user_reserves.b)?;
                Plan::AddLiquidity {
                    amounts: Reserves::new(scaled.out_a, scaled.out_b),
                }
            }
            OperationRequest::RemoveLiquidity { percent } => {
                let balance = snapshot.balances.get(Asset::PoolToken);
                let burn = compute_proportional_withdrawal(balance, percent)?;
                if burn == Amount::ZERO {
                    return Err(PoolError::invalid_amount(
                        &format!("{}%", percent),
                        "no pool tokens to burn",
                    ));
                }
                Plan::RemoveLiquidity { burn }
            }
            OperationRequest::Swap { direction, amount } => {
                require_positive(amount, "swap amount")?;
                let input = Asset::Token(direction.input_side());
                self.require_balance(input, amount, snapshot.balances.get(input))?;
                Plan::Swap { direction, amount }
            }
        };

        if let Some((asset, amount)) = plan.gated_spend() {
            let approved = snapshot.allowances.get(asset);
            if !self.inner.settings.auto_approve && required_approval(approved, amount).is_some() {
                return Err(PoolError::insufficient_allowance(
                    &self.asset_label(asset).0,
                    amount,
                    approved,
                ));
            }
        }

        Ok(plan)
    }

    fn require_balance(&self, asset: Asset, required: Amount, available: Amount) -> PoolResult<()> {
        if required > available {
            return Err(PoolError::insufficient_balance(
                &self.asset_label(asset).0,
                required,
                available,
            ));
        }
        Ok(())
    }

    /// Symbol and decimals of a token, falling back to a synthetic label
    fn token_label(&self, token: TokenId) -> (String, u8) {
        match self.inner.registry.get(&token) {
            Some(meta) => (meta.symbol.clone(), meta.decimals),
            None if token == self.inner.pair.pool_token => {
                (format!("LP-{}", self.inner.pair.pool_id), 0)
            }
            None => (format!("#{}", token), 0),
        }
    }

    fn asset_label(&self, asset: Asset) -> (String, u8) {
        self.token_label(self.inner.pair.asset_token(asset))
    }

    // ========================================================================
    // Execution
    // ========================================================================

    async fn execute(
        &self,
        request: OperationRequest,
        plan: Plan,
        events: Option<mpsc::Sender<PipelineEvent>>,
    ) -> PendingOperation {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let mut run = Run {
            operation: PendingOperation::new(id, request),
            events,
        };
        info!(
            "Starting {} operation {} on pool {}",
            run.operation.kind(),
            id,
            self.inner.pair.pool_id
        );

        match self.drive(&mut run, plan).await {
            Ok(summary) => {
                self.inner.version.send_modify(|version| *version += 1);
                info!(
                    "Operation {} committed in {} at round {}: {}",
                    id, summary.tx_id, summary.confirmed_round, summary
                );
                run.commit(summary).await;
            }
            Err(reason) => {
                warn!("Operation {} failed: {}", id, reason);
                run.fail(reason).await;
            }
        }

        run.operation
    }

    async fn drive(&self, run: &mut Run, plan: Plan) -> Result<OperationSummary, FailureReason> {
        if let Some((asset, amount)) = plan.gated_spend() {
            run.enter(PipelineStatus::CheckingAllowance).await;
            self.ensure_allowance(run, asset, amount).await?;
        }

        run.enter(PipelineStatus::Submitting).await;
        if let Plan::WithdrawReserve {
            side,
            needs_opt_in: true,
            ..
        } = plan
        {
            self.opt_in(side).await?;
        }
        let (payload, output) = self.build_primary(plan).await?;

        run.enter(PipelineStatus::AwaitingSigning).await;
        let signed = self.sign(&payload).await?;
        let tx_id = self
            .submit(&signed)
            .await
            .map_err(FailureReason::OperationSubmissionFailed)?;

        run.enter(PipelineStatus::AwaitingConfirmation).await;
        let confirmed_round = self
            .confirm(&tx_id, |tx_id, cause| FailureReason::OperationNotConfirmed {
                tx_id,
                cause,
            })
            .await?;

        Ok(OperationSummary {
            operation_id: run.operation.id(),
            kind: run.operation.kind(),
            legs: self.summary_legs(plan, output),
            tx_id,
            confirmed_round,
        })
    }

    /// Approve and confirm when the live allowance is short
    async fn ensure_allowance(&self, run: &mut Run, asset: Asset, amount: Amount) -> Result<(), FailureReason> {
        let inner = &self.inner;
        let token = inner.pair.asset_token(asset);
        let spender = &inner.pair.pool_address;

        let current = inner
            .ports
            .tokens
            .allowance(token, &inner.owner, spender)
            .await
            .map_err(|e| FailureReason::AllowanceFetchFailed(e.to_string()))?;

        let Some(approval) = required_approval(current, amount) else {
            debug!("Allowance {} covers {} on token {}", current, amount, token);
            return Ok(());
        };
        if !inner.settings.auto_approve {
            return Err(FailureReason::ApprovalRequired {
                required: amount,
                approved: current,
            });
        }

        run.enter(PipelineStatus::Approving).await;
        info!("Approving {} of token {} for {}", approval, token, spender);
        let payload = inner
            .ports
            .tokens
            .approve(token, &inner.owner, spender, approval)
            .await
            .map_err(|e| FailureReason::ApprovalSubmissionFailed(e.to_string()))?;
        let signed = self.sign(&payload).await?;
        let tx_id = self
            .submit(&signed)
            .await
            .map_err(FailureReason::ApprovalSubmissionFailed)?;

        run.enter(PipelineStatus::AwaitingApprovalConfirmation).await;
        self.confirm(&tx_id, |tx_id, cause| FailureReason::ApprovalNotConfirmed {
            tx_id,
            cause,
        })
        .await?;
        Ok(())
    }

    /// Zero-amount self-transfer so the wallet can hold the withdrawn token
    async fn opt_in(&self, side: Side) -> Result<(), FailureReason> {
        let inner = &self.inner;
        let token = inner.pair.token(side);
        debug!("Opting {} in to token {} before withdrawal", inner.owner, token);

        let payload = inner
            .ports
            .tokens
            .transfer(token, &inner.owner, &inner.owner, Amount::ZERO)
            .await
            .map_err(|e| FailureReason::OperationSubmissionFailed(e.to_string()))?;
        let signed = self.sign(&payload).await?;
        let tx_id = self
            .submit(&signed)
            .await
            .map_err(FailureReason::OperationSubmissionFailed)?;
        self.confirm(&tx_id, |tx_id, cause| FailureReason::OperationNotConfirmed {
            tx_id,
            cause,
        })
        .await?;
        Ok(())
    }

    /// Build the primary transaction
    ///
    /// Liquidity changes and swaps are simulated first with no minimum,
    /// then rebuilt with the simulated output less the slippage tolerance.
    async fn build_primary(&self, plan: Plan) -> Result<(TransactionPayload, CallOutput), FailureReason> {
        let inner = &self.inner;
        let pool_id = inner.pair.pool_id;
        let owner = &inner.owner;
        let pool = &inner.ports.pool;
        let bps = inner.settings.slippage_bps;
        let submission = |e: crate::ports::PortError| FailureReason::OperationSubmissionFailed(e.to_string());

        let built = match plan {
            Plan::Approve { asset, amount } => {
                let token = inner.pair.asset_token(asset);
                let payload = inner
                    .ports
                    .tokens
                    .approve(token, owner, &inner.pair.pool_address, amount)
                    .await
                    .map_err(submission)?;
                (payload, CallOutput::Nothing)
            }
            Plan::DepositReserve { side, amount } => {
                let payload = pool
                    .deposit_reserve(pool_id, owner, amount, side)
                    .await
                    .map_err(submission)?;
                (payload, CallOutput::Nothing)
            }
            Plan::WithdrawReserve { side, amount, .. } => {
                let payload = pool
                    .withdraw_reserve(pool_id, owner, amount, side)
                    .await
                    .map_err(submission)?;
                (payload, CallOutput::Nothing)
            }
            Plan::AddLiquidity { amounts } => {
                let quote = pool
                    .deposit_liquidity(pool_id, owner, amounts, Amount::ZERO)
                    .await
                    .map_err(submission)?
                    .return_value;
                let call = pool
                    .deposit_liquidity(pool_id, owner, amounts, less_slippage(quote, bps))
                    .await
                    .map_err(submission)?;
                (call.payload, CallOutput::Minted(call.return_value))
            }
            Plan::RemoveLiquidity { burn } => {
                let quote = pool
                    .withdraw_liquidity(pool_id, owner, burn, Reserves::default())
                    .await
                    .map_err(submission)?
                    .return_value;
                let min_out = Reserves::new(less_slippage(quote.a, bps), less_slippage(quote.b, bps));
                let call = pool
                    .withdraw_liquidity(pool_id, owner, burn, min_out)
                    .await
                    .map_err(submission)?;
                (call.payload, CallOutput::Released(call.return_value))
            }
            Plan::Swap { direction, amount } => {
                let quote = pool
                    .swap(pool_id, owner, amount, direction, Amount::ZERO)
                    .await
                    .map_err(submission)?
                    .return_value;
                let call = pool
                    .swap(pool_id, owner, amount, direction, less_slippage(quote, bps))
                    .await
                    .map_err(submission)?;
                (call.payload, CallOutput::Received(call.return_value))
            }
        };
        Ok(built)
    }

    async fn sign(&self, payload: &TransactionPayload) -> Result<Vec<SignedTransaction>, FailureReason> {
        self.inner
            .ports
            .signer
            .sign(&payload.transactions)
            .await
            .map_err(FailureReason::from_signer)
    }

    async fn submit(&self, signed: &[SignedTransaction]) -> Result<TxId, String> {
        let tx_id = self
            .inner
            .ports
            .broadcaster
            .submit(signed)
            .await
            .map_err(|e| e.to_string())?;
        debug!("Broadcast {} ({} transactions)", tx_id, signed.len());
        Ok(tx_id)
    }

    async fn confirm(
        &self,
        tx_id: &TxId,
        not_confirmed: fn(TxId, ConfirmationFailure) -> FailureReason,
    ) -> Result<u64, FailureReason> {
        let rounds = self.inner.settings.confirmation_rounds;
        match self.inner.waiter.await_confirmation(tx_id, rounds).await {
            Ok(ConfirmationOutcome::Confirmed {
                confirmed_round, ..
            }) => Ok(confirmed_round),
            Ok(ConfirmationOutcome::TimedOut { rounds }) => Err(not_confirmed(
                tx_id.clone(),
                ConfirmationFailure::TimedOut { rounds },
            )),
            Err(ConfirmationError::Transport(e)) => Err(not_confirmed(
                tx_id.clone(),
                ConfirmationFailure::Transport(e.to_string()),
            )),
        }
    }

    /// Net movements, seen from the user's pool position
    fn summary_legs(&self, plan: Plan, output: CallOutput) -> Vec<SummaryLeg> {
        let leg = |asset: Asset, amount: Amount, credit: bool| {
            let (symbol, decimals) = self.asset_label(asset);
            if credit {
                SummaryLeg::credit(symbol, decimals, amount)
            } else {
                SummaryLeg::debit(symbol, decimals, amount)
            }
        };
        let a = Asset::Token(Side::A);
        let b = Asset::Token(Side::B);

        match (plan, output) {
            (Plan::DepositReserve { side, amount }, _) => vec![leg(Asset::Token(side), amount, true)],
            (Plan::WithdrawReserve { side, amount, .. }, _) => {
                vec![leg(Asset::Token(side), amount, false)]
            }
            (Plan::AddLiquidity { amounts }, CallOutput::Minted(minted)) => vec![
                leg(a, amounts.a, false),
                leg(b, amounts.b, false),
                leg(Asset::PoolToken, minted, true),
            ],
            (Plan::RemoveLiquidity { burn }, CallOutput::Released(released)) => vec![
                leg(Asset::PoolToken, burn, false),
                leg(a, released.a, true),
                leg(b, released.b, true),
            ],
            (Plan::Swap { direction, amount }, CallOutput::Received(received)) => vec![
                leg(Asset::Token(direction.input_side()), amount, false),
                leg(Asset::Token(direction.output_side()), received, true),
            ],
            _ => Vec::new(),
        }
    }
}

/// `quote` less `bps` basis points of it, floored
///
/// Split into quotient and remainder so the product cannot overflow.
fn less_slippage(quote: Amount, bps: u64) -> Amount {
    let denominator = Amount::from(BPS_DENOMINATOR);
    let bps = Amount::from(bps.min(BPS_DENOMINATOR));
    let cut = (quote / denominator) * bps + (quote % denominator) * bps / denominator;
    quote - cut
}

fn require_positive(amount: Amount, what: &str) -> PoolResult<()> {
    if amount == Amount::ZERO {
        return Err(PoolError::invalid_amount("0", &format!("{} must be positive", what)));
    }
    Ok(())
}

/// Operation plus the optional event channel it reports to
struct Run {
    operation: PendingOperation,
    events: Option<mpsc::Sender<PipelineEvent>>,
}

impl Run {
    async fn emit(&self, event: PipelineEvent) {
        if let Some(events) = &self.events {
            // A dropped receiver does not stop the operation
            let _ = events.send(event).await;
        }
    }

    async fn enter(&mut self, status: PipelineStatus) {
        if let Err(e) = self.operation.advance(status) {
            warn!("Operation {}: {}", self.operation.id(), e);
            return;
        }
        debug!("Operation {} -> {}", self.operation.id(), status);
        self.emit(PipelineEvent::Transition {
            operation_id: self.operation.id(),
            status,
        })
        .await;
    }

    async fn commit(&mut self, summary: OperationSummary) {
        if let Err(e) = self.operation.commit(summary.clone()) {
            warn!("Operation {}: {}", self.operation.id(), e);
            return;
        }
        self.emit(PipelineEvent::Committed(summary)).await;
    }

    async fn fail(&mut self, reason: FailureReason) {
        if let Err(e) = self.operation.fail(reason.clone()) {
            warn!("Operation {}: {}", self.operation.id(), e);
            return;
        }
        self.emit(PipelineEvent::Failed {
            operation_id: self.operation.id(),
            reason,
        })
        .await;
    }
}
