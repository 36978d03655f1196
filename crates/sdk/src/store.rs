//! Versioned pool state snapshots
//!
//! `PoolStateStore` reads every balance, allowance and pool figure the
//! front-end needs in one concurrent fetch and publishes the result as an
//! immutable `PoolSnapshot`. Snapshots are replaced whole, so readers never
//! see a mix of two refreshes. A refresh is due whenever the pipeline's
//! refresh version moves past the version the current snapshot was read at.

use std::sync::{Arc, RwLock};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use pairpool_math::compute_redeemable;
use pairpool_types::{
    Address, Amount, Asset, PoolInfo, PoolPair, PoolTokenSupply, Rate, RedeemTieBreak,
    RedeemablePair, Reserves, Side,
};

use crate::errors::SdkResult;
use crate::ports::{PoolContract, TokenContract};
use crate::view::{project_pool_view, PoolView, PoolViewQuery};

/// One amount per asset of a pool pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AssetAmounts {
    pub a: Amount,
    pub b: Amount,
    pub pool_token: Amount,
}

impl AssetAmounts {
    pub fn get(&self, asset: Asset) -> Amount {
        match asset {
            Asset::Token(Side::A) => self.a,
            Asset::Token(Side::B) => self.b,
            Asset::PoolToken => self.pool_token,
        }
    }
}

/// Immutable view of one pool as read at a refresh version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSnapshot {
    /// Refresh version this snapshot was read at
    pub version: u64,
    /// Wallet balances of the owner
    pub balances: AssetAmounts,
    /// Allowances granted by the owner to the pool contract
    pub allowances: AssetAmounts,
    /// Reserves the pool holds for the owner
    pub user_reserves: Reserves,
    pub pool_info: PoolInfo,
    pub supply: PoolTokenSupply,
    /// Current pool rate; `None` while either side is empty
    pub rate: Option<Rate>,
    /// Largest pair of the owner's reserves addable at the pool rate
    pub redeemable: Option<RedeemablePair>,
    /// Pool tokens the redeemable pair would mint, as simulated by the pool
    pub quoted_add_output: Option<Amount>,
}

impl PoolSnapshot {
    pub fn view_query(&self, tie_break: RedeemTieBreak) -> PoolViewQuery {
        PoolViewQuery {
            user_reserves: self.user_reserves,
            supply: self.supply,
            rate: self.rate,
            pool_balances: self.pool_info.pool_balances,
            incoming: self.quoted_add_output,
            tie_break,
        }
    }
}

pub struct PoolStateStore {
    pair: PoolPair,
    owner: Address,
    tokens: Arc<dyn TokenContract>,
    pool: Arc<dyn PoolContract>,
    tie_break: RedeemTieBreak,
    version: watch::Receiver<u64>,
    snapshot: RwLock<Option<Arc<PoolSnapshot>>>,
    refresh_lock: Mutex<()>,
}

impl PoolStateStore {
    pub fn new(
        pair: PoolPair,
        owner: Address,
        tokens: Arc<dyn TokenContract>,
        pool: Arc<dyn PoolContract>,
        tie_break: RedeemTieBreak,
        version: watch::Receiver<u64>,
    ) -> Self {
        Self {
            pair,
            owner,
            tokens,
            pool,
            tie_break,
            version,
            snapshot: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn pair(&self) -> &PoolPair {
        &self.pair
    }

    pub fn owner(&self) -> &Address {
        &self.owner
    }

    /// Latest published refresh version
    pub fn current_version(&self) -> u64 {
        *self.version.borrow()
    }

    /// Latest snapshot, if any refresh has completed
    pub fn snapshot(&self) -> Option<Arc<PoolSnapshot>> {
        self.snapshot
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Read everything again and publish a new snapshot
    ///
    /// Concurrent refreshes are serialized. On error the previous snapshot
    /// stays in place.
    pub async fn refresh(&self) -> SdkResult<Arc<PoolSnapshot>> {
        let _guard = self.refresh_lock.lock().await;
        let version = self.current_version();
        let pair = &self.pair;
        let owner = &self.owner;
        let spender = &pair.pool_address;

        debug!("Refreshing pool {} at version {}", pair.pool_id, version);

        let (
            balance_a,
            balance_b,
            balance_pool,
            allowance_a,
            allowance_b,
            allowance_pool,
            user_reserves,
            pool_info,
        ) = tokio::try_join!(
            self.tokens.balance_of(pair.token_a, owner),
            self.tokens.balance_of(pair.token_b, owner),
            self.tokens.balance_of(pair.pool_token, owner),
            self.tokens.allowance(pair.token_a, owner, spender),
            self.tokens.allowance(pair.token_b, owner, spender),
            self.tokens.allowance(pair.pool_token, owner, spender),
            self.pool.reserves(pair.pool_id, owner),
            self.pool.info(pair.pool_id),
        )?;

        let supply = PoolTokenSupply::new(balance_pool, pool_info.total_minted)?;
        let rate = Rate::from_pool_balances(&pool_info.pool_balances);
        let redeemable = match &rate {
            Some(rate) => {
                compute_redeemable(user_reserves.a, user_reserves.b, rate, self.tie_break)?
            }
            None => None,
        };
        let quoted_add_output = match redeemable {
            Some(pair) => self.quote_add(pair).await,
            None => None,
        };

        let snapshot = Arc::new(PoolSnapshot {
            version,
            balances: AssetAmounts {
                a: balance_a,
                b: balance_b,
                pool_token: balance_pool,
            },
            allowances: AssetAmounts {
                a: allowance_a,
                b: allowance_b,
                pool_token: allowance_pool,
            },
            user_reserves,
            pool_info,
            supply,
            rate,
            redeemable,
            quoted_add_output,
        });

        *self.snapshot.write().unwrap_or_else(|e| e.into_inner()) = Some(snapshot.clone());
        info!(
            "Pool {} snapshot updated to version {} (reserves {}/{}, pool tokens {})",
            self.pair.pool_id, version, user_reserves.a, user_reserves.b, balance_pool
        );
        Ok(snapshot)
    }

    /// Simulate adding `pair` and return the pool tokens it would mint
    async fn quote_add(&self, pair: RedeemablePair) -> Option<Amount> {
        let amounts = Reserves::new(pair.out_a, pair.out_b);
        match self
            .pool
            .deposit_liquidity(self.pair.pool_id, &self.owner, amounts, Amount::ZERO)
            .await
        {
            Ok(call) => Some(call.return_value),
            Err(e) => {
                warn!("Add-liquidity quote for pool {} failed: {}", self.pair.pool_id, e);
                None
            }
        }
    }

    /// Current snapshot, refreshed first if it predates the published version
    pub async fn sync(&self) -> SdkResult<Arc<PoolSnapshot>> {
        let target = self.current_version();
        if let Some(snapshot) = self.snapshot() {
            if snapshot.version >= target {
                return Ok(snapshot);
            }
        }
        self.refresh().await
    }

    /// Project the front-end view from the current snapshot
    pub fn view(&self) -> SdkResult<Option<PoolView>> {
        match self.snapshot() {
            Some(snapshot) => Ok(Some(project_pool_view(&snapshot.view_query(self.tie_break))?)),
            None => Ok(None),
        }
    }

    /// Refresh in the background whenever the version moves
    ///
    /// The task ends once every version sender is dropped.
    pub fn spawn_refresher(self: &Arc<Self>) -> JoinHandle<()> {
        let store = Arc::clone(self);
        let mut version = self.version.clone();
        tokio::spawn(async move {
            while version.changed().await.is_ok() {
                let target = *version.borrow_and_update();
                debug!("Refresh version moved to {}", target);
                if let Err(e) = store.refresh().await {
                    warn!("Background refresh of pool {} failed: {}", store.pair.pool_id, e);
                }
            }
            debug!("Refresh version channel closed for pool {}", store.pair.pool_id);
        })
    }
}
