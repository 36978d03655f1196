//! Pool view projection

use pairpool_math::{compute_new_share, compute_redeemable, compute_share, total_value_locked};
use pairpool_types::{
    Amount, PoolResult, PoolTokenSupply, Rate, RedeemTieBreak, RedeemablePair, Reserves,
    SharePercent,
};

/// Inputs of a pool view, all taken from one snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolViewQuery {
    pub user_reserves: Reserves,
    pub supply: PoolTokenSupply,
    /// Target rate; `None` while the pool is empty on either side
    pub rate: Option<Rate>,
    pub pool_balances: Reserves,
    /// Pool tokens an add-liquidity would mint, when quoted
    pub incoming: Option<Amount>,
    pub tie_break: RedeemTieBreak,
}

/// What a front-end shows for a pool position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolView {
    pub share: SharePercent,
    pub redeemable: Option<RedeemablePair>,
    pub new_share_on_add: Option<SharePercent>,
    /// Denominated in token A
    pub total_value_locked: Amount,
}

/// Project share, redeemable pair and projected share from a snapshot
pub fn project_pool_view(query: &PoolViewQuery) -> PoolResult<PoolView> {
    let share = compute_share(query.supply.user_balance(), query.supply.total_minted())?;

    let redeemable = match &query.rate {
        Some(rate) => compute_redeemable(
            query.user_reserves.a,
            query.user_reserves.b,
            rate,
            query.tie_break,
        )?,
        None => None,
    };

    let new_share_on_add = query
        .incoming
        .map(|incoming| {
            compute_new_share(
                query.supply.user_balance(),
                query.supply.total_minted(),
                incoming,
            )
        })
        .transpose()?;

    Ok(PoolView {
        share,
        redeemable,
        new_share_on_add,
        total_value_locked: total_value_locked(&query.pool_balances)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query() -> PoolViewQuery {
        let pool_balances = Reserves::new(Amount::new(2_000_000_000), Amount::new(1_000_000_000));
        PoolViewQuery {
            user_reserves: Reserves::new(Amount::new(1_000_000_000), Amount::new(300_000_000)),
            supply: PoolTokenSupply::new(Amount::new(250), Amount::new(1_000)).unwrap(),
            rate: Rate::from_pool_balances(&pool_balances),
            pool_balances,
            incoming: Some(Amount::new(500)),
            tie_break: RedeemTieBreak::MinimizeClaim,
        }
    }

    #[test]
    fn test_projection() {
        let view = project_pool_view(&query()).unwrap();

        assert_eq!(view.share.to_string(), "25.000000");
        assert_eq!(
            view.redeemable,
            Some(RedeemablePair {
                out_a: Amount::new(600_000_000),
                out_b: Amount::new(300_000_000),
            })
        );
        assert_eq!(view.new_share_on_add.unwrap().to_string(), "50.000000");
        assert_eq!(view.total_value_locked, Amount::new(4_000_000_000));
    }

    #[test]
    fn test_projection_without_rate_or_quote() {
        let mut query = query();
        query.rate = None;
        query.incoming = None;

        let view = project_pool_view(&query).unwrap();
        assert_eq!(view.redeemable, None);
        assert_eq!(view.new_share_on_add, None);
        assert_eq!(view.share.to_string(), "25.000000");
    }
}
