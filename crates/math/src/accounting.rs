//! Pool share and redeemable-pair accounting
//!
//! Every function here is pure and works on exact atomic amounts. Divisions
//! floor, so derived amounts never exceed what the inputs can back.

use pairpool_types::{
    Amount, PoolResult, Rate, RedeemTieBreak, RedeemablePair, Reserves, SharePercent,
    MAX_PERCENT, SHARE_SCALE,
};

use crate::amount::percent_of;
use crate::safe::{mul_div_floor, safe_add, safe_mul, try_mul_div_floor};

// ============================================================================
// Share
// ============================================================================

/// Percentage of the pool-token supply held by the user
///
/// Zero when nothing has been minted. Otherwise
/// `floor(user_balance * 100 * 10^6 / total_minted)`.
pub fn compute_share(user_balance: Amount, total_minted: Amount) -> PoolResult<SharePercent> {
    if total_minted == Amount::ZERO {
        return Ok(SharePercent::ZERO);
    }
    let scale = Amount::new(MAX_PERCENT as u128 * SHARE_SCALE);
    // floor
    let scaled = mul_div_floor(user_balance, scale, total_minted)?;
    Ok(SharePercent::from_scaled(scaled))
}

/// Share after `incoming` freshly minted pool tokens land in the user's balance
pub fn compute_new_share(
    current_balance: Amount,
    total_minted: Amount,
    incoming: Amount,
) -> PoolResult<SharePercent> {
    compute_share(
        safe_add(current_balance, incoming)?,
        safe_add(total_minted, incoming)?,
    )
}

/// Pool tokens to burn when withdrawing `percent` of the user's position
pub fn compute_proportional_withdrawal(user_balance: Amount, percent: u32) -> PoolResult<Amount> {
    percent_of(user_balance, percent)
}

// ============================================================================
// Redeemable Pair
// ============================================================================

/// Largest pair `(out_a, out_b)` at `rate` that the user's reserves can back
///
/// Two candidates are formed: one spends all of `reserve_a`, the other all
/// of `reserve_b`. A candidate is kept only if its opposing leg fits in the
/// opposing reserve; when both fit, `tie_break` decides. A candidate whose
/// opposing leg exceeds 256 bits cannot fit and is dropped. Returns `None`
/// for an empty reserve or a zero rate; otherwise one candidate always fits.
pub fn compute_redeemable(
    reserve_a: Amount,
    reserve_b: Amount,
    rate: &Rate,
    tie_break: RedeemTieBreak,
) -> PoolResult<Option<RedeemablePair>> {
    if reserve_a == Amount::ZERO || reserve_b == Amount::ZERO || rate.is_degenerate() {
        return Ok(None);
    }

    // floor(reserve_a / rate)
    let via_a = try_mul_div_floor(reserve_a, rate.denominator(), rate.numerator())?
        .filter(|out_b| *out_b <= reserve_b)
        .map(|out_b| RedeemablePair {
            out_a: reserve_a,
            out_b,
        });
    // floor(reserve_b * rate)
    let via_b = try_mul_div_floor(reserve_b, rate.numerator(), rate.denominator())?
        .filter(|out_a| *out_a <= reserve_a)
        .map(|out_a| RedeemablePair {
            out_a,
            out_b: reserve_b,
        });

    Ok(match (via_a, via_b) {
        (Some(a), Some(b)) => Some(break_tie(a, b, tie_break)),
        (candidate, None) | (None, candidate) => candidate,
    })
}

fn break_tie(first: RedeemablePair, second: RedeemablePair, rule: RedeemTieBreak) -> RedeemablePair {
    let first_is_smaller = first.out_a <= second.out_a;
    match rule {
        RedeemTieBreak::MinimizeClaim if first_is_smaller => first,
        RedeemTieBreak::MinimizeClaim => second,
        RedeemTieBreak::MaximizeClaim if first_is_smaller => second,
        RedeemTieBreak::MaximizeClaim => first,
    }
}

/// Both legs of `pair` scaled down to `percent`, each floored
pub fn scale_pair(pair: &RedeemablePair, percent: u32) -> PoolResult<RedeemablePair> {
    Ok(RedeemablePair {
        out_a: percent_of(pair.out_a, percent)?,
        out_b: percent_of(pair.out_b, percent)?,
    })
}

/// Total value locked, denominated in token A
///
/// Both sides of a balanced pool carry equal value, so the estimate is
/// twice the A-side balance.
pub fn total_value_locked(pool_balances: &Reserves) -> PoolResult<Amount> {
    safe_mul(pool_balances.a, Amount::new(2))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rate(numerator: u128, denominator: u128) -> Rate {
        Rate::new(Amount::new(numerator), Amount::new(denominator)).unwrap()
    }

    fn pair(out_a: u128, out_b: u128) -> RedeemablePair {
        RedeemablePair {
            out_a: Amount::new(out_a),
            out_b: Amount::new(out_b),
        }
    }

    #[test]
    fn test_share_of_quarter_position() {
        let share = compute_share(Amount::new(250), Amount::new(1_000)).unwrap();
        assert_eq!(share.to_string(), "25.000000");
    }

    #[test]
    fn test_share_bounds() {
        assert_eq!(compute_share(Amount::ZERO, Amount::ZERO).unwrap(), SharePercent::ZERO);
        assert_eq!(compute_share(Amount::ZERO, Amount::new(77)).unwrap(), SharePercent::ZERO);
        assert_eq!(
            compute_share(Amount::new(77), Amount::new(77)).unwrap(),
            SharePercent::full()
        );
        // 1/3 floors at the sixth fractional digit
        assert_eq!(
            compute_share(Amount::ONE, Amount::new(3)).unwrap().to_string(),
            "33.333333"
        );
    }

    #[test]
    fn test_new_share_matches_post_state() {
        let projected = compute_new_share(Amount::new(250), Amount::new(1_000), Amount::new(500)).unwrap();
        let post = compute_share(Amount::new(750), Amount::new(1_500)).unwrap();
        assert_eq!(projected, post);
        assert_eq!(projected.to_string(), "50.000000");

        // First liquidity provider owns the whole pool
        assert_eq!(
            compute_new_share(Amount::ZERO, Amount::ZERO, Amount::new(10)).unwrap(),
            SharePercent::full()
        );
    }

    #[test]
    fn test_redeemable_already_balanced() {
        let result = compute_redeemable(
            Amount::new(1_000_000_000),
            Amount::new(500_000_000),
            &rate(2, 1),
            RedeemTieBreak::MinimizeClaim,
        )
        .unwrap();
        assert_eq!(result, Some(pair(1_000_000_000, 500_000_000)));
    }

    #[test]
    fn test_redeemable_limited_by_b() {
        let result = compute_redeemable(
            Amount::new(1_000_000_000),
            Amount::new(300_000_000),
            &rate(2, 1),
            RedeemTieBreak::MinimizeClaim,
        )
        .unwrap();
        assert_eq!(result, Some(pair(600_000_000, 300_000_000)));
    }

    #[test]
    fn test_redeemable_limited_by_a() {
        let result = compute_redeemable(
            Amount::new(400),
            Amount::new(1_000),
            &rate(2, 1),
            RedeemTieBreak::MinimizeClaim,
        )
        .unwrap();
        assert_eq!(result, Some(pair(400, 200)));
    }

    #[test]
    fn test_redeemable_none_on_empty_input() {
        let rule = RedeemTieBreak::MinimizeClaim;
        assert_eq!(compute_redeemable(Amount::ZERO, Amount::new(5), &rate(2, 1), rule).unwrap(), None);
        assert_eq!(compute_redeemable(Amount::new(5), Amount::ZERO, &rate(2, 1), rule).unwrap(), None);
        assert_eq!(compute_redeemable(Amount::new(5), Amount::new(5), &rate(0, 1), rule).unwrap(), None);
    }

    #[test]
    fn test_tie_break_rules() {
        // Rate 2/1 with reserves (5, 2): via A gives (5, 2), via B gives (4, 2); both fit
        let minimize = compute_redeemable(Amount::new(5), Amount::new(2), &rate(2, 1), RedeemTieBreak::MinimizeClaim)
            .unwrap();
        let maximize = compute_redeemable(Amount::new(5), Amount::new(2), &rate(2, 1), RedeemTieBreak::MaximizeClaim)
            .unwrap();
        assert_eq!(minimize, Some(pair(4, 2)));
        assert_eq!(maximize, Some(pair(5, 2)));

        // Rate 3/1 with reserves (10, 4): via B gives (12, 4) which exceeds A
        let only_a = compute_redeemable(Amount::new(10), Amount::new(4), &rate(3, 1), RedeemTieBreak::MaximizeClaim)
            .unwrap();
        assert_eq!(only_a, Some(pair(10, 3)));
    }

    #[test]
    fn test_break_tie_picks_by_first_output() {
        let small = pair(5, 3);
        let large = pair(6, 3);
        assert_eq!(break_tie(small, large, RedeemTieBreak::MinimizeClaim), small);
        assert_eq!(break_tie(large, small, RedeemTieBreak::MinimizeClaim), small);
        assert_eq!(break_tie(small, large, RedeemTieBreak::MaximizeClaim), large);
        assert_eq!(break_tie(large, small, RedeemTieBreak::MaximizeClaim), large);
    }

    #[test]
    fn test_redeemable_drops_oversized_candidate() {
        // Via A would need MAX * MAX of B; only the B-limited pair is left
        let result = compute_redeemable(
            Amount::MAX,
            Amount::MAX,
            &Rate::new(Amount::ONE, Amount::MAX).unwrap(),
            RedeemTieBreak::MaximizeClaim,
        )
        .unwrap();
        assert_eq!(
            result,
            Some(RedeemablePair {
                out_a: Amount::ONE,
                out_b: Amount::MAX,
            })
        );
    }

    #[test]
    fn test_full_width_accounting() {
        assert_eq!(compute_share(Amount::MAX, Amount::MAX).unwrap(), SharePercent::full());
        let big = Amount::ONE << 230u32;
        assert_eq!(compute_share(big, big).unwrap(), SharePercent::full());
        assert_eq!(
            compute_share(big, big * Amount::new(4)).unwrap().to_string(),
            "25.000000"
        );

        let a = Amount::ONE << 130u32;
        let b = Amount::ONE << 129u32;
        let result = compute_redeemable(a, b, &Rate::new(a, b).unwrap(), RedeemTieBreak::MinimizeClaim).unwrap();
        assert_eq!(result, Some(RedeemablePair { out_a: a, out_b: b }));
    }

    #[test]
    fn test_scale_pair_and_withdrawal() {
        assert_eq!(scale_pair(&pair(600, 301), 50).unwrap(), pair(300, 150));
        assert!(scale_pair(&pair(600, 300), 0).is_err());
        assert_eq!(
            compute_proportional_withdrawal(Amount::new(1_000), 25).unwrap(),
            Amount::new(250)
        );
    }

    #[test]
    fn test_total_value_locked() {
        let balances = Reserves::new(Amount::new(1_500), Amount::new(700));
        assert_eq!(total_value_locked(&balances).unwrap(), Amount::new(3_000));
    }
}
