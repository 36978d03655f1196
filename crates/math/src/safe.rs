//! Safe arithmetic operations with overflow protection
//!
//! All operations return errors instead of panicking. Divisions round
//! toward zero (floor, since every operand is unsigned).

use pairpool_types::{Amount, PoolError, PoolResult};

// ============================================================================
// Safe Basic Arithmetic
// ============================================================================

/// Safe addition for 256-bit amounts
pub fn safe_add(a: Amount, b: Amount) -> PoolResult<Amount> {
    a.checked_add(b)
        .ok_or_else(|| PoolError::math_overflow("u256 addition", &[&a, &b]))
}

/// Safe subtraction for 256-bit amounts
pub fn safe_sub(a: Amount, b: Amount) -> PoolResult<Amount> {
    a.checked_sub(b)
        .ok_or_else(|| PoolError::math_underflow("u256 subtraction", &[&a, &b]))
}

/// Safe multiplication for 256-bit amounts
pub fn safe_mul(a: Amount, b: Amount) -> PoolResult<Amount> {
    a.checked_mul(b)
        .ok_or_else(|| PoolError::math_overflow("u256 multiplication", &[&a, &b]))
}

/// Floor division for 256-bit amounts
pub fn floor_div(a: Amount, b: Amount) -> PoolResult<Amount> {
    if b == Amount::ZERO {
        return Err(PoolError::DivisionByZero {
            context: format!("u256 division: {} / {}", a, b),
        });
    }
    Ok(a / b)
}

// ============================================================================
// Compound Operations
// ============================================================================

/// Full 512-bit product of two amounts as `(high, low)` halves
pub fn full_mul(a: Amount, b: Amount) -> (Amount, Amount) {
    let (a_hi, a_lo) = a.into_words();
    let (b_hi, b_lo) = b.into_words();

    // Each 128x128 partial product fits in 256 bits
    let low_low = Amount::new(a_lo) * Amount::new(b_lo);
    let high_high = Amount::new(a_hi) * Amount::new(b_hi);
    let (cross, cross_carry) =
        (Amount::new(a_lo) * Amount::new(b_hi)).overflowing_add(Amount::new(a_hi) * Amount::new(b_lo));

    let (cross_hi, cross_lo) = cross.into_words();
    let (low, low_carry) = low_low.overflowing_add(Amount::from_words(cross_lo, 0));

    let mut high = high_high + Amount::new(cross_hi);
    if cross_carry {
        high += Amount::from_words(1, 0);
    }
    if low_carry {
        high += Amount::ONE;
    }
    (high, low)
}

/// `floor((high * 2^256 + low) / divisor)`, or `None` when the quotient
/// needs more than 256 bits
fn div_wide(high: Amount, low: Amount, divisor: Amount) -> Option<Amount> {
    if high == Amount::ZERO {
        return Some(low / divisor);
    }
    if high >= divisor {
        return None;
    }

    // Restoring long division; the remainder stays below the divisor
    let mut remainder = high;
    let mut quotient = Amount::ZERO;
    for bit in (0..256u32).rev() {
        let carry = remainder >> 255u32 != Amount::ZERO;
        remainder = (remainder << 1u32) | ((low >> bit) & Amount::ONE);
        quotient = quotient << 1u32;
        if carry || remainder >= divisor {
            remainder = remainder.wrapping_sub(divisor);
            quotient = quotient | Amount::ONE;
        }
    }
    Some(quotient)
}

/// `floor(a * b / c)` with a 512-bit intermediate product
///
/// `Ok(None)` when the quotient itself exceeds 256 bits.
pub fn try_mul_div_floor(a: Amount, b: Amount, c: Amount) -> PoolResult<Option<Amount>> {
    if c == Amount::ZERO {
        return Err(PoolError::DivisionByZero {
            context: format!("mul_div: {} * {} / {}", a, b, c),
        });
    }
    let (high, low) = full_mul(a, b);
    Ok(div_wide(high, low, c))
}

/// `floor(a * b / c)`
///
/// Any operands are accepted; only a quotient wider than 256 bits is
/// reported as `MathOverflow`.
pub fn mul_div_floor(a: Amount, b: Amount, c: Amount) -> PoolResult<Amount> {
    try_mul_div_floor(a, b, c)?
        .ok_or_else(|| PoolError::math_overflow("mul_div", &[&a, &b, &c]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_arithmetic() {
        assert_eq!(safe_add(Amount::new(100), Amount::new(200)).unwrap(), Amount::new(300));
        assert!(safe_add(Amount::MAX, Amount::ONE).is_err());

        assert_eq!(safe_sub(Amount::new(200), Amount::new(100)).unwrap(), Amount::new(100));
        assert!(matches!(
            safe_sub(Amount::new(100), Amount::new(200)),
            Err(PoolError::MathUnderflow { .. })
        ));

        assert_eq!(safe_mul(Amount::new(10), Amount::new(20)).unwrap(), Amount::new(200));
        assert!(safe_mul(Amount::MAX, Amount::new(2)).is_err());

        assert_eq!(floor_div(Amount::new(7), Amount::new(2)).unwrap(), Amount::new(3));
        assert!(matches!(
            floor_div(Amount::new(100), Amount::ZERO),
            Err(PoolError::DivisionByZero { .. })
        ));
    }

    #[test]
    fn test_mul_div_floor() {
        assert_eq!(
            mul_div_floor(Amount::new(10), Amount::new(10), Amount::new(3)).unwrap(),
            Amount::new(33)
        );
        assert!(mul_div_floor(Amount::ONE, Amount::ONE, Amount::ZERO).is_err());
    }

    #[test]
    fn test_mul_div_floor_wide_product() {
        // Products past 256 bits divide back down exactly
        assert_eq!(mul_div_floor(Amount::MAX, Amount::MAX, Amount::MAX).unwrap(), Amount::MAX);
        assert_eq!(
            mul_div_floor(Amount::MAX, Amount::new(2), Amount::new(2)).unwrap(),
            Amount::MAX
        );
        let big = Amount::ONE << 230u32;
        assert_eq!(
            mul_div_floor(big, Amount::new(100_000_000), big).unwrap(),
            Amount::new(100_000_000)
        );
        // (2^256 - 1) * 3 / 4 = 3 * 2^254 - 1 after flooring
        assert_eq!(
            mul_div_floor(Amount::MAX, Amount::new(3), Amount::new(4)).unwrap(),
            (Amount::ONE << 254u32) * Amount::new(3) - Amount::ONE
        );

        assert!(matches!(
            mul_div_floor(Amount::MAX, Amount::new(2), Amount::ONE),
            Err(PoolError::MathOverflow { .. })
        ));
        assert_eq!(try_mul_div_floor(Amount::MAX, Amount::MAX, Amount::new(3)).unwrap(), None);
    }

    #[test]
    fn test_full_mul() {
        assert_eq!(full_mul(Amount::new(6), Amount::new(7)), (Amount::ZERO, Amount::new(42)));
        // (2^256 - 1)^2 = (2^256 - 2) * 2^256 + 1
        assert_eq!(
            full_mul(Amount::MAX, Amount::MAX),
            (Amount::MAX - Amount::ONE, Amount::ONE)
        );
        let two_128 = Amount::from_words(1, 0);
        assert_eq!(full_mul(two_128, two_128), (Amount::ONE, Amount::ZERO));
    }
}
