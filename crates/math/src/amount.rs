//! Decimal scaling and percentage splits over atomic amounts

use pairpool_types::{pow10, Amount, PoolError, PoolResult, Rate, MAX_PERCENT};

use crate::safe::{safe_add, safe_mul};

/// Convert a human decimal string into atomic units
///
/// Accepts `"12"`, `"12.5"`, `".5"` and thousands separators (`"1,000.25"`).
/// More fractional digits than `decimals` is an error, never a truncation.
pub fn scale_to_atomic(value: &str, decimals: u8) -> PoolResult<Amount> {
    let cleaned: String = value.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return Err(PoolError::invalid_amount(value, "empty string"));
    }

    let (whole, fraction) = match cleaned.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (cleaned.as_str(), ""),
    };
    if whole.is_empty() && fraction.is_empty() {
        return Err(PoolError::invalid_amount(value, "no digits"));
    }
    if !whole.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit()) {
        return Err(PoolError::invalid_amount(value, "expected a plain decimal number"));
    }
    if fraction.len() > decimals as usize {
        return Err(PoolError::invalid_amount(
            value,
            &format!("more than {} fractional digits", decimals),
        ));
    }

    let scale = pow10(decimals)?;
    let whole_atomic = if whole.is_empty() {
        Amount::ZERO
    } else {
        let parsed = Amount::from_str_radix(whole, 10)
            .map_err(|e| PoolError::invalid_amount(value, &e.to_string()))?;
        safe_mul(parsed, scale)?
    };
    if fraction.is_empty() {
        return Ok(whole_atomic);
    }

    // Right-pad the fraction to exactly `decimals` digits
    let padding = pow10(decimals - fraction.len() as u8)?;
    let fraction_atomic = Amount::from_str_radix(fraction, 10)
        .map_err(|e| PoolError::invalid_amount(value, &e.to_string()))?;
    safe_add(whole_atomic, safe_mul(fraction_atomic, padding)?)
}

/// Render atomic units as a decimal string with exactly `decimals` fractional digits
pub fn scale_to_decimal(atomic: Amount, decimals: u8) -> String {
    let digits = atomic.to_string();
    if decimals == 0 {
        return digits;
    }
    let decimals = decimals as usize;
    let padded = format!("{:0>width$}", digits, width = decimals + 1);
    let (whole, fraction) = padded.split_at(padded.len() - decimals);
    format!("{}.{}", whole, fraction)
}

/// `floor(amount * percent / 100)` for `percent` in (0, 100]
///
/// Computed as `q * percent + floor(r * percent / 100)` with
/// `amount = 100q + r`, so it never overflows.
pub fn percent_of(amount: Amount, percent: u32) -> PoolResult<Amount> {
    validate_percent(percent)?;
    let hundred = Amount::new(MAX_PERCENT as u128);
    let percent = Amount::new(percent as u128);
    let quotient = amount / hundred;
    let remainder = amount % hundred;
    Ok(quotient * percent + remainder * percent / hundred)
}

/// Reject percentages outside (0, 100]
pub fn validate_percent(percent: u32) -> PoolResult<()> {
    if percent == 0 || percent > MAX_PERCENT {
        return Err(PoolError::InvalidPercent { percent });
    }
    Ok(())
}

/// Exact rational `a / b`
pub fn ratio(a: Amount, b: Amount) -> PoolResult<Rate> {
    Rate::new(a, b)
}
