//! Allowance gate

use pairpool_types::Amount;

/// True iff `requested` exceeds what the spender may already move
pub fn needs_approval(current: Amount, requested: Amount) -> bool {
    requested > current
}

/// Allowance to request: current headroom plus the new amount
///
/// Saturates at `Amount::MAX`, which still covers `requested`.
pub fn approval_amount(current: Amount, requested: Amount) -> Amount {
    current.saturating_add(requested)
}

/// Approval to submit before spending `requested`, if any
pub fn required_approval(current: Amount, requested: Amount) -> Option<Amount> {
    needs_approval(current, requested).then(|| approval_amount(current, requested))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_decision() {
        let current = Amount::new(100);
        assert!(!needs_approval(current, Amount::new(50)));
        assert!(!needs_approval(current, Amount::new(100)));
        assert!(needs_approval(current, Amount::new(150)));
        assert_eq!(approval_amount(current, Amount::new(150)), Amount::new(250));

        assert_eq!(required_approval(current, Amount::new(50)), None);
        assert_eq!(required_approval(current, Amount::new(150)), Some(Amount::new(250)));
    }

    #[test]
    fn test_approval_amount_saturates() {
        assert_eq!(approval_amount(Amount::MAX, Amount::ONE), Amount::MAX);
        assert_eq!(approval_amount(Amount::new(5), Amount::MAX), Amount::MAX);
    }
}
