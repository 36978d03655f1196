use thiserror::Error;

use crate::{Amount, PoolId, TokenId};

// ============================================================================
// Main Error Enum
// ============================================================================

/// Math and validation errors of the pairpool engine
///
/// Everything here is detected locally, before any network interaction,
/// and is never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    // ========================================================================
    // Math Errors
    // ========================================================================

    /// Arithmetic overflow occurred
    #[error("Math overflow in '{operation}' with values: {values:?}")]
    MathOverflow { operation: String, values: Vec<String> },

    /// Arithmetic underflow occurred
    #[error("Math underflow in '{operation}' with values: {values:?}")]
    MathUnderflow { operation: String, values: Vec<String> },

    /// Division by zero
    #[error("Division by zero in context: {context}")]
    DivisionByZero { context: String },

    // ========================================================================
    // Validation Errors
    // ========================================================================

    /// Percentage argument outside (0, 100]
    #[error("Invalid percent {percent}: expected a value in (0, 100]")]
    InvalidPercent { percent: u32 },

    /// The operation would spend more than is held
    #[error("Insufficient balance of {asset}: need {required}, have {available}")]
    InsufficientBalance {
        asset: String,
        required: Amount,
        available: Amount,
    },

    /// The spender may not move the requested amount and approval is disabled
    #[error("Insufficient allowance of {asset}: need {required}, approved {approved}")]
    InsufficientAllowance {
        asset: String,
        required: Amount,
        approved: Amount,
    },

    /// Malformed or unrepresentable amount
    #[error("Invalid amount '{value}': {reason}")]
    InvalidAmount { value: String, reason: String },

    /// Pool-token balance larger than the minted supply
    #[error("Inconsistent pool-token supply: user balance {user_balance} exceeds total minted {total_minted}")]
    InconsistentSupply {
        user_balance: Amount,
        total_minted: Amount,
    },

    // ========================================================================
    // Registry and Configuration Errors
    // ========================================================================

    /// Token missing from the registry
    #[error("Unknown token: {0}")]
    UnknownToken(TokenId),

    /// Pool missing from the registry
    #[error("Unknown pool: {0}")]
    UnknownPool(PoolId),

    /// Invalid parameter
    #[error("Invalid parameter '{parameter}': got '{value}', expected '{expected}'")]
    InvalidParameter {
        parameter: String,
        value: String,
        expected: String,
    },

    /// Invalid configuration
    #[error("Invalid configuration for '{component}': {reason}")]
    InvalidConfiguration { component: String, reason: String },
}

impl PoolError {
    /// Create a math overflow error with context
    pub fn math_overflow(operation: &str, values: &[&dyn std::fmt::Display]) -> Self {
        Self::MathOverflow {
            operation: operation.to_string(),
            values: values.iter().map(|v| v.to_string()).collect(),
        }
    }

    /// Create a math underflow error with context
    pub fn math_underflow(operation: &str, values: &[&dyn std::fmt::Display]) -> Self {
        Self::MathUnderflow {
            operation: operation.to_string(),
            values: values.iter().map(|v| v.to_string()).collect(),
        }
    }

    /// Create a division by zero error
    pub fn division_by_zero(context: &str) -> Self {
        Self::DivisionByZero {
            context: context.to_string(),
        }
    }

    /// Create an invalid amount error
    pub fn invalid_amount(value: &str, reason: &str) -> Self {
        Self::InvalidAmount {
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create an insufficient balance error
    pub fn insufficient_balance(asset: &str, required: Amount, available: Amount) -> Self {
        Self::InsufficientBalance {
            asset: asset.to_string(),
            required,
            available,
        }
    }

    /// Create an insufficient allowance error
    pub fn insufficient_allowance(asset: &str, required: Amount, approved: Amount) -> Self {
        Self::InsufficientAllowance {
            asset: asset.to_string(),
            required,
            approved,
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter(parameter: &str, value: &str, expected: &str) -> Self {
        Self::InvalidParameter {
            parameter: parameter.to_string(),
            value: value.to_string(),
            expected: expected.to_string(),
        }
    }

    /// Create an invalid configuration error
    pub fn invalid_configuration(component: &str, reason: &str) -> Self {
        Self::InvalidConfiguration {
            component: component.to_string(),
            reason: reason.to_string(),
        }
    }

    /// True for the validation family (bad input or insufficient funds)
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidPercent { .. }
                | Self::InsufficientBalance { .. }
                | Self::InsufficientAllowance { .. }
                | Self::InvalidAmount { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_carry_context() {
        let err = PoolError::math_overflow("u256 multiplication", &[&7u32, &"huge"]);
        assert_eq!(
            err.to_string(),
            "Math overflow in 'u256 multiplication' with values: [\"7\", \"huge\"]"
        );

        let err = PoolError::insufficient_balance("VIA", Amount::new(10), Amount::new(3));
        assert_eq!(err.to_string(), "Insufficient balance of VIA: need 10, have 3");
    }

    #[test]
    fn test_validation_family() {
        assert!(PoolError::InvalidPercent { percent: 0 }.is_validation());
        assert!(PoolError::insufficient_allowance("A", Amount::ONE, Amount::ZERO).is_validation());
        assert!(!PoolError::division_by_zero("ratio").is_validation());
        assert!(!PoolError::UnknownPool(PoolId(1)).is_validation());
    }
}
