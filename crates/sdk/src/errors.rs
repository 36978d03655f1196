use thiserror::Error;

use pairpool_types::{Amount, PoolError, PoolId};

use crate::ports::{PortError, SignerError, TxId};

/// Synchronous errors returned before an operation starts, or by read paths
#[derive(Error, Debug)]
pub enum SdkError {
    #[error("Validation failed: {0}")]
    Validation(#[from] PoolError),

    #[error("An operation is already in flight on pool {pool_id}")]
    OperationInFlight { pool_id: PoolId },

    #[error("Port error: {0}")]
    Port(#[from] PortError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SdkError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

pub type SdkResult<T> = Result<T, SdkError>;

/// Why a confirmation wait did not produce `Confirmed`
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationFailure {
    #[error("timed out after {rounds} rounds")]
    TimedOut { rounds: u32 },

    #[error("confirmation transport error: {0}")]
    Transport(String),
}

/// Broad family of a terminal failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCategory {
    /// A remote call or broadcast was refused; nothing landed
    Submission,
    /// The signer refused or could not be reached; nothing landed
    Signing,
    /// Broadcast happened but finality was not observed; the transaction may have landed
    Confirmation,
}

/// Reason carried by every `Failed` operation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    #[error("Could not read the current allowance: {0}")]
    AllowanceFetchFailed(String),

    #[error("Allowance of {approved} does not cover {required} and automatic approval is disabled")]
    ApprovalRequired { required: Amount, approved: Amount },

    #[error("Approval submission failed: {0}")]
    ApprovalSubmissionFailed(String),

    #[error("Approval {tx_id} not confirmed: {cause}")]
    ApprovalNotConfirmed {
        tx_id: TxId,
        cause: ConfirmationFailure,
    },

    #[error("Operation submission failed: {0}")]
    OperationSubmissionFailed(String),

    #[error("Operation {tx_id} not confirmed: {cause}")]
    OperationNotConfirmed {
        tx_id: TxId,
        cause: ConfirmationFailure,
    },

    #[error("Signer unavailable: {0}")]
    SigningUnavailable(String),

    #[error("Signing rejected: {0}")]
    SigningRejected(String),
}

impl FailureReason {
    pub fn category(&self) -> FailureCategory {
        match self {
            Self::AllowanceFetchFailed(_)
            | Self::ApprovalRequired { .. }
            | Self::ApprovalSubmissionFailed(_)
            | Self::OperationSubmissionFailed(_) => FailureCategory::Submission,
            Self::SigningUnavailable(_) | Self::SigningRejected(_) => FailureCategory::Signing,
            Self::ApprovalNotConfirmed { .. } | Self::OperationNotConfirmed { .. } => {
                FailureCategory::Confirmation
            }
        }
    }

    /// True when a transaction was broadcast and its fate is unknown
    ///
    /// The next refresh cycle reconciles balances; nothing is assumed here.
    pub fn may_have_landed(&self) -> bool {
        self.category() == FailureCategory::Confirmation
    }

    /// True when finality polling itself failed rather than timing out
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self,
            Self::ApprovalNotConfirmed {
                cause: ConfirmationFailure::Transport(_),
                ..
            } | Self::OperationNotConfirmed {
                cause: ConfirmationFailure::Transport(_),
                ..
            }
        )
    }

    pub(crate) fn from_signer(error: SignerError) -> Self {
        match error {
            SignerError::Rejected(message) => Self::SigningRejected(message),
            SignerError::Unavailable(message) => Self::SigningUnavailable(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_categories() {
        let rejected = FailureReason::from_signer(SignerError::Rejected("user declined".into()));
        assert_eq!(rejected, FailureReason::SigningRejected("user declined".into()));
        assert_eq!(rejected.category(), FailureCategory::Signing);
        assert!(!rejected.may_have_landed());

        let submission = FailureReason::OperationSubmissionFailed("pool rejected".into());
        assert!(!submission.may_have_landed());

        let timed_out = FailureReason::OperationNotConfirmed {
            tx_id: TxId::new("TX1"),
            cause: ConfirmationFailure::TimedOut { rounds: 4 },
        };
        assert!(timed_out.may_have_landed());
        assert!(!timed_out.is_transport_error());

        let transport = FailureReason::ApprovalNotConfirmed {
            tx_id: TxId::new("TX2"),
            cause: ConfirmationFailure::Transport("connection reset".into()),
        };
        assert!(transport.may_have_landed());
        assert!(transport.is_transport_error());
        assert_eq!(
            transport.to_string(),
            "Approval TX2 not confirmed: confirmation transport error: connection reset"
        );
    }

    #[test]
    fn test_validation_errors_wrap_pool_errors() {
        let err: SdkError = PoolError::InvalidPercent { percent: 0 }.into();
        assert!(matches!(err, SdkError::Validation(PoolError::InvalidPercent { percent: 0 })));
    }
}
