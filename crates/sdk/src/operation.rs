//! Pending operations and the events they emit

use std::fmt;
use thiserror::Error;

use pairpool_math::scale_to_decimal;
use pairpool_types::{Amount, OperationKind, OperationRequest, PipelineStatus};

use crate::errors::FailureReason;
use crate::ports::TxId;

/// Attempted move against the forward-only status order
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Invalid status transition from {from} to {to}")]
pub struct InvalidTransition {
    pub from: PipelineStatus,
    pub to: PipelineStatus,
}

/// One net movement reported after a commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryLeg {
    pub symbol: String,
    pub decimals: u8,
    pub amount: Amount,
    /// `true` when the amount arrives, `false` when it leaves
    pub credit: bool,
}

impl SummaryLeg {
    pub fn credit(symbol: impl Into<String>, decimals: u8, amount: Amount) -> Self {
        Self {
            symbol: symbol.into(),
            decimals,
            amount,
            credit: true,
        }
    }

    pub fn debit(symbol: impl Into<String>, decimals: u8, amount: Amount) -> Self {
        Self {
            symbol: symbol.into(),
            decimals,
            amount,
            credit: false,
        }
    }
}

impl fmt::Display for SummaryLeg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.credit { '+' } else { '-' };
        write!(
            f,
            "{}{} {}",
            sign,
            scale_to_decimal(self.amount, self.decimals),
            self.symbol
        )
    }
}

/// Success payload of a committed operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationSummary {
    pub operation_id: u64,
    pub kind: OperationKind,
    pub legs: Vec<SummaryLeg>,
    pub tx_id: TxId,
    /// Ledger round the primary transaction landed in
    pub confirmed_round: u64,
}

impl fmt::Display for OperationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} successful", self.kind)?;
        for leg in &self.legs {
            write!(f, " {}", leg)?;
        }
        Ok(())
    }
}

/// Item of the stream returned by `TransactionPipeline::run_operation`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    Transition {
        operation_id: u64,
        status: PipelineStatus,
    },
    Committed(OperationSummary),
    Failed {
        operation_id: u64,
        reason: FailureReason,
    },
}

impl PipelineEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PipelineEvent::Transition { .. })
    }
}

/// A unit of work and every status it has passed through
#[derive(Debug, Clone)]
pub struct PendingOperation {
    id: u64,
    request: OperationRequest,
    status: PipelineStatus,
    history: Vec<PipelineStatus>,
    failure: Option<FailureReason>,
    summary: Option<OperationSummary>,
}

impl PendingOperation {
    pub fn new(id: u64, request: OperationRequest) -> Self {
        Self {
            id,
            request,
            status: PipelineStatus::Idle,
            history: vec![PipelineStatus::Idle],
            failure: None,
            summary: None,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn request(&self) -> &OperationRequest {
        &self.request
    }

    pub fn kind(&self) -> OperationKind {
        self.request.kind()
    }

    pub fn status(&self) -> PipelineStatus {
        self.status
    }

    /// Every status entered, in order, starting with `Idle`
    pub fn history(&self) -> &[PipelineStatus] {
        &self.history
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        self.failure.as_ref()
    }

    pub fn summary(&self) -> Option<&OperationSummary> {
        self.summary.as_ref()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Whether an approval landed before the operation stopped
    pub fn approval_confirmed(&self) -> bool {
        self.history.contains(&PipelineStatus::AwaitingApprovalConfirmation)
            && self.history.contains(&PipelineStatus::Submitting)
    }

    /// Move to a later status; terminal statuses are never left
    pub(crate) fn advance(&mut self, next: PipelineStatus) -> Result<(), InvalidTransition> {
        if !self.status.can_transition_to(next) {
            return Err(InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.history.push(next);
        Ok(())
    }

    pub(crate) fn commit(&mut self, summary: OperationSummary) -> Result<(), InvalidTransition> {
        self.advance(PipelineStatus::Committed)?;
        self.summary = Some(summary);
        Ok(())
    }

    pub(crate) fn fail(&mut self, reason: FailureReason) -> Result<(), InvalidTransition> {
        self.advance(PipelineStatus::Failed)?;
        self.failure = Some(reason);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pairpool_types::SwapDirection;

    fn swap() -> PendingOperation {
        PendingOperation::new(
            1,
            OperationRequest::Swap {
                direction: SwapDirection::AForB,
                amount: Amount::new(10),
            },
        )
    }

    #[test]
    fn test_history_records_every_status() {
        let mut op = swap();
        op.advance(PipelineStatus::CheckingAllowance).unwrap();
        op.advance(PipelineStatus::Approving).unwrap();
        op.advance(PipelineStatus::AwaitingApprovalConfirmation).unwrap();
        op.advance(PipelineStatus::Submitting).unwrap();
        op.fail(FailureReason::SigningRejected("declined".into())).unwrap();

        assert_eq!(
            op.history(),
            &[
                PipelineStatus::Idle,
                PipelineStatus::CheckingAllowance,
                PipelineStatus::Approving,
                PipelineStatus::AwaitingApprovalConfirmation,
                PipelineStatus::Submitting,
                PipelineStatus::Failed,
            ]
        );
        assert!(op.approval_confirmed());
        assert_eq!(op.failure(), Some(&FailureReason::SigningRejected("declined".into())));
    }

    #[test]
    fn test_rejects_backward_and_terminal_exits() {
        let mut op = swap();
        op.advance(PipelineStatus::Submitting).unwrap();
        assert_eq!(
            op.advance(PipelineStatus::CheckingAllowance),
            Err(InvalidTransition {
                from: PipelineStatus::Submitting,
                to: PipelineStatus::CheckingAllowance
            })
        );

        op.fail(FailureReason::OperationSubmissionFailed("rejected".into())).unwrap();
        assert!(op.is_terminal());
        assert!(op.advance(PipelineStatus::Committed).is_err());
        assert!(op.fail(FailureReason::SigningRejected("again".into())).is_err());
        assert_eq!(op.history().len(), 3);
    }

    #[test]
    fn test_commit_only_after_confirmation_wait() {
        let mut op = swap();
        let summary = OperationSummary {
            operation_id: 1,
            kind: OperationKind::Swap,
            legs: Vec::new(),
            tx_id: TxId::new("TX1"),
            confirmed_round: 1,
        };

        assert_eq!(
            op.commit(summary.clone()),
            Err(InvalidTransition {
                from: PipelineStatus::Idle,
                to: PipelineStatus::Committed
            })
        );
        op.advance(PipelineStatus::AwaitingSigning).unwrap();
        assert!(op.commit(summary.clone()).is_err());
        assert!(op.summary().is_none());

        op.advance(PipelineStatus::AwaitingConfirmation).unwrap();
        op.commit(summary).unwrap();
        assert_eq!(op.status(), PipelineStatus::Committed);
    }

    #[test]
    fn test_summary_rendering() {
        let summary = OperationSummary {
            operation_id: 7,
            kind: OperationKind::DepositReserve,
            legs: vec![SummaryLeg::credit("VIA", 6, Amount::new(1_500_000))],
            tx_id: TxId::new("TX7"),
            confirmed_round: 100,
        };
        assert_eq!(summary.to_string(), "deposit reserve successful +1.500000 VIA");

        let leg = SummaryLeg::debit("WVOI", 0, Amount::new(3));
        assert_eq!(leg.to_string(), "-3 WVOI");
    }
}
