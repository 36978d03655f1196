//! Operation requests and pipeline status

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Amount, Asset, Side, SwapDirection};

/// Kind of work a pending operation performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    Approve,
    DepositReserve,
    WithdrawReserve,
    AddLiquidity,
    RemoveLiquidity,
    Swap,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationKind::Approve => "approve",
            OperationKind::DepositReserve => "deposit reserve",
            OperationKind::WithdrawReserve => "withdraw reserve",
            OperationKind::AddLiquidity => "add liquidity",
            OperationKind::RemoveLiquidity => "remove liquidity",
            OperationKind::Swap => "swap",
        };
        f.write_str(name)
    }
}

/// A user request against one pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationRequest {
    /// Set the pool's allowance on an asset to exactly `amount`
    Approve { asset: Asset, amount: Amount },
    /// Move tokens from the wallet into the user's pool reserve
    DepositReserve { side: Side, amount: Amount },
    /// Move tokens from the user's pool reserve back to the wallet
    WithdrawReserve { side: Side, amount: Amount },
    /// Convert a percentage of the redeemable reserve pair into pool tokens
    AddLiquidity { percent: u32 },
    /// Burn a percentage of the user's pool tokens
    RemoveLiquidity { percent: u32 },
    Swap {
        direction: SwapDirection,
        amount: Amount,
    },
}

impl OperationRequest {
    pub fn kind(&self) -> OperationKind {
        match self {
            OperationRequest::Approve { .. } => OperationKind::Approve,
            OperationRequest::DepositReserve { .. } => OperationKind::DepositReserve,
            OperationRequest::WithdrawReserve { .. } => OperationKind::WithdrawReserve,
            OperationRequest::AddLiquidity { .. } => OperationKind::AddLiquidity,
            OperationRequest::RemoveLiquidity { .. } => OperationKind::RemoveLiquidity,
            OperationRequest::Swap { .. } => OperationKind::Swap,
        }
    }

    /// Percentage argument, for the liquidity operations
    pub fn percent(&self) -> Option<u32> {
        match self {
            OperationRequest::AddLiquidity { percent }
            | OperationRequest::RemoveLiquidity { percent } => Some(*percent),
            _ => None,
        }
    }
}

/// State of a pending operation
///
/// Variants are declared in pipeline order; a status may only move to a
/// later one. `Committed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PipelineStatus {
    Idle,
    CheckingAllowance,
    Approving,
    AwaitingApprovalConfirmation,
    Submitting,
    AwaitingSigning,
    AwaitingConfirmation,
    Committed,
    Failed,
}

impl PipelineStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineStatus::Committed | PipelineStatus::Failed)
    }

    /// Whether moving from `self` to `next` keeps the status history forward-only
    ///
    /// `Committed` is only reachable from `AwaitingConfirmation`.
    pub fn can_transition_to(self, next: PipelineStatus) -> bool {
        match next {
            PipelineStatus::Committed => self == PipelineStatus::AwaitingConfirmation,
            _ => !self.is_terminal() && next > self,
        }
    }
}

impl fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_only_transitions() {
        use PipelineStatus::*;

        assert!(Idle.can_transition_to(CheckingAllowance));
        assert!(Idle.can_transition_to(Submitting));
        assert!(CheckingAllowance.can_transition_to(Failed));
        assert!(AwaitingConfirmation.can_transition_to(Committed));

        assert!(!Submitting.can_transition_to(Approving));
        assert!(!Submitting.can_transition_to(Submitting));
        assert!(!Committed.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Committed));
    }

    #[test]
    fn test_commit_requires_confirmation_wait() {
        use PipelineStatus::*;

        for status in [Idle, CheckingAllowance, Approving, AwaitingApprovalConfirmation, Submitting, AwaitingSigning] {
            assert!(!status.can_transition_to(Committed), "{} -> Committed", status);
            assert!(status.can_transition_to(Failed));
        }
        assert!(!Committed.can_transition_to(Committed));
    }

    #[test]
    fn test_request_kind() {
        let request = OperationRequest::Swap {
            direction: SwapDirection::AForB,
            amount: Amount::new(5),
        };
        assert_eq!(request.kind(), OperationKind::Swap);
        assert_eq!(request.percent(), None);
        assert_eq!(
            OperationRequest::RemoveLiquidity { percent: 25 }.percent(),
            Some(25)
        );
    }
}
