//! Bounded finality polling

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::ports::{Broadcaster, FinalityStatus, PortError, TxId};

/// Result of a confirmation wait that did not hit a transport error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationOutcome {
    /// Finality observed on poll number `round` (1-based)
    Confirmed { round: u32, confirmed_round: u64 },
    /// `rounds` polls all answered pending; the caller may wait again
    TimedOut { rounds: u32 },
}

impl ConfirmationOutcome {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, ConfirmationOutcome::Confirmed { .. })
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationError {
    #[error("Confirmation transport error: {0}")]
    Transport(#[from] PortError),
}

/// Polls the broadcaster's finality oracle with a fixed round budget
#[derive(Clone)]
pub struct ConfirmationWaiter {
    broadcaster: Arc<dyn Broadcaster>,
    poll_interval: Duration,
}

impl ConfirmationWaiter {
    pub fn new(broadcaster: Arc<dyn Broadcaster>, poll_interval: Duration) -> Self {
        Self {
            broadcaster,
            poll_interval,
        }
    }

    /// Poll once per round, at most `max_rounds` times
    ///
    /// A transport error ends the wait immediately. The interval sleep is
    /// skipped after the final round.
    pub async fn await_confirmation(
        &self,
        tx_id: &TxId,
        max_rounds: u32,
    ) -> Result<ConfirmationOutcome, ConfirmationError> {
        for round in 1..=max_rounds {
            match self.broadcaster.poll_finality(tx_id).await {
                Ok(FinalityStatus::Confirmed { confirmed_round }) => {
                    debug!("Transaction {} confirmed at ledger round {} (poll {})", tx_id, confirmed_round, round);
                    return Ok(ConfirmationOutcome::Confirmed {
                        round,
                        confirmed_round,
                    });
                }
                Ok(FinalityStatus::Pending) => {
                    debug!("Transaction {} pending (poll {}/{})", tx_id, round, max_rounds);
                }
                Err(e) => {
                    warn!("Finality poll for {} failed: {}", tx_id, e);
                    return Err(ConfirmationError::Transport(e));
                }
            }

            if round < max_rounds && !self.poll_interval.is_zero() {
                tokio::time::sleep(self.poll_interval).await;
            }
        }

        warn!("Transaction {} not final after {} rounds", tx_id, max_rounds);
        Ok(ConfirmationOutcome::TimedOut { rounds: max_rounds })
    }
}
