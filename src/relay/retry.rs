//! Bounded retry over dispatch rounds

use bytes::Bytes;
use tracing::{debug, warn};
use url::Url;

use crate::error::{RelayError, Result};
use crate::relay::dispatch::Round;

/// Where a relayed request currently stands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryState {
    /// Running round number `round` (1-based)
    Attempting { round: u32 },
    /// A round validated; terminal
    Succeeded { round: u32, body: Bytes },
    /// The last round failed and another is allowed
    Retrying { round: u32 },
    /// Every allowed round failed; terminal
    Exhausted { rounds: u32 },
}

/// Runs rounds until one validates or the retry budget is spent
///
/// `max_retries` counts rounds after the first, so at most `max_retries + 1` rounds run.
pub struct RetryController<R> {
    round: R,
    max_retries: u32,
}

impl<R: Round> RetryController<R> {
    pub fn new(round: R, max_retries: u32) -> Self {
        Self { round, max_retries }
    }

    pub fn round(&self) -> &R {
        &self.round
    }

    /// Relay `url`, returning the first validated body
    pub async fn forward(&self, url: &Url) -> Result<Bytes> {
        let mut state = RetryState::Attempting { round: 1 };

        loop {
            state = match state {
                RetryState::Attempting { round } => match self.round.run_round(url).await {
                    Some(body) => RetryState::Succeeded { round, body },
                    None => self.after_failure(round),
                },
                RetryState::Succeeded { round, body } => {
                    debug!("Round {} succeeded for {}", round, url);
                    return Ok(body);
                }
                RetryState::Retrying { round } => {
                    debug!("Retrying {} (round {}/{})", url, round + 1, self.max_retries + 1);
                    RetryState::Attempting { round: round + 1 }
                }
                RetryState::Exhausted { rounds } => {
                    warn!("All {} rounds failed for {}", rounds, url);
                    return Err(RelayError::AllGatesExhausted { rounds });
                }
            };
        }
    }

    fn after_failure(&self, round: u32) -> RetryState {
        if round <= self.max_retries {
            RetryState::Retrying { round }
        } else {
            RetryState::Exhausted { rounds: round }
        }
    }
}
