//! Fan-out dispatch
//!
//! One round launches `fan_out` concurrent attempts, each through an independently selected gate.
//! The first attempt whose response validates answers the round. Siblings keep running; their
//! outcomes still count against their gates but are never consulted.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use rand::seq::SliceRandom;
use tokio::sync::mpsc;
use tracing::{debug, trace};
use url::Url;

use crate::error::Result;
use crate::relay::client::GateResponse;
use crate::relay::pool::{Gate, GatePool};
use crate::relay::selector::AdaptiveSelector;
use crate::relay::validate::{validate_page, Rejection};

/// A single round of forwarding
#[async_trait]
pub trait Round: Send + Sync {
    /// Run one round; `None` means no attempt validated
    async fn run_round(&self, url: &Url) -> Option<Bytes>;
}

/// One forwarding try through one gate
#[derive(Debug)]
pub struct RequestAttempt {
    pub gate: Arc<Gate>,
    pub target: Url,
    pub elapsed: Duration,
    pub outcome: Result<GateResponse>,
}

impl RequestAttempt {
    /// Send `target` through `gate`, timing the exchange
    pub async fn send(gate: Arc<Gate>, target: Url, user_agent: Option<&str>) -> Self {
        let start = Instant::now();
        let outcome = gate.client().get(&target, user_agent).await;
        Self {
            gate,
            target,
            elapsed: start.elapsed(),
            outcome,
        }
    }
}

/// Dispatch settings
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Concurrent attempts per round
    pub fan_out: usize,
    /// Operational timeout, used for the soft latency check
    pub request_timeout: Duration,
    /// User agents to rotate; empty means no header
    pub user_agents: Arc<Vec<String>>,
}

/// Concurrent multi-gate dispatcher
pub struct Dispatcher {
    pool: Arc<GatePool>,
    selector: AdaptiveSelector,
    config: DispatcherConfig,
}

impl Dispatcher {
    pub fn new(pool: Arc<GatePool>, selector: AdaptiveSelector, config: DispatcherConfig) -> Self {
        Self {
            pool,
            selector,
            config,
        }
    }

    pub fn pool(&self) -> &Arc<GatePool> {
        &self.pool
    }

    fn pick_user_agent(&self) -> Option<String> {
        self.config
            .user_agents
            .choose(&mut rand::thread_rng())
            .cloned()
    }
}

#[async_trait]
impl Round for Dispatcher {
    async fn run_round(&self, url: &Url) -> Option<Bytes> {
        let fan_out = self.config.fan_out.max(1);
        let (tx, mut rx) = mpsc::channel::<std::result::Result<Bytes, Rejection>>(fan_out);
        let mut launched = 0usize;

        for _ in 0..fan_out {
            let Some(gate) = self.selector.select(&self.pool.snapshot()) else {
                debug!("No gates to select from");
                break;
            };

            let tx = tx.clone();
            let pool = self.pool.clone();
            let target = url.clone();
            let user_agent = self.pick_user_agent();
            let request_timeout = self.config.request_timeout;
            launched += 1;

            tokio::spawn(async move {
                let attempt = RequestAttempt::send(gate, target, user_agent.as_deref()).await;
                let verdict = validate_page(&attempt.outcome, attempt.elapsed, request_timeout);
                pool.record_outcome(&attempt.gate, verdict.is_ok());

                match &verdict {
                    Ok(_) => trace!(
                        "Gate {} answered {} in {}ms",
                        attempt.gate.address(),
                        attempt.target,
                        attempt.elapsed.as_millis()
                    ),
                    Err(rejection) => debug!(
                        "Gate {} rejected for {}: {}",
                        attempt.gate.address(),
                        attempt.target,
                        rejection
                    ),
                }

                // The round may already be decided; a closed queue is expected then.
                let _ = tx.send(verdict).await;
            });
        }
        drop(tx);

        for _ in 0..launched {
            match rx.recv().await {
                Some(Ok(body)) => return Some(body),
                Some(Err(_)) => {}
                None => break,
            }
        }
        None
    }
}
