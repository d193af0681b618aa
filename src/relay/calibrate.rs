//! Gate calibration
//!
//! Probes every candidate gate against an IP echo responder before it may carry traffic. Gates
//! that pass are rebound to the operational timeout; the rest are dropped for this pass.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use crate::error::{RelayError, Result};
use crate::relay::pool::{Gate, GatePool};
use crate::relay::validate::validate_probe;

/// Calibration settings
#[derive(Debug, Clone)]
pub struct CalibratorConfig {
    /// Responder that echoes the caller's public IP as plain text
    pub probe_url: Url,
    /// Client timeout while probing
    pub calibration_timeout: Duration,
    /// Client timeout once a gate is accepted
    pub request_timeout: Duration,
}

/// One-shot, repeatable health calibration for candidate gates
pub struct Calibrator {
    config: CalibratorConfig,
}

impl Calibrator {
    pub fn new(config: CalibratorConfig) -> Self {
        Self { config }
    }

    /// Probe all candidates concurrently and return the working gates in candidate order
    #[instrument(skip(self, addresses), fields(candidates = addresses.len()))]
    pub async fn calibrate(&self, addresses: &[String]) -> Vec<Arc<Gate>> {
        info!(
            "Calibrating {} gates against {}",
            addresses.len(),
            self.config.probe_url
        );

        let (tx, mut rx) = mpsc::channel(addresses.len().max(1));
        let mut launched = 0usize;

        for (idx, address) in addresses.iter().enumerate() {
            let gate = match Gate::new(address, self.config.calibration_timeout) {
                Ok(gate) => Arc::new(gate),
                Err(e) => {
                    warn!("Skipping gate {}: {}", address, e);
                    continue;
                }
            };

            let tx = tx.clone();
            let probe_url = self.config.probe_url.clone();
            launched += 1;

            tokio::spawn(async move {
                let start = Instant::now();
                let outcome = gate.client().get(&probe_url, None).await;
                let elapsed = start.elapsed();

                let accepted = match validate_probe(&outcome) {
                    Ok(()) => {
                        debug!(
                            "Gate {} passed calibration in {}ms",
                            gate.address(),
                            elapsed.as_millis()
                        );
                        Some((idx, gate, elapsed))
                    }
                    Err(rejection) => {
                        debug!("Gate {} failed calibration: {}", gate.address(), rejection);
                        None
                    }
                };
                let _ = tx.send(accepted).await;
            });
        }
        drop(tx);

        let mut working = Vec::new();
        for _ in 0..launched {
            match rx.recv().await {
                Some(Some(result)) => working.push(result),
                Some(None) => {}
                None => break,
            }
        }
        working.sort_by_key(|(idx, _, _)| *idx);

        let gates: Vec<Arc<Gate>> = working
            .into_iter()
            .map(|(_, gate, elapsed)| {
                gate.record_round_trip(elapsed);
                gate.client().set_timeout(self.config.request_timeout);
                gate
            })
            .collect();

        info!(
            "Calibration complete: {} working, {} dropped",
            gates.len(),
            addresses.len() - gates.len()
        );
        gates
    }

    /// Calibrate and swap the result into `pool`; an empty result is fatal
    pub async fn calibrate_pool(&self, pool: &GatePool, addresses: &[String]) -> Result<usize> {
        let gates = self.calibrate(addresses).await;
        if gates.is_empty() {
            error!("No working gates after calibration");
            return Err(RelayError::NoGatesAvailable);
        }

        let count = gates.len();
        pool.replace(gates);
        Ok(count)
    }
}
