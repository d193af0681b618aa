//! Periodic pool status reporting
//!
//! Logs a per-gate summary of the pool on a fixed interval. The full snapshot is also emitted as
//! JSON at debug level for machine consumption.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

use crate::models::PoolStatus;
use crate::relay::GatePool;

/// Periodically logs gate statistics
pub struct StatusReporter {
    pool: Arc<GatePool>,
    interval: Duration,
}

impl StatusReporter {
    pub fn new(pool: Arc<GatePool>, interval: Duration) -> Self {
        Self { pool, interval }
    }

    /// Run until shutdown is signalled
    #[instrument(skip(self, shutdown))]
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!("Starting status reporter (every {}s)", self.interval.as_secs());

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await; // Skip immediate tick

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.report();
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Status reporter shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// Log one status report and return the snapshot it was built from
    pub fn report(&self) -> PoolStatus {
        let status = self.pool.status();

        info!(
            "Pool status: {} gates, {} active requests, {} ok / {} failed",
            status.gates.len(),
            status.active_requests,
            status.total_success(),
            status.total_fail()
        );
        for gate in &status.gates {
            info!(
                "  {} ratio={:.3} ok={} fail={} ({:.1}%) rtt={}",
                gate.address,
                gate.ratio,
                gate.success,
                gate.fail,
                gate.success_rate(),
                gate.avg_round_trip_ms
                    .map(|ms| format!("{}ms", ms))
                    .unwrap_or_else(|| "-".to_string())
            );
        }

        match serde_json::to_string(&status) {
            Ok(json) => debug!(status = %json, "Pool status snapshot"),
            Err(e) => warn!("Failed to serialize pool status: {}", e),
        }

        status
    }
}

/// Handle for stopping the status reporter
pub struct StatusReporterHandle {
    shutdown_tx: watch::Sender<bool>,
}

impl StatusReporterHandle {
    pub fn new() -> (Self, watch::Receiver<bool>) {
        let (tx, rx) = watch::channel(false);
        (Self { shutdown_tx: tx }, rx)
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

impl Default for StatusReporterHandle {
    fn default() -> Self {
        Self::new().0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::Gate;

    fn pool() -> Arc<GatePool> {
        let gates = vec![
            Arc::new(Gate::new("127.0.0.1:3128", Duration::from_secs(1)).unwrap()),
            Arc::new(Gate::new("127.0.0.1:3129", Duration::from_secs(1)).unwrap()),
        ];
        Arc::new(GatePool::with_gates(gates))
    }

    #[test]
    fn test_report_reflects_pool() {
        let pool = pool();
        let first = pool.snapshot()[0].clone();
        pool.record_outcome(&first, true);
        pool.record_outcome(&first, true);
        pool.record_outcome(&first, false);
        first.record_round_trip(Duration::from_millis(40));

        let reporter = StatusReporter::new(pool.clone(), Duration::from_secs(10));
        let _active = pool.begin_request();
        let status = reporter.report();

        assert_eq!(status.active_requests, 1);
        assert_eq!(status.gates.len(), 2);
        assert_eq!(status.gates[0].success, 2);
        assert_eq!(status.gates[0].fail, 1);
        assert_eq!(status.gates[0].avg_round_trip_ms, Some(40));
        assert!((status.gates[0].success_rate() - 200.0 / 3.0).abs() < 1e-9);
        assert_eq!(status.gates[1].avg_round_trip_ms, None);
        assert_eq!(status.total_fail(), 1);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let reporter = StatusReporter::new(pool(), Duration::from_millis(10));
        let (handle, shutdown) = StatusReporterHandle::new();

        let task = tokio::spawn(async move { reporter.run(shutdown).await });
        tokio::time::sleep(Duration::from_millis(35)).await;
        handle.shutdown();

        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
    }
}
