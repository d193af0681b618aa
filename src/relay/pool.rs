//! Gate pool and per-gate statistics

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use parking_lot::Mutex;

use crate::error::Result;
use crate::models::{GateStats, PoolStatus};
use crate::relay::client::GateClient;
use crate::relay::selector::ratio;

/// One egress gate with its live statistics
#[derive(Debug)]
pub struct Gate {
    address: String,
    client: GateClient,
    round_trips: Mutex<Vec<u64>>,
    success: AtomicU64,
    fail: AtomicU64,
}

impl Gate {
    /// Create a gate whose client starts with `timeout`
    pub fn new(address: &str, timeout: Duration) -> Result<Self> {
        let client = GateClient::new(address, timeout)?;
        Ok(Self {
            address: client.address(),
            client,
            round_trips: Mutex::new(Vec::new()),
            success: AtomicU64::new(0),
            fail: AtomicU64::new(0),
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn client(&self) -> &GateClient {
        &self.client
    }

    pub fn success_count(&self) -> u64 {
        self.success.load(Ordering::Acquire)
    }

    pub fn fail_count(&self) -> u64 {
        self.fail.load(Ordering::Acquire)
    }

    /// Current selection weight
    pub fn ratio(&self) -> f64 {
        ratio(self.success_count(), self.fail_count())
    }

    pub fn record_round_trip(&self, elapsed: Duration) {
        self.round_trips.lock().push(elapsed.as_millis() as u64);
    }

    pub fn round_trips(&self) -> Vec<u64> {
        self.round_trips.lock().clone()
    }

    fn record(&self, success: bool) {
        let counter = if success { &self.success } else { &self.fail };
        counter.fetch_add(1, Ordering::AcqRel);
    }

    pub fn stats(&self) -> GateStats {
        let samples = self.round_trips.lock();
        let avg_round_trip_ms = if samples.is_empty() {
            None
        } else {
            Some(samples.iter().sum::<u64>() / samples.len() as u64)
        };
        let success = self.success_count();
        let fail = self.fail_count();

        GateStats {
            address: self.address.clone(),
            ratio: ratio(success, fail),
            success,
            fail,
            avg_round_trip_ms,
            samples: samples.len(),
        }
    }
}

/// Shared set of calibrated gates
///
/// The gate list is swapped as a whole; readers always see either the old or the new list.
/// Outcome counters live on each gate as atomics, so recording never takes a lock.
#[derive(Debug, Default)]
pub struct GatePool {
    gates: ArcSwap<Vec<Arc<Gate>>>,
    active_requests: AtomicUsize,
}

impl GatePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_gates(gates: Vec<Arc<Gate>>) -> Self {
        let pool = Self::new();
        pool.replace(gates);
        pool
    }

    /// Atomically swap the active gate set
    pub fn replace(&self, gates: Vec<Arc<Gate>>) {
        self.gates.store(Arc::new(gates));
    }

    /// Read-consistent view of the current gate list
    pub fn snapshot(&self) -> Arc<Vec<Arc<Gate>>> {
        self.gates.load_full()
    }

    pub fn record_outcome(&self, gate: &Gate, success: bool) {
        gate.record(success);
    }

    pub fn len(&self) -> usize {
        self.gates.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Mark an inbound request as in flight until the guard drops
    pub fn begin_request(self: &Arc<Self>) -> ActiveRequestGuard {
        self.active_requests.fetch_add(1, Ordering::AcqRel);
        ActiveRequestGuard { pool: self.clone() }
    }

    pub fn active_requests(&self) -> usize {
        self.active_requests.load(Ordering::Acquire)
    }

    pub fn status(&self) -> PoolStatus {
        PoolStatus {
            generated_at: chrono::Utc::now(),
            active_requests: self.active_requests(),
            gates: self.snapshot().iter().map(|g| g.stats()).collect(),
        }
    }
}

/// Decrements the in-flight request count on drop
pub struct ActiveRequestGuard {
    pool: Arc<GatePool>,
}

impl Drop for ActiveRequestGuard {
    fn drop(&mut self) {
        self.pool.active_requests.fetch_sub(1, Ordering::AcqRel);
    }
}
