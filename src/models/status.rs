use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Point-in-time statistics for one gate
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GateStats {
    pub address: String,
    /// Selection weight derived from success/fail history
    pub ratio: f64,
    pub success: u64,
    pub fail: u64,
    /// Mean of recorded round trips in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_round_trip_ms: Option<u64>,
    pub samples: usize,
}

impl GateStats {
    /// Success rate as a percentage of all recorded outcomes
    pub fn success_rate(&self) -> f64 {
        let total = self.success + self.fail;
        if total == 0 {
            0.0
        } else {
            (self.success as f64 / total as f64) * 100.0
        }
    }
}

/// Read-only snapshot of the whole pool for status reporting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolStatus {
    pub generated_at: DateTime<Utc>,
    /// Inbound requests currently being relayed
    pub active_requests: usize,
    pub gates: Vec<GateStats>,
}

impl PoolStatus {
    pub fn total_success(&self) -> u64 {
        self.gates.iter().map(|g| g.success).sum()
    }

    pub fn total_fail(&self) -> u64 {
        self.gates.iter().map(|g| g.fail).sum()
    }
}
