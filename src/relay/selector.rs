//! Adaptive gate selection
//!
//! Each attempt either explores (uniform pick over the whole pool) or exploits (pick weighted by
//! each gate's success/fail ratio). A draw at or above `explore_bias` explores, so a larger bias
//! means more exploitation.

use std::sync::Arc;

use rand::Rng;

use crate::relay::pool::Gate;

/// Selection weight for a gate with the given history
pub fn ratio(success: u64, fail: u64) -> f64 {
    match (success, fail) {
        (0, 0) => 1.0,
        (s, 0) => 1.0 + s as f64,
        (s, f) => 1.0 + s as f64 / f as f64,
    }
}

/// Explore/exploit selector, evaluated fresh for every attempt
#[derive(Debug, Clone, Copy)]
pub struct AdaptiveSelector {
    explore_bias: f64,
}

impl AdaptiveSelector {
    pub fn new(explore_bias: f64) -> Self {
        Self {
            explore_bias: explore_bias.clamp(0.0, 1.0),
        }
    }

    pub fn explore_bias(&self) -> f64 {
        self.explore_bias
    }

    /// Pick one gate, or `None` if the pool is empty
    pub fn select(&self, gates: &[Arc<Gate>]) -> Option<Arc<Gate>> {
        self.select_with(&mut rand::thread_rng(), gates)
    }

    pub fn select_with<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        gates: &[Arc<Gate>],
    ) -> Option<Arc<Gate>> {
        let weights: Vec<f64> = gates.iter().map(|g| g.ratio()).collect();
        self.pick_index(rng, &weights).map(|idx| gates[idx].clone())
    }

    fn pick_index<R: Rng + ?Sized>(&self, rng: &mut R, weights: &[f64]) -> Option<usize> {
        if weights.is_empty() {
            return None;
        }

        if rng.gen::<f64>() < self.explore_bias {
            if let Some(idx) = weighted_index(rng, weights) {
                return Some(idx);
            }
        }

        Some(rng.gen_range(0..weights.len()))
    }
}

/// Walk the weights until the running sum first exceeds a uniform draw in `[0, total)`
fn weighted_index<R: Rng + ?Sized>(rng: &mut R, weights: &[f64]) -> Option<usize> {
    let total: f64 = weights.iter().sum();
    if total <= 0.0 || !total.is_finite() {
        return None;
    }

    let target = rng.gen_range(0.0..total);
    let mut running = 0.0;
    for (idx, weight) in weights.iter().enumerate() {
        running += weight;
        if running > target {
            return Some(idx);
        }
    }
    None
}
