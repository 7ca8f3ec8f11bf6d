//! Weighted round-robin load balancing algorithm.

use super::{LoadBalancer, SelectionError};
use crate::backend::Backend;
use crate::config::ConfigError;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Upper bound on the sum of all weights.
pub const MAX_CYCLE_LEN: u64 = 1 << 20;

/// Weighted round-robin load balancer.
///
/// Distributes requests proportionally to backend weights. The full cycle
/// (one slot per unit of weight) is computed up front with the smooth
/// weighted round-robin interleaving, so a backend with weight 3 next to
/// one with weight 1 is served `a a b a` rather than `a a a b`, and
/// selection is a single atomic increment.
pub struct WeightedRoundRobin {
    /// Backend index for each slot of the cycle.
    schedule: Vec<usize>,
    cursor: AtomicUsize,
}

impl WeightedRoundRobin {
    /// Create a new weighted load balancer.
    ///
    /// Every weight must be at least 1.
    pub fn new(weights: &[i64]) -> Result<Self, ConfigError> {
        let mut total: u64 = 0;
        for (index, &weight) in weights.iter().enumerate() {
            if weight < 1 {
                return Err(ConfigError::InvalidWeight { index, weight });
            }
            total = total.saturating_add(weight as u64);
        }

        if total == 0 {
            return Err(ConfigError::EmptyBackends);
        }

        if total > MAX_CYCLE_LEN {
            return Err(ConfigError::CycleTooLong {
                total,
                max: MAX_CYCLE_LEN,
            });
        }

        Ok(Self {
            schedule: smooth_schedule(weights, total as i64),
            cursor: AtomicUsize::new(0),
        })
    }

    /// Length of one full cycle (the sum of all weights).
    pub fn cycle_len(&self) -> usize {
        self.schedule.len()
    }
}

/// Build one cycle: every step adds each weight to its running score, picks
/// the highest score (lowest index on ties) and charges it the total.
fn smooth_schedule(weights: &[i64], total: i64) -> Vec<usize> {
    let mut current = vec![0i64; weights.len()];
    let mut schedule = Vec::with_capacity(total as usize);

    for _ in 0..total {
        let mut best = 0;
        for (i, weight) in weights.iter().enumerate() {
            current[i] += weight;
            if current[i] > current[best] {
                best = i;
            }
        }
        current[best] -= total;
        schedule.push(best);
    }

    schedule
}

impl LoadBalancer for WeightedRoundRobin {
    fn select(
        &self,
        backends: &[Backend],
        _client_addr: Option<SocketAddr>,
    ) -> Result<usize, SelectionError> {
        let slot = self.cursor.fetch_add(1, Ordering::Relaxed) % self.schedule.len();
        let index = self.schedule[slot];
        if index >= backends.len() {
            return Err(SelectionError::WeightsOutOfRange {
                index,
                backends: backends.len(),
            });
        }
        Ok(index)
    }
}
