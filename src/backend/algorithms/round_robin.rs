//! Round-robin load balancing algorithm.

use super::{LoadBalancer, SelectionError};
use crate::backend::Backend;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Round-robin load balancer.
///
/// Distributes requests evenly across all backends in order.
pub struct RoundRobin {
    counter: AtomicUsize,
}

impl RoundRobin {
    /// Create a new round-robin load balancer.
    pub fn new() -> Self {
        Self {
            counter: AtomicUsize::new(0),
        }
    }
}

impl Default for RoundRobin {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadBalancer for RoundRobin {
    fn select(
        &self,
        backends: &[Backend],
        _client_addr: Option<SocketAddr>,
    ) -> Result<usize, SelectionError> {
        if backends.is_empty() {
            return Err(SelectionError::NoBackends);
        }
        let idx = self.counter.fetch_add(1, Ordering::Relaxed) % backends.len();
        Ok(idx)
    }
}
