//! Load balancing algorithms.

mod ip_hash;
mod round_robin;
mod weighted;

pub use ip_hash::IpHash;
pub use round_robin::RoundRobin;
pub use weighted::{MAX_CYCLE_LEN, WeightedRoundRobin};

use crate::backend::Backend;
use std::net::SocketAddr;
use thiserror::Error;

/// Per-request failure to pick a backend.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SelectionError {
    #[error("client address is required for ip_hash selection")]
    MissingClientAddress,

    #[error("no backends to select from")]
    NoBackends,

    #[error("weight schedule picked backend {index} but only {backends} are available")]
    WeightsOutOfRange { index: usize, backends: usize },
}

/// Trait for load balancing algorithms.
pub trait LoadBalancer: Send + Sync {
    /// Select the next backend.
    ///
    /// # Arguments
    ///
    /// * `backends` - The configured backends, never empty
    /// * `client_addr` - Client's address (for IP hash)
    ///
    /// # Returns
    ///
    /// Index of the selected backend in `backends`.
    fn select(
        &self,
        backends: &[Backend],
        client_addr: Option<SocketAddr>,
    ) -> Result<usize, SelectionError>;
}

/// The fixed set of strategies, chosen once at startup.
pub enum Strategy {
    RoundRobin(RoundRobin),
    WeightedRoundRobin(WeightedRoundRobin),
    IpHash(IpHash),
}

impl LoadBalancer for Strategy {
    fn select(
        &self,
        backends: &[Backend],
        client_addr: Option<SocketAddr>,
    ) -> Result<usize, SelectionError> {
        match self {
            Strategy::RoundRobin(lb) => lb.select(backends, client_addr),
            Strategy::WeightedRoundRobin(lb) => lb.select(backends, client_addr),
            Strategy::IpHash(lb) => lb.select(backends, client_addr),
        }
    }
}

#[cfg(test)]
pub(crate) fn test_backends(n: usize) -> Vec<Backend> {
    (0..n)
        .map(|i| Backend::parse(&format!("http://127.0.0.1:{}", 8001 + i)).unwrap())
        .collect()
}
