//! IP hash load balancing algorithm.

use super::{LoadBalancer, SelectionError};
use crate::backend::Backend;
use std::net::SocketAddr;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// IP hash load balancer.
///
/// Consistently routes requests from the same client IP to the same backend
/// for as long as the backend list is unchanged. Holds no mutable state.
pub struct IpHash;

impl IpHash {
    /// Create a new IP hash load balancer.
    pub fn new() -> Self {
        Self
    }

    /// Stable hash of a client address. The port is ignored and
    /// IPv4-mapped IPv6 addresses hash like their IPv4 form.
    pub fn hash(client_addr: SocketAddr) -> u64 {
        let ip = client_addr.ip().to_canonical().to_string();
        fnv1a(ip.as_bytes())
    }
}

impl Default for IpHash {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadBalancer for IpHash {
    fn select(
        &self,
        backends: &[Backend],
        client_addr: Option<SocketAddr>,
    ) -> Result<usize, SelectionError> {
        let client_addr = client_addr.ok_or(SelectionError::MissingClientAddress)?;
        if backends.is_empty() {
            return Err(SelectionError::NoBackends);
        }
        Ok((Self::hash(client_addr) % backends.len() as u64) as usize)
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, &b| {
        (hash ^ u64::from(b)).wrapping_mul(FNV_PRIME)
    })
}
