//! Configuration data types.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration structure.
///
/// The field names match the JSON configuration files the balancer has
/// always accepted, so an existing `config.json` loads unchanged.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Addresses to listen on (`host:port`, or `:port` for all interfaces)
    #[serde(default)]
    pub addresses: Vec<String>,

    /// Backend base URLs, e.g. `http://10.0.0.1:8080`
    #[serde(default)]
    pub backends: Vec<String>,

    /// Per-backend weights, index-aligned with `backends`.
    /// Only consulted by the weighted round robin strategy.
    #[serde(default)]
    pub weights: Vec<i64>,

    /// Seconds allowed for a backend exchange (0 = no limit)
    #[serde(default)]
    pub backend_timeout: u64,

    /// Seconds allowed to read a request head from a client (0 = no limit)
    #[serde(default)]
    pub read_timeout: u64,

    /// Seconds allowed to write a response to a client (0 = no limit)
    #[serde(default)]
    pub write_timeout: u64,

    /// Accepted for compatibility; registry integration is not provided.
    #[serde(default)]
    pub use_service_registry: bool,

    /// Backend selection strategy
    #[serde(default)]
    pub load_balancing_algorithm: Algorithm,

    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log format: json or pretty
    #[serde(default)]
    pub log_format: LogFormat,
}

impl Config {
    /// Backend exchange timeout, `None` when unlimited.
    pub fn backend_timeout(&self) -> Option<Duration> {
        seconds(self.backend_timeout)
    }

    /// Client request-head read timeout, `None` when unlimited.
    pub fn read_timeout(&self) -> Option<Duration> {
        seconds(self.read_timeout)
    }

    /// Client response write timeout, `None` when unlimited.
    pub fn write_timeout(&self) -> Option<Duration> {
        seconds(self.write_timeout)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addresses: Vec::new(),
            backends: Vec::new(),
            weights: Vec::new(),
            backend_timeout: 0,
            read_timeout: 0,
            write_timeout: 0,
            use_service_registry: false,
            load_balancing_algorithm: Algorithm::default(),
            log_level: default_log_level(),
            log_format: LogFormat::default(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

/// Load balancing algorithm.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    #[default]
    RoundRobin,
    WeightedRoundRobin,
    IpHash,
}

impl std::fmt::Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Algorithm::RoundRobin => "round_robin",
            Algorithm::WeightedRoundRobin => "weighted_round_robin",
            Algorithm::IpHash => "ip_hash",
        };
        f.write_str(name)
    }
}

/// Normalize a listen address for binding.
///
/// `":8080"` means every interface and becomes `"0.0.0.0:8080"`.
pub fn normalize_listen_address(address: &str) -> String {
    if address.starts_with(':') {
        format!("0.0.0.0{}", address)
    } else {
        address.to_string()
    }
}

fn seconds(value: u64) -> Option<Duration> {
    (value > 0).then(|| Duration::from_secs(value))
}

// Default value functions

fn default_log_level() -> String {
    "info".to_string()
}
