//! Shared application context.

use crate::backend::Selector;
use crate::config::{Config, ConfigError};
use crate::proxy::RelayConfig;
use crate::util::ShutdownSignal;
use std::sync::Arc;
use std::time::Duration;

/// State shared by every listener and request task.
///
/// Built once at startup and cloned into each task; clones share the same
/// selector, so selection state is process-wide.
#[derive(Clone)]
pub struct AppContext {
    /// Backends and selection strategy.
    selector: Arc<Selector>,

    /// Relay timeouts.
    relay: RelayConfig,

    /// Client request-head read timeout.
    read_timeout: Option<Duration>,

    /// Shutdown signal.
    shutdown: ShutdownSignal,
}

impl AppContext {
    /// Create a context from an already built selector.
    pub fn new(selector: Selector, relay: RelayConfig, read_timeout: Option<Duration>) -> Self {
        Self {
            selector: Arc::new(selector),
            relay,
            read_timeout,
            shutdown: ShutdownSignal::new(),
        }
    }

    /// Build the context from the loaded configuration.
    ///
    /// Fails when the backends, weights or strategy are unusable; nothing
    /// should be bound in that case.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let selector = Selector::from_config(config)?;
        let relay = RelayConfig {
            backend_timeout: config.backend_timeout(),
            write_timeout: config.write_timeout(),
        };

        Ok(Self::new(selector, relay, config.read_timeout()))
    }

    /// Get the backend selector.
    pub fn selector(&self) -> &Arc<Selector> {
        &self.selector
    }

    /// Get the relay timeouts.
    pub fn relay(&self) -> &RelayConfig {
        &self.relay
    }

    /// Get the client read timeout.
    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout
    }

    /// Get the shutdown signal.
    pub fn shutdown(&self) -> &ShutdownSignal {
        &self.shutdown
    }

    /// Trigger shutdown.
    pub fn trigger_shutdown(&self) {
        self.shutdown.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Algorithm;

    #[test]
    fn test_from_config() {
        let config = Config {
            addresses: vec!["127.0.0.1:0".to_string()],
            backends: vec!["http://127.0.0.1:9001".to_string()],
            backend_timeout: 3,
            write_timeout: 7,
            ..Config::default()
        };

        let ctx = AppContext::from_config(&config).unwrap();
        assert_eq!(ctx.relay().backend_timeout, Some(Duration::from_secs(3)));
        assert_eq!(ctx.relay().write_timeout, Some(Duration::from_secs(7)));
        assert_eq!(ctx.read_timeout(), None);
        assert_eq!(ctx.selector().algorithm(), Algorithm::RoundRobin);
    }

    #[test]
    fn test_from_config_weight_mismatch() {
        let config = Config {
            backends: vec![
                "http://127.0.0.1:9001".to_string(),
                "http://127.0.0.1:9002".to_string(),
            ],
            weights: vec![1],
            load_balancing_algorithm: Algorithm::WeightedRoundRobin,
            ..Config::default()
        };

        assert!(matches!(
            AppContext::from_config(&config),
            Err(ConfigError::WeightCountMismatch { .. })
        ));
    }

    #[test]
    fn test_clones_share_selector() {
        let config = Config {
            backends: vec!["http://127.0.0.1:9001".to_string()],
            ..Config::default()
        };

        let ctx = AppContext::from_config(&config).unwrap();
        let clone = ctx.clone();
        assert!(Arc::ptr_eq(ctx.selector(), clone.selector()));
    }
}
