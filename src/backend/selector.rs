//! Backend selector: the configured backends plus the strategy choosing
//! among them.

use crate::backend::Backend;
use crate::backend::algorithms::{
    IpHash, LoadBalancer, RoundRobin, SelectionError, Strategy, WeightedRoundRobin,
};
use crate::config::{Algorithm, Config, ConfigError};
use std::net::SocketAddr;
use tracing::debug;

/// Picks a backend for each request.
///
/// Built once at startup and shared by every listener; `next` takes `&self`
/// and is safe to call from any number of tasks at once.
pub struct Selector {
    backends: Vec<Backend>,
    algorithm: Algorithm,
    strategy: Strategy,
}

impl Selector {
    /// Create a selector.
    ///
    /// `weights` is only read for [`Algorithm::WeightedRoundRobin`], where it
    /// must hold one weight >= 1 per backend.
    pub fn new(
        backends: Vec<Backend>,
        weights: &[i64],
        algorithm: Algorithm,
    ) -> Result<Self, ConfigError> {
        if backends.is_empty() {
            return Err(ConfigError::EmptyBackends);
        }

        let strategy = match algorithm {
            Algorithm::RoundRobin => Strategy::RoundRobin(RoundRobin::new()),
            Algorithm::WeightedRoundRobin => {
                if weights.len() != backends.len() {
                    return Err(ConfigError::WeightCountMismatch {
                        weights: weights.len(),
                        backends: backends.len(),
                    });
                }
                Strategy::WeightedRoundRobin(WeightedRoundRobin::new(weights)?)
            }
            Algorithm::IpHash => Strategy::IpHash(IpHash::new()),
        };

        Ok(Self {
            backends,
            algorithm,
            strategy,
        })
    }

    /// Create a selector from the loaded configuration.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let backends = config
            .backends
            .iter()
            .map(|url| Backend::parse(url))
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(backends, &config.weights, config.load_balancing_algorithm)
    }

    /// Select the backend for the next request.
    ///
    /// # Arguments
    ///
    /// * `client_addr` - Client's address (required for IP hash)
    pub fn next(&self, client_addr: Option<SocketAddr>) -> Result<&Backend, SelectionError> {
        let idx = self.strategy.select(&self.backends, client_addr)?;
        let backend = &self.backends[idx];

        debug!(algorithm = %self.algorithm, backend = %backend, "selected backend");

        Ok(backend)
    }

    /// All configured backends, in configuration order.
    pub fn backends(&self) -> &[Backend] {
        &self.backends
    }

    /// The strategy in use.
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn backends(n: usize) -> Vec<Backend> {
        (0..n)
            .map(|i| Backend::parse(&format!("http://127.0.0.1:{}", 9001 + i)).unwrap())
            .collect()
    }

    #[test]
    fn test_round_robin_sequence() {
        let selector = Selector::new(backends(3), &[], Algorithm::RoundRobin).unwrap();
        let expected = selector.backends().to_vec();

        for k in 1..=10 {
            let selected = selector.next(None).unwrap();
            assert_eq!(selected, &expected[(k - 1) % 3]);
        }
    }

    #[test]
    fn test_weighted_cycle_counts() {
        let selector =
            Selector::new(backends(2), &[3, 1], Algorithm::WeightedRoundRobin).unwrap();

        let mut counts: HashMap<String, usize> = HashMap::new();
        for _ in 0..40 {
            let selected = selector.next(None).unwrap();
            *counts.entry(selected.url().to_string()).or_default() += 1;
        }

        // With 3:1 weights, the first backend gets 30, the second 10
        assert_eq!(counts["http://127.0.0.1:9001"], 30);
        assert_eq!(counts["http://127.0.0.1:9002"], 10);
    }

    #[test]
    fn test_ip_hash_consistency() {
        let selector = Selector::new(backends(4), &[], Algorithm::IpHash).unwrap();
        let client: SocketAddr = "192.168.1.100:12345".parse().unwrap();

        let s1 = selector.next(Some(client)).unwrap().clone();
        let s2 = selector.next(Some(client)).unwrap().clone();
        let s3 = selector.next(Some(client)).unwrap().clone();

        assert_eq!(s1, s2);
        assert_eq!(s2, s3);
    }

    #[test]
    fn test_ip_hash_without_client_fails() {
        let selector = Selector::new(backends(2), &[], Algorithm::IpHash).unwrap();
        assert_eq!(
            selector.next(None).unwrap_err(),
            SelectionError::MissingClientAddress
        );
    }

    #[test]
    fn test_empty_backends_rejected() {
        for algorithm in [
            Algorithm::RoundRobin,
            Algorithm::WeightedRoundRobin,
            Algorithm::IpHash,
        ] {
            let result = Selector::new(Vec::new(), &[], algorithm);
            assert!(matches!(result, Err(ConfigError::EmptyBackends)));
        }
    }

    #[test]
    fn test_weight_count_mismatch_rejected() {
        let result = Selector::new(backends(3), &[1, 2], Algorithm::WeightedRoundRobin);
        assert!(matches!(
            result,
            Err(ConfigError::WeightCountMismatch {
                weights: 2,
                backends: 3
            })
        ));
    }

    #[test]
    fn test_non_positive_weight_rejected() {
        let result = Selector::new(backends(2), &[1, -1], Algorithm::WeightedRoundRobin);
        assert!(matches!(result, Err(ConfigError::InvalidWeight { .. })));
    }

    #[test]
    fn test_weights_ignored_for_round_robin() {
        assert!(Selector::new(backends(2), &[7], Algorithm::RoundRobin).is_ok());
    }

    #[test]
    fn test_from_config() {
        let config = Config {
            addresses: vec!["127.0.0.1:0".to_string()],
            backends: vec![
                "http://127.0.0.1:9001".to_string(),
                "http://127.0.0.1:9002/base".to_string(),
            ],
            weights: vec![2, 1],
            load_balancing_algorithm: Algorithm::WeightedRoundRobin,
            ..Config::default()
        };

        let selector = Selector::from_config(&config).unwrap();
        assert_eq!(selector.algorithm(), Algorithm::WeightedRoundRobin);
        assert_eq!(selector.backends().len(), 2);
    }

    #[test]
    fn test_from_config_invalid_backend() {
        let config = Config {
            backends: vec!["ftp://127.0.0.1".to_string()],
            ..Config::default()
        };

        assert!(matches!(
            Selector::from_config(&config),
            Err(ConfigError::InvalidBackend { .. })
        ));
    }

    #[test]
    fn test_concurrent_round_robin_no_lost_updates() {
        const THREADS: usize = 8;
        const PER_THREAD: usize = 1250;

        let selector = Arc::new(Selector::new(backends(4), &[], Algorithm::RoundRobin).unwrap());

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let selector = Arc::clone(&selector);
                std::thread::spawn(move || {
                    let mut counts: HashMap<String, usize> = HashMap::new();
                    for _ in 0..PER_THREAD {
                        let selected = selector.next(None).unwrap();
                        *counts.entry(selected.url().to_string()).or_default() += 1;
                    }
                    counts
                })
            })
            .collect();

        let mut totals: HashMap<String, usize> = HashMap::new();
        for handle in handles {
            for (url, count) in handle.join().unwrap() {
                *totals.entry(url).or_default() += count;
            }
        }

        // Every increment hands out a distinct counter value, so 10,000
        // selections over 4 backends land exactly 2,500 on each.
        assert_eq!(totals.values().sum::<usize>(), THREADS * PER_THREAD);
        assert_eq!(totals.len(), 4);
        for count in totals.values() {
            assert_eq!(*count, THREADS * PER_THREAD / 4);
        }
    }

    #[test]
    fn test_concurrent_weighted_exact_totals() {
        let selector = Arc::new(
            Selector::new(backends(3), &[5, 3, 2], Algorithm::WeightedRoundRobin).unwrap(),
        );

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let selector = Arc::clone(&selector);
                std::thread::spawn(move || {
                    (0..1000)
                        .map(|_| selector.next(None).unwrap().url().to_string())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut totals: HashMap<String, usize> = HashMap::new();
        for handle in handles {
            for url in handle.join().unwrap() {
                *totals.entry(url).or_default() += 1;
            }
        }

        assert_eq!(totals["http://127.0.0.1:9001"], 5000);
        assert_eq!(totals["http://127.0.0.1:9002"], 3000);
        assert_eq!(totals["http://127.0.0.1:9003"], 2000);
    }
}
