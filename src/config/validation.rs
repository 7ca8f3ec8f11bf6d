//! Configuration validation.

use crate::backend::Backend;
use crate::config::{Algorithm, Config};
use std::collections::HashSet;

/// Validate the configuration.
///
/// Checks for:
/// - At least one listen address and one backend
/// - No duplicate listen addresses
/// - Backend URLs are absolute `http://` URLs
/// - Weighted round robin has one weight >= 1 per backend
/// - A known log level
///
/// # Returns
///
/// `Ok(())` if valid, or an error message describing every problem found.
pub fn validate_config(config: &Config) -> Result<(), String> {
    let mut errors = Vec::new();

    if config.addresses.is_empty() {
        errors.push("at least one listen address must be defined".to_string());
    }

    if config.backends.is_empty() {
        errors.push("at least one backend must be defined".to_string());
    }

    let mut listen_addresses = HashSet::new();
    for address in &config.addresses {
        if address.trim().is_empty() {
            errors.push("listen address cannot be empty".to_string());
        } else if !listen_addresses.insert(address.as_str()) {
            errors.push(format!("duplicate listen address: {}", address));
        }
    }

    for backend in &config.backends {
        if let Err(e) = Backend::parse(backend) {
            errors.push(e.to_string());
        }
    }

    if config.load_balancing_algorithm == Algorithm::WeightedRoundRobin {
        if config.weights.len() != config.backends.len() {
            errors.push(format!(
                "weighted_round_robin needs one weight per backend ({} weights, {} backends)",
                config.weights.len(),
                config.backends.len()
            ));
        }

        for (index, weight) in config.weights.iter().enumerate() {
            if *weight < 1 {
                errors.push(format!(
                    "weight {} at index {} is invalid (must be >= 1)",
                    weight, index
                ));
            }
        }
    }

    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.log_level.to_lowercase().as_str()) {
        errors.push(format!(
            "invalid log level '{}', must be one of: {}",
            config.log_level,
            valid_levels.join(", ")
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_config() -> Config {
        Config {
            addresses: vec!["127.0.0.1:8080".to_string()],
            backends: vec![
                "http://127.0.0.1:9000".to_string(),
                "http://127.0.0.1:9001".to_string(),
            ],
            ..Config::default()
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(validate_config(&minimal_config()).is_ok());
    }

    #[test]
    fn test_no_addresses() {
        let mut config = minimal_config();
        config.addresses.clear();
        let result = validate_config(&config);
        assert!(result.unwrap_err().contains("at least one listen address"));
    }

    #[test]
    fn test_no_backends() {
        let mut config = minimal_config();
        config.backends.clear();
        let result = validate_config(&config);
        assert!(result.unwrap_err().contains("at least one backend"));
    }

    #[test]
    fn test_duplicate_listen_address() {
        let mut config = minimal_config();
        config.addresses.push("127.0.0.1:8080".to_string());
        let result = validate_config(&config);
        assert!(result.unwrap_err().contains("duplicate listen address"));
    }

    #[test]
    fn test_invalid_backend_url() {
        let mut config = minimal_config();
        config.backends.push("localhost:9002".to_string());
        let result = validate_config(&config);
        assert!(result.unwrap_err().contains("localhost:9002"));
    }

    #[test]
    fn test_weight_count_mismatch() {
        let mut config = minimal_config();
        config.load_balancing_algorithm = Algorithm::WeightedRoundRobin;
        config.weights = vec![1];
        let result = validate_config(&config);
        assert!(result.unwrap_err().contains("one weight per backend"));
    }

    #[test]
    fn test_zero_weight() {
        let mut config = minimal_config();
        config.load_balancing_algorithm = Algorithm::WeightedRoundRobin;
        config.weights = vec![2, 0];
        let result = validate_config(&config);
        assert!(result.unwrap_err().contains("weight 0"));
    }

    #[test]
    fn test_weights_ignored_without_weighted_strategy() {
        let mut config = minimal_config();
        config.weights = vec![0];
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = minimal_config();
        config.log_level = "verbose".to_string();
        let result = validate_config(&config);
        assert!(result.unwrap_err().contains("invalid log level"));
    }

    #[test]
    fn test_errors_are_collected() {
        let config = Config {
            log_level: "loud".to_string(),
            ..Config::default()
        };
        let message = validate_config(&config).unwrap_err();
        assert!(message.contains("listen address"));
        assert!(message.contains("backend"));
        assert!(message.contains("log level"));
    }
}
