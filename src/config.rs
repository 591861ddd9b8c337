use std::time::Duration;
use thiserror::Error;

use crate::prediction::ModelCallPolicy;
use crate::retry::RetryPolicy;
use crate::session::{CleanupConfig, SessionConfig};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{var} has invalid value {value:?}")]
    Invalid { var: &'static str, value: String },
}

/// Runtime settings for the engine and its HTTP surface
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub bind_addr: String,
    /// Postgres store when set, in-memory store otherwise
    pub database_url: Option<String>,
    /// HTTP model when set, offline model otherwise
    pub model_endpoint: Option<String>,
    /// Longest wait for an aggregate's writer lock
    pub lock_timeout: Duration,
    pub model_policy: ModelCallPolicy,
    pub storage_retry: RetryPolicy,
    pub default_session: SessionConfig,
    pub session_cleanup: CleanupConfig,
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
            database_url: None,
            model_endpoint: None,
            lock_timeout: Duration::from_secs(5),
            model_policy: ModelCallPolicy::default(),
            storage_retry: RetryPolicy::storage_default(),
            default_session: SessionConfig::default(),
            session_cleanup: CleanupConfig::default(),
            event_capacity: 100,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Applies overrides from `lookup`; blank values are ignored
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).filter(|value| !value.trim().is_empty());
        let mut config = Self::default();

        if let Some(bind_addr) = get("NEUROBEACON_BIND_ADDR") {
            config.bind_addr = bind_addr;
        }
        config.database_url = get("DATABASE_URL");
        config.model_endpoint = get("NEUROBEACON_MODEL_URL");

        if let Some(raw) = get("NEUROBEACON_LOCK_TIMEOUT_MS") {
            config.lock_timeout = parse_millis("NEUROBEACON_LOCK_TIMEOUT_MS", &raw)?;
        }
        if let Some(raw) = get("NEUROBEACON_MODEL_DEADLINE_MS") {
            config.model_policy.deadline = parse_millis("NEUROBEACON_MODEL_DEADLINE_MS", &raw)?;
        }
        if let Some(raw) = get("NEUROBEACON_SESSION_RETENTION_MS") {
            config.session_cleanup.retention =
                parse_millis("NEUROBEACON_SESSION_RETENTION_MS", &raw)?;
        }

        Ok(config)
    }
}

fn parse_millis(var: &'static str, raw: &str) -> Result<Duration, ConfigError> {
    raw.trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|_| ConfigError::Invalid {
            var,
            value: raw.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn defaults_without_overrides() {
        let config = EngineConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.lock_timeout, Duration::from_secs(5));
        assert_eq!(config.model_policy.deadline, Duration::from_secs(3));
        assert_eq!(config.default_session.max_rounds, Some(10));
    }

    #[test]
    fn environment_overrides() {
        let config = EngineConfig::from_lookup(lookup(&[
            ("NEUROBEACON_BIND_ADDR", "127.0.0.1:8080"),
            ("DATABASE_URL", "postgres://localhost/neurobeacon"),
            ("NEUROBEACON_MODEL_URL", "http://model:9000"),
            ("NEUROBEACON_LOCK_TIMEOUT_MS", "250"),
            ("NEUROBEACON_MODEL_DEADLINE_MS", "1500"),
            ("NEUROBEACON_SESSION_RETENTION_MS", "60000"),
        ]))
        .unwrap();

        assert_eq!(config.bind_addr, "127.0.0.1:8080");
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/neurobeacon")
        );
        assert_eq!(config.model_endpoint.as_deref(), Some("http://model:9000"));
        assert_eq!(config.lock_timeout, Duration::from_millis(250));
        assert_eq!(config.model_policy.deadline, Duration::from_millis(1500));
        assert_eq!(config.session_cleanup.retention, Duration::from_secs(60));
    }

    #[test]
    fn blank_values_are_ignored_and_bad_numbers_rejected() {
        let config = EngineConfig::from_lookup(lookup(&[("DATABASE_URL", "  ")])).unwrap();
        assert!(config.database_url.is_none());

        let err = EngineConfig::from_lookup(lookup(&[("NEUROBEACON_LOCK_TIMEOUT_MS", "soon")]))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                var: "NEUROBEACON_LOCK_TIMEOUT_MS",
                value: "soon".to_string()
            }
        );
    }
}
