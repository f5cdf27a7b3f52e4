use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::core::client::resolver::DEFAULT_BUNDLE_TTL;
use crate::core::kubeconfig::config_store::DEFAULT_CONFIG_TTL;
use crate::core::state::runtime::live::live_state_store::DEFAULT_START_TIMEOUT;
use crate::domain::dashboard::service::dashboard_feed_service::DEFAULT_POLL_INTERVAL;

/// Runtime settings, read from the environment (and `.env`, when present).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub context: Option<String>,
    pub config_ttl: Duration,
    pub bundle_ttl: Duration,
    pub start_timeout: Duration,
    pub poll_interval: Duration,
    pub log_filter: String,
    pub log_dir: Option<PathBuf>,
    pub state_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            context: None,
            config_ttl: DEFAULT_CONFIG_TTL,
            bundle_ttl: DEFAULT_BUNDLE_TTL,
            start_timeout: DEFAULT_START_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            log_filter: "info".to_string(),
            log_dir: None,
            state_dir: None,
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from any key lookup. Unset or blank keys keep their
    /// defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let millis = |key: &str, default: Duration| -> Result<Duration> {
            match get(key) {
                Some(raw) => raw
                    .parse::<u64>()
                    .map(Duration::from_millis)
                    .with_context(|| {
                        format!("{key} must be a number of milliseconds, got '{raw}'")
                    }),
                None => Ok(default),
            }
        };

        let defaults = Self::default();
        Ok(Self {
            context: get("KUBEDECK_CONTEXT"),
            config_ttl: millis("KUBEDECK_CONFIG_TTL_MS", defaults.config_ttl)?,
            bundle_ttl: millis("KUBEDECK_BUNDLE_TTL_MS", defaults.bundle_ttl)?,
            start_timeout: millis("KUBEDECK_START_TIMEOUT_MS", defaults.start_timeout)?,
            poll_interval: millis("KUBEDECK_POLL_INTERVAL_MS", defaults.poll_interval)?,
            log_filter: get("KUBEDECK_LOG").unwrap_or(defaults.log_filter),
            log_dir: get("KUBEDECK_LOG_DIR").map(PathBuf::from),
            state_dir: get("KUBEDECK_STATE_DIR").map(PathBuf::from),
        })
    }
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
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_gives_defaults() {
        assert_eq!(Settings::from_lookup(lookup(&[])).unwrap(), Settings::default());
    }

    #[test]
    fn overrides_are_applied() {
        let settings = Settings::from_lookup(lookup(&[
            ("KUBEDECK_CONTEXT", " dev "),
            ("KUBEDECK_BUNDLE_TTL_MS", "500"),
            ("KUBEDECK_START_TIMEOUT_MS", "1500"),
            ("KUBEDECK_LOG", "kubedeck_core=debug"),
            ("KUBEDECK_LOG_DIR", "/var/log/kubedeck"),
            ("KUBEDECK_STATE_DIR", ""),
        ]))
        .unwrap();

        assert_eq!(settings.context.as_deref(), Some("dev"));
        assert_eq!(settings.bundle_ttl, Duration::from_millis(500));
        assert_eq!(settings.start_timeout, Duration::from_millis(1500));
        assert_eq!(settings.config_ttl, DEFAULT_CONFIG_TTL);
        assert_eq!(settings.log_filter, "kubedeck_core=debug");
        assert_eq!(settings.log_dir, Some(PathBuf::from("/var/log/kubedeck")));
        assert_eq!(settings.state_dir, None);
    }

    #[test]
    fn malformed_durations_are_rejected() {
        let err =
            Settings::from_lookup(lookup(&[("KUBEDECK_POLL_INTERVAL_MS", "soon")])).unwrap_err();
        assert!(err.to_string().contains("KUBEDECK_POLL_INTERVAL_MS"));
    }
}
