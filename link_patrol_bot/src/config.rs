use std::{str::FromStr, time::Duration};

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} is not a valid value: {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Where the health checker takes candidate links from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckSource {
    /// Links registered as they were posted.
    Registry,
    /// A rescan of the recent message window, on top of the registry.
    History,
}

impl FromStr for CheckSource {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "registry" => Ok(CheckSource::Registry),
            "history" => Ok(CheckSource::History),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub allowed_domains: Vec<String>,
    pub allowlist_file: String,
    pub warning_threshold: u32,
    pub check_interval: Duration,
    pub retention: Duration,
    pub probe_timeout: Duration,
    pub check_source: CheckSource,
    pub window_capacity: usize,
    /// SQLite file to keep state in across restarts, if any.
    pub snapshot_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            allowed_domains: vec!["blndev.com".to_string()],
            allowlist_file: "allowed_domains.txt".to_string(),
            warning_threshold: 5,
            check_interval: Duration::from_secs(30 * 60),
            retention: Duration::from_secs(7 * 24 * 60 * 60),
            probe_timeout: Duration::from_secs(10),
            check_source: CheckSource::Registry,
            window_capacity: 1000,
            snapshot_path: None,
        }
    }
}

impl Config {
    /// Read the configuration from environment variables, loading a `.env`
    /// file first if there is one.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                log::warn!("Failed to load .env file: {e}");
            }
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration out of whatever `lookup` returns for each
    /// variable name. Unset and empty variables take the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|x| !x.trim().is_empty());
        let mut config = Config::default();

        if let Some(list) = get("LINK_PATROL_ALLOWED_DOMAINS") {
            config.allowed_domains = list
                .split(',')
                .map(str::trim)
                .filter(|x| !x.is_empty())
                .map(ToString::to_string)
                .collect();
        }
        if let Some(file) = get("LINK_PATROL_ALLOWLIST_FILE") {
            config.allowlist_file = file;
        }
        if let Some(value) = get("LINK_PATROL_WARNING_THRESHOLD") {
            config.warning_threshold = parse("LINK_PATROL_WARNING_THRESHOLD", &value)?;
            if config.warning_threshold == 0 {
                return Err(ConfigError::Invalid {
                    name: "LINK_PATROL_WARNING_THRESHOLD",
                    value,
                });
            }
        }
        if let Some(value) = get("LINK_PATROL_CHECK_INTERVAL_SECS") {
            let secs: u64 = parse("LINK_PATROL_CHECK_INTERVAL_SECS", &value)?;
            if secs == 0 {
                return Err(ConfigError::Invalid {
                    name: "LINK_PATROL_CHECK_INTERVAL_SECS",
                    value,
                });
            }
            config.check_interval = Duration::from_secs(secs);
        }
        if let Some(value) = get("LINK_PATROL_RETENTION_HOURS") {
            let hours: u64 = parse("LINK_PATROL_RETENTION_HOURS", &value)?;
            config.retention = Duration::from_secs(hours.saturating_mul(60 * 60));
        }
        if let Some(value) = get("LINK_PATROL_PROBE_TIMEOUT_SECS") {
            let secs: u64 = parse("LINK_PATROL_PROBE_TIMEOUT_SECS", &value)?;
            config.probe_timeout = Duration::from_secs(secs.max(1));
        }
        if let Some(value) = get("LINK_PATROL_CHECK_SOURCE") {
            config.check_source = parse("LINK_PATROL_CHECK_SOURCE", &value)?;
        }
        if let Some(value) = get("LINK_PATROL_WINDOW_CAPACITY") {
            config.window_capacity = parse("LINK_PATROL_WINDOW_CAPACITY", &value)?;
        }
        config.snapshot_path = get("LINK_PATROL_SNAPSHOT");

        Ok(config)
    }
}

fn parse<T: FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        name,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::collections::HashMap;

    use super::*;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.allowed_domains, vec!["blndev.com"]);
        assert_eq!(config.warning_threshold, 5);
        assert_eq!(config.probe_timeout, Duration::from_secs(10));
    }

    #[test]
    fn reads_everything() {
        let config = config_from(&[
            ("LINK_PATROL_ALLOWED_DOMAINS", "blndev.com, example.org ,"),
            ("LINK_PATROL_WARNING_THRESHOLD", "3"),
            ("LINK_PATROL_CHECK_INTERVAL_SECS", "60"),
            ("LINK_PATROL_RETENTION_HOURS", "72"),
            ("LINK_PATROL_CHECK_SOURCE", "History"),
            ("LINK_PATROL_SNAPSHOT", "state.sqlite"),
        ])
        .unwrap();

        assert_eq!(config.allowed_domains, vec!["blndev.com", "example.org"]);
        assert_eq!(config.warning_threshold, 3);
        assert_eq!(config.check_interval, Duration::from_secs(60));
        assert_eq!(config.retention, Duration::from_secs(72 * 3600));
        assert_eq!(config.check_source, CheckSource::History);
        assert_eq!(config.snapshot_path.as_deref(), Some("state.sqlite"));
    }

    #[test]
    fn rejects_garbage() {
        assert!(config_from(&[("LINK_PATROL_WARNING_THRESHOLD", "many")]).is_err());
        assert!(config_from(&[("LINK_PATROL_WARNING_THRESHOLD", "0")]).is_err());
        assert!(config_from(&[("LINK_PATROL_CHECK_INTERVAL_SECS", "0")]).is_err());
        assert_eq!(
            config_from(&[("LINK_PATROL_CHECK_SOURCE", "crystal ball")]),
            Err(ConfigError::Invalid {
                name: "LINK_PATROL_CHECK_SOURCE",
                value: "crystal ball".to_string()
            })
        );
    }
}
