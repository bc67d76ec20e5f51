//! Engine configuration
//!
//! Layered the usual way: compiled defaults, then an optional TOML file,
//! then `CODETRACK_*` environment variables, then whatever the host binary
//! sets from its command line. [`EngineConfig::validate`] runs last.
//!
//! ```toml
//! fetch_timeout_ms = 30000
//!
//! [polling]
//! users_ms = 10000
//! platform_stats_ms = 300000
//!
//! [storage]
//! path = "codetrack.json"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::Domain;
use crate::errors::{SyncError, SyncResult};

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "CODETRACK_";

/// Refresh cadence per domain, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingIntervals {
    /// Users (drives the live teacher list)
    pub users_ms: u64,
    /// Platform statistics
    pub platform_stats_ms: u64,
    /// Teacher assignments
    pub teacher_records_ms: u64,
    /// Notifications
    pub notifications_ms: u64,
    /// Announcements
    pub announcements_ms: u64,
}

impl Default for PollingIntervals {
    fn default() -> Self {
        Self {
            users_ms: 10_000,
            platform_stats_ms: 300_000,
            teacher_records_ms: 300_000,
            notifications_ms: 30_000,
            announcements_ms: 300_000,
        }
    }
}

impl PollingIntervals {
    /// Interval for `domain` in milliseconds.
    pub fn get(&self, domain: Domain) -> u64 {
        match domain {
            Domain::Users => self.users_ms,
            Domain::PlatformStats => self.platform_stats_ms,
            Domain::TeacherRecords => self.teacher_records_ms,
            Domain::Notifications => self.notifications_ms,
            Domain::Announcements => self.announcements_ms,
        }
    }

    /// Set the interval for `domain` in milliseconds.
    pub fn set(&mut self, domain: Domain, interval_ms: u64) {
        match domain {
            Domain::Users => self.users_ms = interval_ms,
            Domain::PlatformStats => self.platform_stats_ms = interval_ms,
            Domain::TeacherRecords => self.teacher_records_ms = interval_ms,
            Domain::Notifications => self.notifications_ms = interval_ms,
            Domain::Announcements => self.announcements_ms = interval_ms,
        }
    }
}

/// Local storage backing the in-process remote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// JSON file to load from and save to; in-memory only when unset
    pub path: Option<PathBuf>,
    /// Seed demo data when no file exists
    pub seed_demo_data: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: None,
            seed_demo_data: true,
        }
    }
}

/// Configuration of the synchronization engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Per-domain refresh cadence
    pub polling: PollingIntervals,
    /// Upper bound on a single fetch, in milliseconds
    pub fetch_timeout_ms: u64,
    /// Local storage settings
    pub storage: StorageConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            polling: PollingIntervals::default(),
            fetch_timeout_ms: 30_000,
            storage: StorageConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parse a TOML document; missing keys keep their defaults.
    pub fn from_toml_str(content: &str) -> SyncResult<Self> {
        toml::from_str(content).map_err(|e| SyncError::config(format!("Invalid TOML: {e}")))
    }

    /// Load configuration from a TOML file.
    pub fn load_from_file(path: &Path) -> SyncResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SyncError::config(format!(
                "Failed to read config file {}: {e}",
                path.display()
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// Merge `CODETRACK_*` variables from the process environment.
    pub fn merge_with_env(&mut self) -> SyncResult<()> {
        self.merge_with_vars(std::env::vars())
    }

    /// Merge `CODETRACK_*` variables from an explicit list.
    ///
    /// Recognised keys: `FETCH_TIMEOUT_MS`, `STORAGE_PATH`, `SEED_DEMO_DATA`
    /// and `POLL_<DOMAIN>_MS` (for example `POLL_USERS_MS`). Unknown keys
    /// with the prefix are ignored.
    pub fn merge_with_vars<I, K, V>(&mut self, vars: I) -> SyncResult<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in vars {
            let Some(key) = key.as_ref().strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let value = value.as_ref();
            match key {
                "FETCH_TIMEOUT_MS" => self.fetch_timeout_ms = parse_ms(key, value)?,
                "STORAGE_PATH" => self.storage.path = Some(PathBuf::from(value)),
                "SEED_DEMO_DATA" => {
                    self.storage.seed_demo_data = value
                        .parse()
                        .map_err(|_| SyncError::config(format!("{key}: expected true/false")))?;
                }
                other => {
                    let domain = other
                        .strip_prefix("POLL_")
                        .and_then(|rest| rest.strip_suffix("_MS"))
                        .and_then(|name| {
                            Domain::ALL
                                .into_iter()
                                .find(|d| d.as_str().eq_ignore_ascii_case(name))
                        });
                    match domain {
                        Some(domain) => self.polling.set(domain, parse_ms(key, value)?),
                        None => tracing::debug!(key = %other, "Ignoring unknown config variable"),
                    }
                }
            }
        }
        Ok(())
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> SyncResult<()> {
        for domain in Domain::ALL {
            if self.polling.get(domain) == 0 {
                return Err(SyncError::config(format!(
                    "polling interval for {domain} must be at least 1ms"
                )));
            }
        }
        if self.fetch_timeout_ms == 0 {
            return Err(SyncError::config("fetch_timeout_ms must be at least 1ms"));
        }
        Ok(())
    }

    /// Refresh cadence for `domain`.
    pub fn interval(&self, domain: Domain) -> Duration {
        Duration::from_millis(self.polling.get(domain))
    }

    /// Upper bound on a single fetch.
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

fn parse_ms(key: &str, value: &str) -> SyncResult<u64> {
    value
        .trim()
        .parse()
        .map_err(|_| SyncError::config(format!("{key}: expected milliseconds, got {value:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.interval(Domain::Users), Duration::from_secs(10));
        assert_eq!(config.fetch_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            fetch_timeout_ms = 500

            [polling]
            users_ms = 2000
            "#,
        )
        .unwrap();
        assert_eq!(config.fetch_timeout_ms, 500);
        assert_eq!(config.polling.users_ms, 2000);
        assert_eq!(
            config.polling.notifications_ms,
            PollingIntervals::default().notifications_ms
        );
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[storage]\npath = \"data.json\"").unwrap();

        let config = EngineConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.storage.path, Some(PathBuf::from("data.json")));
        assert!(config.storage.seed_demo_data);
    }

    #[test]
    fn env_overrides() {
        let mut config = EngineConfig::default();
        config
            .merge_with_vars([
                ("CODETRACK_POLL_PLATFORM_STATS_MS", "1500"),
                ("CODETRACK_FETCH_TIMEOUT_MS", "250"),
                ("CODETRACK_SEED_DEMO_DATA", "false"),
                ("UNRELATED", "x"),
            ])
            .unwrap();
        assert_eq!(config.polling.platform_stats_ms, 1500);
        assert_eq!(config.fetch_timeout_ms, 250);
        assert!(!config.storage.seed_demo_data);
    }

    #[test]
    fn env_rejects_garbage() {
        let mut config = EngineConfig::default();
        let result = config.merge_with_vars([("CODETRACK_POLL_USERS_MS", "soon")]);
        assert!(matches!(result, Err(SyncError::Config { .. })));
    }

    #[test]
    fn zero_interval_is_invalid() {
        let mut config = EngineConfig::default();
        config.polling.set(Domain::Announcements, 0);
        assert!(config.validate().is_err());
    }
}
