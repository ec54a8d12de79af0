//! Daemon and client configuration.
//!
//! Settings come from an optional TOML file, then environment overrides:
//!
//! ```toml
//! socket_path = "/tmp/showtext.sock"
//! lock_path = "/tmp/showtext.lock"
//! poll_interval_ms = 100
//! idle_window_ms = 3000
//! max_hold_secs = 30     # at most 30
//! read_buffer_size = 1024
//! renderer = "terminal"   # or "headless"
//! ```
//!
//! `SHOWTEXT_CONFIG` points at an alternative file; `SHOWTEXT_SOCKET` and
//! `SHOWTEXT_LOCK` override the two IPC paths.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use showtext_core::MAX_HOLD;
use showtext_protocol::DEFAULT_READ_BUFFER_SIZE;

use crate::channel::DEFAULT_SOCKET_PATH;
use crate::guard::DEFAULT_LOCK_PATH;
use crate::scheduler::SchedulePolicy;

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "SHOWTEXT_CONFIG";

/// Environment variable overriding the socket path.
pub const SOCKET_ENV: &str = "SHOWTEXT_SOCKET";

/// Environment variable overriding the lock file path.
pub const LOCK_ENV: &str = "SHOWTEXT_LOCK";

/// Which renderer the daemon drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RendererKind {
    /// Full-screen drawing on the attached terminal
    #[default]
    Terminal,
    /// Log frames only
    Headless,
}

/// Resolved configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub socket_path: PathBuf,
    pub lock_path: PathBuf,
    pub log_path: PathBuf,
    pub poll_interval_ms: u64,
    pub idle_window_ms: u64,
    pub max_hold_secs: u64,
    pub read_buffer_size: usize,
    pub renderer: RendererKind,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
            lock_path: PathBuf::from(DEFAULT_LOCK_PATH),
            log_path: default_log_path(),
            poll_interval_ms: 100,
            idle_window_ms: 3000,
            max_hold_secs: 30,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            renderer: RendererKind::default(),
        }
    }
}

impl Config {
    /// Loads the config file (if present) and applies environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .or_else(default_config_path);

        let config = match path {
            Some(path) if path.exists() => Self::from_file(&path)?,
            _ => Self::default(),
        };

        let config = config.with_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a TOML config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        debug!(path = %path.display(), "Loaded config file");
        Self::from_toml(&contents).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    /// Parses TOML config text.
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::Parse {
            path: PathBuf::new(),
            source: e,
        })
    }

    /// Applies overrides looked up through `lookup`.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(socket) = lookup(SOCKET_ENV).filter(|s| !s.is_empty()) {
            self.socket_path = PathBuf::from(socket);
        }
        if let Some(lock) = lookup(LOCK_ENV).filter(|s| !s.is_empty()) {
            self.lock_path = PathBuf::from(lock);
        }
        self
    }

    /// Rejects values the daemon cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field: &'static str, reason: &str| ConfigError::Invalid {
            field,
            reason: reason.to_string(),
        };

        if self.poll_interval_ms == 0 {
            return Err(invalid("poll_interval_ms", "must be greater than zero"));
        }
        if self.idle_window_ms == 0 {
            return Err(invalid("idle_window_ms", "must be greater than zero"));
        }
        if self.max_hold_secs == 0 {
            return Err(invalid("max_hold_secs", "must be greater than zero"));
        }
        if self.max_hold_secs > MAX_HOLD.as_secs() {
            return Err(invalid(
                "max_hold_secs",
                &format!("must not exceed {}", MAX_HOLD.as_secs()),
            ));
        }
        if self.read_buffer_size == 0 {
            return Err(invalid("read_buffer_size", "must be greater than zero"));
        }
        if self.socket_path.as_os_str().is_empty() {
            return Err(invalid("socket_path", "must not be empty"));
        }
        if self.lock_path.as_os_str().is_empty() {
            return Err(invalid("lock_path", "must not be empty"));
        }
        Ok(())
    }

    /// Returns the loop tick.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Returns the scheduler timing rules.
    pub fn policy(&self) -> SchedulePolicy {
        SchedulePolicy {
            idle_window: Duration::from_millis(self.idle_window_ms),
            max_hold: Duration::from_secs(self.max_hold_secs),
        }
    }
}

/// Returns `<config_dir>/showtext/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("showtext").join("config.toml"))
}

/// Returns `<state_dir>/showtext/showtext.log`, falling back to `/tmp`.
pub fn default_log_path() -> PathBuf {
    dirs::state_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("showtext")
        .join("showtext.log")
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.socket_path, PathBuf::from("/tmp/showtext.sock"));
        assert_eq!(config.poll_interval(), Duration::from_millis(100));
        assert_eq!(config.policy(), SchedulePolicy::default());
        assert!(config.log_path.ends_with("showtext.log"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            idle_window_ms = 1500
            renderer = "headless"
            "#,
        )
        .unwrap();
        assert_eq!(config.idle_window_ms, 1500);
        assert_eq!(config.renderer, RendererKind::Headless);
        assert_eq!(config.max_hold_secs, 30);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = Config::from_toml("font_size = 48").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_env_overrides() {
        let config = Config::default().with_overrides(|key| match key {
            SOCKET_ENV => Some("/run/showtext.sock".to_string()),
            LOCK_ENV => Some(String::new()),
            _ => None,
        });
        assert_eq!(config.socket_path, PathBuf::from("/run/showtext.sock"));
        assert_eq!(config.lock_path, PathBuf::from(DEFAULT_LOCK_PATH));
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let config = Config {
            poll_interval_ms: 0,
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                field: "poll_interval_ms",
                ..
            })
        ));

        let config = Config {
            read_buffer_size: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_hold_above_protocol_cap() {
        let config = Config {
            max_hold_secs: 60,
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                field: "max_hold_secs",
                ..
            })
        ));

        let config = Config {
            max_hold_secs: MAX_HOLD.as_secs(),
            ..Config::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "max_hold_secs = 10\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.policy().max_hold, Duration::from_secs(10));

        let missing = Config::from_file(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(missing, ConfigError::Read { .. }));
    }
}
