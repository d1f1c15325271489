//! Configuration loading and parsing for Updraft.
//!
//! Configuration lives at `~/.updraft/config.toml` (override with
//! `UPDRAFT_CONFIG`). A missing file is not an error: every section has
//! defaults, and the gateway section is only required by hosts that drive an
//! external updater engine through commands.
//!
//! ```toml
//! [updater]
//! mode = "production"
//! check_interval_secs = 86400
//! consent_timeout_secs = 900
//!
//! [notification]
//! title = "Updraft Updater"
//! product_name = "Updraft"
//!
//! [gateway]
//! check_command = "updater check --json"
//! download_command = "updater download"
//! install_command = "updater install"
//! ```

use serde::Deserialize;
use std::{
    env,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;
use updraft_types::ExecutionMode;

/// Environment variable that overrides `updater.mode`.
pub const MODE_ENV_VAR: &str = "UPDRAFT_ENV";
/// Environment variable that overrides the config file location.
pub const CONFIG_PATH_ENV_VAR: &str = "UPDRAFT_CONFIG";

pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 60 * 60 * 24;
pub const DEFAULT_CHANNEL_PREFIX: &str = "notification:";
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 600;

fn default_check_interval_secs() -> u64 {
    DEFAULT_CHECK_INTERVAL_SECS
}

fn default_channel_prefix() -> String {
    DEFAULT_CHANNEL_PREFIX.to_string()
}

fn default_title() -> String {
    "Updraft Updater".to_string()
}

fn default_product_name() -> String {
    "Updraft".to_string()
}

fn default_command_timeout_secs() -> u64 {
    DEFAULT_COMMAND_TIMEOUT_SECS
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => Some(path),
            ConfigError::Invalid { .. } => None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdraftConfig {
    #[serde(default)]
    pub updater: UpdaterConfig,
    #[serde(default)]
    pub notification: NotificationConfig,
    /// Commands for an external updater engine.
    pub gateway: Option<GatewayConfig>,
}

/// Scheduler settings.
#[derive(Debug, Deserialize)]
pub struct UpdaterConfig {
    /// Execution mode. Background checks only run in production.
    #[serde(default)]
    pub mode: ExecutionMode,
    /// Seconds between update checks. Default: 24 hours.
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,
    /// Give up on an unanswered consent prompt after this many seconds.
    /// Absent means wait indefinitely.
    pub consent_timeout_secs: Option<u64>,
    /// Namespace prefix for notification backchannel ids.
    #[serde(default = "default_channel_prefix")]
    pub channel_prefix: String,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::default(),
            check_interval_secs: DEFAULT_CHECK_INTERVAL_SECS,
            consent_timeout_secs: None,
            channel_prefix: default_channel_prefix(),
        }
    }
}

impl UpdaterConfig {
    #[must_use]
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    #[must_use]
    pub fn consent_timeout(&self) -> Option<Duration> {
        self.consent_timeout_secs.map(Duration::from_secs)
    }
}

/// Text of the update prompt.
#[derive(Debug, Deserialize)]
pub struct NotificationConfig {
    #[serde(default = "default_title")]
    pub title: String,
    /// Product name used in the prompt body.
    #[serde(default = "default_product_name")]
    pub product_name: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            product_name: default_product_name(),
        }
    }
}

/// Shell commands that drive an external updater engine.
///
/// `${VAR}` references are expanded from the environment at use time.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Prints release JSON (`{"version": "..."}`) when an update exists,
    /// nothing or `null` otherwise.
    pub check_command: String,
    /// Downloads the pending release. Receives `UPDRAFT_VERSION`.
    pub download_command: String,
    /// Installs the downloaded release. Receives `UPDRAFT_VERSION`.
    pub install_command: String,
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,
}

impl GatewayConfig {
    #[must_use]
    pub fn check_command(&self) -> String {
        expand_env_vars(&self.check_command)
    }

    #[must_use]
    pub fn download_command(&self) -> String {
        expand_env_vars(&self.download_command)
    }

    #[must_use]
    pub fn install_command(&self) -> String {
        expand_env_vars(&self.install_command)
    }

    #[must_use]
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            break;
        };
        out.push_str(&rest[..start]);
        let var = &after[..end];
        if !var.is_empty() {
            out.push_str(&env::var(var).unwrap_or_default());
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

impl UpdraftConfig {
    /// Load the config file, if one exists.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        let path = match config_path() {
            Some(path) => path,
            None => return Ok(None),
        };
        if !path.exists() {
            return Ok(None);
        }
        Self::load_from(&path).map(Some)
    }

    /// Load, falling back to defaults when no file exists, then apply
    /// environment overrides.
    pub fn load_or_default() -> Result<Self, ConfigError> {
        let config = Self::load()?.unwrap_or_default();
        Ok(config.with_mode_override(env::var(MODE_ENV_VAR).ok().as_deref()))
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        let config: Self = match toml::from_str(&content) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                return Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.updater.check_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "updater.check_interval_secs",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.updater.consent_timeout_secs == Some(0) {
            return Err(ConfigError::Invalid {
                field: "updater.consent_timeout_secs",
                reason: "must be greater than zero (omit it to wait indefinitely)".to_string(),
            });
        }
        if self.updater.channel_prefix.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "updater.channel_prefix",
                reason: "must not be empty".to_string(),
            });
        }
        if let Some(gateway) = &self.gateway {
            for (field, command) in [
                ("gateway.check_command", &gateway.check_command),
                ("gateway.download_command", &gateway.download_command),
                ("gateway.install_command", &gateway.install_command),
            ] {
                if command.trim().is_empty() {
                    return Err(ConfigError::Invalid {
                        field,
                        reason: "command must not be empty".to_string(),
                    });
                }
            }
            if gateway.command_timeout_secs == 0 {
                return Err(ConfigError::Invalid {
                    field: "gateway.command_timeout_secs",
                    reason: "must be greater than zero".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Apply a raw `UPDRAFT_ENV` value. Unknown values are logged and ignored.
    #[must_use]
    pub fn with_mode_override(mut self, raw: Option<&str>) -> Self {
        let Some(raw) = raw.filter(|r| !r.trim().is_empty()) else {
            return self;
        };
        match ExecutionMode::parse(raw) {
            Some(mode) => {
                tracing::debug!(mode = %mode, "Execution mode set from {MODE_ENV_VAR}");
                self.updater.mode = mode;
            }
            None => {
                tracing::warn!("Unknown {MODE_ENV_VAR} value '{raw}', keeping {}", self.updater.mode);
            }
        }
        self
    }

    #[must_use]
    pub fn path() -> Option<PathBuf> {
        config_path()
    }
}

pub fn config_path() -> Option<PathBuf> {
    if let Ok(path) = env::var(CONFIG_PATH_ENV_VAR)
        && !path.trim().is_empty()
    {
        return Some(PathBuf::from(path));
    }
    dirs::home_dir().map(|home| home.join(".updraft").join("config.toml"))
}
