//! Monitor configuration: JSON file on disk, validated once at startup.
//!
//! A missing file is replaced with defaults and reported as
//! [`LoadOutcome::Created`]; the caller must stop so the operator can review
//! it. The engine never runs against a just-written default.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default config file name, resolved against the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "netmon.json";

/// Environment variable that overrides the config file location.
pub const CONFIG_PATH_ENV: &str = "NETMON_CONFIG";

/// Substitution slot in [`NotifyConfig::payload_template`].
pub const MESSAGE_SLOT: &str = "{message}";

/// Webhook endpoint and payload shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NotifyConfig {
    /// Endpoint URL. Empty disables notifications.
    pub url: String,
    /// JSON body with exactly one `{message}` slot.
    pub payload_template: String,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            payload_template: r#"{"content":"{message}"}"#.to_string(),
        }
    }
}

impl NotifyConfig {
    /// Whether both the endpoint and the template are set.
    pub fn is_configured(&self) -> bool {
        !self.url.is_empty() && !self.payload_template.is_empty()
    }
}

/// Everything the monitor needs for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MonitorConfig {
    /// Managed router address (host or IP, no port).
    pub device_address: String,
    pub ssh_port: u16,
    pub ssh_user: String,
    pub ssh_password: String,
    /// Bound on SSH connect and on each remote command.
    pub ssh_timeout_secs: u64,

    /// Probe rotation. `targets[0]` is the steady-state target.
    pub targets: Vec<String>,
    /// Steady-state poll interval, also the passive-wait cadence.
    pub poll_interval_secs: u64,
    /// Pause between failed probes inside a burst.
    pub burst_interval_secs: u64,
    /// Probes per burst before the burst is declared failed.
    pub burst_attempts: u32,

    pub restart_command: String,
    pub restart_attempts: u32,
    /// Wait after each restart command before re-bursting.
    pub restart_wait_secs: u64,

    pub reboot_command: String,
    pub reboot_attempts: u32,
    /// Wait after each reboot command before re-bursting.
    pub reboot_wait_secs: u64,

    pub notify: NotifyConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            device_address: "192.168.1.1".to_string(),
            ssh_port: 22,
            ssh_user: "admin".to_string(),
            ssh_password: "admin".to_string(),
            ssh_timeout_secs: 30,
            targets: vec![
                "1.1.1.1".to_string(),
                "8.8.8.8".to_string(),
                "8.8.4.4".to_string(),
            ],
            poll_interval_secs: 300,
            burst_interval_secs: 10,
            burst_attempts: 10,
            restart_command: "service restart_wan".to_string(),
            restart_attempts: 3,
            restart_wait_secs: 40,
            reboot_command: "reboot".to_string(),
            reboot_attempts: 1,
            reboot_wait_secs: 120,
            notify: NotifyConfig::default(),
        }
    }
}

/// Result of [`MonitorConfig::load_or_create_default`].
#[derive(Debug)]
pub enum LoadOutcome {
    /// An existing file was loaded and validated.
    Loaded(MonitorConfig),
    /// No file existed; defaults were written here and must be reviewed.
    Created(PathBuf),
}

impl MonitorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn burst_interval(&self) -> Duration {
        Duration::from_secs(self.burst_interval_secs)
    }

    pub fn restart_wait(&self) -> Duration {
        Duration::from_secs(self.restart_wait_secs)
    }

    pub fn reboot_wait(&self) -> Duration {
        Duration::from_secs(self.reboot_wait_secs)
    }

    pub fn ssh_timeout(&self) -> Duration {
        Duration::from_secs(self.ssh_timeout_secs)
    }

    /// `host:port` for the remote-command channel.
    pub fn ssh_endpoint(&self) -> String {
        format!("{}:{}", self.device_address, self.ssh_port)
    }

    /// Target at `index` in the rotation (wraps modulo the list length).
    ///
    /// Callers must have validated the config; an empty rotation panics.
    pub fn target(&self, index: usize) -> &str {
        &self.targets[index % self.targets.len()]
    }

    /// Check invariants the engine relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.targets.is_empty() {
            return Err(ConfigError::Invalid(
                "targets must contain at least one address".into(),
            ));
        }
        if let Some(pos) = self.targets.iter().position(|t| t.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!("targets[{pos}] is blank")));
        }
        if self.device_address.trim().is_empty() {
            return Err(ConfigError::Invalid("device_address is empty".into()));
        }

        let template = &self.notify.payload_template;
        if !template.is_empty() {
            let slots = template.matches(MESSAGE_SLOT).count();
            if slots != 1 {
                return Err(ConfigError::Invalid(format!(
                    "notify.payload_template must contain exactly one {MESSAGE_SLOT} slot, found {slots}"
                )));
            }
        }
        Ok(())
    }

    /// Read and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let bytes = std::fs::read(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_slice(&bytes).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the config as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load `path`, or write defaults there if it does not exist yet.
    pub fn load_or_create_default(path: &Path) -> Result<LoadOutcome, ConfigError> {
        if path.exists() {
            return Self::load(path).map(LoadOutcome::Loaded);
        }

        Self::default().save(path)?;
        tracing::warn!(path = %path.display(), "Wrote default config file");
        Ok(LoadOutcome::Created(path.to_path_buf()))
    }
}

/// Resolve the config file path: explicit flag, then `NETMON_CONFIG`, then
/// [`DEFAULT_CONFIG_FILE`].
pub fn resolve_config_path(explicit: Option<PathBuf>) -> PathBuf {
    explicit
        .or_else(|| {
            std::env::var(CONFIG_PATH_ENV)
                .ok()
                .filter(|s| !s.is_empty())
                .map(PathBuf::from)
        })
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}
