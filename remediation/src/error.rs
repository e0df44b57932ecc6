//! Error taxonomy for the monitor and its collaborators.
//!
//! Only [`MonitorError`] is fatal, and only at startup. Everything raised
//! while the monitor loop is running is recovered locally and shows up as a
//! state transition or a log line.
//!
//! | Error              | Raised by          | Effect on the loop                   |
//! |--------------------|--------------------|--------------------------------------|
//! | probe failure      | prober             | `false` verdict, drives transitions  |
//! | `RemoteError`      | remote executor    | logged, tier attempt continues       |
//! | `NotifyError`      | notifier           | logged, swallowed                    |
//! | `ConfigError`      | config loader      | fatal before the loop starts         |

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result alias for startup-time operations.
pub type MonitorResult<T> = Result<T, MonitorError>;

/// Errors that stop the process before monitoring begins.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("platform not supported: {0}")]
    UnsupportedPlatform(String),
}

/// Failures loading, validating or writing the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot access config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot serialize config: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Failures of the remote-command channel.
///
/// `Connect` and `Auth` mean the channel could not be established; `Exec`
/// and `Timeout` mean a command did not complete cleanly. Both kinds are
/// expected while a router is restarting.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("cannot connect to {host}: {reason}")]
    Connect { host: String, reason: String },

    #[error("authentication rejected for user {user}")]
    Auth { user: String },

    #[error("command `{command}` failed: {reason}")]
    Exec { command: String, reason: String },

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("connection already closed")]
    Closed,
}

/// Failures delivering a notification.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification endpoint or payload template not configured")]
    NotConfigured,

    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("endpoint responded with status {0}")]
    Status(u16),
}
