//! Reachability Prober: one `ping` child process per probe.
//!
//! DNS failure, timeout and host-down all collapse to `false`; retry policy
//! belongs to the engine. The platform's ping flavour is picked once at
//! startup by [`select_prober`].

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::{MonitorError, MonitorResult};

/// Deadline handed to the ping utility itself.
pub const PROBE_DEADLINE: Duration = Duration::from_secs(10);

/// Extra time allowed for process startup and name resolution before the
/// child is killed.
const PROBE_GRACE: Duration = Duration::from_secs(2);

/// A reachability check against a single address.
#[async_trait]
pub trait Prober: Send + Sync {
    /// `true` when `address` answered within the probe deadline.
    async fn probe(&self, address: &str) -> bool;
}

/// Command-line dialect of the platform `ping`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PingFlavor {
    /// iputils: `-W` is the reply timeout in seconds.
    Linux,
    /// macOS and the BSDs: `-t` is the overall timeout in seconds.
    Bsd,
    /// `-w` is the reply timeout in milliseconds.
    Windows,
}

impl PingFlavor {
    /// Look up the flavour for a `std::env::consts::OS` value.
    pub fn for_os(os: &str) -> Option<Self> {
        match os {
            "linux" | "android" => Some(Self::Linux),
            "macos" | "ios" | "freebsd" | "openbsd" | "netbsd" | "dragonfly" => Some(Self::Bsd),
            "windows" => Some(Self::Windows),
            _ => None,
        }
    }

    /// Arguments for a single echo request to `address`.
    pub fn args(self, address: &str, deadline: Duration) -> Vec<String> {
        let secs = deadline.as_secs().max(1).to_string();
        match self {
            Self::Linux => vec![
                "-c".into(),
                "1".into(),
                "-W".into(),
                secs,
                "-n".into(),
                "-q".into(),
                address.into(),
            ],
            Self::Bsd => vec![
                "-c".into(),
                "1".into(),
                "-t".into(),
                secs,
                "-n".into(),
                "-q".into(),
                address.into(),
            ],
            Self::Windows => vec![
                address.into(),
                "-n".into(),
                "1".into(),
                "-w".into(),
                deadline.as_millis().to_string(),
            ],
        }
    }
}

/// Probes by running the system `ping` binary.
#[derive(Debug, Clone)]
pub struct SystemPing {
    flavor: PingFlavor,
    program: String,
    deadline: Duration,
}

impl SystemPing {
    pub fn new(flavor: PingFlavor) -> Self {
        Self {
            flavor,
            program: "ping".to_string(),
            deadline: PROBE_DEADLINE,
        }
    }

    /// Use a different executable (tests, or a non-PATH ping).
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }
}

#[async_trait]
impl Prober for SystemPing {
    async fn probe(&self, address: &str) -> bool {
        let child = Command::new(&self.program)
            .args(self.flavor.args(address, self.deadline))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status();

        match tokio::time::timeout(self.deadline + PROBE_GRACE, child).await {
            Ok(Ok(status)) => {
                tracing::trace!(addr = %address, code = ?status.code(), "ping exited");
                status.success()
            }
            Ok(Err(e)) => {
                tracing::debug!(addr = %address, error = %e, "ping could not be spawned");
                false
            }
            Err(_) => {
                tracing::debug!(addr = %address, "ping exceeded deadline, killed");
                false
            }
        }
    }
}

/// Pick the prober for the running platform.
pub fn select_prober(os: &str) -> MonitorResult<Box<dyn Prober>> {
    let flavor = PingFlavor::for_os(os)
        .ok_or_else(|| MonitorError::UnsupportedPlatform(os.to_string()))?;
    tracing::debug!(os, ?flavor, "Selected ping flavour");
    Ok(Box::new(SystemPing::new(flavor)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flavor_table() {
        assert_eq!(PingFlavor::for_os("linux"), Some(PingFlavor::Linux));
        assert_eq!(PingFlavor::for_os("macos"), Some(PingFlavor::Bsd));
        assert_eq!(PingFlavor::for_os("freebsd"), Some(PingFlavor::Bsd));
        assert_eq!(PingFlavor::for_os("windows"), Some(PingFlavor::Windows));
        assert_eq!(PingFlavor::for_os("plan9"), None);
    }

    #[test]
    fn test_linux_args() {
        let args = PingFlavor::Linux.args("1.1.1.1", Duration::from_secs(10));
        assert_eq!(args, ["-c", "1", "-W", "10", "-n", "-q", "1.1.1.1"]);
    }

    #[test]
    fn test_bsd_args() {
        let args = PingFlavor::Bsd.args("8.8.8.8", Duration::from_secs(10));
        assert_eq!(args, ["-c", "1", "-t", "10", "-n", "-q", "8.8.8.8"]);
    }

    #[test]
    fn test_windows_args_use_millis() {
        let args = PingFlavor::Windows.args("8.8.4.4", Duration::from_secs(10));
        assert_eq!(args, ["8.8.4.4", "-n", "1", "-w", "10000"]);
    }

    #[test]
    fn test_sub_second_deadline_rounds_up() {
        let args = PingFlavor::Linux.args("h", Duration::from_millis(200));
        assert_eq!(args[3], "1");
    }

    #[test]
    fn test_select_unsupported_platform() {
        let err = select_prober("plan9").err().unwrap();
        assert!(matches!(err, MonitorError::UnsupportedPlatform(ref os) if os == "plan9"));
        assert!(select_prober("linux").is_ok());
    }

    #[tokio::test]
    async fn test_missing_binary_is_unreachable() {
        let ping = SystemPing::new(PingFlavor::Linux).with_program("netmon-no-such-ping-binary");
        assert!(!ping.probe("127.0.0.1").await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exit_status_decides_verdict() {
        // `true`/`false` ignore their arguments and exit 0/1.
        let ok = SystemPing::new(PingFlavor::Linux).with_program("true");
        assert!(ok.probe("10.0.0.1").await);

        let down = SystemPing::new(PingFlavor::Linux).with_program("false");
        assert!(!down.probe("10.0.0.1").await);
    }
}
