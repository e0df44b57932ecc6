//! Remediation Session: one escalation episode and the connection it owns.
//!
//! The session is created when steady polling detects a failure and is
//! closed exactly once by the engine after the remediation ladder returns,
//! whichever way it returns. [`RemediationSession::close`] is idempotent and
//! dropping an unclosed session logs a warning.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::RemoteError;
use crate::notify::{RESUMED_AFTER_REBOOT, RESUMED_AFTER_RESTART, RESUMED_ON_ITS_OWN};
use crate::remote::{RemoteConnection, RemoteConnector};

/// Remediation tier active within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Only the confirmation burst has run so far.
    BurstOnly,
    Restart,
    Reboot,
    Passive,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BurstOnly => write!(f, "burst"),
            Self::Restart => write!(f, "restart"),
            Self::Reboot => write!(f, "reboot"),
            Self::Passive => write!(f, "passive"),
        }
    }
}

/// How an escalation episode ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recovery {
    /// The confirmation burst succeeded; nothing was done.
    Burst,
    /// A burst after a network restart succeeded.
    Restart,
    /// A burst after a device reboot succeeded.
    Reboot,
    /// Connectivity came back during passive waiting.
    OnItsOwn,
}

impl Recovery {
    /// Notification text, `None` when no intervention took place.
    pub fn message(self) -> Option<&'static str> {
        match self {
            Self::Burst => None,
            Self::Restart => Some(RESUMED_AFTER_RESTART),
            Self::Reboot => Some(RESUMED_AFTER_REBOOT),
            Self::OnItsOwn => Some(RESUMED_ON_ITS_OWN),
        }
    }
}

impl fmt::Display for Recovery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Burst => write!(f, "burst"),
            Self::Restart => write!(f, "restart"),
            Self::Reboot => write!(f, "reboot"),
            Self::OnItsOwn => write!(f, "on its own"),
        }
    }
}

/// State of one escalation episode.
pub struct RemediationSession {
    connection: Option<Box<dyn RemoteConnection>>,
    tier: Tier,
    attempts: u32,
}

impl RemediationSession {
    pub fn new() -> Self {
        Self {
            connection: None,
            tier: Tier::BurstOnly,
            attempts: 0,
        }
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Move to `tier` and reset the attempt counter.
    pub fn enter(&mut self, tier: Tier) {
        self.tier = tier;
        self.attempts = 0;
    }

    /// Count an attempt at the current tier, returning its 1-based number.
    /// This is the attempt number the engine reports.
    pub fn record_attempt(&mut self) -> u32 {
        self.attempts += 1;
        self.attempts
    }

    /// Open the remote channel unless one is already held.
    pub async fn connect(&mut self, connector: &dyn RemoteConnector) -> Result<(), RemoteError> {
        if self.connection.is_none() {
            self.connection = Some(connector.connect().await?);
        }
        Ok(())
    }

    pub async fn execute(&mut self, command: &str) -> Result<(), RemoteError> {
        match self.connection.as_mut() {
            Some(conn) => conn.execute(command).await,
            None => Err(RemoteError::Closed),
        }
    }

    /// Release the connection. Returns whether one was actually held.
    pub async fn close(&mut self) -> bool {
        match self.connection.take() {
            Some(mut conn) => {
                conn.close().await;
                true
            }
            None => false,
        }
    }
}

impl Default for RemediationSession {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RemediationSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemediationSession")
            .field("connected", &self.is_connected())
            .field("tier", &self.tier)
            .field("attempts", &self.attempts)
            .finish()
    }
}

impl Drop for RemediationSession {
    fn drop(&mut self) {
        if self.connection.is_some() {
            tracing::warn!(tier = %self.tier, "Remediation session dropped with an open connection");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingConnection {
        closes: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl RemoteConnection for CountingConnection {
        async fn execute(&mut self, command: &str) -> Result<(), RemoteError> {
            if command == "fail" {
                return Err(RemoteError::Exec {
                    command: command.into(),
                    reason: "exit status 1".into(),
                });
            }
            Ok(())
        }

        async fn close(&mut self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct CountingConnector {
        connects: AtomicUsize,
        closes: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl RemoteConnector for CountingConnector {
        async fn connect(&self) -> Result<Box<dyn RemoteConnection>, RemoteError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(CountingConnection {
                closes: self.closes.clone(),
            }))
        }
    }

    fn connector() -> CountingConnector {
        CountingConnector {
            connects: AtomicUsize::new(0),
            closes: Arc::new(AtomicUsize::new(0)),
        }
    }

    #[test]
    fn test_recovery_messages() {
        assert_eq!(Recovery::Burst.message(), None);
        assert_eq!(Recovery::Restart.message(), Some(RESUMED_AFTER_RESTART));
        assert_eq!(Recovery::Reboot.message(), Some(RESUMED_AFTER_REBOOT));
        assert_eq!(Recovery::OnItsOwn.message(), Some(RESUMED_ON_ITS_OWN));
    }

    #[test]
    fn test_enter_resets_attempts() {
        let mut session = RemediationSession::new();
        assert_eq!(session.tier(), Tier::BurstOnly);

        session.enter(Tier::Restart);
        assert_eq!(session.record_attempt(), 1);
        assert_eq!(session.record_attempt(), 2);

        session.enter(Tier::Reboot);
        assert_eq!(session.tier(), Tier::Reboot);
        assert_eq!(session.record_attempt(), 1);
    }

    #[tokio::test]
    async fn test_connect_is_reused() {
        let connector = connector();
        let mut session = RemediationSession::new();

        session.connect(&connector).await.unwrap();
        session.connect(&connector).await.unwrap();
        assert_eq!(connector.connects.load(Ordering::SeqCst), 1);
        assert!(session.is_connected());
        session.close().await;
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let connector = connector();
        let mut session = RemediationSession::new();
        session.connect(&connector).await.unwrap();

        assert!(session.execute("fail").await.is_err());
        assert!(session.close().await);
        assert!(!session.close().await);
        assert_eq!(connector.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_execute_without_connection() {
        let mut session = RemediationSession::new();
        assert!(matches!(
            session.execute("reboot").await,
            Err(RemoteError::Closed)
        ));
        assert!(!session.close().await);
    }
}
