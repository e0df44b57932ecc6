//! Remote Command Executor: password SSH to the managed router.
//!
//! The router sits on a trusted LAN, so its host key is accepted without
//! verification. Each [`RemoteConnection::execute`] opens a fresh session
//! channel and runs exactly one command.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use russh::client::{self, Handle};
use russh::{ChannelMsg, Disconnect};
use russh_keys::key::PublicKey;

use crate::config::MonitorConfig;
use crate::error::RemoteError;

/// Opens connections to the managed device.
#[async_trait]
pub trait RemoteConnector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn RemoteConnection>, RemoteError>;
}

/// A live remote-command channel.
///
/// `close` must be safe after any earlier error and safe to call twice.
#[async_trait]
pub trait RemoteConnection: Send {
    async fn execute(&mut self, command: &str) -> Result<(), RemoteError>;
    async fn close(&mut self);
}

/// Connection parameters for [`SshConnector`].
#[derive(Clone)]
pub struct SshConnector {
    host: String,
    port: u16,
    user: String,
    password: String,
    timeout: Duration,
}

impl std::fmt::Debug for SshConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshConnector")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl SshConnector {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            user: user.into(),
            password: password.into(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn from_config(config: &MonitorConfig) -> Self {
        Self::new(
            &config.device_address,
            config.ssh_port,
            &config.ssh_user,
            &config.ssh_password,
        )
        .with_timeout(config.ssh_timeout())
    }

    /// Bound for connect+auth and for each command.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    async fn open(&self) -> Result<Handle<AcceptAnyHostKey>, RemoteError> {
        let config = Arc::new(client::Config::default());
        let mut handle = client::connect(
            config,
            (self.host.as_str(), self.port),
            AcceptAnyHostKey,
        )
        .await
        .map_err(|e| RemoteError::Connect {
            host: self.endpoint(),
            reason: e.to_string(),
        })?;

        let accepted = handle
            .authenticate_password(self.user.clone(), self.password.clone())
            .await
            .map_err(|e| RemoteError::Connect {
                host: self.endpoint(),
                reason: e.to_string(),
            })?;
        if !accepted {
            return Err(RemoteError::Auth {
                user: self.user.clone(),
            });
        }
        Ok(handle)
    }
}

#[async_trait]
impl RemoteConnector for SshConnector {
    async fn connect(&self) -> Result<Box<dyn RemoteConnection>, RemoteError> {
        let handle = tokio::time::timeout(self.timeout, self.open())
            .await
            .map_err(|_| RemoteError::Timeout {
                operation: "connect",
                after: self.timeout,
            })??;

        tracing::debug!(host = %self.endpoint(), user = %self.user, "SSH session established");
        Ok(Box::new(SshConnection {
            handle: Some(handle),
            timeout: self.timeout,
        }))
    }
}

/// Host-key policy for the trusted management LAN.
struct AcceptAnyHostKey;

#[async_trait]
impl client::Handler for AcceptAnyHostKey {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        Ok(true)
    }
}

/// Authenticated SSH connection. `handle` is `None` once closed.
pub struct SshConnection {
    handle: Option<Handle<AcceptAnyHostKey>>,
    timeout: Duration,
}

impl SshConnection {
    async fn run(handle: &Handle<AcceptAnyHostKey>, command: &str) -> Result<(), RemoteError> {
        let exec_err = |reason: String| RemoteError::Exec {
            command: command.to_string(),
            reason,
        };

        let mut channel = handle
            .channel_open_session()
            .await
            .map_err(|e| exec_err(e.to_string()))?;
        channel
            .exec(true, command)
            .await
            .map_err(|e| exec_err(e.to_string()))?;

        let mut exit_status = None;
        while let Some(msg) = channel.wait().await {
            if let ChannelMsg::ExitStatus { exit_status: code } = msg {
                exit_status = Some(code);
            }
        }

        match exit_status {
            Some(0) => Ok(()),
            Some(code) => Err(exec_err(format!("exit status {code}"))),
            None => Err(exec_err("channel closed without exit status".into())),
        }
    }
}

#[async_trait]
impl RemoteConnection for SshConnection {
    async fn execute(&mut self, command: &str) -> Result<(), RemoteError> {
        let handle = self.handle.as_ref().ok_or(RemoteError::Closed)?;
        tokio::time::timeout(self.timeout, Self::run(handle, command))
            .await
            .map_err(|_| RemoteError::Timeout {
                operation: "execute",
                after: self.timeout,
            })?
    }

    async fn close(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        // The router may already have dropped the connection (e.g. after a
        // reboot command); a failed disconnect is not interesting.
        let disconnect = handle.disconnect(Disconnect::ByApplication, "", "en");
        if let Err(e) = tokio::time::timeout(self.timeout, disconnect)
            .await
            .unwrap_or(Ok(()))
        {
            tracing::debug!(error = %e, "SSH disconnect failed");
        }
    }
}
