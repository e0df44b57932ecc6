//! Network reachability monitoring with tiered router remediation.
//!
//! This library provides:
//! - A deterministic escalation engine: steady polling, rapid re-test
//!   bursts, network restart, device reboot, passive waiting
//! - The three collaborators it drives, each behind a trait: reachability
//!   prober (`ping`), remote command executor (SSH), notifier (webhook)
//! - The JSON configuration model with load-or-create-default semantics
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use remediation::{EscalationEngine, MonitorConfig, SshConnector, WebhookNotifier};
//!
//! let config = MonitorConfig::load("netmon.json".as_ref())?;
//! let prober = remediation::select_prober(std::env::consts::OS)?;
//! let mut engine = EscalationEngine::new(
//!     config.clone(),
//!     Arc::from(prober),
//!     Arc::new(SshConnector::from_config(&config)),
//!     Arc::new(WebhookNotifier::new(config.notify.clone())),
//! )?;
//! engine.run().await;
//! ```

#![allow(clippy::uninlined_format_args)]

pub mod config;
pub mod engine;
pub mod error;
pub mod notify;
pub mod observer;
pub mod probe;
pub mod remote;
pub mod session;
pub mod state;

pub use config::{resolve_config_path, LoadOutcome, MonitorConfig, NotifyConfig};
pub use engine::{worst_case_remediation_time, CycleOutcome, EscalationEngine};
pub use error::{ConfigError, MonitorError, MonitorResult, NotifyError, RemoteError};
pub use notify::{Notifier, WebhookNotifier};
pub use observer::{MonitorEvent, MonitorObserver, RecordingObserver, TracingObserver};
pub use probe::{select_prober, PingFlavor, Prober, SystemPing};
pub use remote::{RemoteConnection, RemoteConnector, SshConnector};
pub use session::{Recovery, RemediationSession, Tier};
pub use state::{IllegalTransition, MonitorState, StateMachine, TransitionRecord};
