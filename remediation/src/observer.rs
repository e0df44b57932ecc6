//! Structured outcomes reported by the escalation engine.
//!
//! The engine never prints. It hands every transition, probe, command and
//! notification to a [`MonitorObserver`]; production wiring uses
//! [`TracingObserver`], tests use [`RecordingObserver`] to assert on
//! sequences.

use std::sync::Mutex;

use crate::session::{Recovery, Tier};
use crate::state::{MonitorState, TransitionRecord};

/// Something the engine did or saw.
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorEvent {
    Transition(TransitionRecord),
    Probe {
        target: String,
        reachable: bool,
        state: MonitorState,
    },
    SessionOpened {
        tier: Tier,
    },
    ConnectFailed {
        tier: Tier,
        error: String,
    },
    CommandIssued {
        tier: Tier,
        attempt: u32,
        of: u32,
        error: Option<String>,
    },
    SessionClosed,
    Notified {
        recovery: Recovery,
    },
}

pub trait MonitorObserver: Send + Sync {
    fn on_event(&self, event: &MonitorEvent);
}

/// Writes events to `tracing`.
///
/// Probe failures are routine and only traced at debug; remediation steps
/// are info; channel failures are warnings.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl MonitorObserver for TracingObserver {
    fn on_event(&self, event: &MonitorEvent) {
        match event {
            MonitorEvent::Transition(t) => tracing::info!(
                from = %t.from,
                to = %t.to,
                reason = t.reason.as_deref().unwrap_or(""),
                "Monitor state changed"
            ),
            MonitorEvent::Probe {
                target,
                reachable,
                state,
            } => {
                if *reachable {
                    tracing::debug!(addr = %target, %state, "ping ok");
                } else {
                    tracing::debug!(addr = %target, %state, "ping failed");
                }
            }
            MonitorEvent::SessionOpened { tier } => {
                tracing::info!(%tier, "Remote command channel opened")
            }
            MonitorEvent::ConnectFailed { tier, error } => {
                tracing::warn!(%tier, %error, "Cannot connect to router")
            }
            MonitorEvent::CommandIssued {
                tier,
                attempt,
                of,
                error,
            } => match (tier, error) {
                (_, None) => tracing::info!(%tier, attempt, of, "Remediation command sent"),
                // Reboots routinely cut the connection before replying.
                (Tier::Reboot, Some(error)) => {
                    tracing::debug!(%tier, attempt, of, %error, "Reboot command did not acknowledge")
                }
                (_, Some(error)) => {
                    tracing::warn!(%tier, attempt, of, %error, "Remediation command failed")
                }
            },
            MonitorEvent::SessionClosed => tracing::debug!("Remote command channel closed"),
            MonitorEvent::Notified { recovery } => {
                tracing::info!(%recovery, "Network resumed, notification dispatched")
            }
        }
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<MonitorEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<MonitorEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// States entered, in order.
    pub fn path(&self) -> Vec<MonitorState> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                MonitorEvent::Transition(t) => Some(t.to),
                _ => None,
            })
            .collect()
    }

    /// Targets probed, in order.
    pub fn probes(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                MonitorEvent::Probe { target, .. } => Some(target),
                _ => None,
            })
            .collect()
    }

    /// Number of commands issued at `tier`.
    pub fn commands(&self, tier: Tier) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, MonitorEvent::CommandIssued { tier: t, .. } if *t == tier))
            .count()
    }

    pub fn count(&self, predicate: impl Fn(&MonitorEvent) -> bool) -> usize {
        self.events().iter().filter(|e| predicate(e)).count()
    }
}

impl MonitorObserver for RecordingObserver {
    fn on_event(&self, event: &MonitorEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
