//! Monitor State Machine: explicit states and legal transition guards.
//!
//! The escalation engine calls [`StateMachine::advance`] at every state
//! change so that:
//! 1. Every transition is checked against the state graph.
//! 2. The full transition log is available for diagnostics and tests.
//!
//! There is no terminal state; the monitor runs until the process exits.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The set of monitor states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorState {
    /// Polling `targets[0]` at the steady interval.
    Steady,
    /// Rapid re-test across the target rotation.
    Burst,
    /// Issuing the network restart command.
    RestartTier,
    /// Issuing the device reboot command.
    RebootTier,
    /// Remediation exhausted; waiting for connectivity to come back.
    PassiveWait,
}

impl fmt::Display for MonitorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Steady => write!(f, "Steady"),
            Self::Burst => write!(f, "Burst"),
            Self::RestartTier => write!(f, "RestartTier"),
            Self::RebootTier => write!(f, "RebootTier"),
            Self::PassiveWait => write!(f, "PassiveWait"),
        }
    }
}

/// Legal transitions between monitor states.
///
/// ```text
/// Steady      → Burst
/// Burst       → Steady | RestartTier | RebootTier | PassiveWait
/// RestartTier → Burst | RebootTier
/// RebootTier  → Burst | PassiveWait
/// PassiveWait → Steady
/// ```
///
/// `RestartTier → RebootTier` covers a failed connection or zero restart
/// attempts; `RebootTier → PassiveWait` likewise for the reboot tier.
fn is_legal_transition(from: MonitorState, to: MonitorState) -> bool {
    use MonitorState::*;

    matches!(
        (from, to),
        (Steady, Burst)
            // Burst recovered, or failed and hands over to the next tier
            | (Burst, Steady)
            | (Burst, RestartTier)
            | (Burst, RebootTier)
            | (Burst, PassiveWait)
            | (RestartTier, Burst)
            | (RestartTier, RebootTier)
            | (RebootTier, Burst)
            | (RebootTier, PassiveWait)
            | (PassiveWait, Steady)
    )
}

/// A single recorded state transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from: MonitorState,
    pub to: MonitorState,
    pub at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Error returned when an illegal transition is attempted.
#[derive(Debug, Clone)]
pub struct IllegalTransition {
    pub from: MonitorState,
    pub to: MonitorState,
}

impl fmt::Display for IllegalTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Illegal state transition: {} → {}", self.from, self.to)
    }
}

impl std::error::Error for IllegalTransition {}

/// Tracks the current state and keeps the transition log.
///
/// The log is bounded: once `history_limit` records are held, the oldest
/// is dropped so a monitor that runs for months does not grow without bound.
#[derive(Debug)]
pub struct StateMachine {
    current: MonitorState,
    transitions: Vec<TransitionRecord>,
    history_limit: usize,
    total_transitions: u64,
}

impl StateMachine {
    /// Default number of transition records retained.
    pub const DEFAULT_HISTORY: usize = 256;

    pub fn new() -> Self {
        Self::with_history_limit(Self::DEFAULT_HISTORY)
    }

    pub fn with_history_limit(history_limit: usize) -> Self {
        Self {
            current: MonitorState::Steady,
            transitions: Vec::new(),
            history_limit: history_limit.max(1),
            total_transitions: 0,
        }
    }

    pub fn current(&self) -> MonitorState {
        self.current
    }

    /// Attempt to advance to the next state.
    pub fn advance(
        &mut self,
        to: MonitorState,
        reason: Option<&str>,
    ) -> Result<TransitionRecord, IllegalTransition> {
        if !is_legal_transition(self.current, to) {
            return Err(IllegalTransition {
                from: self.current,
                to,
            });
        }

        let record = TransitionRecord {
            from: self.current,
            to,
            at: Utc::now(),
            reason: reason.map(String::from),
        };

        tracing::debug!(from = %self.current, to = %to, "State transition");

        if self.transitions.len() == self.history_limit {
            self.transitions.remove(0);
        }
        self.transitions.push(record.clone());
        self.total_transitions += 1;
        self.current = to;
        Ok(record)
    }

    /// Retained transition log, oldest first.
    pub fn transitions(&self) -> &[TransitionRecord] {
        &self.transitions
    }

    /// Transitions since creation, including ones dropped from the log.
    pub fn total_transitions(&self) -> u64 {
        self.total_transitions
    }

    /// The states visited, in order, as retained in the log.
    pub fn path(&self) -> Vec<MonitorState> {
        self.transitions.iter().map(|t| t.to).collect()
    }

    /// One-line summary of the retained history.
    pub fn summary(&self) -> String {
        let states: Vec<String> = self.transitions.iter().map(|t| t.to.to_string()).collect();
        let mut out = format!(
            "now {} ({} transitions)",
            self.current, self.total_transitions
        );
        if !states.is_empty() {
            out.push_str(&format!(" [{}]", states.join(" → ")));
        }
        out
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}
