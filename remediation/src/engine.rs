//! Escalation Engine: the monitor loop and the remediation ladder.
//!
//! ```text
//! Steady ── ping targets[0] ok ──▶ sleep poll interval
//!    │ fail
//!    ▼
//! Burst (burst_attempts probes over the rotation)
//!    ├─ any ok ──────────────────────────────▶ Steady, no notification
//!    ▼ all fail
//! RestartTier ── connect once ── fail ──┐
//!    │ restart_attempts × (command, wait, burst)   │
//!    ├─ burst ok ── close ── notify ─────▶ Steady
//!    ▼ exhausted (channel kept open)      │
//! RebootTier ◀──────────────────────────┘
//!    │ reboot_attempts × (command, wait, burst)
//!    ├─ burst ok ── close ── notify ─────▶ Steady
//!    ▼ exhausted ── close
//! PassiveWait (every target once per poll interval, unbounded)
//!    └─ any ok ── notify ────────────────▶ Steady
//! ```
//!
//! The engine runs as one sequential task. Every suspension point is a
//! fixed sleep or an awaited collaborator call; targets are never probed
//! concurrently.

use std::sync::Arc;
use std::time::Duration;

use crate::config::MonitorConfig;
use crate::error::ConfigError;
use crate::notify::Notifier;
use crate::observer::{MonitorEvent, MonitorObserver, TracingObserver};
use crate::probe::Prober;
use crate::remote::RemoteConnector;
use crate::session::{Recovery, RemediationSession, Tier};
use crate::state::{MonitorState, StateMachine, TransitionRecord};

/// Result of one steady-state check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// `targets[0]` answered.
    Healthy,
    /// The steady probe failed and an escalation episode ran to completion.
    Recovered(Recovery),
}

/// Drives the prober, remote executor and notifier through the escalation
/// ladder. Owns the [`StateMachine`]; one engine serves one monitored path.
pub struct EscalationEngine {
    config: MonitorConfig,
    prober: Arc<dyn Prober>,
    connector: Arc<dyn RemoteConnector>,
    notifier: Arc<dyn Notifier>,
    observer: Arc<dyn MonitorObserver>,
    machine: StateMachine,
}

impl EscalationEngine {
    /// Build an engine. The config is validated here so the rotation
    /// arithmetic can rely on a non-empty target list.
    pub fn new(
        config: MonitorConfig,
        prober: Arc<dyn Prober>,
        connector: Arc<dyn RemoteConnector>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            prober,
            connector,
            notifier,
            observer: Arc::new(TracingObserver),
            machine: StateMachine::new(),
        })
    }

    /// Route events to `observer` instead of the default [`TracingObserver`].
    pub fn with_observer(mut self, observer: Arc<dyn MonitorObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// The validated configuration this engine runs with.
    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Get the current monitor state.
    pub fn state(&self) -> MonitorState {
        self.machine.current()
    }

    /// Retained transition log, oldest first.
    pub fn transitions(&self) -> &[TransitionRecord] {
        self.machine.transitions()
    }

    /// Monitor forever: one check, then the steady interval, repeat.
    pub async fn run(&mut self) {
        tracing::info!(
            target_count = self.config.targets.len(),
            poll_secs = self.config.poll_interval_secs,
            "Monitoring started"
        );
        loop {
            let outcome = self.check_once().await;
            if let CycleOutcome::Recovered(recovery) = outcome {
                tracing::info!(%recovery, summary = %self.machine.summary(), "Escalation episode finished");
            }
            tokio::time::sleep(self.config.poll_interval()).await;
        }
    }

    /// Probe `targets[0]`; on failure run a full escalation episode.
    pub async fn check_once(&mut self) -> CycleOutcome {
        let primary = self.config.target(0).to_string();
        if self.probe(&primary).await {
            return CycleOutcome::Healthy;
        }

        self.transition(MonitorState::Burst, format!("{primary} unreachable"));
        CycleOutcome::Recovered(self.escalate().await)
    }

    /// Probe the rotation up to `burst_attempts` times, stopping at the
    /// first success. Sleeps the burst interval between failed attempts.
    pub async fn burst(&mut self) -> bool {
        let attempts = self.config.burst_attempts;
        for i in 0..attempts {
            let target = self.config.target(i as usize).to_string();
            if self.probe(&target).await {
                tracing::info!(addr = %target, attempt = i + 1, "Burst probe succeeded");
                return true;
            }
            if i + 1 < attempts {
                tokio::time::sleep(self.config.burst_interval()).await;
            }
        }
        false
    }

    /// One escalation episode, entered from `Burst` after a failed steady probe.
    async fn escalate(&mut self) -> Recovery {
        let mut session = RemediationSession::new();

        if self.burst().await {
            self.transition(MonitorState::Steady, "burst recovered");
            return Recovery::Burst;
        }

        let outcome = self.remediate(&mut session).await;

        // Single release point for every way out of the ladder.
        if session.close().await {
            self.observer.on_event(&MonitorEvent::SessionClosed);
        }

        match outcome {
            Some(recovery) => {
                self.transition(MonitorState::Steady, format!("recovered after {recovery}"));
                self.notify(recovery).await;
                recovery
            }
            None => {
                session.enter(Tier::Passive);
                self.passive_wait().await
            }
        }
    }

    /// Restart tier then reboot tier. `None` means both were exhausted.
    async fn remediate(&mut self, session: &mut RemediationSession) -> Option<Recovery> {
        if self.restart_tier(session).await {
            return Some(Recovery::Restart);
        }
        if self.reboot_tier(session).await {
            return Some(Recovery::Reboot);
        }
        None
    }

    async fn restart_tier(&mut self, session: &mut RemediationSession) -> bool {
        self.transition(MonitorState::RestartTier, "burst failed");
        session.enter(Tier::Restart);

        let total = self.config.restart_attempts;
        if total == 0 {
            tracing::debug!("Restart tier disabled, skipping");
            return false;
        }
        if !self.open_channel(session).await {
            return false;
        }

        let command = self.config.restart_command.clone();
        loop {
            let attempt = session.record_attempt();
            if attempt > 1 {
                self.transition(MonitorState::RestartTier, "burst failed after restart");
            }

            // A failed command still gets its wait and burst; the router
            // may have restarted the WAN before the reply was lost.
            let result = session.execute(&command).await;
            self.observer.on_event(&MonitorEvent::CommandIssued {
                tier: Tier::Restart,
                attempt,
                of: total,
                error: result.err().map(|e| e.to_string()),
            });

            tokio::time::sleep(self.config.restart_wait()).await;
            self.transition(
                MonitorState::Burst,
                format!("restart attempt {attempt}/{total}"),
            );
            if self.burst().await {
                return true;
            }
            if attempt >= total {
                return false;
            }
        }
    }

    async fn reboot_tier(&mut self, session: &mut RemediationSession) -> bool {
        self.transition(MonitorState::RebootTier, "restart tier exhausted");
        session.enter(Tier::Reboot);

        let total = self.config.reboot_attempts;
        if total == 0 {
            tracing::debug!("Reboot tier disabled, skipping");
            return false;
        }
        if !self.open_channel(session).await {
            return false;
        }

        let command = self.config.reboot_command.clone();
        loop {
            let attempt = session.record_attempt();
            if attempt > 1 {
                self.transition(MonitorState::RebootTier, "burst failed after reboot");
            }

            // Reboots often drop the connection before the exit status
            // arrives; the outcome is reported but never acted on.
            let result = session.execute(&command).await;
            self.observer.on_event(&MonitorEvent::CommandIssued {
                tier: Tier::Reboot,
                attempt,
                of: total,
                error: result.err().map(|e| e.to_string()),
            });

            tokio::time::sleep(self.config.reboot_wait()).await;
            self.transition(
                MonitorState::Burst,
                format!("reboot attempt {attempt}/{total}"),
            );
            if self.burst().await {
                return true;
            }
            if attempt >= total {
                return false;
            }
        }
    }

    /// Make sure the session holds a connection. A failure only exhausts
    /// the current tier.
    async fn open_channel(&mut self, session: &mut RemediationSession) -> bool {
        if session.is_connected() {
            return true;
        }
        match session.connect(self.connector.as_ref()).await {
            Ok(()) => {
                self.observer.on_event(&MonitorEvent::SessionOpened {
                    tier: session.tier(),
                });
                true
            }
            Err(e) => {
                self.observer.on_event(&MonitorEvent::ConnectFailed {
                    tier: session.tier(),
                    error: e.to_string(),
                });
                false
            }
        }
    }

    /// Wait for any target to answer, with no attempt limit.
    ///
    /// Each cycle probes every target once and then sleeps the poll
    /// interval, rather than running a burst.
    async fn passive_wait(&mut self) -> Recovery {
        self.transition(MonitorState::PassiveWait, "remediation exhausted");
        tracing::warn!("Unable to restore the network; waiting for it to come back");

        loop {
            for i in 0..self.config.targets.len() {
                let target = self.config.target(i).to_string();
                if self.probe(&target).await {
                    self.transition(MonitorState::Steady, format!("{target} answered"));
                    self.notify(Recovery::OnItsOwn).await;
                    return Recovery::OnItsOwn;
                }
            }
            tokio::time::sleep(self.config.poll_interval()).await;
        }
    }

    async fn probe(&self, target: &str) -> bool {
        let reachable = self.prober.probe(target).await;
        self.observer.on_event(&MonitorEvent::Probe {
            target: target.to_string(),
            reachable,
            state: self.machine.current(),
        });
        reachable
    }

    async fn notify(&self, recovery: Recovery) {
        if let Some(message) = recovery.message() {
            self.notifier.notify(message).await;
            self.observer.on_event(&MonitorEvent::Notified { recovery });
        }
    }

    fn transition(&mut self, to: MonitorState, reason: impl Into<String>) {
        let reason = reason.into();
        match self.machine.advance(to, Some(&reason)) {
            Ok(record) => self.observer.on_event(&MonitorEvent::Transition(record)),
            Err(e) => {
                tracing::error!(error = %e, %reason, "Escalation engine skipped an illegal transition")
            }
        }
    }
}

impl std::fmt::Debug for EscalationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EscalationEngine")
            .field("state", &self.machine.current())
            .field("targets", &self.config.targets)
            .finish_non_exhaustive()
    }
}

/// Longest time one escalation episode can take before passive waiting,
/// assuming every probe fails instantly. Useful for sizing alerts.
///
/// Saturates at [`Duration::MAX`] for configs whose waits cannot be summed.
pub fn worst_case_remediation_time(config: &MonitorConfig) -> Duration {
    let burst = config
        .burst_interval()
        .saturating_mul(config.burst_attempts.saturating_sub(1));
    let restart = config
        .restart_wait()
        .saturating_add(burst)
        .saturating_mul(config.restart_attempts);
    let reboot = config
        .reboot_wait()
        .saturating_add(burst)
        .saturating_mul(config.reboot_attempts);
    burst.saturating_add(restart).saturating_add(reboot)
}
