//! Scripted collaborators shared by the escalation scenario tests.

#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use remediation::{
    EscalationEngine, MonitorConfig, Notifier, Prober, RecordingObserver, RemoteConnection,
    RemoteConnector, RemoteError,
};

/// Replays a verdict script, then answers `fallback` forever.
pub struct ScriptedProber {
    script: Mutex<VecDeque<bool>>,
    fallback: bool,
    calls: Mutex<Vec<String>>,
}

impl ScriptedProber {
    pub fn new(script: &[bool], fallback: bool) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.iter().copied().collect()),
            fallback,
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Fails `failures` times, then succeeds on every later call.
    pub fn fail_then_succeed(failures: usize) -> Arc<Self> {
        Self::new(&vec![false; failures], true)
    }

    pub fn always_down() -> Arc<Self> {
        Self::new(&[], false)
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Prober for ScriptedProber {
    async fn probe(&self, address: &str) -> bool {
        self.calls.lock().unwrap().push(address.to_string());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.fallback)
    }
}

/// What happened on the fake remote channel.
#[derive(Default)]
pub struct RemoteLog {
    pub connects: AtomicUsize,
    pub closes: AtomicUsize,
    pub executed: Mutex<Vec<String>>,
}

impl RemoteLog {
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }

    pub fn executed_count(&self, command: &str) -> usize {
        self.executed().iter().filter(|c| *c == command).count()
    }
}

/// Connector whose connect outcomes and command faults are scripted.
pub struct FakeConnector {
    pub log: Arc<RemoteLog>,
    connect_script: Mutex<VecDeque<bool>>,
    failing_commands: HashSet<String>,
}

impl FakeConnector {
    pub fn healthy() -> Arc<Self> {
        Self::scripted(&[], &[])
    }

    /// `connects`: per-call success, later calls succeed.
    /// `failing`: commands that always report an execution error.
    pub fn scripted(connects: &[bool], failing: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            log: Arc::new(RemoteLog::default()),
            connect_script: Mutex::new(connects.iter().copied().collect()),
            failing_commands: failing.iter().map(|c| c.to_string()).collect(),
        })
    }
}

#[async_trait]
impl RemoteConnector for FakeConnector {
    async fn connect(&self) -> Result<Box<dyn RemoteConnection>, RemoteError> {
        self.log.connects.fetch_add(1, Ordering::SeqCst);
        let ok = self.connect_script.lock().unwrap().pop_front().unwrap_or(true);
        if !ok {
            return Err(RemoteError::Connect {
                host: "192.168.1.1:22".into(),
                reason: "connection refused".into(),
            });
        }
        Ok(Box::new(FakeConnection {
            log: self.log.clone(),
            failing_commands: self.failing_commands.clone(),
            closed: false,
        }))
    }
}

struct FakeConnection {
    log: Arc<RemoteLog>,
    failing_commands: HashSet<String>,
    closed: bool,
}

#[async_trait]
impl RemoteConnection for FakeConnection {
    async fn execute(&mut self, command: &str) -> Result<(), RemoteError> {
        if self.closed {
            return Err(RemoteError::Closed);
        }
        self.log.executed.lock().unwrap().push(command.to_string());
        if self.failing_commands.contains(command) {
            return Err(RemoteError::Exec {
                command: command.to_string(),
                reason: "channel closed without exit status".into(),
            });
        }
        Ok(())
    }

    async fn close(&mut self) {
        self.closed = true;
        self.log.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Records every message it is asked to send.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, message: &str) {
        self.sent.lock().unwrap().push(message.to_string());
    }
}

pub const RESTART: &str = "service restart_wan";
pub const REBOOT: &str = "reboot";

pub fn config(targets: &[&str], burst: u32, restarts: u32, reboots: u32) -> MonitorConfig {
    MonitorConfig {
        targets: targets.iter().map(|t| t.to_string()).collect(),
        burst_attempts: burst,
        burst_interval_secs: 10,
        restart_command: RESTART.into(),
        restart_attempts: restarts,
        restart_wait_secs: 40,
        reboot_command: REBOOT.into(),
        reboot_attempts: reboots,
        reboot_wait_secs: 120,
        poll_interval_secs: 300,
        ..Default::default()
    }
}

pub struct Harness {
    pub engine: EscalationEngine,
    pub prober: Arc<ScriptedProber>,
    pub connector: Arc<FakeConnector>,
    pub notifier: Arc<RecordingNotifier>,
    pub observer: Arc<RecordingObserver>,
}

impl Harness {
    pub fn new(
        config: MonitorConfig,
        prober: Arc<ScriptedProber>,
        connector: Arc<FakeConnector>,
    ) -> Self {
        let notifier = RecordingNotifier::new();
        let observer = Arc::new(RecordingObserver::new());
        let engine = EscalationEngine::new(
            config,
            prober.clone(),
            connector.clone(),
            notifier.clone(),
        )
        .expect("test config must be valid")
        .with_observer(observer.clone());

        Self {
            engine,
            prober,
            connector,
            notifier,
            observer,
        }
    }

    pub fn remote(&self) -> &RemoteLog {
        &self.connector.log
    }
}
