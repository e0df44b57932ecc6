//! Command-line surface.
//!
//! - `netmon [--config <path>] [run]` starts the monitor
//! - `netmon test [webhook|ping|ssh|all]` exercises collaborators once

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(
    name = "netmon",
    version,
    about = "Watches internet reachability and restarts or reboots the router when it is lost"
)]
pub struct Args {
    /// Config file (defaults to $NETMON_CONFIG, then ./netmon.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Monitor until interrupted (the default)
    Run,
    /// Run one self-test against the configured collaborators
    Test {
        #[arg(value_enum)]
        check: Option<Check>,

        /// Print the report as JSON instead of a text summary
        #[arg(long)]
        json: bool,
    },
}

impl Args {
    /// The subcommand, with a bare `netmon` meaning `run`.
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Run)
    }
}

/// Self-test selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Check {
    /// Send the test message to the webhook
    Webhook,
    /// Ping every configured target
    Ping,
    /// Open the router's SSH channel and run `pwd`
    Ssh,
    /// All of the above
    All,
}

impl Check {
    /// Individual checks this selector runs, in execution order.
    pub fn expand(self) -> Vec<Check> {
        match self {
            Check::All => vec![Check::Webhook, Check::Ping, Check::Ssh],
            other => vec![other],
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Check::Webhook => "webhook",
            Check::Ping => "ping",
            Check::Ssh => "ssh",
            Check::All => "all",
        }
    }
}

/// Text shown for a bare `netmon test`.
pub fn available_checks() -> String {
    let mut out = String::from("Available checks:\n");
    for check in Check::value_variants() {
        let help = check
            .to_possible_value()
            .and_then(|v| v.get_help().map(|h| h.to_string()))
            .unwrap_or_default();
        out.push_str(&format!("  {:<8} {}\n", check.name(), help));
    }
    out
}
