use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use netmon::cli::{available_checks, Args, Command};
use netmon::self_test::SelfTest;
use netmon::telemetry;
use remediation::{
    resolve_config_path, select_prober, worst_case_remediation_time, EscalationEngine,
    LoadOutcome, MonitorConfig, Prober, SshConnector, WebhookNotifier,
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    telemetry::init();

    let path = resolve_config_path(args.config.clone());
    let config = match MonitorConfig::load_or_create_default(&path)
        .with_context(|| format!("loading config from {}", path.display()))?
    {
        LoadOutcome::Loaded(config) => config,
        LoadOutcome::Created(path) => {
            eprintln!(
                "A default config was written to {}.\nReview the router address, credentials and webhook, then start netmon again.",
                path.display()
            );
            std::process::exit(1);
        }
    };

    let prober: Arc<dyn Prober> = Arc::from(
        select_prober(std::env::consts::OS).context("selecting reachability prober")?,
    );
    let connector = Arc::new(SshConnector::from_config(&config));
    let webhook = WebhookNotifier::new(config.notify.clone());

    match args.command() {
        Command::Test { check: None, .. } => {
            print!("{}", available_checks());
            Ok(())
        }
        Command::Test {
            check: Some(check),
            json,
        } => {
            let self_test = SelfTest::new(config.targets.clone(), prober, connector, webhook);
            let report = self_test.run(check).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", report.summary());
            }
            std::process::exit(report.exit_code());
        }
        Command::Run => {
            if !webhook.is_configured() {
                tracing::warn!("Webhook not configured; recoveries will not be announced");
            }
            info!(
                config = %path.display(),
                router = %config.ssh_endpoint(),
                primary = config.target(0),
                worst_case_secs = worst_case_remediation_time(&config).as_secs(),
                "netmon starting"
            );

            let mut engine =
                EscalationEngine::new(config, prober, connector, Arc::new(webhook))?;

            tokio::select! {
                _ = engine.run() => {}
                signal = tokio::signal::ctrl_c() => {
                    signal.context("listening for Ctrl-C")?;
                    info!("Interrupted, shutting down");
                }
            }
            Ok(())
        }
    }
}
