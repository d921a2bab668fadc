//! Keel CLI binary entrypoint.
//!
//! `keel run --config apps.json` loads Application definitions and alert
//! rules from a JSON file and runs the reconciliation loop against the
//! in-memory backends until interrupted.

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use keel_alerts::{AlertEvaluator, LogChannel, NotificationRouter};
use keel_core::memory::{InMemoryCluster, StaticManifestSource};
use keel_reconciler::{Reconciler, ReconcilerConfig};

mod config;

use config::FileConfig;

/// Declarative reconciliation with alerting.
#[derive(Debug, Parser)]
#[command(name = "keel", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the reconciliation loop from a config file.
    Run(RunArgs),
}

#[derive(Debug, Args)]
struct RunArgs {
    /// Path to the JSON config file.
    #[arg(long)]
    config: PathBuf,

    /// Override the per-Application poll interval, in seconds.
    #[arg(long)]
    poll_interval_secs: Option<u64>,

    /// Override the alert evaluation interval, in seconds.
    #[arg(long)]
    alert_interval_secs: Option<u64>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Run(args) => run_loop(args).await,
    }
}

async fn run_loop(args: RunArgs) -> anyhow::Result<()> {
    let file = FileConfig::load(&args.config)?;

    let mut config = ReconcilerConfig::default();
    if let Some(secs) = args.poll_interval_secs {
        config = config.with_poll_interval(Duration::from_secs(secs));
    }
    if let Some(secs) = args.alert_interval_secs {
        config = config.with_alert_interval(Duration::from_secs(secs));
    }

    let source = StaticManifestSource::new();
    let cluster = InMemoryCluster::new();

    let poll_interval_secs = config.poll_interval.as_secs();

    let evaluator = Arc::new(AlertEvaluator::new());
    for rule_spec in file.alert_rules {
        evaluator
            .add_rule(rule_spec.build()?)
            .context("registering alert rule")?;
    }
    let mut router = NotificationRouter::new();
    router.add_channel(Arc::new(LogChannel::default()));

    let reconciler = Arc::new(
        Reconciler::new(source.clone(), cluster, config).with_alerting(evaluator, router),
    );

    for app_spec in &file.applications {
        source.set(
            app_spec.application.name.clone(),
            app_spec.revision.clone(),
            app_spec.manifests(),
        );
        reconciler
            .add_application(app_spec.application.clone())
            .context("registering application")?;
    }

    info!(
        applications = file.applications.len(),
        poll_interval_secs,
        "reconciler starting; press ctrl-c to stop"
    );

    let handle = tokio::spawn(Arc::clone(&reconciler).run());

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    info!("shutdown signal received");
    reconciler.shutdown();
    handle.await.context("joining reconciler loop")?;

    for name in reconciler.application_names() {
        if let Some(status) = reconciler.status().get(&name) {
            info!(
                app = %name,
                sync_status = %status.sync_status,
                health = %status.health,
                drift = status.drift.len(),
                "final status"
            );
        }
    }
    Ok(())
}
