//! queuescaled — the Queuescale daemon.
//!
//! Single binary that wires the scaling loop to its collaborators:
//! - Kubernetes API (deployment replicas, worker pods)
//! - Broker management API (queue backlog)
//! - Worker inspection endpoint (in-flight tasks)
//!
//! Configuration comes from the environment, optionally layered over a TOML
//! file. The loop runs until SIGTERM or SIGINT.
//!
//! # Usage
//!
//! ```text
//! DEPLOYMENT_NAME=exam-worker QUEUE_NAME=evaluation queuescaled --log-format json
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use queuescale_autoscale::ControlLoop;
use queuescale_broker::{InspectClient, ManagementClient};
use queuescale_cluster::{resolve_namespace, KubeOrchestrator};
use queuescale_core::ScalerConfig;

const DEFAULT_LOG_FILTER: &str = "info,queuescale=debug,queuescaled=debug";

#[derive(Parser, Debug)]
#[command(name = "queuescaled", about = "Queue-driven worker autoscaler")]
struct Cli {
    /// TOML file with configuration keys. Environment variables win.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Namespace of the worker deployment. Defaults to the namespace this
    /// pod runs in.
    #[arg(long)]
    namespace: Option<String>,

    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = format!("{e:#}"), "queuescaled failed to start");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = ScalerConfig::load(cli.config.as_deref()).context("invalid configuration")?;

    info!(
        deployment = %config.deployment_name,
        queue = %config.queue_name,
        threshold = config.threshold,
        min_replicas = config.min_replicas,
        max_replicas = config.max_replicas,
        check_interval_secs = config.check_interval.as_secs(),
        scale_up_cooldown_secs = config.scale_up_cooldown.as_secs(),
        scale_down_cooldown_secs = config.scale_down_cooldown.as_secs(),
        broker = %config.broker.address(),
        inspect_url = %config.inspect.url,
        removal_order = %config.removal_order,
        "queuescaled starting"
    );

    // ── Collaborators ──────────────────────────────────────────

    let namespace = cli.namespace.unwrap_or_else(resolve_namespace);
    let orchestrator = KubeOrchestrator::connect(&namespace)
        .await
        .context("failed to create Kubernetes client")?;
    info!(%namespace, "kubernetes client initialized");

    let broker = ManagementClient::new(&config.broker);
    let inspector = InspectClient::new(&config.inspect);

    let mut control = ControlLoop::new(
        config,
        Arc::new(orchestrator),
        Arc::new(broker),
        Arc::new(inspector),
    )
    .context("invalid configuration")?;

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut sigterm =
        signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("failed to install SIGINT handler")?;

    tokio::spawn(async move {
        let name = tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        };
        info!(signal = name, "shutdown signal received, finishing current tick");
        let _ = shutdown_tx.send(true);
    });

    control.run(shutdown_rx).await;

    info!("queuescaled stopped");
    Ok(())
}
