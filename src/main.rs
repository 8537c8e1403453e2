//! plantwatch - plant machine monitoring service
//!
//! Polls machine consumption readings, detects stops and consumption
//! anomalies, and sends deduplicated alerts.
//!
//! # Usage
//!
//! ```bash
//! # Synthetic demo data, default config
//! cargo run --release
//!
//! # Plant energy export
//! ./plantwatch --csv /data/energy_export.csv
//!
//! # Explicit config, JSON logs, monitors started manually via the API
//! ./plantwatch --config /etc/plantwatch/plantwatch.toml --log-json --no-autostart
//! ```
//!
//! # Environment Variables
//!
//! - `PLANTWATCH_CONFIG`: Path to the TOML config
//! - `PLANTWATCH_ADDR`: HTTP bind address override
//! - `PLANTWATCH_CSV`: CSV export path override
//! - `PLANTWATCH_CORS_ORIGINS`: Comma-separated allowed CORS origins
//! - `RUST_LOG`: Logging level (default: info)

use anyhow::{Context, Result};
use axum::Router;
use chrono::Utc;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use plantwatch::alerts::{LogNotifier, Notifier, WebhookNotifier};
use plantwatch::api::{create_app, ApiState};
use plantwatch::config::{defaults, PlantConfig, ScorerKind};
use plantwatch::engine::DetectionEngine;
use plantwatch::monitoring::{MonitorKind, MonitoringScheduler};
use plantwatch::scoring::{AnomalyScorer, ModelRegistry, ModelScorer, ThresholdScorer};
use plantwatch::store::{synthetic, CsvStore, MemoryStore, ReadingStore};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "plantwatch")]
#[command(about = "Machine stop and consumption anomaly monitoring")]
#[command(version)]
struct CliArgs {
    /// Path to plantwatch.toml (default: $PLANTWATCH_CONFIG, then ./plantwatch.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Override the server address (default: "0.0.0.0:5000")
    #[arg(short, long, env = "PLANTWATCH_ADDR")]
    addr: Option<String>,

    /// Path to the plant's wide CSV energy export
    #[arg(long, env = "PLANTWATCH_CSV")]
    csv: Option<PathBuf>,

    /// Hours of synthetic data to generate when no CSV is configured
    #[arg(long, default_value = "48")]
    demo_hours: u64,

    /// Do not start the monitors at boot (start them via the API)
    #[arg(long)]
    no_autostart: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

// ============================================================================
// Task Names for Supervisor Logging
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum TaskName {
    HttpServer,
}

impl std::fmt::Display for TaskName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskName::HttpServer => write!(f, "HttpServer"),
        }
    }
}

// ============================================================================
// Component Wiring
// ============================================================================

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

/// CSV export when one is configured, otherwise synthetic demo data.
fn build_store(config: &PlantConfig, csv_override: Option<PathBuf>, demo_hours: u64) -> Arc<dyn ReadingStore> {
    if let Some(path) = csv_override.or_else(|| config.store.csv_path.clone()) {
        info!("📂 Input: CSV export {}", path.display());
        return Arc::new(CsvStore::new(path));
    }

    let machines: Vec<String> = if config.machines().is_empty() {
        defaults::DEFAULT_MACHINES.iter().map(|s| s.to_string()).collect()
    } else {
        config.machines().to_vec()
    };
    let readings = synthetic::demo_readings(&machines, demo_hours, Utc::now());
    info!(
        "📥 Input: synthetic demo data ({} readings, {} machines, {}h)",
        readings.len(),
        machines.len(),
        demo_hours
    );
    Arc::new(MemoryStore::new(readings))
}

/// Scorer selected by `[anomaly] scorer`. A model directory that cannot be
/// loaded falls back to threshold scoring.
fn build_scorer(config: &PlantConfig) -> Arc<dyn AnomalyScorer> {
    let threshold = || -> Arc<dyn AnomalyScorer> {
        Arc::new(ThresholdScorer::from_config(
            &config.anomaly,
            config.classifier.running_threshold,
        ))
    };

    match config.anomaly.scorer {
        ScorerKind::Threshold => threshold(),
        ScorerKind::Model => match ModelRegistry::load_dir(&config.anomaly.models_dir) {
            Ok(registry) => {
                info!("🧠 Scorer: envelope models ({} machines)", registry.len());
                Arc::new(ModelScorer::new(registry, config.anomaly.min_valid_points))
            }
            Err(e) => {
                warn!(error = %e, "Model registry unavailable, falling back to threshold scoring");
                threshold()
            }
        },
    }
}

fn build_notifier(config: &PlantConfig) -> Result<Arc<dyn Notifier>> {
    match &config.notify.webhook_url {
        Some(url) => {
            let notifier = WebhookNotifier::new(url, config.notify.timeout_secs)
                .context("Failed to build webhook notifier")?;
            info!("📨 Alerts: webhook {}", url);
            Ok(Arc::new(notifier))
        }
        None => {
            info!("📨 Alerts: log only (no [notify] webhook_url)");
            Ok(Arc::new(LogNotifier))
        }
    }
}

// ============================================================================
// Tasks
// ============================================================================

/// Spawn the HTTP server task into the JoinSet.
fn spawn_http_server(
    task_set: &mut JoinSet<Result<TaskName>>,
    listener: tokio::net::TcpListener,
    app: Router,
    cancel_token: CancellationToken,
) {
    task_set.spawn(async move {
        info!("[HttpServer] Task starting");

        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                cancel_token.cancelled().await;
                info!("[HttpServer] Received shutdown signal");
            })
            .await;

        match result {
            Ok(()) => {
                info!("[HttpServer] Graceful shutdown complete");
                Ok(TaskName::HttpServer)
            }
            Err(e) => {
                error!("[HttpServer] Server error: {}", e);
                Err(anyhow::anyhow!("HTTP server error: {}", e))
            }
        }
    });
}

/// Run the supervisor loop: monitor tasks, cancel on failure.
async fn run_supervisor(
    task_set: &mut JoinSet<Result<TaskName>>,
    cancel_token: CancellationToken,
) -> Result<()> {
    info!("🔒 Supervisor: All tasks spawned, monitoring...");

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                info!("🛑 Supervisor: Shutdown signal received");
                break;
            }
            result = task_set.join_next() => {
                match result {
                    Some(Ok(Ok(task_name))) => {
                        info!("🔒 Supervisor: Task {} completed normally", task_name);
                    }
                    Some(Ok(Err(e))) => {
                        error!("🔒 Supervisor: Task failed with error: {}", e);
                        cancel_token.cancel();
                        return Err(e);
                    }
                    Some(Err(e)) => {
                        error!("🔒 Supervisor: Task panicked: {}", e);
                        cancel_token.cancel();
                        return Err(anyhow::anyhow!("Task panicked: {}", e));
                    }
                    None => {
                        info!("🔒 Supervisor: All tasks completed");
                        break;
                    }
                }
            }
        }
    }

    // Let the HTTP server finish its graceful shutdown.
    while let Some(result) = task_set.join_next().await {
        if let Ok(Ok(task_name)) = result {
            info!("🔒 Supervisor: Task {} drained", task_name);
        }
    }

    Ok(())
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    init_tracing(args.log_json);

    let config = Arc::new(PlantConfig::load(args.config.as_deref()).context("Failed to load plant config")?);
    let server_addr = args.addr.clone().unwrap_or_else(|| config.server.addr.clone());

    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("  plantwatch - Machine Monitoring");
    info!("  Plant: {} | Machines: {}", config.plant.name, config.machines().len());
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let store = build_store(&config, args.csv.clone(), args.demo_hours);
    let scorer = build_scorer(&config);
    let notifier = build_notifier(&config)?;

    let engine = Arc::new(DetectionEngine::new(Arc::clone(&config), store, scorer, notifier));

    // Graceful shutdown via Ctrl+C
    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("🛑 Received Ctrl+C, initiating shutdown...");
        shutdown_token.cancel();
    });

    let scheduler = Arc::new(MonitoringScheduler::new(
        Arc::clone(&engine) as Arc<dyn plantwatch::CycleRunner>,
        cancel_token.clone(),
    ));

    let listener = tokio::net::TcpListener::bind(&server_addr)
        .await
        .with_context(|| format!("Failed to bind {server_addr}"))?;
    info!("🌐 API listening on http://{}/api/v1", server_addr);

    let app = create_app(ApiState {
        engine: Arc::clone(&engine),
        scheduler: Arc::clone(&scheduler),
    });

    let mut task_set: JoinSet<Result<TaskName>> = JoinSet::new();
    spawn_http_server(&mut task_set, listener, app, cancel_token.clone());

    if config.monitoring.autostart && !args.no_autostart {
        scheduler.start(MonitorKind::Stop, config.monitoring.stop_interval());
        scheduler.start(MonitorKind::Anomaly, config.monitoring.anomaly_interval());
    } else {
        info!("Monitors not autostarted; use POST /api/v1/monitoring/<kind>/start");
    }

    let outcome = run_supervisor(&mut task_set, cancel_token.clone()).await;

    cancel_token.cancel();
    scheduler.shutdown().await;

    info!("✓ plantwatch shutdown complete");
    outcome
}
