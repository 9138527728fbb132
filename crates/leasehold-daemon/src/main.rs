//! leasehold daemon - named lock service
//!
//! This binary serves the lock API and runs the background tasks:
//! - HTTP API over the lock service
//! - Periodic expiry reaper
//! - Audit worker persisting lock events
//! - Graceful shutdown on SIGTERM/SIGINT
//!
//! # Architecture
//!
//! Startup opens the SQLite store, wires a single `ServiceContext`, and
//! spawns the three long-lived tasks. SIGTERM or SIGINT cancels the server
//! and reaper; open connections finish their in-flight requests, and only
//! then is the audit worker stopped, draining its queue before the pool
//! closes.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use leasehold_audit::{channel, WorkerSettings};
use leasehold_core::config::{Config, LoggingConfig};
use leasehold_core::ports::{IAuditRepository, IEventSink, ILockRepository};
use leasehold_server::{ApiServer, ApiSettings, LockMetrics, Reaper, ServiceContext};
use leasehold_store::{DatabasePool, SqliteLockRepository};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Command-line arguments
#[derive(Debug, Parser)]
#[command(name = "leaseholdd", version, about = "leasehold lock service daemon")]
struct Args {
    /// Path to configuration file (defaults to the platform config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

// ============================================================================
// Configuration and logging
// ============================================================================

/// Loads the configuration, applies `DB_PATH`, and rejects invalid values
fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::load_or_default(&Config::default_path()),
    };
    let config = config.with_env_overrides();

    let errors = config.validate();
    if !errors.is_empty() {
        let listed: Vec<String> = errors.iter().map(ToString::to_string).collect();
        anyhow::bail!("Invalid configuration: {}", listed.join("; "));
    }
    Ok(config)
}

/// `RUST_LOG` overrides the configured level
fn init_tracing(logging: &LoggingConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true);

    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

// ============================================================================
// DaemonService
// ============================================================================

/// Owns the store and the shutdown token for the lifetime of the process
struct DaemonService {
    config: Config,
    pool: DatabasePool,
    shutdown: CancellationToken,
}

impl DaemonService {
    /// Opens the database
    async fn new(config: Config, shutdown: CancellationToken) -> Result<Self> {
        let pool = DatabasePool::new(&config.storage.path)
            .await
            .with_context(|| {
                format!("Failed to open database at {}", config.storage.path.display())
            })?;

        Ok(Self {
            config,
            pool,
            shutdown,
        })
    }

    /// Runs until the shutdown token is cancelled
    async fn run(self) -> Result<()> {
        let repo = Arc::new(SqliteLockRepository::new(self.pool.pool().clone()));
        let metrics = Arc::new(LockMetrics::new().context("Failed to create metrics registry")?);

        let (queue, worker) = channel(
            Arc::clone(&repo) as Arc<dyn IAuditRepository>,
            WorkerSettings::from(&self.config.audit),
        );

        let settings =
            ApiSettings::from_config(&self.config).context("Invalid server.default_ttl")?;
        let ctx = Arc::new(ServiceContext::new(
            Arc::clone(&repo) as Arc<dyn ILockRepository>,
            repo as Arc<dyn IAuditRepository>,
            Arc::new(queue) as Arc<dyn IEventSink>,
            metrics,
            settings,
        ));

        // Bind before spawning anything so a busy port fails fast
        let server = ApiServer::bind(Arc::clone(&ctx), &self.config.server.listen)
            .await
            .with_context(|| format!("Failed to bind {}", self.config.server.listen))?;

        // The worker stops last, on its own token, so events produced while
        // connections drain are still persisted
        let worker_shutdown = CancellationToken::new();
        let worker_handle = tokio::spawn(worker.run(worker_shutdown.clone()));
        let reaper = Reaper::new(
            Arc::clone(&ctx),
            Duration::from_secs(self.config.reaper.interval_secs),
        );
        let reaper_handle = tokio::spawn(reaper.run(self.shutdown.clone()));

        info!(addr = %server.local_addr(), "leasehold ready");
        let server_result = server.run(self.shutdown.clone()).await;

        // The server only returns on shutdown or a fatal error
        self.shutdown.cancel();

        if let Err(e) = reaper_handle.await {
            warn!(error = %e, "Reaper task failed");
        }

        worker_shutdown.cancel();
        match worker_handle.await {
            Ok(stats) => info!(
                persisted = stats.persisted,
                dropped = stats.dropped,
                trimmed = stats.trimmed,
                halted = stats.halted,
                "Audit worker finished"
            ),
            Err(e) => warn!(error = %e, "Audit worker task failed"),
        }

        self.pool.close().await;
        server_result
    }
}

// ============================================================================
// Graceful shutdown signal handler
// ============================================================================

/// Waits for SIGTERM or SIGINT and triggers the cancellation token
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }

    token.cancel();
}

// ============================================================================
// Main entry point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;

    init_tracing(&config.logging);

    info!(
        db = %config.storage.path.display(),
        listen = %config.server.listen,
        "leasehold daemon starting (leaseholdd)"
    );

    let shutdown_token = CancellationToken::new();

    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        shutdown_signal(signal_token).await;
    });

    let service = DaemonService::new(config, shutdown_token).await?;
    let result = service.run().await;

    match &result {
        Ok(()) => info!("leasehold daemon shut down gracefully"),
        Err(e) => error!(error = %e, "leasehold daemon exiting with error"),
    }

    result
}

// ============================================================================
// Tests
// ============================================================================
