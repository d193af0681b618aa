//! Gaterelay - Entry Point
//!
//! Calibrates the gate pool, then serves the relay listener with graceful shutdown support.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use gaterelay::config::{Config, LogConfig};
use gaterelay::loader::{load_gate_list, load_user_agents};
use gaterelay::relay::{
    AdaptiveSelector, Calibrator, CalibratorConfig, Dispatcher, DispatcherConfig, GatePool,
    RelayHandler, RelayServer, RetryController,
};
use gaterelay::services::{StatusReporter, StatusReporterHandle};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("failed to load configuration")?;
    init_tracing(&config.log);

    info!("Starting Gaterelay");

    let candidates = load_gate_list(&config.gates.list_file)
        .await
        .with_context(|| format!("failed to read gate list {}", config.gates.list_file))?;
    let user_agents = load_user_agents(&config.gates.user_agent_file)
        .await
        .with_context(|| format!("failed to read user agents {}", config.gates.user_agent_file))?;
    info!(
        "Loaded {} candidate gates and {} user agents",
        candidates.len(),
        user_agents.len()
    );

    // Calibrate before accepting traffic; no working gates means nothing to serve with.
    let pool = Arc::new(GatePool::new());
    let calibrator = Calibrator::new(CalibratorConfig {
        probe_url: config.gates.probe_url.clone(),
        calibration_timeout: config.gates.calibration_timeout(),
        request_timeout: config.gates.request_timeout(),
    });
    let working = calibrator
        .calibrate_pool(&pool, &candidates)
        .await
        .context("gate calibration failed")?;
    info!("{} of {} gates ready", working, candidates.len());

    let dispatcher = Dispatcher::new(
        pool.clone(),
        AdaptiveSelector::new(config.gates.explore_bias),
        DispatcherConfig {
            fan_out: config.gates.fan_out,
            request_timeout: config.gates.request_timeout(),
            user_agents: Arc::new(user_agents),
        },
    );
    let retry = RetryController::new(dispatcher, config.gates.max_retries);
    let handler = Arc::new(RelayHandler::new(pool.clone(), retry));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Start status reporter
    let (status_handle, status_shutdown) = StatusReporterHandle::new();
    let status_task = if config.status.interval > 0 {
        let reporter = StatusReporter::new(pool.clone(), Duration::from_secs(config.status.interval));
        Some(tokio::spawn(async move {
            reporter.run(status_shutdown).await;
        }))
    } else {
        info!("Status reporting disabled");
        None
    };

    let server = RelayServer::new(config.server.clone(), handler);
    let server_task = tokio::spawn(async move {
        if let Err(e) = server.run(shutdown_rx).await {
            error!("Relay server error: {}", e);
        }
    });

    info!("Relay started on {}", config.server_addr());

    // Wait for shutdown signal
    shutdown_signal().await;
    info!("Shutdown signal received");

    let _ = shutdown_tx.send(true);
    status_handle.shutdown();

    let _ = server_task.await;
    if let Some(task) = status_task {
        let _ = task.await;
    }

    info!("Gaterelay stopped");
    Ok(())
}

/// Initialize tracing; `RUST_LOG` wins over the configured level
fn init_tracing(log: &LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("gaterelay={}", log.level).into());

    let registry = tracing_subscriber::registry().with(filter);
    if log.format.eq_ignore_ascii_case("json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
