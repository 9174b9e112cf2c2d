use std::time::Duration;

use anyhow::{Context, Result};
use cadence_core::materialization::BatchOptions;
use tokio::net::TcpListener;
use tokio::signal::ctrl_c;
#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::routes;
use crate::state::AppState;

/// Serves the HTTP API until ctrl-c or SIGTERM, then closes the pool.
pub async fn serve(state: AppState) -> Result<()> {
    let address = state.config.bind_address();
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {}", address))?;
    info!(%address, "listening");

    let background = state
        .config
        .materialization
        .auto_process_interval_secs
        .filter(|secs| *secs > 0)
        .map(|secs| spawn_auto_process(state.clone(), Duration::from_secs(secs)));

    let shutdown = state.shutdown.clone();
    let pool = state.repo.pool().clone();

    axum::serve(listener, routes::router(state))
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            shutdown.cancel();
        })
        .await
        .context("server error")?;

    if let Some(handle) = background {
        if let Err(e) = handle.await {
            warn!(error = %e, "auto-process loop ended abnormally");
        }
    }

    pool.close().await;
    info!("server stopped");
    Ok(())
}

/// Runs a full materialization pass every `period` until shutdown.
fn spawn_auto_process(state: AppState, period: Duration) -> JoinHandle<()> {
    info!(?period, "auto-processing enabled");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = state.shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match state.run_pass(&BatchOptions::default()).await {
                Ok(summary) if !summary.errors.is_empty() => warn!(
                    tasks_created = summary.tasks_created,
                    errors = summary.errors.len(),
                    "auto-process pass finished with errors"
                ),
                Ok(_) => {}
                Err(e) => warn!(error = %e, "auto-process pass failed"),
            }
        }
        info!("auto-process loop stopped");
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
        info!("received ctrl-c, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("received terminate signal, shutting down");
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
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
