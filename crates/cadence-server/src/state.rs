use std::sync::Arc;
use std::time::Duration;

use cadence_core::materialization::{BatchOptions, MaterializationManager, MaterializationSummary};
use cadence_core::error::CoreError;
use cadence_core::repository::SqliteRepository;
use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::config::Config;

/// Shared state for axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: SqliteRepository,
    pub manager: Arc<MaterializationManager>,
    pub config: Arc<Config>,
    /// Cancelled when the server shuts down; passes run on child tokens
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(repo: SqliteRepository, config: Config) -> Self {
        let manager = MaterializationManager::new((&config.materialization).into());
        Self {
            repo,
            manager: Arc::new(manager),
            config: Arc::new(config),
            shutdown: CancellationToken::new(),
        }
    }

    /// Runs one materialization pass that is cancelled after the configured
    /// deadline or on shutdown, whichever comes first.
    pub async fn run_pass(&self, options: &BatchOptions) -> Result<MaterializationSummary, CoreError> {
        let cancel = self.shutdown.child_token();
        let deadline = Duration::from_secs(self.config.materialization.process_timeout_secs);

        let timer = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(deadline).await;
                tracing::warn!(?deadline, "materialization pass hit its deadline");
                cancel.cancel();
            })
        };

        let result = self
            .manager
            .process_all(&self.repo, Utc::now(), options, &cancel)
            .await;
        timer.abort();
        result
    }
}
