//! Runner: the invocable unit behind every trigger
//!
//! Binds a [`Duplicator`] to a fixed [`DuplicateConfig`] and a run log.
//! Triggers call [`Runner::run`], which never fails; the HTTP trigger uses
//! [`Runner::try_run`] to get an error it can turn into a response.

use chrono::Local;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::config::{Config, DuplicateConfig};
use crate::duplicator::Duplicator;
use crate::error::{DupcastError, Result};
use crate::logging::RunLog;
use crate::sources::mastodon::MastodonSource;
use crate::sources::PostSource;
use crate::types::Outcome;

/// Runs the duplication pipeline with fixed settings
///
/// Cheap to clone; clones share the source client and the in-flight guard,
/// so at most one run executes at a time across all clones.
#[derive(Clone)]
pub struct Runner {
    duplicator: Duplicator,
    settings: DuplicateConfig,
    log: RunLog,
    in_flight: Arc<Mutex<()>>,
}

impl Runner {
    pub fn new(source: Arc<dyn PostSource>, settings: DuplicateConfig, log: RunLog) -> Self {
        Self {
            duplicator: Duplicator::new(source, log.clone()),
            settings,
            log,
            in_flight: Arc::new(Mutex::new(())),
        }
    }

    /// Build a runner backed by the configured Mastodon instance
    ///
    /// # Errors
    ///
    /// Returns an error if no access token is configured or the client
    /// cannot be created.
    pub fn from_config(config: &Config) -> Result<Self> {
        let source = MastodonSource::from_config(&config.source)?;
        Ok(Self::new(
            Arc::new(source),
            config.duplicate.clone(),
            RunLog::new(&config.log.file),
        ))
    }

    pub fn log(&self) -> &RunLog {
        &self.log
    }

    pub fn settings(&self) -> &DuplicateConfig {
        &self.settings
    }

    /// Record that the bot was created
    pub async fn init(&self) {
        let message = format!("Bot created on {}", timestamp());
        info!("{}", message);
        self.log.info(&message).await;
    }

    /// Run the pipeline once
    ///
    /// Returns `None` when the run could not happen (another run is in
    /// flight, or the pipeline task died); the cause is logged.
    pub async fn run(&self) -> Option<Vec<Outcome>> {
        match self.try_run().await {
            Ok(outcomes) => Some(outcomes),
            Err(e) => {
                error!("Run failed: {}", e);
                self.log.error(&e).await;
                None
            }
        }
    }

    /// Run the pipeline once, reporting why a run could not happen
    ///
    /// # Errors
    ///
    /// - `DupcastError::RunInProgress` if another run holds the guard
    /// - `DupcastError::Pipeline` if the pipeline task panicked
    pub async fn try_run(&self) -> Result<Vec<Outcome>> {
        let _guard = self.in_flight.try_lock().map_err(|_| {
            warn!("Skipping run: previous run still in progress");
            DupcastError::RunInProgress
        })?;

        let message = format!("Run at {}", timestamp());
        info!("{}", message);
        self.log.info(&message).await;

        let started = Instant::now();
        let duplicator = self.duplicator.clone();
        let settings = self.settings.clone();
        let outcomes = tokio::spawn(async move {
            duplicator
                .duplicate(
                    &settings.source_account,
                    &settings.target_account,
                    settings.limit,
                    settings.delay_days,
                )
                .await
        })
        .await
        .map_err(|e| DupcastError::Pipeline(format!("Duplication task failed: {}", e)))?;

        let summary = format!(
            "{} to send at {} ({} ms)",
            outcomes.len(),
            timestamp(),
            started.elapsed().as_millis()
        );
        info!("{}", summary);
        let details = serde_json::to_string_pretty(&outcomes)
            .unwrap_or_else(|e| format!("<outcomes not serializable: {}>", e));
        self.log.info(&format!("{}\n{}", summary, details)).await;

        Ok(outcomes)
    }
}

fn timestamp() -> String {
    Local::now().format("%a %b %d %Y %H:%M:%S %z").to_string()
}
