//! Background pruning of rows past the configured retention.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use tokio::sync::Mutex;

use crate::config;
use crate::db::Store;

/// How often the pruner wakes up. Retention is measured in days, so an
/// hourly pass keeps the tables within a sliver of the configured window.
const PRUNE_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Deletes samples and events older than `logging.database_retention_days`.
///
/// The configuration is reloaded on every pass, so an operator's retention
/// change takes effect without a restart.
pub struct RetentionManager {
    store: Store,
    config_path: PathBuf,
    stop: Arc<Mutex<Option<tokio::sync::broadcast::Sender<()>>>>,
}

impl RetentionManager {
    pub fn new(store: Store, config_path: PathBuf) -> Self {
        Self {
            store,
            config_path,
            stop: Arc::new(Mutex::new(None)),
        }
    }

    /// Start the background task. The first pass runs immediately.
    pub fn start(&self) {
        let store = self.store.clone();
        let config_path = self.config_path.clone();
        let stop = self.stop.clone();

        tokio::spawn(async move {
            let (tx, _) = tokio::sync::broadcast::channel(1);
            {
                let mut stop_guard = stop.lock().await;
                *stop_guard = Some(tx.clone());
            }

            let mut rx = tx.subscribe();
            let mut interval = tokio::time::interval(PRUNE_INTERVAL);

            loop {
                tokio::select! {
                    _ = rx.recv() => break,
                    _ = interval.tick() => {
                        prune_expired(&store, &config_path);
                    }
                }
            }
        });
    }

    /// Stop the background task.
    pub async fn stop(&self) {
        let stop = self.stop.lock().await;
        if let Some(tx) = stop.as_ref() {
            let _ = tx.send(());
        }
    }
}

fn prune_expired(store: &Store, config_path: &Path) {
    let retention_days = config::load(config_path)
        .logging
        .database_retention_days
        .clamp(1, 3650);
    let cutoff = Utc::now() - ChronoDuration::days(retention_days);

    match store.prune(cutoff) {
        Ok(outcome) if outcome.total() > 0 => {
            let remaining = store.count_samples().unwrap_or(-1);
            tracing::info!(
                samples = outcome.samples_deleted,
                events = outcome.events_deleted,
                retention_days,
                remaining_samples = remaining,
                "pruned expired rows"
            );
        }
        Ok(_) => {}
        Err(e) => {
            tracing::error!("retention: failed to prune: {}", e);
        }
    }
}
