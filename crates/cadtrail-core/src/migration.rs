//! One-shot legacy history migration, run in the background at startup.
//!
//! Tracking waits on the [`MigrationGate`] so that a document's chain is
//! never loaded before its legacy history has been imported.

use cadtrail_storage::{HistoryStore, MigrationReport};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Progress of the startup migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationStatus {
    Running,
    Finished(MigrationReport),
    Failed(String),
}

/// Completion signal for the startup migration.
#[derive(Clone)]
pub struct MigrationGate {
    rx: watch::Receiver<MigrationStatus>,
}

impl MigrationGate {
    /// Start migrating `legacy_dir` into `store` on the blocking pool.
    pub fn spawn(store: Arc<HistoryStore>, legacy_dir: PathBuf) -> Self {
        let (tx, rx) = watch::channel(MigrationStatus::Running);

        tokio::spawn(async move {
            let result = tokio::task::spawn_blocking(move || store.migrate_legacy(&legacy_dir)).await;
            let status = match result {
                Ok(Ok(report)) => {
                    debug!(files = report.files, failed = report.failed, "Migration gate open");
                    MigrationStatus::Finished(report)
                }
                Ok(Err(e)) => {
                    warn!(error = %e, "Legacy history migration failed");
                    MigrationStatus::Failed(e.to_string())
                }
                Err(e) => {
                    warn!(error = %e, "Legacy history migration task failed");
                    MigrationStatus::Failed(e.to_string())
                }
            };
            let _ = tx.send(status);
        });

        Self { rx }
    }

    pub fn status(&self) -> MigrationStatus {
        self.rx.borrow().clone()
    }

    /// Wait for the migration to end, successfully or not.
    pub async fn wait(&self) -> MigrationStatus {
        let mut rx = self.rx.clone();
        let ended = rx
            .wait_for(|status| !matches!(status, MigrationStatus::Running))
            .await
            .map(|status| status.clone());
        let status = match ended {
            Ok(status) => status,
            Err(_) => rx.borrow().clone(),
        };
        match status {
            MigrationStatus::Running => {
                MigrationStatus::Failed("migration task ended without a result".to_string())
            }
            other => other,
        }
    }
}
