use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{error, info, instrument};

use super::service::SessionService;

/// Configuration for the session cleanup task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanupConfig {
    /// How often to run the cleanup task
    pub cleanup_interval: Duration,
    /// How long an ended session is kept before deletion
    pub retention: Duration,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            cleanup_interval: Duration::from_secs(5 * 60),
            retention: Duration::from_secs(60 * 60),
        }
    }
}

/// Periodically deletes ended sessions along with their locks, mirrors and channels
#[instrument(skip(sessions))]
pub async fn start_cleanup_task(sessions: Arc<SessionService>, config: CleanupConfig) {
    info!(
        cleanup_interval_secs = config.cleanup_interval.as_secs(),
        retention_secs = config.retention.as_secs(),
        "Starting session cleanup background task"
    );

    let retention = match chrono::Duration::from_std(config.retention) {
        Ok(retention) => retention,
        Err(e) => {
            error!(error = %e, "Session retention out of range, cleanup disabled");
            return;
        }
    };
    let mut cleanup_interval = interval(config.cleanup_interval);

    loop {
        cleanup_interval.tick().await;

        match sessions.sweep_ended_sessions(retention).await {
            Ok(deleted_count) => {
                info!(deleted_count, "Session cleanup completed");
            }
            Err(e) => {
                error!(error = %e, "Session cleanup task failed");
            }
        }
    }
}
