use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{debug, error, info, instrument};

use super::registry::RoomRegistry;

/// Configuration for the cleanup task
#[derive(Debug, Clone)]
pub struct CleanupConfig {
    /// How often to sweep for expired rooms
    pub sweep_interval: Duration,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(30 * 60), // 30 minutes
        }
    }
}

/// Starts the background task that periodically removes expired rooms.
#[instrument(skip(registry))]
pub async fn start_cleanup_task(registry: Arc<RoomRegistry>, config: CleanupConfig) {
    info!(
        sweep_interval_secs = config.sweep_interval.as_secs(),
        "Starting room cleanup background task"
    );

    let mut sweep = interval(config.sweep_interval);

    loop {
        sweep.tick().await;

        match registry.remove_expired_rooms().await {
            Ok(removed) if removed.is_empty() => {
                debug!("No expired rooms to clean up");
            }
            Ok(removed) => {
                info!(count = removed.len(), "Room cleanup completed");
            }
            Err(e) => {
                error!(error = %e, "Room cleanup task failed");
            }
        }
    }
}
