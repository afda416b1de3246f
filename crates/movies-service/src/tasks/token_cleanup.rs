//! Expired token purge background task.
//!
//! Expired tokens are already inert; this task only keeps the table small.
//!
//! # Graceful Shutdown
//!
//! The task exits when its cancellation token is cancelled. A purge that is
//! already running finishes first.

use crate::repositories::Store;
use crate::services::token_service;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

/// Start the token cleanup loop. Returns once `cancel_token` is cancelled.
#[instrument(skip_all, name = "movies.task.token_cleanup")]
pub async fn start_token_cleanup(
    store: Store,
    interval_seconds: u64,
    cancel_token: CancellationToken,
) {
    info!(
        target: "movies.task.token_cleanup",
        interval_seconds = interval_seconds,
        "Starting token cleanup task"
    );

    let mut interval = tokio::time::interval(Duration::from_secs(interval_seconds));

    loop {
        tokio::select! {
            _ = interval.tick() => {
                run_cleanup(&store).await;
            }
            _ = cancel_token.cancelled() => {
                info!(
                    target: "movies.task.token_cleanup",
                    "Token cleanup task received shutdown signal, exiting"
                );
                break;
            }
        }
    }

    info!(target: "movies.task.token_cleanup", "Token cleanup task stopped");
}

/// Run a single purge.
pub(crate) async fn run_cleanup(store: &Store) {
    match token_service::purge_expired(store).await {
        Ok(count) => {
            if count > 0 {
                info!(
                    target: "movies.task.token_cleanup",
                    purged_count = count,
                    "Purged expired tokens"
                );
            }
        }
        Err(e) => {
            tracing::error!(
                target: "movies.task.token_cleanup",
                error = %e,
                "Failed to purge expired tokens"
            );
        }
    }
}
