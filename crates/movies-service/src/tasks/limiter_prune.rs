//! Rate limiter housekeeping.
//!
//! Every client IP the limiter has seen keeps an entry until it is pruned.
//! This task drops entries whose buckets have refilled, so the table tracks
//! recent clients only.

use crate::middleware::ClientRateLimiter;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

/// Interval between prunes.
pub const LIMITER_PRUNE_INTERVAL: Duration = Duration::from_secs(180);

/// Start the prune loop. Returns once `cancel_token` is cancelled.
#[instrument(skip_all, name = "movies.task.limiter_prune")]
pub async fn start_limiter_prune(
    limiter: ClientRateLimiter,
    interval: Duration,
    cancel_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let tracked = limiter.prune();
                debug!(
                    target: "movies.task.limiter_prune",
                    tracked_clients = tracked,
                    "Pruned rate limiter"
                );
            }
            _ = cancel_token.cancelled() => {
                info!(
                    target: "movies.task.limiter_prune",
                    "Limiter prune task received shutdown signal, exiting"
                );
                break;
            }
        }
    }
}
