//! Per-client request rate limiting.
//!
//! Each client IP gets its own GCRA bucket: `rps` sustained requests per
//! second plus a burst allowance. A request over the limit is answered with
//! 429 before authentication runs, so a flood of bad tokens costs no store
//! lookups.
//!
//! The peer address comes from `ConnectInfo<SocketAddr>`. Requests without
//! one (in-process services in tests) share a single bucket.

use crate::config::LimiterConfig;
use crate::errors::ApiError;
use crate::observability::metrics::record_rate_limited;
use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::debug;

/// One cell replenishes every `1/rps` seconds, which is at most a second
/// for any accepted rate.
pub const RETRY_AFTER_SECONDS: u64 = 1;

/// Shared keyed limiter.
#[derive(Clone)]
pub struct ClientRateLimiter {
    limiter: Arc<DefaultKeyedRateLimiter<IpAddr>>,
}

impl ClientRateLimiter {
    pub fn new(rps: u32, burst: u32) -> Self {
        let rps = NonZeroU32::new(rps).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(burst).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::per_second(rps).allow_burst(burst);

        Self {
            limiter: Arc::new(RateLimiter::keyed(quota)),
        }
    }

    /// `None` when limiting is switched off.
    pub fn from_config(config: &LimiterConfig) -> Option<Self> {
        config
            .enabled
            .then(|| Self::new(config.rps, config.burst))
    }

    /// Take one cell from `client`'s bucket.
    pub fn check(&self, client: IpAddr) -> Result<(), ApiError> {
        self.limiter
            .check_key(&client)
            .map_err(|_| ApiError::RateLimitExceeded {
                retry_after_seconds: RETRY_AFTER_SECONDS,
            })
    }

    /// Forget clients whose buckets have refilled. Returns the number of
    /// clients still tracked.
    pub fn prune(&self) -> usize {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
        self.limiter.len()
    }
}

fn client_ip(request: &Request) -> IpAddr {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

/// Rate limiting middleware.
pub async fn rate_limit(
    State(limiter): State<ClientRateLimiter>,
    request: Request,
    next: Next,
) -> Response {
    let client = client_ip(&request);

    match limiter.check(client) {
        Ok(()) => next.run(request).await,
        Err(e) => {
            record_rate_limited();
            debug!(target: "movies.rate_limit", client = %client, "Request rate limited");
            e.into_response()
        }
    }
}
