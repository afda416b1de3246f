//! Middleware for the movies API.
//!
//! # Components
//!
//! - `auth` - resolves the caller's identity on every request
//! - `authorize` - activation and permission gates
//! - `fault` - converts request panics into 500 responses
//! - `http_metrics` - HTTP request metrics
//! - `rate_limit` - per-client request rate limiting

pub mod auth;
pub mod authorize;
pub mod fault;
pub mod http_metrics;
pub mod rate_limit;

pub use auth::{authenticate, AuthState, CurrentIdentity};
pub use authorize::{activated_only, permission_gate, PermissionGate};
pub use fault::fault_boundary;
pub use http_metrics::http_metrics_middleware;
pub use rate_limit::{rate_limit, ClientRateLimiter};
