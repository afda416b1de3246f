//! Metrics definitions for the movies API.
//!
//! All metrics follow Prometheus naming conventions:
//! - `movies_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `method`: the standard HTTP methods, everything else is `OTHER`
//! - `endpoint`: the fixed route table, everything else is `/other`
//! - `scope`: activation, authentication
//! - `gate`: activation, permission
//! - `outcome`: bounded by code at each call site
//! - `task`: names passed to the background supervisor
//! - `operation`: store operation names

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize Prometheus metrics recorder and return the handle
/// for serving metrics via HTTP.
///
/// # Errors
///
/// Returns error if Prometheus recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("movies_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.150, 0.200, 0.300, 0.500, 1.000, 2.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        // bcrypt at cost 12 sits around 100-300ms
        .set_buckets_for_metric(
            Matcher::Prefix("movies_credential_operation".to_string()),
            &[0.025, 0.050, 0.100, 0.200, 0.300, 0.500, 1.000, 2.000],
        )
        .map_err(|e| format!("Failed to set credential operation buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion
///
/// Metric: `movies_http_requests_total`, `movies_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status`
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);
    let method = normalize_method(method);

    histogram!("movies_http_request_duration_seconds",
        "method" => method,
        "endpoint" => normalized_endpoint.clone(),
        "status" => status.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("movies_http_requests_total",
        "method" => method,
        "endpoint" => normalized_endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

/// Clients can send arbitrary extension methods; only the standard set
/// becomes its own label value.
fn normalize_method(method: &str) -> &'static str {
    match method {
        "GET" => "GET",
        "HEAD" => "HEAD",
        "POST" => "POST",
        "PUT" => "PUT",
        "PATCH" => "PATCH",
        "DELETE" => "DELETE",
        "OPTIONS" => "OPTIONS",
        "CONNECT" => "CONNECT",
        "TRACE" => "TRACE",
        _ => "OTHER",
    }
}

/// Normalize endpoint path to prevent label cardinality explosion
fn normalize_endpoint(path: &str) -> String {
    match path {
        "/health" | "/ready" | "/metrics" | "/v1/users" | "/v1/users/activated"
        | "/v1/users/authentication" | "/v1/users/me" | "/v1/movies" => path.to_string(),
        _ => normalize_dynamic_endpoint(path),
    }
}

fn normalize_dynamic_endpoint(path: &str) -> String {
    if let Some(id) = path.strip_prefix("/v1/movies/") {
        if !id.is_empty() && !id.contains('/') {
            return "/v1/movies/{id}".to_string();
        }
    }

    "/other".to_string()
}

/// Record a request turned away by the per-client rate limiter.
///
/// Metric: `movies_rate_limited_total`
pub fn record_rate_limited() {
    counter!("movies_rate_limited_total").increment(1);
}

// ============================================================================
// Token Metrics
// ============================================================================

/// Metric: `movies_tokens_issued_total`
/// Labels: `scope`
pub fn record_token_issued(scope: &str) {
    counter!("movies_tokens_issued_total",
        "scope" => scope.to_string()
    )
    .increment(1);
}

/// Metric: `movies_token_validations_total`
/// Labels: `scope`, `outcome` (valid, not_found, error)
pub fn record_token_validation(scope: &str, outcome: &str) {
    counter!("movies_token_validations_total",
        "scope" => scope.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Metric: `movies_tokens_purged_total`
pub fn record_tokens_purged(count: u64) {
    counter!("movies_tokens_purged_total").increment(count);
}

// ============================================================================
// Credential Metrics
// ============================================================================

/// Record a bcrypt hash or verify.
///
/// Metric: `movies_credential_operation_duration_seconds`
/// Labels: `operation` (hash, verify)
pub fn record_credential_operation(operation: &str, duration: Duration) {
    histogram!("movies_credential_operation_duration_seconds",
        "operation" => operation.to_string()
    )
    .record(duration.as_secs_f64());
}

// ============================================================================
// Authorization Metrics
// ============================================================================

/// Metric: `movies_authorization_decisions_total`
/// Labels: `gate`, `outcome` (allowed, unauthenticated, not_activated, forbidden, error)
pub fn record_authorization_decision(gate: &str, outcome: &str) {
    counter!("movies_authorization_decisions_total",
        "gate" => gate.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

// ============================================================================
// Store Metrics
// ============================================================================

/// Metric: `movies_edit_conflicts_total`
/// Labels: `resource`
pub fn record_edit_conflict(resource: &str) {
    counter!("movies_edit_conflicts_total",
        "resource" => resource.to_string()
    )
    .increment(1);
}

/// Metric: `movies_store_timeouts_total`
/// Labels: `operation`
pub fn record_store_timeout(operation: &str) {
    counter!("movies_store_timeouts_total",
        "operation" => operation.to_string()
    )
    .increment(1);
}

// ============================================================================
// Background Task Metrics
// ============================================================================

/// Metric: `movies_background_tasks_total`
/// Labels: `task`, `outcome` (success, error, panic, cancelled)
pub fn record_background_task(task: &str, outcome: &str) {
    counter!("movies_background_tasks_total",
        "task" => task.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Metric: `movies_background_tasks_in_flight`
pub fn set_background_tasks_in_flight(count: usize) {
    gauge!("movies_background_tasks_in_flight").set(count as f64);
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use metrics_util::debugging::{DebugValue, DebuggingRecorder};

    #[test]
    fn test_record_http_request() {
        record_http_request("GET", "/health", 200, Duration::from_millis(5));
        record_http_request("POST", "/v1/users", 201, Duration::from_millis(250));
        record_http_request("PATCH", "/v1/movies/42", 409, Duration::from_millis(20));
        record_http_request("GET", "/v1/movies/42", 504, Duration::from_secs(30));
    }

    #[test]
    fn test_categorize_status_code() {
        assert_eq!(categorize_status_code(200), "success");
        assert_eq!(categorize_status_code(201), "success");
        assert_eq!(categorize_status_code(408), "timeout");
        assert_eq!(categorize_status_code(504), "timeout");
        assert_eq!(categorize_status_code(401), "error");
        assert_eq!(categorize_status_code(409), "error");
        assert_eq!(categorize_status_code(500), "error");
    }

    #[test]
    fn test_normalize_method_buckets_extension_methods() {
        assert_eq!(normalize_method("GET"), "GET");
        assert_eq!(normalize_method("PATCH"), "PATCH");
        assert_eq!(normalize_method("PROPFIND"), "OTHER");
        assert_eq!(normalize_method("X-RANDOM-1234"), "OTHER");
        assert_eq!(normalize_method("get"), "OTHER");
    }

    #[test]
    fn test_extension_methods_share_one_label() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            record_http_request("FOO1", "/health", 405, Duration::from_millis(1));
            record_http_request("FOO2", "/health", 405, Duration::from_millis(1));
        });

        let entries = snapshotter.snapshot().into_vec();
        let methods: Vec<String> = entries
            .iter()
            .filter(|(key, _, _, _)| key.key().name() == "movies_http_requests_total")
            .flat_map(|(key, _, _, _)| {
                key.key()
                    .labels()
                    .filter(|l| l.key() == "method")
                    .map(|l| l.value().to_string())
                    .collect::<Vec<_>>()
            })
            .collect();

        assert_eq!(methods, vec!["OTHER".to_string()]);
    }

    #[test]
    fn test_normalize_endpoint_known_paths() {
        for path in [
            "/health",
            "/ready",
            "/metrics",
            "/v1/users",
            "/v1/users/activated",
            "/v1/users/authentication",
            "/v1/users/me",
            "/v1/movies",
        ] {
            assert_eq!(normalize_endpoint(path), path);
        }
    }

    #[test]
    fn test_normalize_endpoint_movie_ids() {
        assert_eq!(normalize_endpoint("/v1/movies/1"), "/v1/movies/{id}");
        assert_eq!(normalize_endpoint("/v1/movies/999999"), "/v1/movies/{id}");
        assert_eq!(normalize_endpoint("/v1/movies/abc"), "/v1/movies/{id}");
    }

    #[test]
    fn test_normalize_endpoint_unknown_paths() {
        assert_eq!(normalize_endpoint("/"), "/other");
        assert_eq!(normalize_endpoint("/v2/movies"), "/other");
        assert_eq!(normalize_endpoint("/v1/movies/"), "/other");
        assert_eq!(normalize_endpoint("/v1/movies/1/reviews"), "/other");
    }

    #[test]
    fn test_record_functions_do_not_panic_without_recorder() {
        record_token_issued("activation");
        record_token_validation("authentication", "not_found");
        record_tokens_purged(3);
        record_credential_operation("hash", Duration::from_millis(120));
        record_authorization_decision("permission", "forbidden");
        record_edit_conflict("movie");
        record_store_timeout("tokens.find_user");
        record_background_task("send_activation_email", "panic");
        set_background_tasks_in_flight(2);
    }

    #[test]
    fn test_background_task_outcomes_are_counted() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            record_background_task("send_activation_email", "panic");
            record_background_task("send_activation_email", "panic");
            record_background_task("send_activation_email", "success");
        });

        let entries = snapshotter.snapshot().into_vec();
        let panics = entries
            .iter()
            .find(|(key, _, _, _)| {
                key.key().name() == "movies_background_tasks_total"
                    && key
                        .key()
                        .labels()
                        .any(|l| l.key() == "outcome" && l.value() == "panic")
            })
            .map(|(_, _, _, value)| value);

        assert_eq!(panics, Some(&DebugValue::Counter(2)));
    }
}
