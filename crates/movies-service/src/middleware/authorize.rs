//! Authorization gates.
//!
//! Gates compose in a fixed order: authenticated, then activated, then the
//! required permission. A later gate never runs when an earlier one rejects,
//! so anonymous and unactivated callers never cost a grant lookup.
//!
//! The gate functions are pure over an [`Identity`]; the middleware wrappers
//! apply them as route layers.

use crate::errors::ApiError;
use crate::middleware::auth::CurrentIdentity;
use crate::models::{Identity, PermissionCode, User};
use crate::observability::metrics;
use crate::services::GrantSource;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

const ACTIVATION_GATE: &str = "activation";
const PERMISSION_GATE: &str = "permission";

/// Require an authenticated, activated identity.
pub fn require_activated(identity: &Identity) -> Result<&User, ApiError> {
    match identity {
        Identity::Anonymous => {
            metrics::record_authorization_decision(ACTIVATION_GATE, "unauthenticated");
            Err(ApiError::Unauthenticated)
        }
        Identity::Authenticated(user) if !user.activated => {
            metrics::record_authorization_decision(ACTIVATION_GATE, "not_activated");
            Err(ApiError::NotActivated)
        }
        Identity::Authenticated(user) => {
            metrics::record_authorization_decision(ACTIVATION_GATE, "allowed");
            Ok(user)
        }
    }
}

/// Require an activated identity holding `code`.
///
/// Looks up the caller's grants exactly once, and only after the activation
/// gate has passed.
pub async fn require_permission<'a>(
    identity: &'a Identity,
    code: PermissionCode,
    grants: &dyn GrantSource,
) -> Result<&'a User, ApiError> {
    let user = require_activated(identity)?;

    let granted = match grants.all_grants(user.id).await {
        Ok(granted) => granted,
        Err(e) => {
            metrics::record_authorization_decision(PERMISSION_GATE, "error");
            return Err(e);
        }
    };

    if !granted.includes(code.as_str()) {
        tracing::debug!(
            target: "movies.middleware.authorize",
            permission = code.as_str(),
            "Permission not granted"
        );
        metrics::record_authorization_decision(PERMISSION_GATE, "forbidden");
        return Err(ApiError::Forbidden);
    }

    metrics::record_authorization_decision(PERMISSION_GATE, "allowed");
    Ok(user)
}

/// Route layer: activated callers only.
pub async fn activated_only(
    CurrentIdentity(identity): CurrentIdentity,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    require_activated(&identity)?;
    Ok(next.run(req).await)
}

/// State for [`permission_gate`]: which permission a route requires.
#[derive(Clone)]
pub struct PermissionGate {
    pub grants: Arc<dyn GrantSource>,
    pub code: PermissionCode,
}

impl PermissionGate {
    pub fn new(grants: Arc<dyn GrantSource>, code: PermissionCode) -> Self {
        Self { grants, code }
    }
}

/// Route layer: activated callers holding the gate's permission.
pub async fn permission_gate(
    State(gate): State<PermissionGate>,
    CurrentIdentity(identity): CurrentIdentity,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    require_permission(&identity, gate.code, gate.grants.as_ref()).await?;
    Ok(next.run(req).await)
}
