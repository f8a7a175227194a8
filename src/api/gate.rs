//! Entitlement gating for HTTP handlers.
//!
//! A missing entitlement answers `402 Payment Required` so clients can tell
//! "not on a plan that includes this" apart from a 401/403.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::license::{registry, Feature, LicenseManager, Tier};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("feature '{feature}' is not included in the {current_tier} tier")]
pub struct EntitlementRequired {
    pub feature: Feature,
    /// `None` for grant-only features.
    pub required_tier: Option<Tier>,
    pub current_tier: Tier,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("usage limit '{limit}' reached")]
pub struct LimitReached {
    pub limit: String,
    /// `None` when the license does not define the limit at all.
    pub max: Option<u64>,
    pub current_tier: Tier,
}

#[derive(Serialize)]
struct ErrorBody<'a, T> {
    error: &'static str,
    #[serde(flatten)]
    detail: &'a T,
}

impl IntoResponse for EntitlementRequired {
    fn into_response(self) -> Response {
        let body = ErrorBody { error: "entitlement_required", detail: &self };
        (StatusCode::PAYMENT_REQUIRED, Json(body)).into_response()
    }
}

impl IntoResponse for LimitReached {
    fn into_response(self) -> Response {
        let body = ErrorBody { error: "limit_reached", detail: &self };
        (StatusCode::PAYMENT_REQUIRED, Json(body)).into_response()
    }
}

pub fn ensure_feature(manager: &LicenseManager, feature: &Feature) -> Result<(), EntitlementRequired> {
    let license = manager.current();
    if license.has_feature(feature) {
        return Ok(());
    }
    Err(EntitlementRequired {
        feature: feature.clone(),
        required_tier: registry::minimum_tier(feature),
        current_tier: license.tier(),
    })
}

/// Succeeds when one more unit on top of `usage` stays within the limit.
pub fn ensure_limit(manager: &LicenseManager, name: &str, usage: u64) -> Result<(), LimitReached> {
    let license = manager.current();
    if license.check_limit(name, usage) {
        return Ok(());
    }
    Err(LimitReached {
        limit: name.to_string(),
        max: license.limits().get(name),
        current_tier: license.tier(),
    })
}

/// Route layer: `middleware::from_fn_with_state((manager, feature), require_feature)`.
pub async fn require_feature(
    State((manager, feature)): State<(Arc<LicenseManager>, Feature)>,
    request: Request,
    next: Next,
) -> Response {
    match ensure_feature(&manager, &feature) {
        Ok(()) => next.run(request).await,
        Err(denied) => {
            tracing::debug!(feature = %denied.feature, tier = %denied.current_tier, "entitlement required");
            denied.into_response()
        }
    }
}
