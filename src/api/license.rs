use std::sync::Arc;
use axum::{Json, extract::State};
use serde::Serialize;
use time::OffsetDateTime;

use crate::license::{Feature, LicenseManager, LicenseType, Limits, Tier};

/// Operator view of the license in effect. Identifiers only, no customer PII.
#[derive(Serialize)]
pub struct LicenseStatus {
    pub id: String,
    pub community: bool,
    pub edition: &'static str,
    pub tier: Tier,
    pub r#type: LicenseType,
    #[serde(with = "time::serde::rfc3339")]
    pub issued_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
    pub features: Vec<Feature>,
    pub limits: Limits,
}

pub async fn license_status(State(license): State<Arc<LicenseManager>>) -> Json<LicenseStatus> {
    let current = license.current();
    Json(LicenseStatus {
        id: current.id().to_string(),
        community: current.is_community(),
        edition: current.tier().edition(),
        tier: current.tier(),
        r#type: current.license_type(),
        issued_at: current.issued_at(),
        expires_at: current.expires_at(),
        features: current.effective_features().into_iter().collect(),
        limits: current.limits().clone(),
    })
}
