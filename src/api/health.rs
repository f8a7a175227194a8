use std::sync::Arc;
use axum::{Json, extract::State};
use serde::Serialize;

use crate::license::{LicenseManager, Tier};

#[derive(Serialize)]
pub struct Health { status: &'static str, edition: &'static str, tier: Tier }

pub async fn healthz(State(license): State<Arc<LicenseManager>>) -> Json<Health> {
    let tier = license.tier();
    Json(Health { status: "ok", edition: tier.edition(), tier })
}
