use std::sync::Arc;
use axum::extract::FromRef;
use axum::{middleware, routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{config::AppConfig, license::{Feature, LicenseManager}};

#[derive(Clone)]
pub struct AppState {
    pub cfg: AppConfig,
    pub license: Arc<LicenseManager>,
}

impl AppState {
    pub fn new(cfg: AppConfig, license: Arc<LicenseManager>) -> Self { Self { cfg, license } }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(s: &AppState) -> AppConfig { s.cfg.clone() }
}
impl FromRef<AppState> for Arc<LicenseManager> {
    fn from_ref(s: &AppState) -> Arc<LicenseManager> { s.license.clone() }
}

pub fn router(state: AppState) -> Router {
    let audit = Router::new()
        .route("/api/license/events", get(events::license_events))
        .route_layer(middleware::from_fn_with_state(
            (state.license.clone(), Feature::AUDIT_LOGS),
            gate::require_feature,
        ));

    Router::new()
        .route("/api/healthz", get(health::healthz))
        .route("/api/license", get(license::license_status))
        .merge(audit)
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

pub mod events;
pub mod gate;
pub mod health;
pub mod license;
