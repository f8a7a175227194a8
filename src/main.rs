use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use ddui_licensing::api;
use ddui_licensing::config::AppConfig;
use ddui_licensing::license::{LicenseManager, RevalidationHandle, Verifier};
use tokio::net::TcpListener;
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).compact().init();

    let cfg = AppConfig::from_env()?;
    let verifier = Verifier::embedded().context("embedded license public key is malformed")?;
    if !verifier.has_keys() {
        tracing::warn!("no license public key embedded in this build; commercial keys cannot be verified");
    }
    let manager = Arc::new(LicenseManager::new(verifier));
    let revalidation = activate_license(&cfg, &manager)?;

    let app = api::router(api::AppState::new(cfg.clone(), manager.clone()));
    let addr: SocketAddr = cfg.bind_addr.parse()?;
    tracing::info!(%addr, edition = manager.tier().edition(), "DDUI starting");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = revalidation {
        handle.stop().await;
    }
    Ok(())
}

/// Load the configured key, or fall back to Community unless a license is
/// required. Revalidation runs whenever a key is configured so a key that is
/// not yet valid is picked up once its window opens.
fn activate_license(cfg: &AppConfig, manager: &Arc<LicenseManager>) -> anyhow::Result<Option<RevalidationHandle>> {
    let Some(key) = cfg.license_key() else {
        if cfg.license_required {
            return Err(anyhow!(
                "DDUI_LICENSE_REQUIRED is set but no license key was found in ${} or {}",
                cfg.license_env,
                cfg.license_path.display()
            ));
        }
        manager.set_community_edition();
        return Ok(None);
    };

    if let Err(err) = manager.load_license(&key) {
        if cfg.license_required {
            return Err(anyhow::Error::new(err).context("license key rejected"));
        }
        tracing::warn!(reason = err.kind(), error = %err, "license key rejected; running as Community edition");
        manager.set_community_edition();
    }
    Ok(Some(manager.start_periodic_revalidation(key, cfg.refresh_interval)))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
