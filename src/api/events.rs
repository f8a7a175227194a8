// src/api/events.rs
use std::sync::Arc;
use axum::{extract::State, http::header, response::IntoResponse};
use axum::body::Body;
use futures_util::{future, stream, StreamExt};
use tokio_stream::wrappers::BroadcastStream;

use crate::license::{LicenseEvent, LicenseManager};

/// NDJSON feed of license events, starting with the state currently in effect.
pub async fn license_events(State(license): State<Arc<LicenseManager>>) -> impl IntoResponse {
    let updates = license.subscribe();
    let first = LicenseEvent::in_effect(&license.current());

    let events = stream::once(future::ready(first)).chain(
        BroadcastStream::new(updates).filter_map(|msg| {
            if let Err(lagged) = &msg {
                tracing::debug!(error = %lagged, "license event subscriber lagged");
            }
            future::ready(msg.ok())
        }),
    );
    let lines = events.filter_map(|event| {
        future::ready(
            serde_json::to_string(&event)
                .ok()
                .map(|line| Ok::<_, std::io::Error>(format!("{line}\n"))),
        )
    });

    ([(header::CONTENT_TYPE, "application/x-ndjson")], Body::from_stream(lines))
}
