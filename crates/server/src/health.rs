use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use aquabot_store::CatalogCache;

#[derive(Clone)]
pub struct HealthState {
    pub catalog: Arc<CatalogCache>,
    pub catalog_configured: bool,
    pub channels: Vec<&'static str>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub catalog: HealthCheck,
    pub channels: HealthCheck,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

/// The bot answers (with canned apologies) even without a catalog, so only the service check
/// decides the HTTP status.
pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let catalog = catalog_check(&state).await;
    let channels = if state.channels.is_empty() {
        HealthCheck { status: "disabled", detail: "no outbound sender configured".to_string() }
    } else {
        HealthCheck { status: "ready", detail: state.channels.join(", ") }
    };
    let degraded = catalog.status != "ready" || channels.status != "ready";

    let payload = HealthResponse {
        status: if degraded { "degraded" } else { "ready" },
        service: HealthCheck {
            status: "ready",
            detail: "aquabot-server runtime initialized".to_string(),
        },
        catalog,
        channels,
        checked_at: Utc::now().to_rfc3339(),
    };
    (StatusCode::OK, Json(payload))
}

async fn catalog_check(state: &HealthState) -> HealthCheck {
    if !state.catalog_configured {
        return HealthCheck {
            status: "disabled",
            detail: "catalog.base_url is not set".to_string(),
        };
    }
    match state.catalog.last_refreshed_at().await {
        Some(refreshed_at) => HealthCheck {
            status: "ready",
            detail: format!(
                "{} products cached at {}",
                state.catalog.len().await,
                refreshed_at.to_rfc3339()
            ),
        },
        None => HealthCheck {
            status: "warming",
            detail: "catalog cache loads on the first search".to_string(),
        },
    }
}
