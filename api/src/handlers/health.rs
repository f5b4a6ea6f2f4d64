use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
    pub cache: &'static str,
    pub scheduled_timers: usize,
}

fn probe_label<E>(probe: Option<Result<(), E>>) -> &'static str {
    match probe {
        Some(Ok(())) => "up",
        Some(Err(_)) => "down",
        None => "not_configured",
    }
}

/// Health check endpoint
///
/// The durable store decides overall health; a cache outage only degrades reads.
#[tracing::instrument(skip(state))]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let database = match &state.db_pool {
        Some(pool) => Some(pool.health_check().await),
        None => None,
    };
    let cache = match &state.redis {
        Some(redis) => Some(redis.health_check().await),
        None => None,
    };

    let healthy = !matches!(database, Some(Err(_)));
    if let Some(Err(e)) = &database {
        tracing::warn!(error = %e, "Database health check failed");
    }
    if let Some(Err(e)) = &cache {
        tracing::warn!(error = %e, "Cache health check failed");
    }

    let body = HealthResponse {
        status: if healthy { "ok" } else { "unavailable" },
        database: probe_label(database),
        cache: probe_label(cache),
        scheduled_timers: state.service.scheduler().len().await,
    };

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}
