use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use crate::handlers::{ErrorResponse, SuccessResponse};
use crate::state::AppState;
use common::models::{EventLog, SweepReport};

#[derive(Debug, Default, Deserialize)]
pub struct EventsQuery {
    /// Include archived logs
    #[serde(default)]
    pub archived: bool,
}

/// List event logs, newest first
#[tracing::instrument(skip(state))]
pub async fn list_events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Result<Json<SuccessResponse<Vec<EventLog>>>, ErrorResponse> {
    let logs = state.service.list_events(query.archived).await?;
    Ok(Json(SuccessResponse::new(logs)))
}

/// Run one retention pass now
#[tracing::instrument(skip(state))]
pub async fn sweep(
    State(state): State<AppState>,
) -> Result<Json<SuccessResponse<SweepReport>>, ErrorResponse> {
    let report = state.service.sweep().await?;
    Ok(Json(SuccessResponse::new(report)))
}
