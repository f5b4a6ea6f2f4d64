use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::handlers::{ErrorResponse, SuccessResponse};
use crate::state::AppState;
use common::models::{EventLog, Trigger, TriggerDraft};

/// Request to start (or restart) the timer of a stored trigger
#[derive(Debug, Deserialize)]
pub struct ScheduleTriggerRequest {
    pub id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub id: Uuid,
    pub deleted: bool,
}

/// Create a new trigger
#[tracing::instrument(skip(state, draft))]
pub async fn create_trigger(
    State(state): State<AppState>,
    Json(draft): Json<TriggerDraft>,
) -> Result<(StatusCode, Json<SuccessResponse<Trigger>>), ErrorResponse> {
    let trigger = state.service.create_trigger(draft).await?;
    Ok((StatusCode::CREATED, Json(SuccessResponse::new(trigger))))
}

/// List all triggers
#[tracing::instrument(skip(state))]
pub async fn list_triggers(
    State(state): State<AppState>,
) -> Result<Json<SuccessResponse<Vec<Trigger>>>, ErrorResponse> {
    let triggers = state.service.list_triggers().await?;
    Ok(Json(SuccessResponse::new(triggers)))
}

/// Get a trigger by ID
#[tracing::instrument(skip(state))]
pub async fn get_trigger(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SuccessResponse<Trigger>>, ErrorResponse> {
    let trigger = state.service.get_trigger(id).await?;
    Ok(Json(SuccessResponse::new(trigger)))
}

/// Delete a trigger and stop its timer
#[tracing::instrument(skip(state))]
pub async fn delete_trigger(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SuccessResponse<DeletedResponse>>, ErrorResponse> {
    state.service.delete_trigger(id).await?;
    Ok(Json(SuccessResponse::new(DeletedResponse { id, deleted: true })))
}

/// Logs of a trigger from the active window
#[tracing::instrument(skip(state))]
pub async fn recent_logs(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SuccessResponse<Vec<EventLog>>>, ErrorResponse> {
    let logs = state.service.recent_logs(id).await?;
    Ok(Json(SuccessResponse::new(logs)))
}

/// Dry-run a trigger definition without storing it
#[tracing::instrument(skip(state, draft))]
pub async fn test_trigger(
    State(state): State<AppState>,
    Json(draft): Json<TriggerDraft>,
) -> Result<Json<SuccessResponse<EventLog>>, ErrorResponse> {
    let log = state.service.test_trigger(&draft).await?;
    Ok(Json(SuccessResponse::new(log)))
}

/// Fire a stored trigger now
#[tracing::instrument(skip(state))]
pub async fn execute_trigger(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SuccessResponse<EventLog>>, ErrorResponse> {
    let log = state.service.execute_trigger(id).await?;
    Ok(Json(SuccessResponse::new(log)))
}

/// Start or replace the timer of a stored scheduled trigger
#[tracing::instrument(skip(state, req))]
pub async fn schedule_trigger(
    State(state): State<AppState>,
    Json(req): Json<ScheduleTriggerRequest>,
) -> Result<Json<SuccessResponse<Trigger>>, ErrorResponse> {
    let trigger = state.service.schedule_trigger(req.id).await?;
    Ok(Json(SuccessResponse::new(trigger)))
}
