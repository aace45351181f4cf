use crate::api::errors::ApiError;
use crate::api::AppState;
use crate::service::{QueryRequest, UpsertRequest};
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Json};
use serde_json::json;

pub async fn upsert(
    State(state): State<AppState>,
    Json(payload): Json<UpsertRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state.service.handle_upsert(payload)?;
    Ok(Json(json!({"ok": true})))
}

pub async fn query(
    State(state): State<AppState>,
    Json(payload): Json<QueryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let response = state.service.handle_query(payload)?;
    Ok(Json(response))
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.service.health())
}

pub async fn get_record(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let record = state.service.get(&id)?;
    Ok(Json(record))
}

pub async fn delete_record(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.service.delete(&id)?;
    Ok(Json(json!({"ok": true})))
}

pub async fn stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.service.stats())
}

pub async fn compact(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let compacted = state.service.compact()?;
    Ok(Json(json!({"ok": true, "compacted": compacted})))
}
