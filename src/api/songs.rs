use crate::api::middleware::BearerToken;
use crate::api::AppState;
use crate::error::{AppError, Result};
use crate::models::SongRequestBody;
use crate::services::song_request::SongRequestOutcome;
use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use std::sync::Arc;
use validator::Validate;

pub fn song_routes() -> Router<Arc<AppState>> {
    Router::new().route("/request-song", post(request_song))
}

async fn request_song(
    State(state): State<Arc<AppState>>,
    token: Option<BearerToken>,
    payload: std::result::Result<Json<SongRequestBody>, JsonRejection>,
) -> Result<Json<SongRequestOutcome>> {
    let Json(req) = payload.map_err(|e| AppError::InvalidRequest(e.body_text()))?;
    // Reject blank or oversized input before any upstream call
    req.validate()
        .map_err(|e| AppError::InvalidRequest(e.to_string()))?;

    // Anonymous requests still work for tracks via an app token
    let token = token.map(|BearerToken(t)| t);
    let outcome = state
        .song_requests
        .handle(&req.input, req.download, token.as_deref())
        .await?;

    Ok(Json(outcome))
}
