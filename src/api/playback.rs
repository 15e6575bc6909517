use crate::api::AppState;
use crate::error::Result;
use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::sync::Arc;

pub fn playback_routes() -> Router<Arc<AppState>> {
    Router::new().route("/play/:track_id", get(play))
}

async fn play(
    State(state): State<Arc<AppState>>,
    Path(track_id): Path<String>,
) -> Result<Response> {
    let audio = state.downloader.serve(&track_id).await?;

    Ok((
        [
            (header::CONTENT_TYPE, "audio/mpeg".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}.mp3\"", track_id),
            ),
        ],
        audio,
    )
        .into_response())
}
