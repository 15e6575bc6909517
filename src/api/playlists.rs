use crate::api::middleware::BearerToken;
use crate::api::AppState;
use crate::error::{AppError, Result};
use crate::models::{format_tracks, PlaylistSummary, TrackView};
use crate::services::spotify::select_default_playlist;
use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
struct PlaylistsResponse {
    playlists: Vec<PlaylistSummary>,
}

#[derive(Debug, Serialize)]
struct DailyMixResponse {
    playlist_name: String,
    tracks: Vec<TrackView>,
}

pub fn playlist_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/playlists", get(list_playlists))
        .route("/playlists/daily-mix", get(daily_mix))
}

async fn list_playlists(
    State(state): State<Arc<AppState>>,
    BearerToken(token): BearerToken,
) -> Result<Json<PlaylistsResponse>> {
    let playlists = state.spotify.list_playlists(&token).await?;
    Ok(Json(PlaylistsResponse {
        playlists: playlists.iter().map(PlaylistSummary::from).collect(),
    }))
}

/// Tracks of the first "Daily Mix" playlist, or of the first playlist when
/// there is none.
async fn daily_mix(
    State(state): State<Arc<AppState>>,
    BearerToken(token): BearerToken,
) -> Result<Json<DailyMixResponse>> {
    let playlists = state.spotify.list_playlists(&token).await?;
    let playlist = select_default_playlist(&playlists)
        .ok_or_else(|| AppError::NotFound("No playlists available".to_string()))?;

    tracing::debug!("Daily mix resolved to playlist {}", playlist.id);
    let tracks = state.spotify.list_tracks(&token, &playlist.id).await?;

    Ok(Json(DailyMixResponse {
        playlist_name: playlist.name.clone(),
        tracks: format_tracks(tracks),
    }))
}

#[cfg(test)]
mod tests {
    use crate::test_support::{json_body, test_app};
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use serde_json::json;
    use tower::ServiceExt;

    fn get(path: &str, token: &str) -> Request<Body> {
        Request::get(path)
            .header(header::AUTHORIZATION, token)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn lists_playlists() {
        let (_upstream, app) = test_app("{}").await;
        let response = app.oneshot(get("/playlists", "user-token")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            json!({"playlists": [
                {"id": "p1", "name": "Workout"},
                {"id": "p2", "name": "Daily Mix 1"}
            ]})
        );
    }

    #[tokio::test]
    async fn daily_mix_keeps_track_order() {
        let (upstream, app) = test_app("{}").await;
        let response = app
            .oneshot(get("/playlists/daily-mix", "Bearer user-token"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            json!({
                "playlist_name": "Daily Mix 1",
                "tracks": [
                    {"title": "Lonely At The Top", "artist": "Asake", "downloadLink": null},
                    {"title": "Peace Be Unto You", "artist": "Asake, Olamide", "downloadLink": null}
                ]
            })
        );
        assert_eq!(upstream.hits("/v1/playlists/p2/tracks"), 1);
    }

    #[tokio::test]
    async fn refused_track_listing_reports_status() {
        let (_upstream, app) = test_app("{}").await;
        let response = app
            .oneshot(get("/playlists/daily-mix", "expired-tracks"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let error = json_body(response).await["error"].as_str().unwrap().to_string();
        assert!(error.contains("401"), "{}", error);
    }

    #[tokio::test]
    async fn token_is_required() {
        let (upstream, app) = test_app("{}").await;
        let response = app
            .oneshot(Request::get("/playlists").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(upstream.total_hits(), 0);
    }

    #[tokio::test]
    async fn scheme_without_token_is_rejected() {
        let (upstream, app) = test_app("{}").await;
        let response = app.oneshot(get("/playlists", "Bearer ")).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(upstream.total_hits(), 0);
    }
}
