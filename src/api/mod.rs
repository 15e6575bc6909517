pub mod auth;
pub mod middleware;
pub mod playback;
pub mod playlists;
pub mod songs;

use crate::config::Config;
use crate::frontend;
use crate::services::{
    AdlibGenerator, Downloader, IntentExtractor, RetryPolicy, SongRequestService, SpotifyAuthClient,
    SpotifyClient, TextGenerationClient, TrackResolver,
};
use axum::{routing::get, Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;

pub use auth::auth_routes;
pub use playback::playback_routes;
pub use playlists::playlist_routes;
pub use songs::song_routes;

/// Every client is built once here and shared read-only between requests.
/// User credentials are never part of the state; they come with each request.
pub struct AppState {
    pub auth: Arc<SpotifyAuthClient>,
    pub spotify: Arc<SpotifyClient>,
    pub downloader: Arc<Downloader>,
    pub song_requests: Arc<SongRequestService>,
}

impl AppState {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let user_agent = concat!("song-request/", env!("CARGO_PKG_VERSION"));

        // JSON APIs share one pooled client with a whole-request timeout
        let api_http = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(config.http_timeout)
            .build()?;
        // Audio transfers can outlast the API timeout; only bound the connect.
        let audio_http = reqwest::Client::builder()
            .user_agent(user_agent)
            .connect_timeout(config.http_timeout)
            .build()?;
        let retry = RetryPolicy::from_config(config);

        // Upstream clients
        let auth = Arc::new(SpotifyAuthClient::new(config, api_http.clone(), retry.clone()));
        let spotify = Arc::new(SpotifyClient::new(config, api_http.clone(), retry.clone()));
        let text = Arc::new(TextGenerationClient::new(config, api_http, retry.clone()));
        let downloader = Arc::new(Downloader::new(config, audio_http, retry));

        // The request pipeline borrows every client above
        let song_requests = Arc::new(SongRequestService::new(
            Arc::new(IntentExtractor::new(text.clone())),
            Arc::new(TrackResolver::new(spotify.clone(), auth.clone())),
            spotify.clone(),
            downloader.clone(),
            Arc::new(AdlibGenerator::new(text)),
        ));

        Ok(Self {
            auth,
            spotify,
            downloader,
            song_requests,
        })
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(auth_routes())
        .merge(playlist_routes())
        .merge(song_routes())
        .merge(playback_routes())
        .route("/health", get(health))
        .with_state(state)
        .route("/", get(frontend::serve_frontend))
        .fallback(get(frontend::serve_frontend))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
