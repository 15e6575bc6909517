//! In-process stand-ins for Spotify, the text model and the download proxy.

use crate::api::{self, AppState};
use crate::config::{Config, SpotifyCredentials};
use axum::{
    extract::Request,
    middleware::{self, Next},
    response::Response,
    Json, Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub struct FakeUpstream {
    pub base_url: String,
    hits: Arc<Mutex<Vec<String>>>,
    scratch: Vec<TestDir>,
}

impl FakeUpstream {
    /// Serves `router` on an ephemeral port and records every request path.
    pub async fn spawn(router: Router) -> Self {
        Self::spawn_with(|_| router).await
    }

    /// Like [`FakeUpstream::spawn`], for routers that need their own base URL
    /// (e.g. to hand out absolute `next` or download links).
    pub async fn spawn_with<F>(build: F) -> Self
    where
        F: FnOnce(&str) -> Router,
    {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());

        let hits = Arc::new(Mutex::new(Vec::new()));
        let recorder = hits.clone();

        let router = build(&base_url).layer(middleware::from_fn(move |req: Request, next: Next| {
            let recorder = recorder.clone();
            async move {
                recorder.lock().unwrap().push(req.uri().path().to_string());
                next.run(req).await
            }
        }));

        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self {
            base_url,
            hits,
            scratch: Vec::new(),
        }
    }

    /// Keeps `dir` alive (and on disk) as long as the fake.
    pub fn hold(mut self, dir: TestDir) -> Self {
        self.scratch.push(dir);
        self
    }

    pub fn hits(&self, path: &str) -> usize {
        self.hits.lock().unwrap().iter().filter(|p| *p == path).count()
    }

    pub fn total_hits(&self) -> usize {
        self.hits.lock().unwrap().len()
    }
}

/// Config with every upstream pointed at `base_url` under distinct prefixes:
/// `/accounts`, `/v1`, `/text` and `/proxy`.
pub fn test_config(base_url: &str, download_dir: PathBuf) -> Config {
    Config {
        spotify: Some(SpotifyCredentials {
            client_id: "client-id".to_string(),
            client_secret: "client-secret".to_string(),
            redirect_uri: "http://localhost:8000/callback".to_string(),
        }),
        spotify_client_id: Some("client-id".to_string()),
        spotify_redirect_uri: Some("http://localhost:8000/callback".to_string()),
        text_api_key: Some("text-key".to_string()),
        text_model: "test-model".to_string(),
        download_api_key: Some("proxy-key".to_string()),
        download_api_host: "proxy.test".to_string(),
        spotify_accounts_url: format!("{}/accounts", base_url),
        spotify_api_url: format!("{}/v1", base_url),
        text_api_url: format!("{}/text", base_url),
        download_api_url: format!("{}/proxy", base_url),
        server_host: "127.0.0.1".to_string(),
        server_port: 0,
        download_dir,
        audio_retention: Duration::from_secs(3600),
        retry_attempts: 2,
        retry_base_delay: Duration::from_millis(1),
        http_timeout: Duration::from_secs(5),
        cors_origins: vec!["*".to_string()],
    }
}

/// [`test_config`] for clients that never touch audio; the download
/// directory is never created.
pub fn client_config(base_url: &str) -> Config {
    test_config(base_url, PathBuf::from("song-request-unused-downloads"))
}

/// Directory under the system temp dir, removed again on drop.
pub struct TestDir(PathBuf);

impl TestDir {
    pub fn path(&self) -> PathBuf {
        self.0.clone()
    }
}

impl Drop for TestDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}

pub fn temp_dir() -> TestDir {
    let dir = std::env::temp_dir().join(format!("song-request-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    TestDir(dir)
}

/// The full router wired to [`fake_services`], plus the fake for hit counting.
pub async fn test_app(intent_reply: &str) -> (FakeUpstream, Router) {
    let reply = intent_reply.to_string();
    let upstream = FakeUpstream::spawn_with(|base| fake_services(base, reply)).await;
    let downloads = temp_dir();
    let state = AppState::new(&test_config(&upstream.base_url, downloads.path())).unwrap();
    let app = api::router(Arc::new(state));
    (upstream.hold(downloads), app)
}

pub async fn json_body(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Body shaped like a Messages API reply carrying `text`.
pub fn text_reply(text: &str) -> Json<Value> {
    Json(json!({
        "id": "msg_test",
        "type": "message",
        "role": "assistant",
        "content": [{ "type": "text", "text": text }],
    }))
}

/// One server standing in for every upstream the app talks to.
///
/// - token endpoint: `code=good` exchanges, refresh and client-credentials grants succeed
/// - playlists: "Workout" (p1) and "Daily Mix 1" (p2); p2 holds two tracks and a removed entry
/// - the token `expired-tracks` lists playlists but is refused by the tracks endpoint
/// - search knows "Lonely At The Top" (track1) and "Joha" (track3)
/// - the text model answers `intent_reply`, or "Turn it up!" for adlib prompts
/// - the proxy links every id to `/cdn/audio.mp3`
pub fn fake_services(base_url: &str, intent_reply: String) -> Router {
    use axum::{
        extract::{Path, Query, State},
        http::{HeaderMap, StatusCode},
        response::IntoResponse,
        routing::{get, post},
        Form,
    };
    use std::collections::HashMap;

    #[derive(Clone)]
    struct Fake {
        base_url: String,
        intent_reply: String,
    }

    fn track(id: &str, name: &str, artists: &[&str]) -> Value {
        json!({
            "id": id,
            "name": name,
            "artists": artists.iter().map(|a| json!({"name": a})).collect::<Vec<_>>(),
        })
    }

    Router::new()
        .route(
            "/accounts/api/token",
            post(|Form(form): Form<HashMap<String, String>>| async move {
                let grant = form.get("grant_type").map(String::as_str);
                let code = form.get("code").map(String::as_str);
                match (grant, code) {
                    (Some("authorization_code"), Some("good")) => (
                        StatusCode::OK,
                        Json(json!({
                            "access_token": "user-token",
                            "refresh_token": "refresh-token",
                            "expires_in": 3600,
                            "token_type": "Bearer"
                        })),
                    ),
                    (Some("refresh_token"), _) => (
                        StatusCode::OK,
                        Json(json!({"access_token": "fresh-token", "expires_in": 3600})),
                    ),
                    (Some("client_credentials"), _) => (
                        StatusCode::OK,
                        Json(json!({"access_token": "app-token", "expires_in": 3600})),
                    ),
                    _ => (StatusCode::BAD_REQUEST, Json(json!({"error": "invalid_grant"}))),
                }
            }),
        )
        .route(
            "/v1/me/playlists",
            get(|| async {
                Json(json!({
                    "items": [
                        {"id": "p1", "name": "Workout"},
                        {"id": "p2", "name": "Daily Mix 1"}
                    ],
                    "next": null
                }))
            }),
        )
        .route(
            "/v1/playlists/:id/tracks",
            get(|Path(id): Path<String>, headers: HeaderMap| async move {
                let auth = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default();
                if auth == "Bearer expired-tracks" {
                    return (
                        StatusCode::UNAUTHORIZED,
                        Json(json!({"error": {"status": 401, "message": "The access token expired"}})),
                    )
                        .into_response();
                }

                let items = if id == "p2" {
                    vec![
                        json!({"track": track("track1", "Lonely At The Top", &["Asake"])}),
                        json!({"track": null}),
                        json!({"track": track("track2", "Peace Be Unto You", &["Asake", "Olamide"])}),
                    ]
                } else {
                    vec![]
                };
                Json(json!({"items": items, "next": null})).into_response()
            }),
        )
        .route(
            "/v1/search",
            get(|Query(q): Query<HashMap<String, String>>| async move {
                let query = q.get("q").cloned().unwrap_or_default();
                let items = if query.contains("Lonely At The Top") {
                    vec![track("track1", "Lonely At The Top", &["Asake"])]
                } else if query.contains("Joha") {
                    vec![track("track3", "Joha", &["Asake"])]
                } else {
                    vec![]
                };
                Json(json!({"tracks": {"items": items, "next": null}}))
            }),
        )
        .route(
            "/text/v1/messages",
            post(|State(fake): State<Fake>, Json(body): Json<Value>| async move {
                let prompt = body["messages"][0]["content"].as_str().unwrap_or_default();
                if prompt.contains("radio DJ") {
                    text_reply("Turn it up!")
                } else {
                    text_reply(&fake.intent_reply)
                }
            }),
        )
        .route(
            "/proxy/downloadSong",
            get(|State(fake): State<Fake>| async move {
                Json(json!({
                    "success": true,
                    "data": {"downloadLink": format!("{}/cdn/audio.mp3", fake.base_url)}
                }))
            }),
        )
        .route("/cdn/audio.mp3", get(|| async { b"ID3-audio-bytes".to_vec() }))
        .with_state(Fake {
            base_url: base_url.to_string(),
            intent_reply,
        })
}
