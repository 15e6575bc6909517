use axum::{
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use rust_embed::RustEmbed;

// Landing page and its assets, compiled into the binary
#[derive(RustEmbed)]
#[folder = "static"]
pub struct Assets;

pub async fn serve_frontend(uri: Uri) -> Response {
    let path = match uri.path().trim_start_matches('/') {
        "" => "index.html",
        path => path,
    };

    match Assets::get(path) {
        Some(content) => serve_asset(path, content.data.into_owned()),
        None => not_found(),
    }
}

fn serve_asset(path: &str, data: Vec<u8>) -> Response {
    let mime = mime_guess::from_path(path).first_or_octet_stream();

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, mime.as_ref().to_string()),
            (header::CACHE_CONTROL, cache_control_value(path).to_string()),
        ],
        data,
    )
        .into_response()
}

fn cache_control_value(path: &str) -> &'static str {
    // The page carries tokens in its query string; never let it go stale
    if path.ends_with(".html") {
        "no-cache"
    } else {
        "public, max-age=3600"
    }
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "404 Not Found").into_response()
}
