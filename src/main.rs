mod api;
mod config;
mod error;
mod frontend;
mod models;
mod services;

#[cfg(test)]
mod test_support;

use crate::api::AppState;
use crate::config::Config;
use crate::services::Downloader;
use axum::{
    extract::Request,
    http::{header, HeaderValue, Method},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,song_request=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Configuration loaded");
    if config.text_api_key.is_none() {
        tracing::warn!("ANTHROPIC_API_KEY is not set; song requests will fail");
    }
    if config.download_api_key.is_none() {
        tracing::warn!("RAPIDAPI_KEY is not set; downloads will fail");
    }

    std::fs::create_dir_all(&config.download_dir).map_err(|e| {
        anyhow::anyhow!(
            "Cannot create download directory {}: {}",
            config.download_dir.display(),
            e
        )
    })?;
    tracing::info!("Storing audio in {}", config.download_dir.display());

    // Initialize services
    let app_state = Arc::new(AppState::new(&config)?);

    // Delete expired audio in the background
    spawn_retention_sweeper(app_state.downloader.clone());

    // Build router
    let app = with_middleware(api::router(app_state), &config.cors_origins)?;

    // Start server
    let addr = format!("{}:{}", config.server_host, config.server_port);
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn with_middleware(router: Router, cors_origins: &[String]) -> anyhow::Result<Router> {
    Ok(router
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
        .layer(CompressionLayer::new())
        .layer(cors_layer(cors_origins)?))
}

/// Method and path only. Query strings can carry OAuth tokens.
fn request_span(request: &Request) -> tracing::Span {
    tracing::info_span!(
        "request",
        method = %request.method(),
        path = %request.uri().path(),
    )
}

fn cors_layer(origins: &[String]) -> anyhow::Result<CorsLayer> {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT]);

    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return Ok(layer.allow_origin(Any));
    }

    let origins = origins
        .iter()
        .map(|o| {
            HeaderValue::from_str(o).map_err(|e| anyhow::anyhow!("Invalid CORS origin {}: {}", o, e))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(layer.allow_origin(AllowOrigin::list(origins)))
}

/// Deletes expired audio a few times per retention window.
fn spawn_retention_sweeper(downloader: Arc<Downloader>) {
    let period = (downloader.retention() / 4).max(MIN_SWEEP_INTERVAL);

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            // First tick fires immediately, clearing leftovers from the last run
            interval.tick().await;
            if let Err(e) = downloader.sweep_expired().await {
                tracing::error!("Audio retention sweep failed: {}", e);
            }
        }
    });
}
