use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Upstream bodies are echoed back to the client, so keep them short.
const MAX_UPSTREAM_BODY: usize = 500;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(String),

    #[error("{}", upstream_message(.service, .status, .body))]
    Upstream {
        service: &'static str,
        status: Option<u16>,
        body: String,
    },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidRequest(String),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

fn upstream_message(service: &str, status: &Option<u16>, body: &str) -> String {
    match status {
        Some(code) => format!("{} responded with status {}: {}", service, code, body),
        None => format!("{} request failed: {}", service, body),
    }
}

impl AppError {
    pub fn upstream_status(service: &'static str, status: u16, body: impl Into<String>) -> Self {
        AppError::Upstream {
            service,
            status: Some(status),
            body: truncate(body.into()),
        }
    }

    pub fn upstream_transport(service: &'static str, err: impl std::fmt::Display) -> Self {
        AppError::Upstream {
            service,
            status: None,
            body: err.to_string(),
        }
    }

    /// Consumes a non-success response into an upstream error carrying its status and body.
    pub async fn from_response(service: &'static str, response: reqwest::Response) -> Self {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        tracing::error!("{} API error: {} - {}", service, status, truncate(body.clone()));
        Self::upstream_status(service, status, body)
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ConfigMissing(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Upstream { status: Some(_), .. } => StatusCode::BAD_REQUEST,
            AppError::Upstream { status: None, .. } => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::MalformedResponse(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn truncate(mut body: String) -> String {
    if body.len() > MAX_UPSTREAM_BODY {
        let mut cut = MAX_UPSTREAM_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
        body.push_str("...");
    }
    body
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_message = match self {
            AppError::Internal(ref e) => {
                tracing::error!("Internal error: {:?}", e);
                self.to_string()
            }
            AppError::MalformedResponse(ref detail) => {
                tracing::error!("Malformed upstream response: {}", detail);
                "Malformed response from an upstream service".to_string()
            }
            AppError::Upstream { status: None, .. } => {
                tracing::error!("{}", self);
                self.to_string()
            }
            _ => self.to_string(),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_error_carries_status_in_message() {
        let err = AppError::upstream_status("Spotify", 503, "service unavailable");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            err.to_string(),
            "Spotify responded with status 503: service unavailable"
        );
    }

    #[test]
    fn transport_failures_are_server_errors() {
        let err = AppError::upstream_transport("Spotify", "connection refused");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn long_bodies_are_truncated() {
        let err = AppError::upstream_status("Spotify", 500, "é".repeat(400));
        match err {
            AppError::Upstream { body, .. } => {
                assert!(body.ends_with("..."));
                assert!(body.len() <= MAX_UPSTREAM_BODY + 3);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn internal_errors_hide_details() {
        let err = AppError::Internal(anyhow::anyhow!("disk on fire"));
        assert_eq!(err.to_string(), "Internal server error");
    }
}
