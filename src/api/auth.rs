use crate::api::AppState;
use crate::error::{AppError, Result};
use crate::models::AccessCredential;
use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::{header, HeaderMap},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Serialize)]
struct LoginResponse {
    url: String,
}

#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    error: Option<String>,
}

#[derive(Serialize)]
struct CallbackResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct RefreshRequest {
    #[serde(default)]
    refresh_token: Option<String>,
}

pub fn auth_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/login", get(login))
        .route("/callback", get(callback))
        .route("/refresh-token", post(refresh_token))
}

async fn login(State(state): State<Arc<AppState>>) -> Result<Json<LoginResponse>> {
    let url = state.auth.authorize_url()?;
    Ok(Json(LoginResponse { url }))
}

/// Spotify redirects here after the user approves (or denies) access.
async fn callback(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<CallbackParams>,
) -> Result<Response> {
    // The user declined, or Spotify rejected the request
    if let Some(error) = params.error {
        return Err(AppError::InvalidRequest(format!(
            "Authorization was not granted: {}",
            error
        )));
    }

    // Check the code before spending a call on the token endpoint
    let code = params
        .code
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| AppError::InvalidRequest("Authorization code is missing!".to_string()))?;

    let credential = state.auth.exchange_code(&code).await?;
    tracing::info!("Authorization code exchanged, token expires in {}s", credential.expires_in);

    // API clients ask for JSON; browsers go back to the landing page
    if wants_json(&headers) {
        return Ok(Json(CallbackResponse {
            access_token: credential.access_token,
            refresh_token: credential.refresh_token,
            expires_in: credential.expires_in,
        })
        .into_response());
    }

    Ok(Redirect::to(&landing_redirect(&credential)?).into_response())
}

async fn refresh_token(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<Json<Value>> {
    let Json(req) = payload.map_err(|e| AppError::InvalidRequest(e.body_text()))?;
    let refresh_token = req
        .refresh_token
        .ok_or_else(|| AppError::InvalidRequest("Refresh token is required".to_string()))?;

    let body = state.auth.refresh(&refresh_token).await?;
    Ok(Json(body))
}

fn wants_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(|accept| accept.contains("application/json"))
        .unwrap_or(false)
}

/// `/?access_token=..&refresh_token=..&expires_in=..` for the landing page to pick up.
fn landing_redirect(credential: &AccessCredential) -> Result<String> {
    let mut target = Url::parse("http://localhost/")
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Building redirect: {}", e)))?;

    {
        let mut query = target.query_pairs_mut();
        query.append_pair("access_token", &credential.access_token);
        if let Some(refresh_token) = &credential.refresh_token {
            query.append_pair("refresh_token", refresh_token);
        }
        query.append_pair("expires_in", &credential.expires_in.to_string());
    }

    Ok(format!("/?{}", target.query().unwrap_or_default()))
}
