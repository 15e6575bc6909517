use crate::config::{Config, SpotifyCredentials};
use crate::error::{AppError, Result};
use crate::models::AccessCredential;
use crate::services::retry::RetryPolicy;
use reqwest::{Client, Url};
use serde_json::Value;

const SERVICE: &str = "Spotify accounts";
const SCOPES: &str = "playlist-read-private user-library-read";

/// OAuth2 grants against the Spotify token endpoint. Nothing is cached: every
/// credential goes straight back to the caller.
pub struct SpotifyAuthClient {
    credentials: Option<SpotifyCredentials>,
    client_id: Option<String>,
    redirect_uri: Option<String>,
    accounts_url: String,
    client: Client,
    retry: RetryPolicy,
}

impl SpotifyAuthClient {
    pub fn new(config: &Config, client: Client, retry: RetryPolicy) -> Self {
        Self {
            credentials: config.spotify.clone(),
            client_id: config.spotify_client_id.clone(),
            redirect_uri: config.spotify_redirect_uri.clone(),
            accounts_url: config.spotify_accounts_url.clone(),
            client,
            retry,
        }
    }

    pub fn authorize_url(&self) -> Result<String> {
        let (client_id, redirect_uri) = match (&self.client_id, &self.redirect_uri) {
            (Some(id), Some(uri)) => (id, uri),
            _ => {
                return Err(AppError::ConfigMissing(
                    "SPOTIFY_CLIENT_ID and SPOTIFY_REDIRECT_URI must be set".to_string(),
                ))
            }
        };

        let url = Url::parse_with_params(
            &format!("{}/authorize", self.accounts_url),
            &[
                ("client_id", client_id.as_str()),
                ("response_type", "code"),
                ("redirect_uri", redirect_uri.as_str()),
                ("scope", SCOPES),
            ],
        )
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Invalid accounts URL: {}", e)))?;

        Ok(url.to_string())
    }

    pub async fn exchange_code(&self, code: &str) -> Result<AccessCredential> {
        let code = code.trim();
        if code.is_empty() {
            return Err(AppError::InvalidRequest(
                "Authorization code is missing".to_string(),
            ));
        }

        let redirect_uri = self.credentials()?.redirect_uri.clone();
        // Codes are single-use: a replay after a lost response only earns invalid_grant
        let body = self
            .token_request(
                &[
                    ("grant_type", "authorization_code"),
                    ("code", code),
                    ("redirect_uri", redirect_uri.as_str()),
                ],
                &RetryPolicy::no_retry(),
            )
            .await?;

        parse_credential(body)
    }

    /// Returns the provider's token JSON untouched.
    pub async fn refresh(&self, refresh_token: &str) -> Result<Value> {
        let refresh_token = refresh_token.trim();
        if refresh_token.is_empty() {
            return Err(AppError::InvalidRequest(
                "Refresh token is required".to_string(),
            ));
        }

        self.token_request(
            &[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ],
            &self.retry,
        )
        .await
    }

    /// App-only token, good for catalog search but not for user playlists.
    pub async fn client_credentials(&self) -> Result<AccessCredential> {
        let body = self
            .token_request(&[("grant_type", "client_credentials")], &self.retry)
            .await?;

        parse_credential(body)
    }

    fn credentials(&self) -> Result<&SpotifyCredentials> {
        self.credentials.as_ref().ok_or_else(|| {
            AppError::ConfigMissing(
                "SPOTIFY_CLIENT_ID, SPOTIFY_CLIENT_SECRET and SPOTIFY_REDIRECT_URI must be set"
                    .to_string(),
            )
        })
    }

    async fn token_request(&self, grant: &[(&str, &str)], retry: &RetryPolicy) -> Result<Value> {
        let credentials = self.credentials()?;
        let url = format!("{}/api/token", self.accounts_url);

        let mut form: Vec<(&str, &str)> = grant.to_vec();
        form.push(("client_id", credentials.client_id.as_str()));
        form.push(("client_secret", credentials.client_secret.as_str()));

        tracing::debug!("Requesting {} grant", grant[0].1);

        let response = retry
            .send(SERVICE, || self.client.post(&url).form(&form))
            .await?;

        if !response.status().is_success() {
            return Err(AppError::from_response(SERVICE, response).await);
        }

        response
            .json()
            .await
            .map_err(|e| AppError::MalformedResponse(format!("Token response: {}", e)))
    }
}

fn parse_credential(body: Value) -> Result<AccessCredential> {
    serde_json::from_value(body)
        .map_err(|e| AppError::MalformedResponse(format!("Token response: {}", e)))
}
