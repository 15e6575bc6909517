use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const SPOTIFY_ACCOUNTS_URL: &str = "https://accounts.spotify.com";
pub const SPOTIFY_API_URL: &str = "https://api.spotify.com/v1";
pub const TEXT_API_URL: &str = "https://api.anthropic.com";
pub const DOWNLOAD_API_URL: &str = "https://spotify-downloader9.p.rapidapi.com";
pub const DOWNLOAD_API_HOST: &str = "spotify-downloader9.p.rapidapi.com";
pub const DEFAULT_TEXT_MODEL: &str = "claude-3-5-haiku-20241022";

/// Spotify application credentials. All three are needed for any token grant.
#[derive(Clone)]
pub struct SpotifyCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

impl std::fmt::Debug for SpotifyCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpotifyCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_uri", &self.redirect_uri)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// `None` until every Spotify variable is set; endpoints that need it answer 500.
    pub spotify: Option<SpotifyCredentials>,
    /// Set only when the client id and redirect URI exist (enough to build the login URL).
    pub spotify_client_id: Option<String>,
    pub spotify_redirect_uri: Option<String>,
    pub text_api_key: Option<String>,
    pub text_model: String,
    pub download_api_key: Option<String>,
    pub download_api_host: String,
    pub spotify_accounts_url: String,
    pub spotify_api_url: String,
    pub text_api_url: String,
    pub download_api_url: String,
    pub server_host: String,
    pub server_port: u16,
    pub download_dir: PathBuf,
    /// How long a downloaded file is kept before the sweeper removes it
    pub audio_retention: Duration,
    pub retry_attempts: u32,
    pub retry_base_delay: Duration,
    pub http_timeout: Duration,
    /// Allowed CORS origins (comma-separated). Use "*" for any origin.
    pub cors_origins: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let client_id = var_any(&["SPOTIFY_CLIENT_ID", "CLIENT_ID"]);
        let client_secret = var_any(&["SPOTIFY_CLIENT_SECRET", "CLIENT_SECRET"]);
        let redirect_uri = var_any(&["SPOTIFY_REDIRECT_URI", "REDIRECT_URI"]);

        let spotify = match (&client_id, &client_secret, &redirect_uri) {
            (Some(id), Some(secret), Some(uri)) => Some(SpotifyCredentials {
                client_id: id.clone(),
                client_secret: secret.clone(),
                redirect_uri: uri.clone(),
            }),
            _ => None,
        };

        if spotify.is_none() {
            tracing::warn!("Spotify credentials incomplete, auth endpoints will answer 500");
        }

        let cors_origins = env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Config {
            spotify,
            spotify_client_id: client_id,
            spotify_redirect_uri: redirect_uri,
            text_api_key: var_any(&["ANTHROPIC_API_KEY"]),
            text_model: env::var("TEXT_MODEL").unwrap_or_else(|_| DEFAULT_TEXT_MODEL.to_string()),
            download_api_key: var_any(&["RAPIDAPI_KEY"]),
            download_api_host: env::var("RAPIDAPI_HOST")
                .unwrap_or_else(|_| DOWNLOAD_API_HOST.to_string()),
            spotify_accounts_url: url_var("SPOTIFY_ACCOUNTS_URL", SPOTIFY_ACCOUNTS_URL),
            spotify_api_url: url_var("SPOTIFY_API_URL", SPOTIFY_API_URL),
            text_api_url: url_var("TEXT_API_URL", TEXT_API_URL),
            download_api_url: url_var("DOWNLOAD_API_URL", DOWNLOAD_API_URL),
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: parse_var("SERVER_PORT", 8000)?,
            download_dir: env::var("DOWNLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("downloads")),
            audio_retention: Duration::from_secs(parse_var("AUDIO_RETENTION_SECS", 3600)?),
            retry_attempts: parse_var("HTTP_RETRY_ATTEMPTS", 3)?,
            retry_base_delay: Duration::from_millis(parse_var("HTTP_RETRY_BASE_MS", 250)?),
            http_timeout: Duration::from_secs(parse_var("HTTP_TIMEOUT_SECS", 30)?),
            cors_origins,
        })
    }
}

/// First non-blank value among `names`.
fn var_any(names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| env::var(name).ok())
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
}

fn url_var(name: &str, default: &str) -> String {
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .trim_end_matches('/')
        .to_string()
}

fn parse_var<T>(name: &str, default: T) -> Result<T, anyhow::Error>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{} has an invalid value {:?}: {}", name, raw, e)),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_non_blank_alias_wins() {
        env::set_var("SONG_REQUEST_TEST_ALIAS_B", "  ");
        env::set_var("SONG_REQUEST_TEST_ALIAS_C", " value ");
        assert_eq!(
            var_any(&[
                "SONG_REQUEST_TEST_ALIAS_A",
                "SONG_REQUEST_TEST_ALIAS_B",
                "SONG_REQUEST_TEST_ALIAS_C"
            ]),
            Some("value".to_string())
        );
        assert_eq!(var_any(&["SONG_REQUEST_TEST_ALIAS_A"]), None);
    }

    #[test]
    fn numeric_settings_fall_back_or_fail_loudly() {
        assert_eq!(parse_var("SONG_REQUEST_TEST_UNSET_PORT", 8000u16).unwrap(), 8000);

        env::set_var("SONG_REQUEST_TEST_PORT", " 9000 ");
        assert_eq!(parse_var("SONG_REQUEST_TEST_PORT", 8000u16).unwrap(), 9000);

        env::set_var("SONG_REQUEST_TEST_BAD_PORT", "eighty");
        let err = parse_var("SONG_REQUEST_TEST_BAD_PORT", 8000u16).unwrap_err();
        assert!(err.to_string().contains("SONG_REQUEST_TEST_BAD_PORT"));
    }

    #[test]
    fn endpoint_overrides_drop_trailing_slash() {
        env::set_var("SONG_REQUEST_TEST_URL", "http://localhost:9000/");
        assert_eq!(
            url_var("SONG_REQUEST_TEST_URL", SPOTIFY_API_URL),
            "http://localhost:9000"
        );
        assert_eq!(url_var("SONG_REQUEST_TEST_UNSET_URL", SPOTIFY_API_URL), SPOTIFY_API_URL);
    }
}
