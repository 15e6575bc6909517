use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::{normalize_bearer, Playlist, Track};
use crate::services::retry::RetryPolicy;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;

const SERVICE: &str = "Spotify";
const DAILY_MIX: &str = "Daily Mix";
/// Upper bound on `next` links followed for one listing
const MAX_PAGES: usize = 50;

/// Read-only access to the Spotify Web API on behalf of the caller's token.
pub struct SpotifyClient {
    api_url: String,
    client: Client,
    retry: RetryPolicy,
}

#[derive(Debug, Deserialize)]
struct Paging<T> {
    // A plain `default` would add a `T: Default` bound
    #[serde(default = "Vec::new")]
    items: Vec<T>,
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SpotifyPlaylist {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct PlaylistItem {
    #[serde(default)]
    track: Option<SpotifyTrack>,
}

#[derive(Debug, Deserialize)]
struct SpotifyTrack {
    id: Option<String>,
    name: String,
    #[serde(default)]
    artists: Vec<SpotifyArtist>,
}

#[derive(Debug, Deserialize)]
struct SpotifyArtist {
    name: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    tracks: Option<Paging<Option<SpotifyTrack>>>,
}

impl From<SpotifyTrack> for Track {
    fn from(track: SpotifyTrack) -> Self {
        Track {
            id: track.id.unwrap_or_default(),
            name: track.name,
            artists: track.artists.into_iter().map(|a| a.name).collect(),
        }
    }
}

impl SpotifyClient {
    pub fn new(config: &Config, client: Client, retry: RetryPolicy) -> Self {
        Self {
            api_url: config.spotify_api_url.clone(),
            client,
            retry,
        }
    }

    /// All of the caller's playlists in provider order. Accepts a raw token or a
    /// full `Bearer <token>` header value.
    pub async fn list_playlists(&self, access_token: &str) -> Result<Vec<Playlist>> {
        let token = bearer(access_token)?;
        let url = format!("{}/me/playlists", self.api_url);

        let playlists: Vec<Option<SpotifyPlaylist>> =
            self.get_pages(token, url, &[("limit", "50")]).await?;

        Ok(playlists
            .into_iter()
            .flatten()
            .map(|p| Playlist {
                id: p.id,
                name: p.name,
                tracks: Vec::new(),
            })
            .collect())
    }

    /// Tracks of a playlist in provider order. Removed tracks come back as
    /// `"track": null` and are skipped.
    pub async fn list_tracks(&self, access_token: &str, playlist_id: &str) -> Result<Vec<Track>> {
        let token = bearer(access_token)?;
        if playlist_id.trim().is_empty() {
            return Err(AppError::InvalidRequest("Playlist id is required".to_string()));
        }

        let url = format!("{}/playlists/{}/tracks", self.api_url, playlist_id.trim());
        let items: Vec<PlaylistItem> = self.get_pages(token, url, &[("limit", "100")]).await?;

        let total = items.len();
        let tracks: Vec<Track> = items
            .into_iter()
            .filter_map(|item| item.track)
            .map(Track::from)
            .collect();

        if tracks.len() < total {
            tracing::debug!(
                "Skipped {} empty playlist entries in {}",
                total - tracks.len(),
                playlist_id
            );
        }

        Ok(tracks)
    }

    pub async fn search_tracks(
        &self,
        access_token: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Track>> {
        let token = bearer(access_token)?;
        let url = format!("{}/search", self.api_url);
        let limit = limit.to_string();

        tracing::debug!("Searching Spotify with query: {}", query);

        let response: SearchResponse = self
            .get_json(
                token,
                &url,
                &[("q", query), ("type", "track"), ("limit", limit.as_str())],
            )
            .await?;

        Ok(response
            .tracks
            .map(|page| page.items.into_iter().flatten().map(Track::from).collect())
            .unwrap_or_default())
    }

    async fn get_pages<T: DeserializeOwned>(
        &self,
        token: &str,
        first_url: String,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut page: Paging<T> = self.get_json(token, &first_url, query).await?;

        // Follow `next` links until the listing ends
        for _ in 1..MAX_PAGES {
            items.append(&mut page.items);
            match page.next.take() {
                Some(next) => page = self.get_json(token, &next, &[]).await?,
                None => return Ok(items),
            }
        }

        tracing::warn!("Stopped following pages of {} after {}", first_url, MAX_PAGES);
        items.append(&mut page.items);
        Ok(items)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        token: &str,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let response = self
            .retry
            .send(SERVICE, || {
                self.client.get(url).bearer_auth(token).query(query)
            })
            .await?;

        if !response.status().is_success() {
            return Err(AppError::from_response(SERVICE, response).await);
        }

        let text = response
            .text()
            .await
            .map_err(|e| AppError::upstream_transport(SERVICE, e))?;

        serde_json::from_str(&text).map_err(|e| {
            AppError::MalformedResponse(format!(
                "Spotify response: {} - {}",
                e,
                &text[..floor_boundary(&text, 200)]
            ))
        })
    }
}

fn bearer(access_token: &str) -> Result<&str> {
    normalize_bearer(access_token)
        .ok_or_else(|| AppError::InvalidRequest("Access token is required".to_string()))
}

fn floor_boundary(text: &str, max: usize) -> usize {
    let mut cut = max.min(text.len());
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    cut
}

/// First playlist whose name contains "Daily Mix" (case-sensitive), else the
/// first playlist, else `None`.
pub fn select_default_playlist(playlists: &[Playlist]) -> Option<&Playlist> {
    playlists
        .iter()
        .find(|p| p.name.contains(DAILY_MIX))
        .or_else(|| playlists.first())
}
