use crate::error::{AppError, Result};
use crate::models::{normalize_bearer, Playlist, Track};
use crate::services::spotify::SpotifyClient;
use crate::services::spotify_auth::SpotifyAuthClient;
use std::sync::Arc;

/// Maps an intent onto Spotify ids. First result wins; there is no fuzzy retry.
pub struct TrackResolver {
    spotify: Arc<SpotifyClient>,
    auth: Arc<SpotifyAuthClient>,
}

impl TrackResolver {
    pub fn new(spotify: Arc<SpotifyClient>, auth: Arc<SpotifyAuthClient>) -> Self {
        Self { spotify, auth }
    }

    /// Searches `track:<song> artist:<artist>` with limit 1. Without a user token
    /// an app token from the client-credentials grant is used instead.
    pub async fn resolve_track(
        &self,
        song: &str,
        artist: &str,
        access_token: Option<&str>,
    ) -> Result<Option<Track>> {
        let (song, artist) = (song.trim(), artist.trim());
        if song.is_empty() || artist.is_empty() {
            return Err(AppError::InvalidRequest(
                "Both song and artist are required".to_string(),
            ));
        }

        let query = format!("track:{} artist:{}", song, artist);
        // Prefer the user's token, fall back to an app token
        let tracks = match access_token.and_then(normalize_bearer) {
            Some(token) => self.spotify.search_tracks(token, &query, 1).await?,
            None => {
                let app = self.auth.client_credentials().await?;
                self.spotify
                    .search_tracks(&app.access_token, &query, 1)
                    .await?
            }
        };

        Ok(tracks.into_iter().next())
    }

    /// First of the caller's playlists whose name contains `name`, ignoring case.
    pub async fn resolve_playlist(
        &self,
        name: &str,
        access_token: Option<&str>,
    ) -> Result<Option<Playlist>> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::InvalidRequest("Playlist name is required".to_string()));
        }

        let token = access_token.and_then(normalize_bearer).ok_or_else(|| {
            AppError::InvalidRequest(
                "Access token is required to look up your playlists".to_string(),
            )
        })?;

        let playlists = self.spotify.list_playlists(token).await?;
        Ok(find_playlist(&playlists, name).cloned())
    }
}

pub fn find_playlist<'a>(playlists: &'a [Playlist], name: &str) -> Option<&'a Playlist> {
    let needle = name.to_lowercase();
    playlists
        .iter()
        .find(|p| p.name.to_lowercase().contains(&needle))
}
