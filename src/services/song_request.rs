use crate::error::{AppError, Result};
use crate::models::{format_tracks, Intent, PlaylistSummary, TrackView};
use crate::services::{
    AdlibGenerator, Downloader, IntentExtractor, SpotifyClient, TrackResolver,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SongRequestOutcome {
    Track {
        song_id: String,
        song: String,
        artist: String,
        adlib: String,
        download_link: Option<String>,
    },
    Playlist {
        playlist: PlaylistSummary,
        tracks: Vec<TrackView>,
    },
}

/// Free text to playable result: extract, resolve, download, announce.
/// Every step runs in order; nothing fans out.
pub struct SongRequestService {
    extractor: Arc<IntentExtractor>,
    resolver: Arc<TrackResolver>,
    spotify: Arc<SpotifyClient>,
    downloader: Arc<Downloader>,
    adlib: Arc<AdlibGenerator>,
}

impl SongRequestService {
    pub fn new(
        extractor: Arc<IntentExtractor>,
        resolver: Arc<TrackResolver>,
        spotify: Arc<SpotifyClient>,
        downloader: Arc<Downloader>,
        adlib: Arc<AdlibGenerator>,
    ) -> Self {
        Self {
            extractor,
            resolver,
            spotify,
            downloader,
            adlib,
        }
    }

    pub async fn handle(
        &self,
        input: &str,
        download: bool,
        access_token: Option<&str>,
    ) -> Result<SongRequestOutcome> {
        let input = input.trim();
        if input.is_empty() {
            return Err(AppError::InvalidRequest("Input is required".to_string()));
        }

        // One model call decides between a track and a playlist
        match self.extractor.extract(input).await? {
            Intent::Track { song, artist } => {
                self.play_track(&song, &artist, download, access_token).await
            }
            Intent::Playlist { name } => self.open_playlist(&name, access_token).await,
            Intent::Unresolved => Err(AppError::InvalidRequest(
                "Could not work out a song and artist or a playlist from the request".to_string(),
            )),
        }
    }

    async fn play_track(
        &self,
        song: &str,
        artist: &str,
        download: bool,
        access_token: Option<&str>,
    ) -> Result<SongRequestOutcome> {
        // Search Spotify for the extracted song and artist
        let track = self
            .resolver
            .resolve_track(song, artist, access_token)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("No track found for {} by {}", song, artist))
            })?;

        // Local files are listed without an id and cannot be fetched
        if track.id.is_empty() {
            return Err(AppError::NotFound(format!(
                "{} has no Spotify id to play",
                track.name
            )));
        }

        info!("Resolved '{}' by '{}' to track {}", song, artist, track.id);

        // Fetch the audio before announcing it, so the link is playable
        let download_link = if download {
            Some(self.downloader.download(&track.id).await?.play_url())
        } else {
            None
        };

        // Announce with every credited artist
        let artist = track.artists.join(", ");
        let adlib = self.adlib.generate_or_fallback(&track.name, &artist).await;

        Ok(SongRequestOutcome::Track {
            song_id: track.id,
            song: track.name,
            artist,
            adlib,
            download_link,
        })
    }

    async fn open_playlist(
        &self,
        name: &str,
        access_token: Option<&str>,
    ) -> Result<SongRequestOutcome> {
        let playlist = self
            .resolver
            .resolve_playlist(name, access_token)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("No playlist matching '{}'", name)))?;

        info!("Resolved playlist '{}' to {}", name, playlist.id);

        // resolve_playlist already rejected a missing token
        let token = access_token.unwrap_or_default();
        let tracks = self.spotify.list_tracks(token, &playlist.id).await?;

        Ok(SongRequestOutcome::Playlist {
            playlist: PlaylistSummary::from(&playlist),
            tracks: format_tracks(tracks),
        })
    }
}
