use crate::config::Config;
use crate::error::AppError;
use crate::models::DownloadedAudio;
use crate::services::retry::RetryPolicy;
use bytes::Bytes;
use futures::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

const SERVICE: &str = "Download proxy";
const AUDIO_EXTENSION: &str = "mp3";
const PARTIAL_EXTENSION: &str = "part";

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("Invalid track id {0:?}")]
    InvalidTrackId(String),

    #[error("No download link for {track_id}: {reason}")]
    LinkUnavailable { track_id: String, reason: String },

    #[error("Audio transfer failed: {detail}")]
    TransferFailed { status: Option<u16>, detail: String },

    #[error("No downloaded audio for track {0}")]
    NotFound(String),

    #[error("Audio storage error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Upstream(#[from] AppError),
}

impl From<DownloadError> for AppError {
    fn from(err: DownloadError) -> Self {
        match err {
            DownloadError::InvalidTrackId(_) => AppError::InvalidRequest(err.to_string()),
            DownloadError::LinkUnavailable { .. } => AppError::upstream_transport(SERVICE, err),
            DownloadError::TransferFailed {
                status: Some(status),
                detail,
            } => AppError::upstream_status("Audio transfer", status, detail),
            DownloadError::TransferFailed { status: None, detail } => {
                AppError::upstream_transport("Audio transfer", detail)
            }
            DownloadError::NotFound(_) => AppError::NotFound(err.to_string()),
            DownloadError::Io(e) => AppError::Internal(e.into()),
            DownloadError::Upstream(e) => e,
        }
    }
}

#[derive(Debug, Deserialize)]
struct LinkResponse {
    #[serde(default)]
    success: bool,
    data: Option<LinkData>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LinkData {
    #[serde(rename = "downloadLink")]
    download_link: Option<String>,
}

/// Fetches audio through the download proxy into `download_dir`, one file per
/// track id.
///
/// Bytes land in a uniquely named `.part` file that is renamed into place once
/// complete. Two downloads of the same id are not coordinated: both transfer,
/// and whichever rename happens last wins.
pub struct Downloader {
    api_key: Option<String>,
    api_host: String,
    api_url: String,
    download_dir: PathBuf,
    retention: Duration,
    client: Client,
    retry: RetryPolicy,
}

impl Downloader {
    pub fn new(config: &Config, client: Client, retry: RetryPolicy) -> Self {
        Self {
            api_key: config.download_api_key.clone(),
            api_host: config.download_api_host.clone(),
            api_url: config.download_api_url.clone(),
            download_dir: config.download_dir.clone(),
            retention: config.audio_retention,
            client,
            retry,
        }
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    pub async fn download(&self, track_id: &str) -> Result<DownloadedAudio, DownloadError> {
        let path = self.audio_path(track_id)?;

        // Reuse an earlier download, restarting its retention window
        match touch(&path).await {
            Ok(()) => {
                tracing::debug!("Reusing downloaded audio for {}", track_id);
                return Ok(DownloadedAudio {
                    track_id: track_id.to_string(),
                    local_path: path,
                });
            }
            // Never downloaded, or swept since
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        // Ask the proxy for a short-lived link to the audio
        let link = self.request_link(track_id).await?;

        tracing::info!("Downloading audio for track {}", track_id);
        let response = self
            .client
            .get(&link)
            .send()
            .await
            .map_err(|e| DownloadError::TransferFailed {
                status: None,
                detail: e.to_string(),
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(DownloadError::TransferFailed {
                status: Some(status),
                detail: body,
            });
        }

        // Stream into a private partial file so readers never see half a track
        tokio::fs::create_dir_all(&self.download_dir).await?;
        let partial = self.download_dir.join(format!(
            "{}.{}.{}",
            track_id,
            Uuid::new_v4().simple(),
            PARTIAL_EXTENSION
        ));

        if let Err(e) = write_body(response, &partial).await {
            if let Err(cleanup) = tokio::fs::remove_file(&partial).await {
                tracing::warn!("Failed to remove {}: {}", partial.display(), cleanup);
            }
            return Err(e);
        }

        // Publish; a concurrent download of the same id may overwrite this
        tokio::fs::rename(&partial, &path).await?;
        tracing::info!("Saved track {} to {}", track_id, path.display());

        Ok(DownloadedAudio {
            track_id: track_id.to_string(),
            local_path: path,
        })
    }

    /// Bytes of a previously downloaded track.
    pub async fn serve(&self, track_id: &str) -> Result<Bytes, DownloadError> {
        let path = self.audio_path(track_id)?;

        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(DownloadError::NotFound(track_id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Deletes audio (and abandoned partial files) older than the retention window.
    pub async fn sweep_expired(&self) -> Result<usize, DownloadError> {
        let cutoff = match SystemTime::now().checked_sub(self.retention) {
            Some(cutoff) => cutoff,
            None => return Ok(0),
        };

        let mut entries = match tokio::fs::read_dir(&self.download_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let managed = matches!(
                path.extension().and_then(|e| e.to_str()),
                Some(AUDIO_EXTENSION) | Some(PARTIAL_EXTENSION)
            );
            if !managed {
                continue;
            }

            let metadata = entry.metadata().await?;
            if !metadata.is_file() || metadata.modified()? > cutoff {
                continue;
            }

            match tokio::fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                // Another sweep or download got there first
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        if removed > 0 {
            tracing::info!("Removed {} expired audio files", removed);
        }

        Ok(removed)
    }

    async fn request_link(&self, track_id: &str) -> Result<String, DownloadError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            AppError::ConfigMissing("RAPIDAPI_KEY must be set".to_string())
        })?;
        let url = format!("{}/downloadSong", self.api_url);

        let response = self
            .retry
            .send(SERVICE, || {
                self.client
                    .get(&url)
                    .query(&[("songId", track_id)])
                    .header("x-rapidapi-key", api_key)
                    .header("x-rapidapi-host", &self.api_host)
            })
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::LinkUnavailable {
                track_id: track_id.to_string(),
                reason: format!("proxy responded with status {}", status.as_u16()),
            });
        }

        // The proxy answers 200 with `success: false` for unknown tracks
        let body: LinkResponse = response.json().await.map_err(|e| {
            DownloadError::LinkUnavailable {
                track_id: track_id.to_string(),
                reason: format!("unreadable proxy response: {}", e),
            }
        })?;

        let link = body
            .data
            .and_then(|d| d.download_link)
            .filter(|link| !link.trim().is_empty());

        match link {
            Some(link) if body.success => Ok(link),
            _ => Err(DownloadError::LinkUnavailable {
                track_id: track_id.to_string(),
                reason: body
                    .message
                    .unwrap_or_else(|| "proxy reported failure".to_string()),
            }),
        }
    }

    fn audio_path(&self, track_id: &str) -> Result<PathBuf, DownloadError> {
        if !is_valid_track_id(track_id) {
            return Err(DownloadError::InvalidTrackId(track_id.to_string()));
        }
        Ok(self
            .download_dir
            .join(format!("{}.{}", track_id, AUDIO_EXTENSION)))
    }
}

/// Spotify ids are base62; anything else could escape the download directory.
pub fn is_valid_track_id(track_id: &str) -> bool {
    !track_id.is_empty()
        && track_id.len() <= 64
        && track_id.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Sets the modification time of an existing file to now.
async fn touch(path: &Path) -> std::io::Result<()> {
    let file = tokio::fs::OpenOptions::new().write(true).open(path).await?;
    let file = file.into_std().await;
    tokio::task::spawn_blocking(move || file.set_modified(SystemTime::now()))
        .await
        .map_err(std::io::Error::other)?
}

async fn write_body(response: reqwest::Response, path: &Path) -> Result<(), DownloadError> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| DownloadError::TransferFailed {
            status: None,
            detail: e.to_string(),
        })?;
        file.write_all(&chunk).await?;
    }

    file.flush().await?;
    Ok(())
}
