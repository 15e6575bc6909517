use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize)]
pub struct DownloadedAudio {
    pub track_id: String,
    pub local_path: PathBuf,
}

impl DownloadedAudio {
    /// Public path the facade serves this file from
    pub fn play_url(&self) -> String {
        format!("/play/{}", self.track_id)
    }
}
