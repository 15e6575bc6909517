use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    /// Empty for local files, which Spotify lists without an id
    pub id: String,
    pub name: String,
    /// Artist names in the order the provider returned them
    pub artists: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playlist {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tracks: Vec<Track>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlaylistSummary {
    pub id: String,
    pub name: String,
}

impl From<&Playlist> for PlaylistSummary {
    fn from(playlist: &Playlist) -> Self {
        PlaylistSummary {
            id: playlist.id.clone(),
            name: playlist.name.clone(),
        }
    }
}

/// Track shape the landing page renders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackView {
    pub title: String,
    pub artist: String,
    #[serde(rename = "downloadLink")]
    pub download_link: Option<String>,
}

impl From<Track> for TrackView {
    fn from(track: Track) -> Self {
        TrackView {
            artist: track.artists.join(", "),
            title: track.name,
            download_link: None,
        }
    }
}

pub fn format_tracks(tracks: Vec<Track>) -> Vec<TrackView> {
    tracks.into_iter().map(TrackView::from).collect()
}
