use serde::{Deserialize, Serialize};

/// What the text model extracted, before validation. Every key is optional because
/// the model is not trusted to return all of them.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawIntent {
    #[serde(default)]
    pub song: Option<String>,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub playlist: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Intent {
    Track { song: String, artist: String },
    Playlist { name: String },
    Unresolved,
}

impl From<RawIntent> for Intent {
    fn from(raw: RawIntent) -> Self {
        let song = non_blank(raw.song);
        let artist = non_blank(raw.artist);
        let playlist = non_blank(raw.playlist);

        match (song, artist, playlist) {
            (Some(song), Some(artist), _) => Intent::Track { song, artist },
            (_, _, Some(name)) => Intent::Playlist { name },
            (song, artist, None) => {
                if song.is_some() || artist.is_some() {
                    tracing::debug!(
                        "Discarding partial track intent (song: {:?}, artist: {:?})",
                        song,
                        artist
                    );
                }
                Intent::Unresolved
            }
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
