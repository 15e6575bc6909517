pub mod audio;
pub mod credential;
pub mod intent;
pub mod request;
pub mod track;

pub use audio::DownloadedAudio;
pub use credential::{normalize_bearer, AccessCredential};
pub use intent::{Intent, RawIntent};
pub use request::SongRequestBody;
pub use track::{format_tracks, Playlist, PlaylistSummary, Track, TrackView};
