pub mod adlib;
pub mod downloader;
pub mod intent_extractor;
pub mod retry;
pub mod song_request;
pub mod spotify;
pub mod spotify_auth;
pub mod text_generation;
pub mod track_resolver;

pub use adlib::AdlibGenerator;
pub use downloader::Downloader;
pub use intent_extractor::IntentExtractor;
pub use retry::RetryPolicy;
pub use song_request::SongRequestService;
pub use spotify::SpotifyClient;
pub use spotify_auth::SpotifyAuthClient;
pub use text_generation::TextGenerationClient;
pub use track_resolver::TrackResolver;
