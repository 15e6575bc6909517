use crate::error::{AppError, Result};
use crate::models::{Intent, RawIntent};
use crate::services::text_generation::TextGenerationClient;
use std::sync::Arc;
use tracing::{info, warn};

const MAX_TOKENS: u32 = 200;

/// Turns a free-form request into a typed [`Intent`].
///
/// The model is treated as a text-to-JSON function. Whatever it answers, the
/// caller gets back a tri-state `Intent` or a typed error, never a panic.
pub struct IntentExtractor {
    text: Arc<TextGenerationClient>,
}

impl IntentExtractor {
    pub fn new(text: Arc<TextGenerationClient>) -> Self {
        Self { text }
    }

    pub async fn extract(&self, user_text: &str) -> Result<Intent> {
        let prompt = format!(
            r#"You turn music requests into search parameters for Spotify.

USER REQUEST: "{}"

Decide whether the user wants a specific song or a playlist.
- For a song, fill "song" with the song title and "artist" with the main artist.
  If the user asks for an artist's latest or most popular song, name that song.
- For a playlist, fill "playlist" with the playlist name.
- Use null for anything you cannot determine.

Respond with ONLY a JSON object, no commentary:
{{"song": "title or null", "artist": "artist or null", "playlist": "name or null"}}"#,
            user_text.replace('"', "'")
        );

        let reply = self.text.complete(&prompt, MAX_TOKENS).await?;
        let intent = parse_intent(&reply)?;

        info!("Extracted intent: {:?}", intent);
        Ok(intent)
    }
}

/// Parses a model reply, tolerating a Markdown code fence around the JSON.
pub fn parse_intent(reply: &str) -> Result<Intent> {
    let body = strip_code_fence(reply);

    let raw: RawIntent = serde_json::from_str(body)
        .or_else(|first_err| match embedded_object(body) {
            Some(object) => serde_json::from_str(object),
            None => Err(first_err),
        })
        .map_err(|e| {
            warn!("Unparseable intent reply: {}", reply);
            AppError::MalformedResponse(format!("Intent reply is not valid JSON: {}", e))
        })?;

    Ok(Intent::from(raw))
}

/// Removes a leading ```` ``` ```` / ```` ```json ```` line and a trailing ```` ``` ````.
pub fn strip_code_fence(text: &str) -> &str {
    let mut body = text.trim();

    if body.starts_with("```") {
        body = match body.find('\n') {
            Some(newline) => &body[newline + 1..],
            None => body.trim_start_matches('`'),
        };
    }

    body.trim_end().trim_end_matches("```").trim()
}

fn embedded_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}
