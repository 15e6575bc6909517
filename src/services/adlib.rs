use crate::error::{AppError, Result};
use crate::services::text_generation::TextGenerationClient;
use std::sync::Arc;

const MAX_TOKENS: u32 = 60;

pub struct AdlibGenerator {
    text: Arc<TextGenerationClient>,
}

impl AdlibGenerator {
    pub fn new(text: Arc<TextGenerationClient>) -> Self {
        Self { text }
    }

    pub async fn generate(&self, song: &str, artist: &str) -> Result<String> {
        let prompt = format!(
            "You are an upbeat radio DJ. Write one short adlib (under 20 words) announcing \
            the song \"{}\" by {}. Respond with only the adlib text, no quotes.",
            song, artist
        );

        let reply = self.text.complete(&prompt, MAX_TOKENS).await?;
        let adlib = clean_adlib(&reply);

        if adlib.is_empty() {
            return Err(AppError::MalformedResponse("Empty adlib".to_string()));
        }

        Ok(adlib)
    }

    /// Never fails: any upstream problem becomes the fixed announcement.
    pub async fn generate_or_fallback(&self, song: &str, artist: &str) -> String {
        match self.generate(song, artist).await {
            Ok(adlib) => adlib,
            Err(e) => {
                tracing::warn!("Adlib generation failed, using fallback: {}", e);
                fallback_adlib(song, artist)
            }
        }
    }
}

pub fn fallback_adlib(song: &str, artist: &str) -> String {
    format!("Now playing {} by {}!", song, artist)
}

fn clean_adlib(reply: &str) -> String {
    reply
        .trim()
        .trim_matches(|c: char| c == '"' || c == '\u{201c}' || c == '\u{201d}')
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::retry::RetryPolicy;
    use crate::test_support::{client_config, text_reply, FakeUpstream};
    use axum::{http::StatusCode, routing::post, Router};
    use reqwest::Client;
    use std::time::Duration;

    fn generator(base_url: &str) -> AdlibGenerator {
        let config = client_config(base_url);
        AdlibGenerator::new(Arc::new(TextGenerationClient::new(
            &config,
            Client::new(),
            RetryPolicy::new(2, Duration::from_millis(1)),
        )))
    }

    #[test]
    fn strips_wrapping_quotes() {
        assert_eq!(clean_adlib("  \"Turn it up for Asake!\"\n"), "Turn it up for Asake!");
    }

    #[tokio::test]
    async fn uses_model_text() {
        let router = Router::new().route(
            "/text/v1/messages",
            post(|| async { text_reply("\"Lagos, turn it up for Joha!\"") }),
        );
        let upstream = FakeUpstream::spawn(router).await;

        let adlib = generator(&upstream.base_url)
            .generate_or_fallback("Joha", "Asake")
            .await;
        assert_eq!(adlib, "Lagos, turn it up for Joha!");
    }

    #[tokio::test]
    async fn falls_back_on_upstream_failure() {
        let router = Router::new().route(
            "/text/v1/messages",
            post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "overloaded") }),
        );
        let upstream = FakeUpstream::spawn(router).await;

        let adlib = generator(&upstream.base_url)
            .generate_or_fallback("Joha", "Asake")
            .await;
        assert_eq!(adlib, "Now playing Joha by Asake!");
    }

    #[tokio::test]
    async fn falls_back_on_empty_reply() {
        let router = Router::new().route("/text/v1/messages", post(|| async { text_reply("  ") }));
        let upstream = FakeUpstream::spawn(router).await;

        let generator = generator(&upstream.base_url);
        assert!(generator.generate("Joha", "Asake").await.is_err());
        assert_eq!(
            generator.generate_or_fallback("Joha", "Asake").await,
            "Now playing Joha by Asake!"
        );
    }
}
