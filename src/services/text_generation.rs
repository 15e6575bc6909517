use crate::config::Config;
use crate::error::{AppError, Result};
use crate::services::retry::RetryPolicy;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const SERVICE: &str = "Text generation";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Prompt in, text out. The model is only ever asked for data, and its reply is
/// only ever parsed, never executed.
pub struct TextGenerationClient {
    api_key: Option<String>,
    model: String,
    api_url: String,
    client: Client,
    retry: RetryPolicy,
}

#[derive(Debug, Serialize)]
struct ClaudeRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<ClaudeMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ClaudeMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ClaudeResponse {
    #[serde(default)]
    content: Vec<ClaudeContent>,
}

#[derive(Debug, Deserialize)]
struct ClaudeContent {
    #[serde(default)]
    text: Option<String>,
}

impl TextGenerationClient {
    pub fn new(config: &Config, client: Client, retry: RetryPolicy) -> Self {
        Self {
            api_key: config.text_api_key.clone(),
            model: config.text_model.clone(),
            api_url: config.text_api_url.clone(),
            client,
            retry,
        }
    }

    pub async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            AppError::ConfigMissing("ANTHROPIC_API_KEY must be set".to_string())
        })?;

        let request = ClaudeRequest {
            model: &self.model,
            max_tokens,
            messages: vec![ClaudeMessage {
                role: "user",
                content: prompt,
            }],
        };
        let url = format!("{}/v1/messages", self.api_url);

        let response = self
            .retry
            .send(SERVICE, || {
                self.client
                    .post(&url)
                    .header("x-api-key", api_key)
                    .header("anthropic-version", ANTHROPIC_VERSION)
                    .json(&request)
            })
            .await?;

        if !response.status().is_success() {
            return Err(AppError::from_response(SERVICE, response).await);
        }

        let reply: ClaudeResponse = response
            .json()
            .await
            .map_err(|e| AppError::MalformedResponse(format!("Text generation reply: {}", e)))?;

        let text: String = reply
            .content
            .into_iter()
            .filter_map(|c| c.text)
            .collect::<Vec<_>>()
            .join("");

        tracing::debug!("Text generation returned {} chars", text.len());

        Ok(text)
    }
}
