use crate::config::Config;
use crate::error::{AppError, Result};
use rand::Rng;
use reqwest::{header::RETRY_AFTER, RequestBuilder, Response, StatusCode};
use std::time::Duration;

const MAX_DELAY: Duration = Duration::from_secs(5);

/// Bounded exponential backoff shared by every outbound client.
///
/// Transport failures (connect, timeout) and 429/5xx answers are retried. Whatever
/// the last attempt produced is handed back so callers can map status and body
/// themselves.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: MAX_DELAY,
        }
    }

    /// One attempt, for requests that must not be replayed.
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO)
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.retry_attempts, config.retry_base_delay)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before retrying after `attempt` (1-based) failed, without jitter.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    fn jittered(&self, delay: Duration) -> Duration {
        let spread = delay.as_millis() as u64 / 2;
        if spread == 0 {
            return delay;
        }
        let extra = rand::thread_rng().gen_range(0..=spread);
        (delay + Duration::from_millis(extra)).min(self.max_delay)
    }

    pub async fn send<F>(&self, service: &'static str, build: F) -> Result<Response>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut attempt = 1;

        loop {
            match build().send().await {
                Ok(response) => {
                    let status = response.status();
                    if attempt >= self.max_attempts || !is_retryable(status) {
                        return Ok(response);
                    }

                    let delay = retry_after(&response)
                        .map(|d| d.min(self.max_delay))
                        .unwrap_or_else(|| self.jittered(self.backoff(attempt)));

                    tracing::warn!(
                        "{} answered {} (attempt {}/{}), retrying in {:?}",
                        service,
                        status,
                        attempt,
                        self.max_attempts,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) if attempt < self.max_attempts && (e.is_connect() || e.is_timeout()) => {
                    let delay = self.jittered(self.backoff(attempt));
                    tracing::warn!(
                        "{} request failed (attempt {}/{}): {}, retrying in {:?}",
                        service,
                        attempt,
                        self.max_attempts,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(AppError::upstream_transport(service, e)),
            }

            attempt += 1;
        }
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn retry_after(response: &Response) -> Option<Duration> {
    if response.status() != StatusCode::TOO_MANY_REQUESTS {
        return None;
    }

    response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}
