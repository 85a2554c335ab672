//! HTTP retry policy with exponential backoff.
//!
//! # Retry Policy
//!
//! - Max retries: 2 (3 total attempts), configurable
//! - Initial delay: 500ms, doubling per attempt
//! - Max delay: 8 seconds
//! - Jitter: down-jitter up to 25% (multiplier in [0.75, 1.0])
//!
//! # Retryable Conditions
//!
//! Idempotent requests (GET, PUT, DELETE):
//! - HTTP 408, 429, 5xx
//! - Connection errors and timeouts
//!
//! Non-idempotent requests (POST) are only replayed when the server cannot
//! have acted on them:
//! - Connection never established
//! - HTTP 429 or 503 carrying a valid `Retry-After`
//!
//! A timeout or a bare 5xx after a POST may follow a create that went
//! through, so it is returned as is.
//!
//! A valid `Retry-After` header replaces the computed backoff.

use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use tokio::time::sleep;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retries (not counting the initial request).
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Jitter factor for down-jitter (0.25 = up to 25% reduction).
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            jitter_factor: 0.25,
        }
    }
}

impl RetryConfig {
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

/// Parse a `Retry-After` header given in whole seconds.
///
/// Returns `None` when missing, unparseable, or outside `0 < d < 60s`.
#[must_use]
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let secs = headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()?;
    let duration = Duration::from_secs(secs);
    (duration > Duration::ZERO && duration < Duration::from_secs(60)).then_some(duration)
}

/// Whether a request may be sent again after an ambiguous failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Replay {
    /// Sending twice has the same effect as sending once.
    Idempotent,
    /// Only resent when the server provably did not process it.
    Unprocessed,
}

impl Replay {
    #[must_use]
    pub fn for_method(method: &Method) -> Self {
        if method.is_idempotent() {
            Self::Idempotent
        } else {
            Self::Unprocessed
        }
    }
}

#[must_use]
pub fn is_retryable_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 408 | 429 | 500..=599)
}

/// Rejections that happen before the request is handled: throttling and
/// maintenance answers that name a time to come back.
fn is_unprocessed_status(status: StatusCode, headers: &HeaderMap) -> bool {
    matches!(status.as_u16(), 429 | 503) && parse_retry_after(headers).is_some()
}

fn is_retryable_error(error: &reqwest::Error) -> bool {
    error.is_connect() || error.is_timeout() || error.is_request()
}

fn should_retry_status(replay: Replay, response: &Response) -> bool {
    match replay {
        Replay::Idempotent => is_retryable_status(response.status()),
        Replay::Unprocessed => is_unprocessed_status(response.status(), response.headers()),
    }
}

fn should_retry_error(replay: Replay, error: &reqwest::Error) -> bool {
    match replay {
        Replay::Idempotent => is_retryable_error(error),
        Replay::Unprocessed => error.is_connect(),
    }
}

/// Backoff before retry number `backoff_step + 1`.
#[must_use]
pub fn calculate_retry_delay(
    backoff_step: u32,
    config: &RetryConfig,
    headers: Option<&HeaderMap>,
) -> Duration {
    if let Some(delay) = headers.and_then(parse_retry_after) {
        return delay;
    }

    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(backoff_step as i32);
    let capped = base.min(config.max_delay.as_secs_f64());

    let jitter = 1.0 - rand::random::<f64>() * config.jitter_factor;
    Duration::from_secs_f64(capped * jitter)
}

/// Outcome of a retried request.
///
/// Distinguishes success from failure structurally so an error response
/// cannot be mistaken for a successful one.
#[derive(Debug)]
pub enum RetryOutcome {
    /// 2xx response.
    Success(Response),
    /// Non-2xx response, either not retryable or after exhausting retries.
    HttpError(Response),
    /// Transport failure, after exhausting retries if it was retryable.
    ConnectionError { attempts: u32, source: reqwest::Error },
}

/// Send a request, retrying transient failures.
///
/// `build_request` is called once per attempt, since a `RequestBuilder` is
/// consumed by `send`. `replay` narrows what counts as transient for
/// requests that must not run twice.
pub async fn send_with_retry<F>(
    build_request: F,
    replay: Replay,
    config: &RetryConfig,
) -> RetryOutcome
where
    F: Fn() -> RequestBuilder,
{
    let mut attempt: u32 = 0;
    loop {
        let can_retry = attempt < config.max_retries;
        match build_request().send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    return RetryOutcome::Success(response);
                }
                if !can_retry || !should_retry_status(replay, &response) {
                    return RetryOutcome::HttpError(response);
                }
                let delay = calculate_retry_delay(attempt, config, Some(response.headers()));
                tracing::debug!(
                    status = %status,
                    retry_count = attempt + 1,
                    delay_ms = delay.as_millis(),
                    "Retrying request after error status"
                );
                sleep(delay).await;
            }
            Err(e) => {
                if !can_retry || !should_retry_error(replay, &e) {
                    return RetryOutcome::ConnectionError {
                        attempts: attempt + 1,
                        source: e,
                    };
                }
                let delay = calculate_retry_delay(attempt, config, None);
                tracing::debug!(
                    error = %e,
                    retry_count = attempt + 1,
                    delay_ms = delay.as_millis(),
                    "Retrying request after connection error"
                );
                sleep(delay).await;
            }
        }
        attempt += 1;
    }
}
