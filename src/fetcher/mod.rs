//! HTTP fetching for remote resources
//!
//! This module handles the crawler's outbound HTTP:
//! - a configured client with proper user agent and timeout
//! - retry with exponential jittered backoff for transient failures
//! - fetching a page and parsing it into the links it contains

mod extractor;

pub use extractor::{ExtractError, LinkExtractor};

use rand::Rng;
use reqwest::{Client, Response, StatusCode};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use url::{Position, Url};

/// Errors that can occur while fetching a URL
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("building HTTP client failed: {0}")]
    Client(#[source] reqwest::Error),

    #[error("fetching links from {url} failed: no parser set")]
    NoParser { url: String },

    #[error("fetching links from {url} failed: invalid URL: {source}")]
    Target {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("fetching {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("fetching links from {url} failed: {status}")]
    Status { url: String, status: StatusCode },

    #[error("reading body of {url} failed: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("fetching links from {url} failed: {source}")]
    Parse {
        url: String,
        #[source]
        source: ExtractError,
    },
}

/// Retry policy for transient failures
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retries after the initial attempt
    pub max_retries: u32,
    /// Base delay doubled at each attempt
    pub base_delay: Duration,
    /// Upper bound on the backoff delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry `attempt` (0-indexed): a random duration up to
    /// `base_delay * 2^attempt`, capped at `max_delay`
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.max_delay);
        let millis = exp.as_millis() as u64;
        if millis == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::rng().random_range(0..=millis))
    }

    /// Whether an outcome warrants another attempt: timeouts, connection
    /// failures and server errors do; client errors do not
    fn is_retryable(status: Option<StatusCode>, is_timeout: bool, is_connect: bool) -> bool {
        if is_timeout || is_connect {
            return true;
        }
        match status {
            Some(status) => status.is_server_error(),
            None => false,
        }
    }
}

/// HTTP fetcher with `reqwest::Client` as the backend.
///
/// Each crawl engine builds one fetcher; the link parser is shared across
/// engines so its dedup spans the whole crawl.
pub struct Fetcher {
    client: Client,
    parser: Option<Arc<LinkExtractor>>,
    retry: RetryPolicy,
}

impl Fetcher {
    /// Creates a new fetcher. `parser` may be `None` for callers that only
    /// need raw responses (robots.txt loading); `fetch_links` then fails.
    pub fn new(
        user_agent: &str,
        parser: Option<Arc<LinkExtractor>>,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .gzip(true)
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self {
            client,
            parser,
            retry: RetryPolicy::default(),
        })
    }

    /// Single GET toward a URL, following redirects, retrying transient
    /// failures with exponential jittered backoff.
    ///
    /// The elapsed time covers every attempt and is reported on errors too,
    /// so callers can always feed it back into their pacing.
    pub async fn fetch(&self, url: &str) -> (Duration, Result<Response, FetchError>) {
        let start = Instant::now();
        let mut attempt = 0;

        loop {
            let outcome = self.client.get(url).send().await;
            let retry = attempt < self.retry.max_retries
                && match &outcome {
                    Ok(response) => response.status().is_server_error(),
                    Err(err) => {
                        RetryPolicy::is_retryable(err.status(), err.is_timeout(), err.is_connect())
                    }
                };

            if !retry {
                return match outcome {
                    Ok(response) => (start.elapsed(), Ok(response)),
                    Err(source) => (
                        start.elapsed(),
                        Err(FetchError::Transport {
                            url: url.to_string(),
                            source,
                        }),
                    ),
                };
            }

            let delay = self.retry.delay_for_attempt(attempt);
            tracing::debug!("retrying {} in {:?} (attempt {})", url, delay, attempt + 1);
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// Downloads a page and parses its content into the links it holds.
    ///
    /// Relative links are resolved against the `scheme://host` of the
    /// target URL. A status of 400 or above counts as a failed fetch.
    ///
    /// # Arguments
    ///
    /// * `target` - The absolute URL to download
    ///
    /// # Returns
    ///
    /// The elapsed request time paired with the extracted links, or with
    /// the error that ended the attempt. The time is reported either way.
    pub async fn fetch_links(&self, target: &str) -> (Duration, Result<Vec<Url>, FetchError>) {
        let Some(parser) = self.parser.as_ref() else {
            return (
                Duration::ZERO,
                Err(FetchError::NoParser {
                    url: target.to_string(),
                }),
            );
        };
        let base = match Url::parse(target) {
            Ok(parsed) => parsed[..Position::BeforePath].to_string(),
            Err(source) => {
                return (
                    Duration::ZERO,
                    Err(FetchError::Target {
                        url: target.to_string(),
                        source,
                    }),
                )
            }
        };

        let (elapsed, outcome) = self.fetch(target).await;
        let response = match outcome {
            Ok(response) => response,
            Err(err) => return (elapsed, Err(err)),
        };

        let status = response.status();
        if status.as_u16() >= 400 {
            return (
                elapsed,
                Err(FetchError::Status {
                    url: target.to_string(),
                    status,
                }),
            );
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(source) => {
                return (
                    elapsed,
                    Err(FetchError::Body {
                        url: target.to_string(),
                        source,
                    }),
                )
            }
        };

        match parser.parse(&base, &body) {
            Ok(links) => (elapsed, Ok(links)),
            Err(source) => (
                elapsed,
                Err(FetchError::Parse {
                    url: target.to_string(),
                    source,
                }),
            ),
        }
    }
}
