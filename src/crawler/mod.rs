//! Crawling core
//!
//! This module contains the crawling logic proper:
//! - the orchestrator spawning one engine per seed
//! - the per-seed crawl engine (frontier, worker pool, termination)
//! - per-domain politeness rules
//! - visited-link tracking
//! - result emission onto the message bus

mod emitter;
mod engine;
mod politeness;
mod visited;

pub use emitter::{ParsedResult, ResultEmitter};
pub use politeness::PolitenessPolicy;
pub use visited::VisitedSet;

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use url::{Position, Url};

use crate::config::Settings;
use crate::fetcher::{Fetcher, LinkExtractor};
use crate::messaging::Producer;
use engine::CrawlEngine;

/// The main crawler object: holds the settings, the shared visited store
/// and the downstream producer, and walks any number of seeds.
pub struct Crawler {
    settings: Arc<Settings>,
    producer: Arc<dyn Producer>,
    visited: Arc<VisitedSet>,
    parser: Arc<LinkExtractor>,
}

impl Crawler {
    pub fn new(settings: Settings, producer: Arc<dyn Producer>) -> Self {
        Self {
            settings: Arc::new(settings.normalized()),
            producer,
            visited: Arc::new(VisitedSet::new()),
            parser: Arc::new(LinkExtractor::new()),
        }
    }

    /// Replaces the default link extractor, e.g. to exclude extensions
    pub fn with_parser(mut self, parser: LinkExtractor) -> Self {
        self.parser = Arc::new(parser);
        self
    }

    /// Walks through the seed URLs, spawning one crawl engine per seed and
    /// waiting for all of them to terminate.
    ///
    /// A seed missing its scheme is assumed to be `https`. A seed that does
    /// not parse is logged and skipped; it never fails the other seeds.
    /// Nothing else is surfaced to the caller: failures show up in the logs
    /// and as absent results.
    ///
    /// # Arguments
    ///
    /// * `seeds` - The URLs to start crawling from, one engine each
    /// * `cancel` - Token shared by every engine; canceling it unwinds the
    ///   whole crawl
    ///
    /// # Example
    ///
    /// ```no_run
    /// use spinneret::config::Settings;
    /// use spinneret::crawler::Crawler;
    /// use spinneret::messaging::ChannelQueue;
    /// use std::sync::Arc;
    /// use tokio_util::sync::CancellationToken;
    ///
    /// # async fn example() {
    /// let (queue, _consumer) = ChannelQueue::new();
    /// let crawler = Crawler::new(Settings::from_env(), Arc::new(queue));
    /// crawler
    ///     .crawl(&["https://example.com".to_string()], CancellationToken::new())
    ///     .await;
    /// # }
    /// ```
    pub async fn crawl(&self, seeds: &[String], cancel: CancellationToken) {
        let mut engines = Vec::new();

        for seed in seeds {
            let seed_url = match parse_seed(seed) {
                Ok(url) => url,
                Err(err) => {
                    tracing::error!("skipping seed {}: {}", seed, err);
                    continue;
                }
            };
            let base_domain = match base_domain_of(&seed_url) {
                Ok(url) => url,
                Err(err) => {
                    tracing::error!("skipping seed {}: {}", seed, err);
                    continue;
                }
            };
            let fetcher = match Fetcher::new(
                &self.settings.user_agent,
                Some(Arc::clone(&self.parser)),
                self.settings.fetching_timeout,
            ) {
                Ok(fetcher) => Arc::new(fetcher),
                Err(err) => {
                    tracing::error!("skipping seed {}: {}", seed, err);
                    continue;
                }
            };
            let policy = Arc::new(PolitenessPolicy::new(
                base_domain,
                Arc::clone(&self.visited),
                self.settings.politeness_fixed_delay,
            ));
            let engine = CrawlEngine::new(
                seed_url,
                Arc::clone(&self.settings),
                fetcher,
                policy,
                ResultEmitter::new(Arc::clone(&self.producer)),
                cancel.clone(),
            );
            engines.push(tokio::spawn(engine.run()));
        }

        for engine in engines {
            let _ = engine.await;
        }
        tracing::info!("crawling done");
    }
}

/// Parses a seed, assuming `https` when the scheme is missing
fn parse_seed(seed: &str) -> Result<Url, url::ParseError> {
    match Url::parse(seed) {
        Ok(url) => Ok(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(&format!("https://{}", seed)),
        Err(err) => Err(err),
    }
}

/// The `scheme://host[:port]` portion of a seed, the unit a crawl is
/// scoped to
fn base_domain_of(seed: &Url) -> Result<Url, url::ParseError> {
    Url::parse(&seed[..Position::BeforePath])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_seed_with_scheme() {
        let url = parse_seed("http://example.com/foo").unwrap();
        assert_eq!(url.scheme(), "http");
        assert_eq!(url.host_str(), Some("example.com"));
    }

    #[test]
    fn test_parse_seed_without_scheme_defaults_to_https() {
        let url = parse_seed("example.com/foo").unwrap();
        assert_eq!(url.scheme(), "https");
        assert_eq!(url.host_str(), Some("example.com"));
        assert_eq!(url.path(), "/foo");
    }

    #[test]
    fn test_parse_seed_rejects_garbage() {
        assert!(parse_seed("http://[").is_err());
    }

    #[test]
    fn test_base_domain_strips_path_and_query() {
        let seed = Url::parse("http://example.com:8080/foo/bar?x=1").unwrap();
        let base = base_domain_of(&seed).unwrap();
        assert_eq!(base.as_str(), "http://example.com:8080/");
    }
}
