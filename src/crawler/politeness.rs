//! Per-domain politeness rules
//!
//! The rules to be obeyed while crawling a single domain: robots.txt
//! allowances and the delays to respect between requests.
//!
//! Three delays compete for each domain and the largest wins: the
//! robots.txt `Crawl-delay`, a random value between 0.5 and 1.5 times the
//! configured fixed delay, and an adaptive delay derived from the last
//! response time.

use rand::Rng;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::RwLock;
use url::{Position, Url};

use super::visited::VisitedSet;
use crate::fetcher::Fetcher;
use crate::robots::RobotsGroup;

const ROBOTS_TXT_PATH: &str = "/robots.txt";

/// Politeness rules for one domain, shared by all of its workers.
///
/// `last_delay` has many readers (every `crawl_delay` call) and one writer
/// at a time (the worker that last completed a fetch). The robots group is
/// written once, before workers start, and read lock-free afterwards.
pub struct PolitenessPolicy {
    /// The domain the crawl starts from; doubles as the visited namespace
    base_domain: Url,
    /// Visited-link store shared with the engine
    visited: Arc<VisitedSet>,
    /// robots.txt group for the configured user agent, when one was found
    robots_group: OnceLock<RobotsGroup>,
    /// Fixed delay to respect between requests when robots.txt is silent
    fixed_delay: Duration,
    /// Delay derived from the last response time
    last_delay: RwLock<Duration>,
}

impl PolitenessPolicy {
    pub fn new(base_domain: Url, visited: Arc<VisitedSet>, fixed_delay: Duration) -> Self {
        Self {
            base_domain,
            visited,
            robots_group: OnceLock::new(),
            fixed_delay,
            last_delay: RwLock::new(Duration::ZERO),
        }
    }

    /// Tests a URL for eligibility to be crawled.
    ///
    /// The URL is consumed either way: once `allowed` has seen it, every
    /// later call for the same URL returns false, so a URL is never
    /// re-evaluated, let alone fetched twice. When two workers race on the
    /// same URL exactly one sees true.
    ///
    /// An eligible URL is in-domain (same host as the base domain, or no
    /// host at all) and, when a robots.txt group was found, allowed by it.
    pub async fn allowed(&self, url: &Url) -> bool {
        if !self
            .visited
            .insert(self.base_domain.as_str(), url.as_str())
            .await
        {
            return false;
        }
        if !self.in_domain(url) {
            return false;
        }
        match self.robots_group.get() {
            Some(group) => group.test(&url[Position::BeforePath..Position::AfterQuery]),
            None => true,
        }
    }

    /// The delay to respect before the next request to this domain:
    /// `max(last_delay, max(random(0.5..1.5 × fixed), robots crawl-delay))`.
    /// A zero fixed delay contributes nothing random.
    pub async fn crawl_delay(&self) -> Duration {
        let last = *self.last_delay.read().await;
        let robots_delay = self
            .robots_group
            .get()
            .map(RobotsGroup::crawl_delay)
            .unwrap_or(Duration::ZERO);
        let base = rand_delay(self.fixed_delay).max(robots_delay);
        last.max(base)
    }

    /// Squares the last response time (in seconds) and stores it as the
    /// adaptive delay: slow responses slow the crawl down quadratically.
    pub async fn update_last_delay(&self, response_time: Duration) {
        let seconds = response_time.as_secs_f64();
        *self.last_delay.write().await = Duration::from_secs_f64(seconds * seconds);
    }

    /// Tries to fetch and parse `/robots.txt` from the base domain.
    ///
    /// On transport errors, a 404 or an unreadable body the crawl proceeds
    /// without rules, which is the same stance a missing robots.txt gets.
    /// Returns true iff a group matching `user_agent` was found and stored.
    pub async fn load_robots(&self, fetcher: &Fetcher, user_agent: &str) -> bool {
        let robots_url = match self.base_domain.join(ROBOTS_TXT_PATH) {
            Ok(url) => url,
            Err(err) => {
                tracing::debug!("cannot resolve robots.txt for {}: {}", self.base_domain, err);
                return false;
            }
        };
        let (_, outcome) = fetcher.fetch(robots_url.as_str()).await;
        let response = match outcome {
            Ok(response) => response,
            Err(err) => {
                tracing::debug!("{}", err);
                return false;
            }
        };
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return false;
        }
        let body = match response.text().await {
            Ok(body) => body,
            Err(err) => {
                tracing::debug!("reading {} failed: {}", robots_url, err);
                return false;
            }
        };
        match RobotsGroup::find(&body, user_agent) {
            Some(group) => self.robots_group.set(group).is_ok(),
            None => false,
        }
    }

    fn in_domain(&self, url: &Url) -> bool {
        match url.host_str() {
            Some(host) => Some(host) == self.base_domain.host_str(),
            None => true,
        }
    }

    #[cfg(test)]
    fn install_robots_group(&self, group: RobotsGroup) {
        let _ = self.robots_group.set(group);
    }
}

/// A random duration between 0.5 and 1.5 times `fixed`, zero when `fixed`
/// is zero
fn rand_delay(fixed: Duration) -> Duration {
    let millis = fixed.as_millis() as u64;
    if millis == 0 {
        return Duration::ZERO;
    }
    let low = millis as f64 * 0.5;
    let high = millis as f64 * 1.5;
    Duration::from_millis(rand::rng().random_range(low..high) as u64)
}
