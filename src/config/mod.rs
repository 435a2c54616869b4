//! Configuration module
//!
//! Crawler settings are read from the environment, with every value falling
//! back to a sensible default when unset or unparseable:
//!
//! | Variable | Meaning | Default |
//! |---|---|---|
//! | `USERAGENT` | User-Agent header for every request | Googlebot-compatible UA |
//! | `CRAWLING_TIMEOUT` | quiet-period before an idle engine stops (seconds) | 30 |
//! | `CONCURRENCY` | concurrent fetches per domain | 1 |
//! | `MAX_DEPTH` | URL budget per domain, 0 = unlimited | 16 |
//! | `FETCHING_TIMEOUT` | per-request timeout (seconds) | 10 |
//! | `POLITENESS_DELAY` | fixed politeness delay (milliseconds) | 500 |

use std::env;
use std::time::Duration;

/// Default user agent set on each GET request; it also decides which
/// robots.txt group to follow while crawling a domain.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)";

const DEFAULT_CRAWLING_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CONCURRENCY: usize = 1;
const DEFAULT_MAX_DEPTH: u64 = 16;
const DEFAULT_FETCHING_TIMEOUT_SECS: u64 = 10;
const DEFAULT_POLITENESS_DELAY_MS: u64 = 500;

/// General settings for the crawler and its dependencies
#[derive(Debug, Clone)]
pub struct Settings {
    /// User-Agent header value for every request, robots.txt included
    pub user_agent: String,

    /// Number of concurrent fetches per domain. Unbounded crawling is
    /// rejected by design: 0 is normalized to 1.
    pub concurrency: usize,

    /// Limit on the number of URLs processed per domain; 0 means unlimited
    pub max_depth: u64,

    /// Time to wait with an idle frontier before a crawl is considered done
    pub crawling_timeout: Duration,

    /// Time to wait before giving up a single HTTP request
    pub fetching_timeout: Duration,

    /// Fixed delay used to derive a randomized wait between subsequent
    /// requests to the same domain
    pub politeness_fixed_delay: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            concurrency: DEFAULT_CONCURRENCY,
            max_depth: DEFAULT_MAX_DEPTH,
            crawling_timeout: Duration::from_secs(DEFAULT_CRAWLING_TIMEOUT_SECS),
            fetching_timeout: Duration::from_secs(DEFAULT_FETCHING_TIMEOUT_SECS),
            politeness_fixed_delay: Duration::from_millis(DEFAULT_POLITENESS_DELAY_MS),
        }
    }
}

impl Settings {
    /// Builds settings from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds settings from an arbitrary variable lookup.
    ///
    /// Missing or unparseable values fall back to the defaults; the result
    /// is already normalized.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let settings = Self {
            user_agent: lookup("USERAGENT").unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            concurrency: lookup_parsed(&lookup, "CONCURRENCY", DEFAULT_CONCURRENCY),
            max_depth: lookup_parsed(&lookup, "MAX_DEPTH", DEFAULT_MAX_DEPTH),
            crawling_timeout: Duration::from_secs(lookup_parsed(
                &lookup,
                "CRAWLING_TIMEOUT",
                DEFAULT_CRAWLING_TIMEOUT_SECS,
            )),
            fetching_timeout: Duration::from_secs(lookup_parsed(
                &lookup,
                "FETCHING_TIMEOUT",
                DEFAULT_FETCHING_TIMEOUT_SECS,
            )),
            politeness_fixed_delay: Duration::from_millis(lookup_parsed(
                &lookup,
                "POLITENESS_DELAY",
                DEFAULT_POLITENESS_DELAY_MS,
            )),
        };
        settings.normalized()
    }

    /// Applies the settings invariants, normalizing a zero concurrency to 1
    pub fn normalized(mut self) -> Self {
        if self.concurrency == 0 {
            self.concurrency = 1;
        }
        self
    }
}

/// Reads a variable through `lookup` and parses it, falling back to
/// `default` when the variable is unset or does not parse
fn lookup_parsed<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key)
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}
