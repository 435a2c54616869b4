//! Spinneret: a polite, concurrent web crawler
//!
//! Spinneret discovers reachable pages within each seed's host, deduplicates
//! visited links, respects robots.txt, paces requests per domain, and emits
//! structured crawl results to a downstream message bus. The crawler itself
//! persists nothing; a consumer (printer, indexer, storage writer) attaches
//! to the bus.

pub mod config;
pub mod crawler;
pub mod fetcher;
pub mod messaging;
pub mod robots;

// Re-export commonly used types
pub use config::Settings;
pub use crawler::{Crawler, ParsedResult, VisitedSet};
pub use fetcher::{Fetcher, LinkExtractor};
pub use messaging::{ChannelQueue, Producer};
