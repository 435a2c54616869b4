//! HTML link extraction
//!
//! Walks a parsed document for anchors and canonical links, resolves each
//! href to an absolute URL and deduplicates across every page the extractor
//! has seen during its lifetime.

use scraper::{Html, Selector};
use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use url::Url;

/// Errors that can occur while extracting links
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("invalid base URL {base}: {source}")]
    BaseUrl {
        base: String,
        #[source]
        source: url::ParseError,
    },

    #[error("selector compilation failed: {0}")]
    Selector(String),
}

/// Extracts absolute URLs from `<a href>` and `<link rel="canonical">`
/// elements.
///
/// The extractor keeps an "already emitted" set for its whole lifetime: a
/// URL surfaced on one page is not emitted again for any later page parsed
/// through the same instance. One instance is meant to be shared by all the
/// workers of a crawl.
#[derive(Debug, Default)]
pub struct LinkExtractor {
    excluded_exts: HashSet<String>,
    seen: Mutex<HashSet<String>>,
}

impl LinkExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds file extensions (with the leading dot, e.g. `".png"`) whose
    /// anchors are skipped
    pub fn exclude_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_exts
            .extend(extensions.into_iter().map(Into::into));
        self
    }

    /// Parses an HTML document and returns the absolute URLs it links to,
    /// in document order, first-emission only.
    ///
    /// An href with a host is taken as-is; anything else is resolved
    /// against `base_url`. Malformed hrefs are silently skipped.
    ///
    /// # Example
    ///
    /// ```
    /// use spinneret::fetcher::LinkExtractor;
    ///
    /// let extractor = LinkExtractor::new();
    /// let links = extractor
    ///     .parse("https://example.com", r#"<a href="/page">a page</a>"#)
    ///     .unwrap();
    /// assert_eq!(links[0].as_str(), "https://example.com/page");
    /// ```
    pub fn parse(&self, base_url: &str, html: &str) -> Result<Vec<Url>, ExtractError> {
        let base = Url::parse(base_url).map_err(|source| ExtractError::BaseUrl {
            base: base_url.to_string(),
            source,
        })?;
        let selector =
            Selector::parse("a, link").map_err(|err| ExtractError::Selector(err.to_string()))?;

        let document = Html::parse_document(html);
        let mut links = Vec::new();
        let mut seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);

        for element in document.select(&selector) {
            let Some(href) = element.value().attr("href") else {
                continue;
            };
            let qualifies = match element.value().name() {
                "a" => !self.excluded_exts.contains(file_extension(href)),
                "link" => {
                    let rel = element.value().attr("rel").unwrap_or("");
                    rel == "canonical" && !self.excluded_exts.contains(file_extension(rel))
                }
                _ => false,
            };
            if !qualifies {
                continue;
            }
            let Some(resolved) = resolve_href(&base, href) else {
                continue;
            };
            if seen.insert(resolved.to_string()) {
                links.push(resolved);
            }
        }

        Ok(links)
    }
}

/// Resolves an href to an absolute URL: an href carrying its own host is
/// used as-is, everything else is joined onto the base
fn resolve_href(base: &Url, href: &str) -> Option<Url> {
    match Url::parse(href) {
        Ok(absolute) if absolute.host_str().is_some() => Some(absolute),
        Ok(_) | Err(url::ParseError::RelativeUrlWithoutBase) => base.join(href).ok(),
        Err(_) => None,
    }
}

/// The file extension of an href (the suffix of its last path segment from
/// the final `.`, dot included), or `""` when there is none
fn file_extension(href: &str) -> &str {
    let name = href.rsplit('/').next().unwrap_or(href);
    match name.rfind('.') {
        Some(idx) => &name[idx..],
        None => "",
    }
}
