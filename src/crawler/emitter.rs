//! Crawl result serialization onto the message bus

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use url::Url;

use crate::messaging::Producer;

/// The URL crawled and the links found on it, JSON-serializable to be sent
/// on message queues
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedResult {
    pub url: String,
    pub links: Vec<String>,
}

/// Pushes crawl records to the downstream producer.
///
/// Cheap to clone; clones share the producer.
#[derive(Clone)]
pub struct ResultEmitter {
    producer: Arc<dyn Producer>,
}

impl ResultEmitter {
    pub fn new(producer: Arc<dyn Producer>) -> Self {
        Self { producer }
    }

    /// Serializes one `(url, links)` record and hands it to the producer.
    ///
    /// A producer failure loses this record only: it is logged and the
    /// crawl goes on.
    pub fn emit(&self, url: &Url, links: &[Url]) {
        let record = ParsedResult {
            url: url.to_string(),
            links: links.iter().map(Url::to_string).collect(),
        };
        let payload = match serde_json::to_vec(&record) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::error!("failed to serialize result for {}: {}", record.url, err);
                return;
            }
        };
        if let Err(err) = self.producer.produce(payload) {
            tracing::warn!("unable to communicate with message queue: {}", err);
        }
    }
}
