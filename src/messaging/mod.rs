//! Message bus seams decoupling the crawling core from processing, storage
//! or presentation layers. Could be backed by RabbitMQ or Kafka drivers as
//! well as the in-process channel provided here.

use thiserror::Error;
use tokio::sync::mpsc;

/// Errors that can occur while handing payloads to the bus
#[derive(Debug, Error)]
pub enum ProduceError {
    #[error("message bus closed")]
    Closed,
}

/// Producer behavior: enqueue a payload of bytes onto the bus.
///
/// The crawler only ever produces; consuming is the downstream component's
/// business.
pub trait Producer: Send + Sync {
    fn produce(&self, payload: Vec<u8>) -> Result<(), ProduceError>;
}

/// In-process message bus backed by a tokio mpsc channel.
///
/// `new` hands back the queue alongside its consuming end; attach a task
/// draining the receiver to process crawl results.
#[derive(Debug, Clone)]
pub struct ChannelQueue {
    bus: mpsc::UnboundedSender<Vec<u8>>,
}

impl ChannelQueue {
    /// Creates a new queue and the receiver that consumes from it
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Vec<u8>>) {
        let (bus, consumer) = mpsc::unbounded_channel();
        (Self { bus }, consumer)
    }
}

impl Producer for ChannelQueue {
    fn produce(&self, payload: Vec<u8>) -> Result<(), ProduceError> {
        self.bus.send(payload).map_err(|_| ProduceError::Closed)
    }
}
