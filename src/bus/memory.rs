//! In-process broadcast bus for local runs and tests.

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::bus::{BusMessage, MessageBus, MessageStream};
use crate::error::BusError;

const DEFAULT_CAPACITY: usize = 256;

/// A `tokio::sync::broadcast`-backed bus. Slow subscribers lag and drop
/// messages rather than blocking publishers.
pub struct MemoryBus {
    tx: broadcast::Sender<BusMessage>,
    // Held so publishing without subscribers still succeeds.
    _keepalive: broadcast::Receiver<BusMessage>,
}

impl MemoryBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, keepalive) = broadcast::channel(capacity);
        Self {
            tx,
            _keepalive: keepalive,
        }
    }

    /// Subscribe from this point forward; earlier messages are not replayed.
    pub fn subscribe(&self) -> MessageStream {
        BroadcastStream::new(self.tx.subscribe())
            .filter_map(|item| async move { item.ok() })
            .boxed()
    }
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[async_trait]
impl MessageBus for MemoryBus {
    async fn publish(&self, message: BusMessage) -> Result<(), BusError> {
        self.tx.send(message).map(|_| ()).map_err(|_| BusError::Closed)
    }
}
