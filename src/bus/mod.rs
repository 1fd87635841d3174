//! Message-bus boundary.
//!
//! Triggered task content and heartbeat system events leave this subsystem
//! through a single `publish` call; routing to delivery channels happens
//! elsewhere.

pub mod memory;

pub use memory::MemoryBus;

use std::pin::Pin;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::BusError;

/// A stream of bus messages, as handed to a consumer.
pub type MessageStream = Pin<Box<dyn Stream<Item = BusMessage> + Send>>;

/// An inbound message published onto the bus.
///
/// System events (heartbeats, task-start notices) leave `channel` and
/// `chat_id` empty and carry their payload in `metadata`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusMessage {
    pub id: String,
    pub channel: String,
    pub chat_id: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl BusMessage {
    pub fn new(channel: &str, chat_id: &str, content: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            channel: channel.to_string(),
            chat_id: chat_id.to_string(),
            content: content.to_string(),
            timestamp,
            metadata: serde_json::Value::Null,
        }
    }

    /// A broadcast-style system event with no delivery target.
    pub fn system_event(timestamp: DateTime<Utc>) -> Self {
        Self::new("", "", "", timestamp)
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Publish surface consumed by the scheduler and heartbeat services.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Publish one message. Best-effort: callers in poll/beat loops log
    /// failures and keep going.
    async fn publish(&self, message: BusMessage) -> Result<(), BusError>;
}
