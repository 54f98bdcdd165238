//! Publish-subscribe channel for store changes.
//!
//! Every store write is published here so that presentation layers (the
//! terminal renderer, tests, anything else that wants to re-render) can
//! follow state without polling.
//!
//! # Example
//!
//! ```rust
//! use simpleai_core::event_bus::EventBus;
//! use std::sync::Arc;
//!
//! let event_bus = Arc::new(EventBus::new());
//! let mut rx = event_bus.subscribe();
//!
//! event_bus.emit("text_answer:value", &"Hi there!");
//!
//! // In async context:
//! // let event = rx.recv().await.unwrap();
//! ```

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Events beyond this many unread ones make a slow subscriber lag.
const DEFAULT_CAPACITY: usize = 256;

/// A published change: which store changed and its new value as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastEvent {
    /// Store event name (e.g. "generation:loading", "history:items").
    pub event_type: String,

    /// The store's new value.
    pub payload: serde_json::Value,
}

impl BroadcastEvent {
    pub fn new(event_type: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
        }
    }

    /// Whether this event came from the store with the given event name.
    pub fn is(&self, event_type: &str) -> bool {
        self.event_type == event_type
    }
}

/// Broadcasts store changes to any number of subscribers.
///
/// Backed by a tokio broadcast channel. Subscribers only see events emitted
/// after they subscribed.
pub struct EventBus {
    sender: broadcast::Sender<BroadcastEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Serialize `payload` and publish it under `event_type`.
    ///
    /// Returns how many subscribers received the event; with nobody
    /// listening the event is dropped and 0 is returned.
    pub fn emit<T: Serialize + ?Sized>(&self, event_type: &str, payload: &T) -> usize {
        let json_payload = match serde_json::to_value(payload) {
            Ok(v) => v,
            Err(e) => {
                log::warn!("Failed to serialize {} payload: {}", event_type, e);
                return 0;
            }
        };

        self.sender
            .send(BroadcastEvent::new(event_type, json_payload))
            .unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BroadcastEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
