//! Observable state containers.
//!
//! Each store holds one value and publishes every write on the shared
//! [`EventBus`] under its own event name. Stores know nothing about each
//! other; keeping e.g. `loading` and `task` consistent is the dispatcher's
//! job.

mod history;

pub use history::HistoryStore;

use crate::event_bus::{BroadcastEvent, EventBus};
use crate::turn::Artifact;
use serde::Serialize;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::broadcast;

pub const LOADING_EVENT: &str = "generation:loading";
pub const TASK_EVENT: &str = "generation:task";
pub const PROMPT_EVENT: &str = "prompt:value";
pub const TEXT_ANSWER_EVENT: &str = "text_answer:value";
pub const IMAGE_ANSWER_EVENT: &str = "image_answer:artifacts";
pub const NOTICE_EVENT: &str = "notice:value";
pub const HISTORY_EVENT: &str = "history:items";

/// A single observable value.
pub struct Store<T> {
    event_type: &'static str,
    value: RwLock<T>,
    bus: Arc<EventBus>,
}

impl<T: Clone + Serialize> Store<T> {
    pub fn new(event_type: &'static str, initial: T, bus: Arc<EventBus>) -> Self {
        Self {
            event_type,
            value: RwLock::new(initial),
            bus,
        }
    }

    /// Event name this store publishes under.
    pub fn event_type(&self) -> &'static str {
        self.event_type
    }

    pub fn get(&self) -> T {
        self.value
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the value and notify subscribers.
    pub fn set(&self, value: T) {
        let mut guard = self.value.write().unwrap_or_else(PoisonError::into_inner);
        // Published under the write lock so readers woken by the event
        // observe the new value.
        self.bus.emit(self.event_type, &value);
        *guard = value;
    }

    /// Mutate the value in place and notify subscribers.
    pub fn update<F: FnOnce(&mut T)>(&self, f: F) {
        let mut guard = self.value.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut *guard);
        self.bus.emit(self.event_type, &*guard);
    }

    /// Receive every bus event; filter with [`BroadcastEvent::is`] and
    /// [`Store::event_type`].
    pub fn subscribe(&self) -> broadcast::Receiver<BroadcastEvent> {
        self.bus.subscribe()
    }
}

/// The full set of session stores, sharing one event bus.
pub struct Stores {
    /// Whether a dispatch is in flight.
    pub loading: Store<bool>,
    /// Human-readable label for the in-flight work ("Thinking...").
    pub task: Store<Option<String>>,
    /// Text currently in the prompt box.
    pub prompt: Store<String>,
    /// Current chat reply.
    pub text_answer: Store<String>,
    /// Current image grid.
    pub image_answer: Store<Vec<Artifact>>,
    /// User-visible message about the last failure.
    pub notice: Store<Option<String>>,
    pub history: HistoryStore,
    bus: Arc<EventBus>,
}

impl Stores {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self {
            loading: Store::new(LOADING_EVENT, false, Arc::clone(&bus)),
            task: Store::new(TASK_EVENT, None, Arc::clone(&bus)),
            prompt: Store::new(PROMPT_EVENT, String::new(), Arc::clone(&bus)),
            text_answer: Store::new(TEXT_ANSWER_EVENT, String::new(), Arc::clone(&bus)),
            image_answer: Store::new(IMAGE_ANSWER_EVENT, Vec::new(), Arc::clone(&bus)),
            notice: Store::new(NOTICE_EVENT, None, Arc::clone(&bus)),
            history: HistoryStore::new(Arc::clone(&bus)),
            bus,
        }
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.bus
    }
}

impl Default for Stores {
    fn default() -> Self {
        Self::new(Arc::new(EventBus::new()))
    }
}
