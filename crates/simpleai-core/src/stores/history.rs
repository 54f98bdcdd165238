//! Append-only conversation log.

use super::{Store, HISTORY_EVENT};
use crate::event_bus::{BroadcastEvent, EventBus};
use crate::turn::ConversationTurn;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Conversation history, oldest turn first.
///
/// Readers ask for a window of the most recent turns; nothing is ever
/// trimmed from the log itself.
pub struct HistoryStore {
    items: Store<Vec<ConversationTurn>>,
}

impl HistoryStore {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self {
            items: Store::new(HISTORY_EVENT, Vec::new(), bus),
        }
    }

    pub fn event_type(&self) -> &'static str {
        self.items.event_type()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BroadcastEvent> {
        self.items.subscribe()
    }

    /// Replace the whole log.
    pub fn set_history(&self, history: Vec<ConversationTurn>) {
        self.items.set(history);
    }

    pub fn add_item(&self, item: ConversationTurn) {
        self.items.update(|history| history.push(item));
    }

    pub fn add_items(&self, items: Vec<ConversationTurn>) {
        if items.is_empty() {
            return;
        }
        self.items.update(|history| history.extend(items));
    }

    pub fn items(&self) -> Vec<ConversationTurn> {
        self.items.get()
    }

    /// The last `n` turns in chronological order. Asking for more turns
    /// than exist returns the whole log.
    pub fn last_items(&self, n: usize) -> Vec<ConversationTurn> {
        let history = self.items.get();
        let start = history.len().saturating_sub(n);
        history[start..].to_vec()
    }

    pub fn last_item(&self) -> Option<ConversationTurn> {
        self.items.get().pop()
    }

    /// The last `n` assistant turns, skipping generations.
    pub fn last_text_items(&self, n: usize) -> Vec<ConversationTurn> {
        let texts: Vec<ConversationTurn> = self
            .items
            .get()
            .into_iter()
            .filter(|turn| matches!(turn, ConversationTurn::Assistant { .. }))
            .collect();
        let start = texts.len().saturating_sub(n);
        texts[start..].to_vec()
    }

    pub fn len(&self) -> usize {
        self.items.get().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
