//! Session identity and state snapshots.

use crate::stores::Stores;
use crate::turn::{Artifact, ConversationTurn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for one client session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Point-in-time copy of every store in a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub session_id: SessionId,
    pub loading: bool,
    pub current_task: Option<String>,
    pub prompt_text: String,
    pub assistant_text: String,
    pub artifacts: Vec<Artifact>,
    pub notice: Option<String>,
    pub history: Vec<ConversationTurn>,
}

impl SessionState {
    /// Read every store. Stores are read one after another, so a write
    /// racing with the snapshot may be only partly reflected.
    pub fn capture(session_id: &SessionId, stores: &Stores) -> Self {
        Self {
            session_id: session_id.clone(),
            loading: stores.loading.get(),
            current_task: stores.task.get(),
            prompt_text: stores.prompt.get(),
            assistant_text: stores.text_answer.get(),
            artifacts: stores.image_answer.get(),
            notice: stores.notice.get(),
            history: stores.history.items(),
        }
    }
}
