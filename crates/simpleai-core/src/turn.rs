//! Conversation turns and generated artifacts.
//!
//! A turn is one recorded exchange: what the user said and what came back,
//! either a chat reply or an image generation.

use serde::{Deserialize, Serialize};

/// User text recorded for turns created from dropped image files.
pub const DROPPED_FILES_USER: &str = "*added files*";

/// One generated image plus the seed it was generated with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Image reference (URL or data URI).
    pub image: String,
    pub seed: i64,
}

impl Artifact {
    pub fn new(image: impl Into<String>, seed: i64) -> Self {
        Self {
            image: image.into(),
            seed,
        }
    }
}

/// A recorded exchange in the conversation history.
///
/// Immutable once appended to the history store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ConversationTurn {
    /// The model answered with a chat message.
    Assistant { user: String, text: String },

    /// The model asked for images; `images` holds their references in order.
    Generation {
        user: String,
        prompt: String,
        images: Vec<String>,
    },
}

impl ConversationTurn {
    pub fn assistant(user: impl Into<String>, text: impl Into<String>) -> Self {
        Self::Assistant {
            user: user.into(),
            text: text.into(),
        }
    }

    pub fn generation(
        user: impl Into<String>,
        prompt: impl Into<String>,
        images: Vec<String>,
    ) -> Self {
        Self::Generation {
            user: user.into(),
            prompt: prompt.into(),
            images,
        }
    }

    /// Label used both as the serialized tag and in rendered prompts.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Assistant { .. } => "Assistant",
            Self::Generation { .. } => "Generation",
        }
    }

    pub fn user(&self) -> &str {
        match self {
            Self::Assistant { user, .. } | Self::Generation { user, .. } => user,
        }
    }

    /// The part of the turn the model produced, as it appears in a prompt:
    /// the reply text, or `<count>x"<prompt>"` for generations.
    pub fn payload(&self) -> String {
        match self {
            Self::Assistant { text, .. } => text.clone(),
            Self::Generation { prompt, images, .. } => {
                format!("{}x\"{}\"", images.len(), prompt)
            }
        }
    }
}
