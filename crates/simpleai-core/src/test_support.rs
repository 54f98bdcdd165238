//! In-memory stand-ins for the remote capabilities.

use crate::remote::{ImageCaptioning, ImageGeneration, RemoteError, TextCompletion};
use crate::stores::Stores;
use crate::turn::Artifact;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// Holds one matching request until released.
struct Gate {
    key: String,
    started: Arc<Notify>,
    release: Arc<Notify>,
}

impl Gate {
    fn new(key: &str, started: Arc<Notify>, release: Arc<Notify>) -> Self {
        Self {
            key: key.to_string(),
            started,
            release,
        }
    }

    async fn pass(&self) {
        self.started.notify_one();
        self.release.notified().await;
    }
}

/// Replies with scripted completions, in order, and records every prompt.
#[derive(Default)]
pub struct FakeText {
    replies: Mutex<VecDeque<Result<String, RemoteError>>>,
    pub prompts: Mutex<Vec<String>>,
    pub loading_seen: Mutex<Vec<bool>>,
    stores: Option<Arc<Stores>>,
    gate: Option<Gate>,
}

impl FakeText {
    pub fn replying<'a>(replies: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(|r| Ok(r.to_string())).collect()),
            ..Self::default()
        }
    }

    pub fn failing(error: RemoteError) -> Self {
        Self {
            replies: Mutex::new(VecDeque::from([Err(error)])),
            ..Self::default()
        }
    }

    /// Record the loading flag whenever a completion is requested.
    pub fn observing(mut self, stores: Arc<Stores>) -> Self {
        self.stores = Some(stores);
        self
    }

    /// Block the completion for `user_text` until `release` is notified;
    /// `started` is notified when that request arrives.
    pub fn gated_on(mut self, user_text: &str, started: Arc<Notify>, release: Arc<Notify>) -> Self {
        self.gate = Some(Gate::new(user_text, started, release));
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextCompletion for FakeText {
    async fn complete(&self, prompt: &str) -> Result<String, RemoteError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if let Some(stores) = &self.stores {
            self.loading_seen.lock().unwrap().push(stores.loading.get());
        }
        // Take the reply before waiting so later requests get theirs.
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(RemoteError::Network("no scripted reply".to_string())));

        if let Some(gate) = &self.gate {
            if prompt.ends_with(&format!("User: {}\n", gate.key)) {
                gate.pass().await;
            }
        }
        reply
    }
}

/// Returns a fixed artifact list and records every request.
#[derive(Default)]
pub struct FakeImages {
    result: Option<Result<Vec<Artifact>, RemoteError>>,
    pub calls: Mutex<Vec<(String, u32)>>,
    pub loading_seen: Mutex<Vec<bool>>,
    stores: Option<Arc<Stores>>,
    gate: Option<Gate>,
}

impl FakeImages {
    pub fn returning(artifacts: Vec<Artifact>) -> Self {
        Self {
            result: Some(Ok(artifacts)),
            ..Self::default()
        }
    }

    /// One artifact per requested image: `https://img/<n>.png`, seed n.
    pub fn counting() -> Self {
        Self::default()
    }

    pub fn failing(error: RemoteError) -> Self {
        Self {
            result: Some(Err(error)),
            ..Self::default()
        }
    }

    pub fn observing(mut self, stores: Arc<Stores>) -> Self {
        self.stores = Some(stores);
        self
    }

    /// Block generation for `prompt` until `release` is notified;
    /// `started` is notified when that request arrives.
    pub fn gated_on(mut self, prompt: &str, started: Arc<Notify>, release: Arc<Notify>) -> Self {
        self.gate = Some(Gate::new(prompt, started, release));
        self
    }

    pub fn calls(&self) -> Vec<(String, u32)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageGeneration for FakeImages {
    async fn generate(&self, prompt: &str, count: u32) -> Result<Vec<Artifact>, RemoteError> {
        self.calls.lock().unwrap().push((prompt.to_string(), count));
        if let Some(stores) = &self.stores {
            self.loading_seen.lock().unwrap().push(stores.loading.get());
        }
        if let Some(gate) = &self.gate {
            if prompt == gate.key {
                gate.pass().await;
            }
        }
        match &self.result {
            Some(result) => result.clone(),
            None => Ok((1..=count)
                .map(|n| Artifact::new(format!("https://img/{n}.png"), i64::from(n)))
                .collect()),
        }
    }
}

/// Captions images from a lookup table; unknown images fail.
#[derive(Default)]
pub struct FakeCaptions {
    captions: HashMap<String, String>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeCaptions {
    pub fn with<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self {
            captions: pairs
                .into_iter()
                .map(|(image, caption)| (image.to_string(), caption.to_string()))
                .collect(),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageCaptioning for FakeCaptions {
    async fn interrogate(&self, image: &str) -> Result<String, RemoteError> {
        self.calls.lock().unwrap().push(image.to_string());
        self.captions
            .get(image)
            .cloned()
            .ok_or_else(|| RemoteError::Network(format!("no caption for {image}")))
    }
}
