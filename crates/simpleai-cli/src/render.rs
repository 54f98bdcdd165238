//! Prints store changes as they are published.

use simpleai_core::interrogate::abbreviate;
use simpleai_core::stores::{IMAGE_ANSWER_EVENT, NOTICE_EVENT, TASK_EVENT, TEXT_ANSWER_EVENT};
use simpleai_core::{Artifact, BroadcastEvent};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

/// Print every renderable event until the bus closes.
pub fn spawn(mut events: broadcast::Receiver<BroadcastEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    for line in render(&event) {
                        println!("{line}");
                    }
                }
                Err(RecvError::Lagged(count)) => {
                    log::warn!("Renderer lagged by {} events", count);
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

/// Terminal lines for one event. Events nobody needs to see yield nothing.
pub fn render(event: &BroadcastEvent) -> Vec<String> {
    if event.is(TASK_EVENT) {
        return event
            .payload
            .as_str()
            .map(|task| vec![format!("[{task}]")])
            .unwrap_or_default();
    }
    if event.is(TEXT_ANSWER_EVENT) {
        return match event.payload.as_str() {
            Some(text) if !text.is_empty() => vec![text.to_string()],
            _ => Vec::new(),
        };
    }
    if event.is(IMAGE_ANSWER_EVENT) {
        return match serde_json::from_value::<Vec<Artifact>>(event.payload.clone()) {
            Ok(artifacts) => artifact_lines(&artifacts),
            Err(e) => {
                log::warn!("Unreadable artifacts event: {}", e);
                Vec::new()
            }
        };
    }
    if event.is(NOTICE_EVENT) {
        return event
            .payload
            .as_str()
            .map(|notice| vec![format!("! {notice}")])
            .unwrap_or_default();
    }
    Vec::new()
}

/// One numbered line per image, data URIs shortened.
pub fn artifact_lines(artifacts: &[Artifact]) -> Vec<String> {
    artifacts
        .iter()
        .enumerate()
        .map(|(i, artifact)| {
            format!("  {}. {} (seed {})", i + 1, abbreviate(&artifact.image), artifact.seed)
        })
        .collect()
}
