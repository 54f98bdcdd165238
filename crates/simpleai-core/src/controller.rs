//! AppController - the top-level owner of one client session.
//!
//! Front ends never touch stores or backends directly; they hold a
//! controller and call its operations. Cloning a controller clones the
//! `Arc`s, so every clone drives the same session.
//!
//! ```text
//!                 ┌──────────────────────────┐
//!                 │      AppController       │
//!                 ├──────────────────────────┤
//!                 │  - EventBus              │
//!                 │  - Stores                │
//!                 │  - Dispatcher ───────────┼──► TextCompletion
//!                 │                          │──► ImageGeneration
//!                 │  - ImageCaptioning       │
//!                 │  - prompt debounce timer │
//!                 └────────────┬─────────────┘
//!                              │ BroadcastEvent
//!                              ▼
//!                     terminal renderer, tests
//! ```

use crate::config::Config;
use crate::dispatcher::{DispatchError, DispatchOutcome, Dispatcher};
use crate::event_bus::{BroadcastEvent, EventBus};
use crate::interrogate::{abbreviate, interrogate, InterrogateError};
use crate::logging::open_log_file;
use crate::remote::{HttpBackend, ImageCaptioning, ImageGeneration, TextCompletion};
use crate::session::{SessionId, SessionState};
use crate::stores::Stores;
use crate::turn::{Artifact, ConversationTurn, DROPPED_FILES_USER};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Builder for an [`AppController`]. Backends left unset talk HTTP to
/// `config.api_base`.
#[derive(Default)]
pub struct AppControllerBuilder {
    config: Config,
    session_id: Option<SessionId>,
    event_bus: Option<Arc<EventBus>>,
    text: Option<Arc<dyn TextCompletion>>,
    images: Option<Arc<dyn ImageGeneration>>,
    captions: Option<Arc<dyn ImageCaptioning>>,
}

impl AppControllerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn session_id(mut self, session_id: SessionId) -> Self {
        self.session_id = Some(session_id);
        self
    }

    /// Use an existing EventBus (to subscribe before the first event).
    pub fn event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    pub fn text_completion(mut self, backend: Arc<dyn TextCompletion>) -> Self {
        self.text = Some(backend);
        self
    }

    pub fn image_generation(mut self, backend: Arc<dyn ImageGeneration>) -> Self {
        self.images = Some(backend);
        self
    }

    pub fn image_captioning(mut self, backend: Arc<dyn ImageCaptioning>) -> Self {
        self.captions = Some(backend);
        self
    }

    pub fn build(self) -> AppController {
        let http = Arc::new(HttpBackend::from_config(&self.config));
        let text = self
            .text
            .unwrap_or_else(|| Arc::clone(&http) as Arc<dyn TextCompletion>);
        let images = self
            .images
            .unwrap_or_else(|| Arc::clone(&http) as Arc<dyn ImageGeneration>);
        let captions = self
            .captions
            .unwrap_or_else(|| http as Arc<dyn ImageCaptioning>);

        let event_bus = self.event_bus.unwrap_or_else(|| Arc::new(EventBus::new()));
        let stores = Arc::new(Stores::new(Arc::clone(&event_bus)));
        let session_id = self.session_id.unwrap_or_default();
        let transcript = open_log_file(self.config.transcript_dir.as_deref(), &session_id.0);

        let dispatcher = Dispatcher::new(Arc::clone(&stores), text, images)
            .with_history_window(self.config.history_window)
            .with_transcript(transcript);

        AppController {
            session_id,
            config: Arc::new(self.config),
            event_bus,
            stores,
            dispatcher: Arc::new(dispatcher),
            captions,
            pending_submit: Arc::new(Mutex::new(None)),
        }
    }
}

/// Owns the stores, backends and timers of one session.
#[derive(Clone)]
pub struct AppController {
    session_id: SessionId,
    config: Arc<Config>,
    event_bus: Arc<EventBus>,
    stores: Arc<Stores>,
    dispatcher: Arc<Dispatcher>,
    captions: Arc<dyn ImageCaptioning>,
    /// Debounce timer armed by the last prompt edit.
    pending_submit: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl AppController {
    pub fn builder() -> AppControllerBuilder {
        AppControllerBuilder::new()
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn stores(&self) -> &Arc<Stores> {
        &self.stores
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Receive every store change from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<BroadcastEvent> {
        self.event_bus.subscribe()
    }

    pub fn snapshot(&self) -> SessionState {
        SessionState::capture(&self.session_id, &self.stores)
    }

    /// Dispatch `text` now, cancelling any pending auto-submit. Blank
    /// input is ignored and yields `Ok(None)`.
    pub async fn submit(&self, text: &str) -> Result<Option<DispatchOutcome>, DispatchError> {
        if text.trim().is_empty() {
            return Ok(None);
        }
        self.cancel_pending_submit();
        self.stores.prompt.set(text.to_string());
        self.dispatcher.dispatch(text).await.map(Some)
    }

    /// Record an edit to the prompt text and re-arm the auto-submit timer.
    ///
    /// When `config.debounce` passes without another edit, whatever is in
    /// the prompt store at that moment is dispatched (unless blank). Must
    /// be called from within a tokio runtime.
    pub fn edit_prompt(&self, text: &str) {
        self.stores.prompt.set(text.to_string());

        let dispatcher = Arc::clone(&self.dispatcher);
        let delay = self.config.debounce;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let prompt = dispatcher.stores().prompt.get();
            if prompt.trim().is_empty() {
                return;
            }
            log::debug!("Auto-submitting prompt after {:?} idle", delay);
            // Detached so that a later edit cancels only the timer, never
            // a dispatch already in flight.
            tokio::spawn(async move {
                let _ = dispatcher.dispatch(&prompt).await;
            });
        });

        let previous = self
            .pending_submit
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(timer);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// Cancel the auto-submit timer, if armed.
    pub fn cancel_pending_submit(&self) {
        let pending = self
            .pending_submit
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(timer) = pending {
            timer.abort();
        }
    }

    /// Prompt gained focus: a lone text answer is cleared so the user can
    /// type the next message. Image answers stay visible.
    pub fn focus_prompt(&self) {
        if !self.stores.text_answer.get().is_empty() && self.stores.image_answer.get().is_empty() {
            self.stores.text_answer.set(String::new());
        }
    }

    /// Show the most recent turn again: its text as the text answer, or its
    /// images as the artifact grid. Returns the turn that was restored.
    pub fn restore_last_turn(&self) -> Option<ConversationTurn> {
        let last = self.stores.history.last_item()?;
        match &last {
            ConversationTurn::Assistant { text, .. } => {
                self.stores.text_answer.set(text.clone());
            }
            ConversationTurn::Generation { images, .. } => {
                self.stores.image_answer.set(seedless(images));
            }
        }
        Some(last)
    }

    pub fn clear_artifacts(&self) {
        self.stores.image_answer.set(Vec::new());
    }

    /// Caption each dropped image and record it as a one-image generation
    /// turn.
    ///
    /// Images are handled one at a time, in order; a failure does not stop
    /// the rest. Accepted images replace the artifact grid. Returns one
    /// result per input image.
    pub async fn drop_images(
        &self,
        images: &[String],
    ) -> Vec<Result<ConversationTurn, InterrogateError>> {
        if images.is_empty() {
            return Vec::new();
        }
        let mut results = Vec::with_capacity(images.len());
        let mut accepted = Vec::new();

        for image in images {
            match interrogate(self.captions.as_ref(), image).await {
                Ok(caption) => {
                    let image = image.trim().to_string();
                    let turn =
                        ConversationTurn::generation(DROPPED_FILES_USER, caption, vec![image.clone()]);
                    self.stores.history.add_item(turn.clone());
                    accepted.push(image);
                    results.push(Ok(turn));
                }
                Err(e) => {
                    log::warn!("Skipping dropped image {}: {}", abbreviate(image), e);
                    results.push(Err(e));
                }
            }
        }

        if !accepted.is_empty() {
            self.stores.image_answer.set(seedless(&accepted));
        }
        let failed = images.len() - accepted.len();
        let notice = (failed > 0)
            .then(|| format!("Could not read {failed} of {} image(s)", images.len()));
        self.stores.notice.set(notice);
        results
    }
}

/// Artifacts for images whose seed is unknown.
fn seedless(images: &[String]) -> Vec<Artifact> {
    images.iter().map(|image| Artifact::new(image.clone(), 0)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeCaptions, FakeImages, FakeText};
    use std::time::Duration;

    fn controller(text: FakeText, images: FakeImages) -> (AppController, Arc<FakeText>) {
        let text = Arc::new(text);
        let controller = AppController::builder()
            .text_completion(text.clone())
            .image_generation(Arc::new(images))
            .image_captioning(Arc::new(FakeCaptions::default()))
            .build();
        (controller, text)
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    mod builder {
        use super::*;

        #[test]
        fn uses_provided_event_bus() {
            let bus = Arc::new(EventBus::new());
            let controller = AppController::builder()
                .event_bus(Arc::clone(&bus))
                .build();
            assert!(Arc::ptr_eq(controller.stores().event_bus(), &bus));
        }

        #[test]
        fn history_window_comes_from_config() {
            let config = Config {
                history_window: 3,
                ..Config::default()
            };
            let controller = AppController::builder().config(config).build();
            assert_eq!(controller.config().history_window, 3);
        }

        #[test]
        fn uses_provided_session_id() {
            let id = SessionId("fixed".to_string());
            let controller = AppController::builder().session_id(id.clone()).build();
            assert_eq!(controller.session_id(), &id);
            assert_eq!(controller.snapshot().session_id, id);
        }

        #[test]
        fn transcript_file_named_after_session() {
            let dir = tempfile::tempdir().unwrap();
            let config = Config {
                transcript_dir: Some(dir.path().to_path_buf()),
                ..Config::default()
            };
            AppController::builder()
                .config(config)
                .session_id(SessionId("abc".to_string()))
                .build();
            assert!(dir.path().join("abc.log").exists());
        }

        #[test]
        fn clones_share_state() {
            let controller = AppController::builder().build();
            let clone = controller.clone();
            clone.stores().prompt.set("shared".to_string());
            assert_eq!(controller.snapshot().prompt_text, "shared");
        }
    }

    mod submit {
        use super::*;

        #[tokio::test]
        async fn blank_input_is_ignored() {
            let (controller, text) =
                controller(FakeText::replying(["Assistant: x"]), FakeImages::counting());

            assert_eq!(controller.submit("   ").await, Ok(None));
            assert!(text.prompts().is_empty());
        }

        #[tokio::test]
        async fn dispatches_and_records_prompt() {
            let (controller, _) =
                controller(FakeText::replying(["Assistant: Hi there!"]), FakeImages::counting());

            let outcome = controller.submit("hello").await.unwrap();

            assert_eq!(outcome, Some(DispatchOutcome::Assistant("Hi there!".to_string())));
            let state = controller.snapshot();
            assert_eq!(state.prompt_text, "hello");
            assert_eq!(state.assistant_text, "Hi there!");
            assert!(!state.loading);
            assert_eq!(
                state.history,
                vec![ConversationTurn::assistant("hello", "Hi there!")]
            );
        }
    }

    mod edit_prompt {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn fires_once_after_last_edit() {
            let (controller, text) =
                controller(FakeText::replying(["Assistant: done"]), FakeImages::counting());

            controller.edit_prompt("a red");
            tokio::time::sleep(Duration::from_secs(3)).await;
            controller.edit_prompt("a red bike");
            tokio::time::sleep(Duration::from_secs(6)).await;
            settle().await;
            assert!(text.prompts().is_empty());

            tokio::time::sleep(Duration::from_secs(2)).await;
            settle().await;

            let prompts = text.prompts();
            assert_eq!(prompts.len(), 1);
            assert!(prompts[0].ends_with("User: a red bike\n"));
            assert_eq!(controller.stores().text_answer.get(), "done");
        }

        #[tokio::test(start_paused = true)]
        async fn blank_prompt_does_not_fire() {
            let (controller, text) =
                controller(FakeText::replying(["Assistant: x"]), FakeImages::counting());

            controller.edit_prompt("  ");
            tokio::time::sleep(Duration::from_secs(10)).await;
            settle().await;

            assert!(text.prompts().is_empty());
        }

        #[tokio::test(start_paused = true)]
        async fn submit_cancels_pending_timer() {
            let (controller, text) = controller(
                FakeText::replying(["Assistant: now", "Assistant: later"]),
                FakeImages::counting(),
            );

            controller.edit_prompt("typing");
            controller.submit("typed").await.unwrap();
            tokio::time::sleep(Duration::from_secs(10)).await;
            settle().await;

            assert_eq!(text.prompts().len(), 1);
        }
    }

    mod view_operations {
        use super::*;

        #[test]
        fn focus_clears_lone_text_answer() {
            let controller = AppController::builder().build();
            controller.stores().text_answer.set("old reply".to_string());

            controller.focus_prompt();

            assert_eq!(controller.stores().text_answer.get(), "");
        }

        #[test]
        fn focus_keeps_text_when_images_shown() {
            let controller = AppController::builder().build();
            controller.stores().text_answer.set("old reply".to_string());
            controller
                .stores()
                .image_answer
                .set(vec![Artifact::new("https://img/1.png", 1)]);

            controller.focus_prompt();

            assert_eq!(controller.stores().text_answer.get(), "old reply");
        }

        #[test]
        fn restore_assistant_turn() {
            let controller = AppController::builder().build();
            controller
                .stores()
                .history
                .add_item(ConversationTurn::assistant("q", "the answer"));

            let restored = controller.restore_last_turn();

            assert!(matches!(restored, Some(ConversationTurn::Assistant { .. })));
            assert_eq!(controller.stores().text_answer.get(), "the answer");
        }

        #[test]
        fn restore_generation_turn_uses_zero_seeds() {
            let controller = AppController::builder().build();
            controller.stores().history.add_item(ConversationTurn::generation(
                "q",
                "p",
                vec!["https://img/a.png".into(), "https://img/b.png".into()],
            ));

            controller.restore_last_turn();

            assert_eq!(
                controller.stores().image_answer.get(),
                vec![
                    Artifact::new("https://img/a.png", 0),
                    Artifact::new("https://img/b.png", 0)
                ]
            );
        }

        #[test]
        fn restore_with_empty_history_is_noop() {
            let controller = AppController::builder().build();
            assert!(controller.restore_last_turn().is_none());
            assert!(controller.stores().text_answer.get().is_empty());
        }

        #[test]
        fn clear_artifacts_empties_grid() {
            let controller = AppController::builder().build();
            controller
                .stores()
                .image_answer
                .set(vec![Artifact::new("https://img/1.png", 1)]);

            controller.clear_artifacts();

            assert!(controller.stores().image_answer.get().is_empty());
        }
    }

    mod drop_images {
        use super::*;

        fn with_captions(captions: FakeCaptions) -> (AppController, Arc<FakeCaptions>) {
            let captions = Arc::new(captions);
            let controller = AppController::builder()
                .text_completion(Arc::new(FakeText::default()))
                .image_generation(Arc::new(FakeImages::counting()))
                .image_captioning(captions.clone())
                .build();
            (controller, captions)
        }

        #[tokio::test]
        async fn each_image_becomes_a_generation_turn() {
            let (controller, _) = with_captions(FakeCaptions::with([
                ("https://img/dog.png", "a dog"),
                ("https://img/cat.png", "a cat"),
            ]));

            let results = controller
                .drop_images(&["https://img/dog.png".to_string(), "https://img/cat.png".to_string()])
                .await;

            assert!(results.iter().all(Result::is_ok));
            assert_eq!(
                controller.stores().history.items(),
                vec![
                    ConversationTurn::generation(
                        DROPPED_FILES_USER,
                        "a dog",
                        vec!["https://img/dog.png".into()]
                    ),
                    ConversationTurn::generation(
                        DROPPED_FILES_USER,
                        "a cat",
                        vec!["https://img/cat.png".into()]
                    ),
                ]
            );
            assert_eq!(controller.stores().image_answer.get().len(), 2);
            assert!(controller.stores().notice.get().is_none());
        }

        #[tokio::test]
        async fn failures_do_not_stop_other_images() {
            let (controller, captions) =
                with_captions(FakeCaptions::with([("https://img/cat.png", "a cat")]));

            let results = controller
                .drop_images(&[
                    "not-an-image".to_string(),
                    "https://img/unknown.png".to_string(),
                    "https://img/cat.png".to_string(),
                ])
                .await;

            assert!(matches!(results[0], Err(InterrogateError::UnsupportedImage(_))));
            assert!(matches!(results[1], Err(InterrogateError::Remote(_))));
            assert!(results[2].is_ok());
            assert_eq!(
                captions.calls(),
                vec!["https://img/unknown.png", "https://img/cat.png"]
            );
            assert_eq!(controller.stores().history.len(), 1);
            assert_eq!(
                controller.stores().image_answer.get(),
                vec![Artifact::new("https://img/cat.png", 0)]
            );
            assert_eq!(
                controller.stores().notice.get().as_deref(),
                Some("Could not read 2 of 3 image(s)")
            );
        }

        #[tokio::test]
        async fn clean_drop_clears_earlier_notice() {
            let (controller, _) =
                with_captions(FakeCaptions::with([("https://img/cat.png", "a cat")]));

            controller.drop_images(&["not-an-image".to_string()]).await;
            assert!(controller.stores().notice.get().is_some());

            controller
                .drop_images(&["https://img/cat.png".to_string()])
                .await;
            assert!(controller.stores().notice.get().is_none());
        }

        #[tokio::test]
        async fn empty_drop_changes_nothing() {
            let (controller, captions) = with_captions(FakeCaptions::default());
            controller.stores().notice.set(Some("earlier".to_string()));

            assert!(controller.drop_images(&[]).await.is_empty());

            assert!(captions.calls().is_empty());
            assert_eq!(controller.stores().notice.get().as_deref(), Some("earlier"));
        }

        #[tokio::test]
        async fn dropped_turns_feed_later_prompts() {
            let text = Arc::new(FakeText::replying(["Assistant: They are both animals."]));
            let controller = AppController::builder()
                .text_completion(text.clone())
                .image_generation(Arc::new(FakeImages::counting()))
                .image_captioning(Arc::new(FakeCaptions::with([(
                    "https://img/pets.png",
                    "a dog and a cat",
                )])))
                .build();

            controller
                .drop_images(&["https://img/pets.png".to_string()])
                .await;
            controller.submit("What do these have in common?").await.unwrap();

            assert!(text.prompts()[0]
                .contains("User: *added files*\nGeneration: 1x\"a dog and a cat\""));
        }
    }
}
