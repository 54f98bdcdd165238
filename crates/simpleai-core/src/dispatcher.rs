//! The dispatch cycle: user text → prompt → completion → classify → store.
//!
//! One dispatch makes one text-completion call and, when the completion is
//! a generation directive, one image-generation call. Results are fanned
//! out to the stores and appended to the history log.
//!
//! Dispatches may overlap. Each one takes a request id from a monotonically
//! increasing counter and only the newest request may touch the stores, so
//! a slow dispatch can never overwrite the answer to a later one.

use crate::classify::{classify, Classification, ClassifyError};
use crate::config::DEFAULT_HISTORY_WINDOW;
use crate::logging::{self, log_line, LogHandle};
use crate::prompt::PromptBuilder;
use crate::remote::{ImageGeneration, RemoteError, TextCompletion};
use crate::stores::Stores;
use crate::turn::{Artifact, ConversationTurn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;

pub const THINKING_TASK: &str = "Thinking...";
pub const IMAGINING_TASK: &str = "Imagining...";

/// What a completed dispatch produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Assistant(String),
    Generation(Vec<Artifact>),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// The model asked for a zero or out-of-range number of images.
    #[error("The model asked for an invalid number of images ({0})")]
    InvalidCount(String),

    /// A newer dispatch started before this one finished; its result was
    /// discarded.
    #[error("Dispatch {request_id} was superseded by a newer request")]
    Superseded { request_id: u64 },
}

impl From<ClassifyError> for DispatchError {
    fn from(error: ClassifyError) -> Self {
        match error {
            ClassifyError::InvalidCount(count) => Self::InvalidCount(count),
        }
    }
}

impl DispatchError {
    /// Whether the user should be told about this failure.
    pub fn is_user_visible(&self) -> bool {
        !matches!(self, Self::Superseded { .. })
    }
}

/// Runs dispatches against a set of stores.
pub struct Dispatcher {
    stores: Arc<Stores>,
    text: Arc<dyn TextCompletion>,
    images: Arc<dyn ImageGeneration>,
    transcript: LogHandle,
    history_window: usize,
    latest_request: AtomicU64,
}

impl Dispatcher {
    pub fn new(
        stores: Arc<Stores>,
        text: Arc<dyn TextCompletion>,
        images: Arc<dyn ImageGeneration>,
    ) -> Self {
        Self {
            stores,
            text,
            images,
            transcript: logging::disabled(),
            history_window: DEFAULT_HISTORY_WINDOW,
            latest_request: AtomicU64::new(0),
        }
    }

    /// Number of recent turns replayed into each prompt.
    pub fn with_history_window(mut self, history_window: usize) -> Self {
        self.history_window = history_window;
        self
    }

    pub fn with_transcript(mut self, transcript: LogHandle) -> Self {
        self.transcript = transcript;
        self
    }

    pub fn stores(&self) -> &Arc<Stores> {
        &self.stores
    }

    /// Id of the most recently started dispatch (0 before the first).
    pub fn latest_request_id(&self) -> u64 {
        self.latest_request.load(Ordering::SeqCst)
    }

    /// Run one full dispatch for `user_text`.
    ///
    /// The loading flag is raised for the whole call and lowered when the
    /// newest dispatch finishes, whether it succeeded or not. Failures of
    /// the newest dispatch are also published to the notice store.
    pub async fn dispatch(&self, user_text: &str) -> Result<DispatchOutcome, DispatchError> {
        let request_id = self.latest_request.fetch_add(1, Ordering::SeqCst) + 1;
        let _busy = BusyGuard::begin(&self.stores, &self.latest_request, request_id);

        let result = self.run(request_id, user_text).await;
        match &result {
            Ok(outcome) => {
                log::info!("Dispatch {} finished: {}", request_id, describe(outcome));
                self.stores.notice.set(None);
            }
            Err(e) if e.is_user_visible() && self.is_latest(request_id) => {
                log::warn!("Dispatch {} failed: {}", request_id, e);
                self.stores.notice.set(Some(e.to_string()));
            }
            Err(e) => log::warn!("Dispatch {}: {}", request_id, e),
        }
        result
    }

    async fn run(&self, request_id: u64, user_text: &str) -> Result<DispatchOutcome, DispatchError> {
        let history = self.stores.history.last_items(self.history_window);
        let prompt = PromptBuilder::new(&history).build(user_text);
        log::debug!("Dispatch {} prompt:\n{}", request_id, prompt);
        log_line(&self.transcript, "PROMPT", &prompt);

        let completion = self.text.complete(&prompt).await?;
        log::debug!("Dispatch {} completion: {}", request_id, completion);
        log_line(&self.transcript, "COMPLETION", &completion);

        match classify(&completion)? {
            Classification::Assistant(text) => {
                self.ensure_latest(request_id)?;
                self.stores.text_answer.set(text.clone());
                self.stores
                    .history
                    .add_item(ConversationTurn::assistant(user_text, text.clone()));
                Ok(DispatchOutcome::Assistant(text))
            }
            Classification::Generation { count, prompt } => {
                self.ensure_latest(request_id)?;
                self.stores.task.set(Some(IMAGINING_TASK.to_string()));

                let artifacts = self.images.generate(&prompt, count).await?;
                self.ensure_latest(request_id)?;

                let images = artifacts.iter().map(|a| a.image.clone()).collect();
                self.stores.image_answer.set(artifacts.clone());
                self.stores
                    .history
                    .add_item(ConversationTurn::generation(user_text, prompt, images));
                Ok(DispatchOutcome::Generation(artifacts))
            }
        }
    }

    fn is_latest(&self, request_id: u64) -> bool {
        self.latest_request.load(Ordering::SeqCst) == request_id
    }

    fn ensure_latest(&self, request_id: u64) -> Result<(), DispatchError> {
        if self.is_latest(request_id) {
            Ok(())
        } else {
            Err(DispatchError::Superseded { request_id })
        }
    }
}

fn describe(outcome: &DispatchOutcome) -> String {
    match outcome {
        DispatchOutcome::Assistant(text) => format!("assistant reply ({} chars)", text.len()),
        DispatchOutcome::Generation(artifacts) => format!("{} image(s)", artifacts.len()),
    }
}

/// Holds the loading flag up for one dispatch.
///
/// Dropping the guard lowers the flag only if no newer dispatch has
/// started; the newer one owns the flag from then on.
struct BusyGuard<'a> {
    stores: &'a Stores,
    latest_request: &'a AtomicU64,
    request_id: u64,
}

impl<'a> BusyGuard<'a> {
    fn begin(stores: &'a Stores, latest_request: &'a AtomicU64, request_id: u64) -> Self {
        stores.loading.set(true);
        stores.task.set(Some(THINKING_TASK.to_string()));
        Self {
            stores,
            latest_request,
            request_id,
        }
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        if self.latest_request.load(Ordering::SeqCst) == self.request_id {
            self.stores.loading.set(false);
            self.stores.task.set(None);
        }
    }
}
