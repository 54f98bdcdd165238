//! # simpleai-core
//!
//! Core logic for SimpleAI, a chat client that answers in text or images.
//!
//! This crate is front-end agnostic and can be used by:
//! - the `simpleai` terminal client
//! - any UI that can subscribe to a broadcast channel
//!
//! ## Key Concepts
//!
//! - **Dispatch**: one user message sent to the text model, classified, and
//!   (for generation directives) forwarded to the image model
//! - **Turn**: a user message and what the model made of it
//! - **Stores**: observable state slots; every change is an event on the bus

pub mod classify;
pub mod config;
pub mod controller;
pub mod dispatcher;
pub mod event_bus;
pub mod interrogate;
pub mod logging;
pub mod prompt;
pub mod remote;
pub mod session;
pub mod stores;
pub mod turn;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use config::Config;
pub use controller::{AppController, AppControllerBuilder};
pub use dispatcher::{DispatchError, DispatchOutcome, Dispatcher};
pub use event_bus::{BroadcastEvent, EventBus};
pub use session::{SessionId, SessionState};
pub use turn::{Artifact, ConversationTurn};
