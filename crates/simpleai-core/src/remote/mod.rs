//! Remote capabilities the dispatcher depends on.
//!
//! Each capability is an opaque async call that may be slow or fail. The
//! production implementation is [`HttpBackend`]; tests plug in fakes.

mod http;

pub use http::HttpBackend;

use crate::turn::Artifact;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// Endpoint unreachable, timed out, or answered with a non-2xx status.
    #[error("Network failure: {0}")]
    Network(String),

    /// Endpoint answered but the body lacked the expected fields.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

/// Prompt in, single completion out.
#[async_trait]
pub trait TextCompletion: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, RemoteError>;
}

/// Generate `count` images for `prompt`, in endpoint order.
#[async_trait]
pub trait ImageGeneration: Send + Sync {
    async fn generate(&self, prompt: &str, count: u32) -> Result<Vec<Artifact>, RemoteError>;
}

/// Describe an image (URL or data URI) as a text prompt.
#[async_trait]
pub trait ImageCaptioning: Send + Sync {
    async fn interrogate(&self, image: &str) -> Result<String, RemoteError>;
}
