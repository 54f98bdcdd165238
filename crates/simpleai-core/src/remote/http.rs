//! HTTP implementation of the remote capabilities.
//!
//! Requests go through a blocking `ureq` agent on tokio's blocking pool so
//! callers can await them without stalling the runtime.

use super::{ImageCaptioning, ImageGeneration, RemoteError, TextCompletion};
use crate::config::Config;
use crate::turn::Artifact;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

const TEXT_PATH: &str = "/text";
const IMAGE_PATH: &str = "/image";
const INTERROGATE_PATH: &str = "/interrogate";

/// Client for the `/text`, `/image` and `/interrogate` endpoints.
#[derive(Clone)]
pub struct HttpBackend {
    agent: ureq::Agent,
    api_base: String,
}

impl HttpBackend {
    pub fn new(api_base: impl Into<String>, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            agent,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.api_base.clone(), config.request_timeout)
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    async fn post<B>(&self, path: &str, body: B) -> Result<Value, RemoteError>
    where
        B: Serialize + Send + 'static,
    {
        let agent = self.agent.clone();
        let url = self.url(path);
        log::debug!("POST {}", url);

        tokio::task::spawn_blocking(move || post_json(&agent, &url, &body))
            .await
            .map_err(|e| RemoteError::Network(format!("request task failed: {e}")))?
    }
}

fn post_json<B: Serialize>(agent: &ureq::Agent, url: &str, body: &B) -> Result<Value, RemoteError> {
    let response = match agent.post(url).send_json(body) {
        Ok(response) => response,
        Err(ureq::Error::Status(code, response)) => {
            let detail = response.into_string().unwrap_or_default();
            return Err(RemoteError::Network(format!(
                "{url} returned HTTP {code}: {}",
                detail.trim()
            )));
        }
        Err(e) => return Err(RemoteError::Network(format!("{url}: {e}"))),
    };

    response
        .into_json::<Value>()
        .map_err(|e| RemoteError::MalformedResponse(format!("{url}: {e}")))
}

#[derive(Serialize)]
struct TextRequest {
    prompt: String,
}

#[derive(Serialize)]
struct ImageRequest {
    prompt: String,
    count: u32,
}

#[derive(Serialize)]
struct InterrogateRequest {
    image: String,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    text: String,
}

#[derive(Deserialize)]
struct CaptionResponse {
    prompt: String,
}

/// Text of the last choice in a `/text` response.
fn parse_completion(body: Value) -> Result<String, RemoteError> {
    let response: CompletionResponse = serde_json::from_value(body)
        .map_err(|e| RemoteError::MalformedResponse(format!("completion: {e}")))?;

    response
        .choices
        .into_iter()
        .last()
        .map(|choice| choice.text)
        .ok_or_else(|| RemoteError::MalformedResponse("completion has no choices".to_string()))
}

fn parse_artifacts(body: Value) -> Result<Vec<Artifact>, RemoteError> {
    serde_json::from_value(body)
        .map_err(|e| RemoteError::MalformedResponse(format!("image artifacts: {e}")))
}

fn parse_caption(body: Value) -> Result<String, RemoteError> {
    serde_json::from_value::<CaptionResponse>(body)
        .map(|response| response.prompt)
        .map_err(|e| RemoteError::MalformedResponse(format!("caption: {e}")))
}

#[async_trait]
impl TextCompletion for HttpBackend {
    async fn complete(&self, prompt: &str) -> Result<String, RemoteError> {
        let body = self
            .post(
                TEXT_PATH,
                TextRequest {
                    prompt: prompt.to_string(),
                },
            )
            .await?;
        parse_completion(body)
    }
}

#[async_trait]
impl ImageGeneration for HttpBackend {
    async fn generate(&self, prompt: &str, count: u32) -> Result<Vec<Artifact>, RemoteError> {
        let body = self
            .post(
                IMAGE_PATH,
                ImageRequest {
                    prompt: prompt.to_string(),
                    count,
                },
            )
            .await?;
        let artifacts = parse_artifacts(body)?;
        if artifacts.len() != count as usize {
            log::warn!(
                "Asked for {} images but received {}",
                count,
                artifacts.len()
            );
        }
        Ok(artifacts)
    }
}

#[async_trait]
impl ImageCaptioning for HttpBackend {
    async fn interrogate(&self, image: &str) -> Result<String, RemoteError> {
        let body = self
            .post(
                INTERROGATE_PATH,
                InterrogateRequest {
                    image: image.to_string(),
                },
            )
            .await?;
        parse_caption(body)
    }
}
