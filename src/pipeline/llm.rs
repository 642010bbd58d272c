//! VLM interaction: send one invoice image and return the model's raw text.
//!
//! The prompts live in [`crate::prompts`] and all interpretation of the
//! answer happens in [`super::normalize`]. There are no retries: a transient
//! network failure is reported exactly like a permanent one.

use super::encode::EncodedImage;
use crate::error::ClientError;
use crate::prompts::{EXTRACTION_PROMPT, SYSTEM_PROMPT};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::debug;

/// A vision-capable model that answers one image + fixed instruction.
#[async_trait]
pub trait VisionModel: Send + Sync {
    /// Return the model's raw text for `image`.
    async fn query(&self, image: &EncodedImage) -> Result<String, ClientError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    images: Option<[&'a str; 1]>,
}

/// Client for an Ollama-style `/api/chat` endpoint.
///
/// Sends a system message, then a user message carrying the image, with
/// `stream: false`, and reads `message.content` from the single response.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    http: reqwest::Client,
    endpoint: String,
    model: String,
}

impl OllamaClient {
    /// `timeout`: `None` waits for the model indefinitely.
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, ClientError> {
        let mut builder = reqwest::Client::builder();
        if let Some(t) = timeout {
            builder = builder.timeout(t);
        }
        Ok(Self {
            http: builder.build()?,
            endpoint: endpoint.into(),
            model: model.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn request_body<'a>(&'a self, image: &'a EncodedImage) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                    images: None,
                },
                ChatMessage {
                    role: "user",
                    content: EXTRACTION_PROMPT,
                    images: Some([image.base64.as_str()]),
                },
            ],
            stream: false,
        }
    }
}

#[async_trait]
impl VisionModel for OllamaClient {
    async fn query(&self, image: &EncodedImage) -> Result<String, ClientError> {
        let start = Instant::now();
        let response = self
            .http
            .post(&self.endpoint)
            .json(&self.request_body(image))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = response.json().await?;
        debug!("Model answered in {:?}", start.elapsed());
        message_content(body)
    }
}

/// Pull `message.content` out of a chat response body.
fn message_content(body: Value) -> Result<String, ClientError> {
    match body.pointer("/message/content").and_then(Value::as_str) {
        Some(content) => Ok(content.to_string()),
        None => Err(ClientError::UnexpectedShape { body }),
    }
}
