//! Client leg of an exchange: request shape and the relay transport

use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::Client;
use serde::Serialize;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::debug;

use crate::config::ClientConfig;
use crate::conversation::ChatMessage;
use crate::decoder::ByteStream;
use crate::error::{RelayChatError, Result};
use crate::models::ModelProfile;

/// Fields owned by the request itself; profile parameters may not override them
const RESERVED_FIELDS: &[&str] = &["model", "messages", "stream"];

/// Message in the chat completion request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundMessage {
    pub role: String,
    pub content: String,
}

impl From<&ChatMessage> for OutboundMessage {
    fn from(message: &ChatMessage) -> Self {
        Self {
            role: message.sender.role().to_string(),
            content: message.content.clone(),
        }
    }
}

/// OpenAI-compatible streaming chat completion request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<OutboundMessage>,
    pub stream: bool,
    /// Provider-specific generation options from the model profile
    #[serde(flatten)]
    pub parameters: Map<String, Value>,
}

impl ChatRequest {
    pub fn new(profile: &ModelProfile, messages: Vec<OutboundMessage>) -> Self {
        let parameters = profile
            .parameters
            .iter()
            .filter(|(key, _)| !RESERVED_FIELDS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Self {
            model: profile.name.clone(),
            messages,
            stream: true,
            parameters,
        }
    }
}

/// Opens the response byte stream for one exchange
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Issue the request. Resolves once the response is accepted; a
    /// non-success status yields `UpstreamRejected` before any byte is read.
    async fn open(&self, request: &ChatRequest) -> Result<ByteStream>;
}

/// Transport that POSTs to the relay over HTTP
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    endpoint: url::Url,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let endpoint = config.endpoint()?;
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| RelayChatError::Transport(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &url::Url {
        &self.endpoint
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn open(&self, request: &ChatRequest) -> Result<ByteStream> {
        debug!(model = %request.model, messages = request.messages.len(), "Opening exchange");

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(request)
            .send()
            .await
            .map_err(|e| RelayChatError::Transport(format!("Failed to reach relay: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = error_message(&body)
                .or_else(|| status.canonical_reason().map(String::from))
                .unwrap_or_else(|| "Unknown error".to_string());
            return Err(RelayChatError::UpstreamRejected {
                status: status.as_u16(),
                message,
            });
        }

        let stream = response
            .bytes_stream()
            .map_err(|e| RelayChatError::Transport(format!("Stream interrupted: {e}")));
        Ok(Box::pin(stream))
    }
}

/// `error.message` from a provider error body
fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .get("error")?
        .get("message")?
        .as_str()
        .map(String::from)
}
