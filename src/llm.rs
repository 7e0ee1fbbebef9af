use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

/// Sampling options forwarded to the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SamplingOptions {
    pub temperature: f32,
    pub top_p: f32,
    pub num_predict: u32,
}

impl Default for SamplingOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 0.9,
            num_predict: 2048,
        }
    }
}

/// Body of an Ollama `/api/chat` call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    pub stream: bool,
    pub options: SamplingOptions,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct OllamaErrorBody {
    error: String,
}

/// Failures of a chat backend, classified by what went wrong on the wire.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The backend refused or dropped the connection.
    #[error("model backend unreachable: {0}")]
    Unavailable(String),

    /// The requested model is not installed on the backend.
    #[error("model '{0}' is not available on the backend")]
    ModelNotFound(String),

    #[error("model request timed out after {0}s")]
    Timeout(u64),

    #[error("model backend returned {status}: {message}")]
    Api { status: u16, message: String },

    /// The backend answered but the envelope could not be decoded.
    #[error("unexpected response from model backend: {0}")]
    Decode(String),

    /// The HTTP client itself could not be constructed.
    #[error("failed to build model client: {0}")]
    Client(String),
}

/// A chat-style generative model.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Sends one non-streaming chat request and returns the assistant's text.
    async fn chat(&self, request: ChatRequest) -> Result<String, BackendError>;

    /// Where the backend lives, for operator-facing messages.
    fn endpoint(&self) -> &str;
}

/// Client for a local Ollama server.
pub struct OllamaClient {
    client: Client,
    host: String,
    timeout: Duration,
}

impl OllamaClient {
    pub fn new(host: impl Into<String>, timeout: Duration) -> Result<Self, BackendError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Client(e.to_string()))?;

        Ok(Self {
            client,
            host: host.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    fn classify(&self, err: reqwest::Error) -> BackendError {
        if err.is_timeout() {
            BackendError::Timeout(self.timeout.as_secs())
        } else if err.is_connect() || err.is_request() {
            BackendError::Unavailable(err.to_string())
        } else if err.is_decode() || err.is_body() {
            BackendError::Decode(err.to_string())
        } else {
            BackendError::Unavailable(err.to_string())
        }
    }
}

#[async_trait]
impl ChatBackend for OllamaClient {
    async fn chat(&self, request: ChatRequest) -> Result<String, BackendError> {
        let url = format!("{}/api/chat", self.host);
        tracing::debug!(%url, model = %request.model, "sending chat request");

        let res = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = res.status();
        if status == StatusCode::NOT_FOUND {
            return Err(BackendError::ModelNotFound(request.model));
        }
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<OllamaErrorBody>(&body) {
                Ok(b) => b.error,
                Err(_) => {
                    tracing::error!(status = status.as_u16(), %body, "model backend returned an unrecognized error body");
                    "unrecognized error response".to_string()
                }
            };
            return Err(BackendError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let reply: ChatResponse = res.json().await.map_err(|e| self.classify(e))?;
        Ok(reply.message.content)
    }

    fn endpoint(&self) -> &str {
        &self.host
    }
}
