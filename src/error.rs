use axum::{
    response::{IntoResponse, Response},
    Json,
    http::StatusCode,
};
use serde::Serialize;

/// Error category reported for every failure downstream of input validation.
pub const GENERATION_FAILED: &str = "Failed to generate quiz";

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Please provide a blog post URL in the request body")]
    MissingUrl,

    #[error("Invalid URL '{0}': an absolute http or https URL is required")]
    InvalidUrl(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Could not extract enough content from the provided URL")]
    InsufficientContent,

    #[error("Failed to fetch page content: HTTP status {0}")]
    FetchStatus(u16),

    #[error("Failed to fetch page content: {0}")]
    FetchError(String),

    #[error("{0} timed out after {1} seconds")]
    Timeout(&'static str, u64),

    #[error("Cannot connect to Ollama at {0}. Please ensure Ollama is running (run: ollama serve)")]
    ModelUnavailable(String),

    #[error("Model '{0}' not found. Please pull the model first (run: ollama pull {0})")]
    ModelNotFound(String),

    #[error("Invalid JSON response from Ollama: {0}")]
    InvalidResponse(String),

    #[error("LLM processing error: {0}")]
    LlmError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MissingUrl
            | AppError::InvalidUrl(_)
            | AppError::InvalidRequest(_)
            | AppError::InsufficientContent => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short category string placed in the `error` field of the body.
    pub fn category(&self) -> &'static str {
        match self {
            AppError::MissingUrl => "URL is required",
            AppError::InvalidUrl(_) => "Invalid URL",
            AppError::InvalidRequest(_) => "Invalid request",
            AppError::InsufficientContent => "Insufficient content",
            _ => GENERATION_FAILED,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::warn!(error = %self, "request rejected");
        }

        let body = Json(ErrorResponse {
            error: self.category().to_string(),
            message: self.to_string(),
        });

        (status, body).into_response()
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::FetchError(err.to_string())
    }
}

impl From<std::net::AddrParseError> for AppError {
    fn from(err: std::net::AddrParseError) -> Self {
        AppError::ConfigError(format!("Invalid host address: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
