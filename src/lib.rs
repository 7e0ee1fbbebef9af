pub mod api;
pub mod config;
pub mod error;
pub mod extractor;
pub mod llm;
pub mod quiz;

use std::sync::Arc;
use config::Config;
use error::{AppError, Result};
use extractor::ContentExtractor;
use llm::{ChatBackend, OllamaClient};
use quiz::QuizGenerator;

/// Application state that will be shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub extractor: Arc<ContentExtractor>,
    pub generator: Arc<QuizGenerator>,
}

impl AppState {
    /// Wires the extractor and an Ollama-backed generator from `config`.
    pub fn from_config(config: Config) -> Result<Self> {
        let backend = OllamaClient::new(config.ollama_host.clone(), config.model_timeout)
            .map_err(|e| AppError::ConfigError(e.to_string()))?;
        Self::with_backend(config, Arc::new(backend))
    }

    pub fn with_backend(config: Config, backend: Arc<dyn ChatBackend>) -> Result<Self> {
        let extractor = ContentExtractor::new(config.fetch_timeout)?;
        let generator = QuizGenerator::new(backend, config.ollama_model.clone());

        Ok(AppState {
            config: Arc::new(config),
            extractor: Arc::new(extractor),
            generator: Arc::new(generator),
        })
    }
}
