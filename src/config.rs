use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;
use url::Url;
use crate::error::{AppError, Result};

pub const DEFAULT_OLLAMA_HOST: &str = "http://127.0.0.1:11434";
pub const DEFAULT_OLLAMA_MODEL: &str = "llama2";

#[derive(Clone, Debug)]
pub struct Config {
    pub server_addr: SocketAddr,
    /// Base URL of the Ollama server, without a trailing slash.
    pub ollama_host: String,
    pub ollama_model: String,
    pub fetch_timeout: Duration,
    pub model_timeout: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        // Load environment variables from .env file if it exists
        dotenv::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup, falling back to
    /// defaults for missing keys.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let port = lookup("PORT").unwrap_or_else(|| "3000".to_string());
        let port = port.parse::<u16>().map_err(|e| AppError::ConfigError(format!("Invalid port: {}", e)))?;
        let ip = IpAddr::from_str(host.trim())?;

        let ollama_host = normalize_backend_host(
            &lookup("OLLAMA_HOST").unwrap_or_else(|| DEFAULT_OLLAMA_HOST.to_string()),
        )?;
        let ollama_model = lookup("OLLAMA_MODEL")
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| DEFAULT_OLLAMA_MODEL.to_string());

        let fetch_timeout = parse_secs(lookup("FETCH_TIMEOUT_SECS"), "FETCH_TIMEOUT_SECS", 15)?;
        let model_timeout = parse_secs(lookup("MODEL_TIMEOUT_SECS"), "MODEL_TIMEOUT_SECS", 180)?;

        Ok(Config {
            server_addr: SocketAddr::new(ip, port),
            ollama_host,
            ollama_model,
            fetch_timeout,
            model_timeout,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            ollama_host: DEFAULT_OLLAMA_HOST.to_string(),
            ollama_model: DEFAULT_OLLAMA_MODEL.to_string(),
            fetch_timeout: Duration::from_secs(15),
            model_timeout: Duration::from_secs(180),
        }
    }
}

/// Accepts `host:port` as well as a full URL, the way `OLLAMA_HOST` is
/// commonly written.
fn normalize_backend_host(raw: &str) -> Result<String> {
    let raw = raw.trim();
    let with_scheme = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("http://{}", raw)
    };

    let parsed = Url::parse(&with_scheme)
        .map_err(|e| AppError::ConfigError(format!("Invalid OLLAMA_HOST '{}': {}", raw, e)))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(AppError::ConfigError(format!(
            "Invalid OLLAMA_HOST '{}': scheme must be http or https",
            raw
        )));
    }

    Ok(with_scheme.trim_end_matches('/').to_string())
}

fn parse_secs(value: Option<String>, key: &str, default: u64) -> Result<Duration> {
    let secs = match value {
        Some(v) => v
            .trim()
            .parse::<u64>()
            .map_err(|e| AppError::ConfigError(format!("Invalid {}: {}", key, e)))?,
        None => default,
    };
    if secs == 0 {
        return Err(AppError::ConfigError(format!("{} must be greater than zero", key)));
    }
    Ok(Duration::from_secs(secs))
}
