use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::ChatMessage;

/// Errors that can occur while asking a generator for a response
#[derive(Error, Debug)]
pub enum GeneratorError {
    #[error("Failed to spawn generator process: {0}")]
    SpawnFailed(#[from] std::io::Error),

    #[error("Generator timed out after {0:?}")]
    Timeout(Duration),

    #[error("Network error: {0}")]
    Network(String),

    #[error("API returned HTTP {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Generator execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Generator configuration error: {0}")]
    ConfigError(String),
}

/// Configuration shared by all generator backends
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Working directory for CLI backends
    pub working_dir: PathBuf,
    /// Optional timeout per request (None = no limit)
    pub timeout: Option<Duration>,
    /// Additional environment variables for CLI backends
    pub env_vars: HashMap<String, String>,
    /// Model to use (if the backend supports it)
    pub model: Option<String>,
    /// Base URL of a chat-completions API
    pub base_url: Option<String>,
    /// Environment variable holding the API key
    pub api_key_env: Option<String>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            working_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            timeout: None,
            env_vars: HashMap::new(),
            model: None,
            base_url: None,
            api_key_env: None,
        }
    }
}

impl GeneratorConfig {
    pub fn new(working_dir: PathBuf) -> Self {
        Self {
            working_dir,
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_model(mut self, model: String) -> Self {
        self.model = Some(model);
        self
    }

    pub fn with_env(mut self, key: String, value: String) -> Self {
        self.env_vars.insert(key, value);
        self
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = Some(base_url);
        self
    }

    pub fn with_api_key_env(mut self, name: String) -> Self {
        self.api_key_env = Some(name);
        self
    }
}

/// Supported generator backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    /// OpenAI-compatible `/chat/completions` HTTP API
    ChatCompletions,
    ClaudeCode,
    OpenCode,
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::ChatCompletions => write!(f, "openai"),
            Backend::ClaudeCode => write!(f, "claude-code"),
            Backend::OpenCode => write!(f, "opencode"),
        }
    }
}

impl std::str::FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" | "chat" | "chat-completions" => Ok(Backend::ChatCompletions),
            "claude" | "claude-code" | "claudecode" => Ok(Backend::ClaudeCode),
            "opencode" | "open-code" => Ok(Backend::OpenCode),
            _ => Err(format!("Unknown generator backend: {}", s)),
        }
    }
}

/// A capability that turns a conversation into response text
#[async_trait]
pub trait Generator: Send + Sync {
    /// Human-readable name of the generator (e.g., "OpenAI", "Claude Code")
    fn name(&self) -> &str;

    fn backend(&self) -> Backend;

    /// Model the generator is configured with, if any
    fn model(&self) -> Option<&str>;

    /// Send the messages and return the raw response text
    async fn get_response(&self, messages: &[ChatMessage]) -> Result<String, GeneratorError>;

    /// Check whether the generator can be used (binary on PATH, API key set, ...)
    async fn is_available(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_from_str() {
        assert_eq!("openai".parse::<Backend>(), Ok(Backend::ChatCompletions));
        assert_eq!("Claude".parse::<Backend>(), Ok(Backend::ClaudeCode));
        assert_eq!("open-code".parse::<Backend>(), Ok(Backend::OpenCode));
        assert!("gemini".parse::<Backend>().is_err());
    }

    #[test]
    fn test_backend_display_round_trips() {
        for backend in [Backend::ChatCompletions, Backend::ClaudeCode, Backend::OpenCode] {
            assert_eq!(backend.to_string().parse::<Backend>(), Ok(backend));
        }
    }
}
