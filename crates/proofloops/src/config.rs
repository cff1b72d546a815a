//! Project configuration file support for proofloops.
//!
//! Loads configuration from `proofloops.toml` in the working directory.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use proofloops_agent::{Backend, GeneratorConfig};
use proofloops_core::{RetryPolicy, DEFAULT_MAX_ROUNDS};
use proofloops_verifier::VerifierConfig;

/// The config file name
pub const CONFIG_FILE_NAME: &str = "proofloops.toml";

const DEFAULT_PRIMARY_MODEL: &str = "gpt-4o";
const DEFAULT_REFINER_MODEL: &str = "o3-mini";

/// Project-level configuration loaded from `proofloops.toml`
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// Rounds before giving up (default 3)
    pub max_rounds: Option<usize>,
    /// Generator for the first round
    #[serde(default)]
    pub primary: GeneratorSection,
    /// Generator for error-feedback rounds
    #[serde(default)]
    pub refiner: GeneratorSection,
    #[serde(default)]
    pub retry: RetrySection,
    #[serde(default)]
    pub verifier: VerifierSection,
}

/// Configuration for one generator role
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct GeneratorSection {
    /// `openai`, `claude` or `opencode`
    pub backend: Option<String>,
    pub model: Option<String>,
    /// Base URL of the chat-completions API
    pub base_url: Option<String>,
    /// Environment variable holding the API key
    pub api_key_env: Option<String>,
    pub timeout_secs: Option<u64>,
    /// Extra environment variables for CLI backends
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RetrySection {
    pub max_attempts: Option<usize>,
    pub delay_secs: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct VerifierSection {
    pub command: Option<PathBuf>,
    pub args: Option<Vec<String>>,
    /// Lean project to check in, relative to the working directory
    pub project_dir: Option<PathBuf>,
    pub timeout_secs: Option<u64>,
    pub reject_sorry: Option<bool>,
}

impl ProjectConfig {
    /// Load configuration from the working directory.
    ///
    /// Returns:
    /// - `Ok(Some(config))` if file exists and parses successfully
    /// - `Ok(None)` if file does not exist
    /// - `Err(...)` if file exists but fails to parse (hard error)
    pub fn load(working_dir: &Path) -> Result<Option<Self>> {
        let config_path = working_dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            return Ok(None);
        }

        Self::load_from(&config_path).map(Some)
    }

    /// Load configuration from an explicit path; a missing file is an error.
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        Self::parse(&content).with_context(|| format!("Failed to parse {}", config_path.display()))
    }

    fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn max_rounds(&self) -> usize {
        self.max_rounds.unwrap_or(DEFAULT_MAX_ROUNDS)
    }

    /// Get the effective backend for the first round.
    /// Priority: [primary].backend > openai
    pub fn primary_backend(&self) -> Result<Backend> {
        parse_backend(self.primary.backend.as_deref())
    }

    /// Get the effective backend for refinement rounds.
    /// Priority: [refiner].backend > [primary].backend > openai
    pub fn refiner_backend(&self) -> Result<Backend> {
        parse_backend(
            self.refiner
                .backend
                .as_deref()
                .or(self.primary.backend.as_deref()),
        )
    }

    pub fn primary_generator_config(&self, working_dir: &Path) -> Result<GeneratorConfig> {
        Ok(generator_config(
            &self.primary,
            self.primary_backend()?,
            DEFAULT_PRIMARY_MODEL,
            working_dir,
        ))
    }

    pub fn refiner_generator_config(&self, working_dir: &Path) -> Result<GeneratorConfig> {
        Ok(generator_config(
            &self.refiner,
            self.refiner_backend()?,
            DEFAULT_REFINER_MODEL,
            working_dir,
        ))
    }

    pub fn retry_policy(&self) -> Result<RetryPolicy> {
        let default = RetryPolicy::default();
        let delay = match self.retry.delay_secs {
            Some(secs) => Duration::try_from_secs_f64(secs)
                .with_context(|| format!("Invalid retry.delay_secs: {}", secs))?,
            None => default.delay,
        };
        Ok(RetryPolicy::new(
            self.retry.max_attempts.unwrap_or(default.max_attempts),
            delay,
        ))
    }

    pub fn verifier_config(&self, working_dir: &Path) -> VerifierConfig {
        let mut config = VerifierConfig::default();
        let section = &self.verifier;

        if let Some(ref command) = section.command {
            config.command = command.clone();
            // A custom command does not inherit the `env lean` arguments of lake
            config.args = section.args.clone().unwrap_or_default();
        } else if let Some(ref args) = section.args {
            config.args = args.clone();
        }

        config.project_dir = match section.project_dir {
            Some(ref dir) if dir.is_absolute() => dir.clone(),
            Some(ref dir) => working_dir.join(dir),
            None => working_dir.to_path_buf(),
        };

        if let Some(secs) = section.timeout_secs {
            config.timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(reject) = section.reject_sorry {
            config.reject_sorry = reject;
        }
        config
    }
}

fn parse_backend(name: Option<&str>) -> Result<Backend> {
    match name {
        Some(name) => name.parse::<Backend>().map_err(anyhow::Error::msg),
        None => Ok(Backend::ChatCompletions),
    }
}

fn generator_config(
    section: &GeneratorSection,
    backend: Backend,
    default_model: &str,
    working_dir: &Path,
) -> GeneratorConfig {
    let mut config = GeneratorConfig::new(working_dir.to_path_buf());

    // CLI backends pick their own model unless one is configured
    let model = match (&section.model, backend) {
        (Some(model), _) => Some(model.clone()),
        (None, Backend::ChatCompletions) => Some(default_model.to_string()),
        (None, _) => None,
    };
    if let Some(model) = model {
        config = config.with_model(model);
    }
    if let Some(ref url) = section.base_url {
        config = config.with_base_url(url.clone());
    }
    if let Some(ref key_env) = section.api_key_env {
        config = config.with_api_key_env(key_env.clone());
    }
    if let Some(secs) = section.timeout_secs {
        config = config.with_timeout(Duration::from_secs(secs));
    }
    for (key, value) in &section.env {
        config = config.with_env(key.clone(), value.clone());
    }
    config
}
