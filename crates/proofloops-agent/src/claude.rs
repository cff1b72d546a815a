use async_trait::async_trait;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::debug;

use crate::{
    flatten_messages, Backend, ChatMessage, Generator, GeneratorConfig, GeneratorError,
    ProcessSpawner,
};

/// Claude Code CLI used as a one-shot generator
pub struct ClaudeCodeGenerator {
    binary_path: PathBuf,
    config: GeneratorConfig,
}

impl ClaudeCodeGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        Self {
            binary_path: PathBuf::from("claude"),
            config,
        }
    }

    pub fn with_binary_path(mut self, path: PathBuf) -> Self {
        self.binary_path = path;
        self
    }
}

#[async_trait]
impl Generator for ClaudeCodeGenerator {
    fn name(&self) -> &str {
        "Claude Code"
    }

    fn backend(&self) -> Backend {
        Backend::ClaudeCode
    }

    fn model(&self) -> Option<&str> {
        self.config.model.as_deref()
    }

    async fn is_available(&self) -> bool {
        Command::new(&self.binary_path)
            .arg("--version")
            .output()
            .await
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    async fn get_response(&self, messages: &[ChatMessage]) -> Result<String, GeneratorError> {
        let prompt = flatten_messages(messages);

        debug!(
            generator = self.name(),
            prompt_len = prompt.len(),
            "Requesting response"
        );

        // Non-interactive mode, output only
        let mut args = vec!["--print"];

        if let Some(ref model) = self.config.model {
            args.push("--model");
            args.push(model);
        }

        // `--` keeps a prompt starting with '-' from being read as an option
        args.push("--");
        args.push(&prompt);

        ProcessSpawner::spawn(&self.binary_path, &args, &self.config)
            .await?
            .into_response(self.name())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_print_mode_args() {
        let config = GeneratorConfig::default().with_model("m1".to_string());
        // `echo` prints the arguments the CLI would receive
        let generator = ClaudeCodeGenerator::new(config).with_binary_path(PathBuf::from("echo"));
        let response = generator
            .get_response(&[ChatMessage::system("sys"), ChatMessage::user("usr")])
            .await
            .unwrap();

        assert_eq!(response, "--print --model m1 -- sys\n\nusr");
    }

    #[tokio::test]
    async fn test_model_flag_is_optional() {
        let generator = ClaudeCodeGenerator::new(GeneratorConfig::default())
            .with_binary_path(PathBuf::from("echo"));
        let response = generator
            .get_response(&[ChatMessage::user("prove it")])
            .await
            .unwrap();

        assert_eq!(response, "--print -- prove it");
    }
}
