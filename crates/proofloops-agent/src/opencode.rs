use async_trait::async_trait;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::debug;

use crate::{
    flatten_messages, Backend, ChatMessage, Generator, GeneratorConfig, GeneratorError,
    ProcessSpawner,
};

/// OpenCode CLI used as a one-shot generator
pub struct OpenCodeGenerator {
    binary_path: PathBuf,
    config: GeneratorConfig,
}

impl OpenCodeGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        Self {
            binary_path: PathBuf::from("opencode"),
            config,
        }
    }

    pub fn with_binary_path(mut self, path: PathBuf) -> Self {
        self.binary_path = path;
        self
    }
}

#[async_trait]
impl Generator for OpenCodeGenerator {
    fn name(&self) -> &str {
        "OpenCode"
    }

    fn backend(&self) -> Backend {
        Backend::OpenCode
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

        // OpenCode uses the "run" subcommand for non-interactive execution
        let mut args = vec!["run"];

        if let Some(ref model) = self.config.model {
            args.push("--model");
            args.push(model);
        }

        args.push("--prompt");
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
    async fn test_passes_flattened_prompt_and_model() {
        let config = GeneratorConfig::default().with_model("m1".to_string());
        // `echo` stands in for the CLI and prints the arguments it was given
        let generator = OpenCodeGenerator::new(config).with_binary_path(PathBuf::from("echo"));
        let response = generator
            .get_response(&[ChatMessage::system("sys"), ChatMessage::user("usr")])
            .await
            .unwrap();

        assert_eq!(response, "run --model m1 --prompt sys\n\nusr");
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_an_error() {
        let generator = OpenCodeGenerator::new(GeneratorConfig::default())
            .with_binary_path(PathBuf::from("false"));
        let err = generator
            .get_response(&[ChatMessage::user("hi")])
            .await
            .unwrap_err();

        assert!(matches!(err, GeneratorError::ExecutionFailed(_)));
        assert!(err.to_string().contains("exited with code 1"));
    }
}
