use async_trait::async_trait;
use std::io::Write;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::{Verification, Verifier};

const SORRY_WARNING: &str = "declaration uses 'sorry'";

#[derive(Error, Debug)]
enum RunError {
    #[error("Failed to write document to scratch file: {0}")]
    ScratchFile(std::io::Error),

    #[error("Failed to run {command}: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[error("Proof checker timed out after {0:?}")]
    Timeout(Duration),
}

/// How the Lean checker is invoked
#[derive(Debug, Clone)]
pub struct VerifierConfig {
    /// Program to run (default `lake`)
    pub command: PathBuf,
    /// Arguments placed before the document path (default `env lean`)
    pub args: Vec<String>,
    /// Lean project the document is checked in; scratch files live here too
    pub project_dir: PathBuf,
    /// Optional timeout (None = no limit)
    pub timeout: Option<Duration>,
    /// Treat `declaration uses 'sorry'` warnings as a failed check
    pub reject_sorry: bool,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            command: PathBuf::from("lake"),
            args: vec!["env".to_string(), "lean".to_string()],
            project_dir: PathBuf::from("."),
            timeout: Some(Duration::from_secs(120)),
            reject_sorry: true,
        }
    }
}

impl VerifierConfig {
    pub fn with_command(mut self, command: PathBuf, args: Vec<String>) -> Self {
        self.command = command;
        self.args = args;
        self
    }

    pub fn with_project_dir(mut self, project_dir: PathBuf) -> Self {
        self.project_dir = project_dir;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_reject_sorry(mut self, reject_sorry: bool) -> Self {
        self.reject_sorry = reject_sorry;
        self
    }
}

/// Checks documents by compiling them with Lean
pub struct LeanVerifier {
    config: VerifierConfig,
}

impl LeanVerifier {
    pub fn new(config: VerifierConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    async fn check(&self, document: &str) -> Result<Verification, RunError> {
        // Removed when dropped at the end of this call
        let mut scratch = tempfile::Builder::new()
            .prefix("proofloops_")
            .suffix(".lean")
            .tempfile_in(&self.config.project_dir)
            .map_err(RunError::ScratchFile)?;
        scratch
            .write_all(document.as_bytes())
            .and_then(|_| scratch.flush())
            .map_err(RunError::ScratchFile)?;

        let start = Instant::now();
        debug!(
            command = %self.config.command.display(),
            file = %scratch.path().display(),
            document_len = document.len(),
            "Running proof checker"
        );

        let mut command = Command::new(&self.config.command);
        command
            .args(&self.config.args)
            .arg(scratch.path())
            .current_dir(&self.config.project_dir)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        let output = command.output();

        let output = match self.config.timeout {
            Some(limit) => tokio::time::timeout(limit, output)
                .await
                .map_err(|_| RunError::Timeout(limit))?,
            None => output.await,
        }
        .map_err(|source| RunError::Spawn {
            command: self.config.command.display().to_string(),
            source,
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let diagnostic = combine_output(stdout.trim(), stderr.trim());

        debug!(
            exit_code = output.status.code().unwrap_or(-1),
            duration_ms = start.elapsed().as_millis(),
            "Proof checker completed"
        );

        if !output.status.success() {
            return Ok(Verification::failed(diagnostic));
        }
        if self.config.reject_sorry && diagnostic.contains(SORRY_WARNING) {
            return Ok(Verification::failed(diagnostic));
        }
        Ok(Verification::passed())
    }
}

fn combine_output(stdout: &str, stderr: &str) -> String {
    match (stdout.is_empty(), stderr.is_empty()) {
        (_, true) => stdout.to_string(),
        (true, false) => stderr.to_string(),
        (false, false) => format!("{}\n{}", stdout, stderr),
    }
}

#[async_trait]
impl Verifier for LeanVerifier {
    fn name(&self) -> &str {
        "Lean"
    }

    async fn execute(&self, document: &str) -> Verification {
        match self.check(document).await {
            Ok(verification) => verification,
            Err(e) => {
                warn!(error = %e, "Proof checker could not be run");
                Verification::failed(e.to_string())
            }
        }
    }

    async fn is_available(&self) -> bool {
        Command::new(&self.config.command)
            .arg("--version")
            .current_dir(&self.config.project_dir)
            .stdin(Stdio::null())
            .output()
            .await
            .map(|o| o.status.success())
            .unwrap_or(false)
    }
}
