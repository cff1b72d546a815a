/// Output captured from a spawned CLI generator
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit code from the process (-1 if killed by a signal)
    pub exit_code: i32,
}

impl ProcessOutput {
    pub fn new(stdout: String, stderr: String, exit_code: i32) -> Self {
        Self {
            stdout,
            stderr,
            exit_code,
        }
    }

    /// Check if the process exited successfully
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Get combined output (stdout + stderr)
    pub fn combined_output(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else if self.stdout.is_empty() {
            self.stderr.clone()
        } else {
            format!("{}\n\n--- stderr ---\n{}", self.stdout, self.stderr)
        }
    }

    /// Turn a finished process into the response text, or an error if it failed
    pub fn into_response(self, name: &str) -> Result<String, crate::GeneratorError> {
        if self.success() {
            Ok(self.stdout)
        } else {
            Err(crate::GeneratorError::ExecutionFailed(format!(
                "{} exited with code {}: {}",
                name,
                self.exit_code,
                self.combined_output()
            )))
        }
    }
}
