use std::path::Path;
use std::process::Stdio;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, trace};

use crate::{GeneratorConfig, GeneratorError, ProcessOutput};

/// Utility for spawning CLI generator processes
pub struct ProcessSpawner;

impl ProcessSpawner {
    /// Spawn a process, capture its output and wait for it to exit.
    ///
    /// The child is killed if `config.timeout` elapses first.
    pub async fn spawn(
        binary: &Path,
        args: &[&str],
        config: &GeneratorConfig,
    ) -> Result<ProcessOutput, GeneratorError> {
        let start = Instant::now();

        debug!(
            binary = %binary.display(),
            arg_count = args.len(),
            working_dir = %config.working_dir.display(),
            "Spawning generator process"
        );

        let mut cmd = Command::new(binary);
        cmd.args(args)
            .current_dir(&config.working_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(Stdio::null()) // Non-interactive
            .kill_on_drop(true);

        for (key, value) in &config.env_vars {
            cmd.env(key, value);
        }

        let mut child = cmd.spawn()?;

        let stdout_handle = child.stdout.take().ok_or_else(|| {
            GeneratorError::ExecutionFailed("stdout was not captured".to_string())
        })?;
        let stderr_handle = child.stderr.take().ok_or_else(|| {
            GeneratorError::ExecutionFailed("stderr was not captured".to_string())
        })?;

        let run = async {
            let (stdout, stderr) = tokio::try_join!(
                read_lines(stdout_handle, "stdout"),
                read_lines(stderr_handle, "stderr"),
            )?;
            let status = child.wait().await?;
            Ok::<_, GeneratorError>((stdout, stderr, status))
        };

        let (stdout, stderr, status) = match config.timeout {
            Some(limit) => tokio::time::timeout(limit, run)
                .await
                .map_err(|_| GeneratorError::Timeout(limit))??,
            None => run.await?,
        };

        debug!(
            exit_code = status.code().unwrap_or(-1),
            duration_ms = start.elapsed().as_millis(),
            "Generator process completed"
        );

        Ok(ProcessOutput::new(stdout, stderr, status.code().unwrap_or(-1)))
    }
}

async fn read_lines<R>(handle: R, stream: &'static str) -> Result<String, GeneratorError>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(handle).lines();
    let mut collected = String::new();

    while let Some(line) = reader.next_line().await.map_err(|e| {
        GeneratorError::ExecutionFailed(format!("Failed to read {}: {}", stream, e))
    })? {
        trace!(stream, line = %line, "generator output");
        if !collected.is_empty() {
            collected.push('\n');
        }
        collected.push_str(&line);
    }

    Ok(collected)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_captures_both_streams() {
        let config = GeneratorConfig::default();
        let output = ProcessSpawner::spawn(
            Path::new("sh"),
            &["-c", "echo out1; echo err1 >&2; echo out2"],
            &config,
        )
        .await
        .unwrap();

        assert!(output.success());
        assert_eq!(output.stdout, "out1\nout2");
        assert_eq!(output.stderr, "err1");
    }

    #[tokio::test]
    async fn test_reports_exit_code() {
        let config = GeneratorConfig::default();
        let output = ProcessSpawner::spawn(Path::new("sh"), &["-c", "exit 3"], &config)
            .await
            .unwrap();
        assert_eq!(output.exit_code, 3);
    }

    #[tokio::test]
    async fn test_timeout_kills_process() {
        let config = GeneratorConfig::default().with_timeout(Duration::from_millis(100));
        let result = ProcessSpawner::spawn(Path::new("sh"), &["-c", "sleep 5"], &config).await;
        assert!(matches!(result, Err(GeneratorError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let config = GeneratorConfig::default();
        let result =
            ProcessSpawner::spawn(Path::new("definitely-not-a-real-binary"), &[], &config).await;
        assert!(matches!(result, Err(GeneratorError::SpawnFailed(_))));
    }
}
