mod config;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{Parser, ValueEnum};
use colored::Colorize;
use tracing::warn;

use proofloops_agent::{create_generator, Generator};
use proofloops_core::{read_unit_tests, LoopContext, LoopOutcome, LoopRunner, ProofResult, Task};
use proofloops_fragments::missing_placeholders;
use proofloops_logging::{init_tracing, LogFormat, Logger, SessionWriter};
use proofloops_verifier::{LeanVerifier, Verifier};

use crate::config::ProjectConfig;

#[derive(Parser, Debug)]
#[command(
    name = "proofloops",
    about = "Fill Lean implementation and proof templates with a language model, checked by Lean",
    version,
    author
)]
struct Cli {
    /// Task directory containing description.txt, task.lean and tests.lean
    task_dir: PathBuf,

    /// Path to config file (default: ./proofloops.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum, default_value = "pretty")]
    log_format: LogFormatChoice,

    /// Tracing level for internal diagnostics (overridden by RUST_LOG)
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Also append JSON log events to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Output final result as JSON
    #[arg(long)]
    json_output: bool,

    /// Do not record a session file
    #[arg(long)]
    no_session: bool,

    /// Dry run: show what would happen without executing
    #[arg(long)]
    dry_run: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormatChoice {
    Pretty,
    Json,
    Compact,
}

impl From<LogFormatChoice> for LogFormat {
    fn from(choice: LogFormatChoice) -> Self {
        match choice {
            LogFormatChoice::Pretty => LogFormat::Pretty,
            LogFormatChoice::Json => LogFormat::Json,
            LogFormatChoice::Compact => LogFormat::Compact,
        }
    }
}

/// Parse arguments; usage errors exit with status 1
fn parse_cli() -> Cli {
    match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.exit()
        }
        Err(e) => {
            let _ = e.print();
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = parse_cli();

    let log_format: LogFormat = cli.log_format.into();
    init_tracing(&cli.log_level, log_format);

    let working_dir = std::env::current_dir().context("Failed to get current directory")?;

    let config = match cli.config {
        Some(ref path) => ProjectConfig::load_from(path)?,
        None => ProjectConfig::load(&working_dir)?.unwrap_or_default(),
    };

    let task = Task::from_dir(&cli.task_dir)
        .with_context(|| format!("Failed to load task from {}", cli.task_dir.display()))?;

    let missing = missing_placeholders(&task.template);
    if !missing.is_empty() {
        warn!(missing = ?missing, "Template is missing placeholders");
    }

    let primary_backend = config.primary_backend()?;
    let refiner_backend = config.refiner_backend()?;
    let verifier_config = config.verifier_config(&working_dir);

    if cli.dry_run {
        println!("=== Dry Run ===");
        println!("Task dir: {}", cli.task_dir.display());
        println!("Description: {}", preview(&task.description, 100));
        println!("Template: {} lines", task.template.lines().count());
        if !missing.is_empty() {
            println!("Missing placeholders: {}", missing.join(", "));
        }
        match read_unit_tests(&cli.task_dir) {
            Ok(tests) => println!("Unit tests: {} lines", tests.lines().count()),
            Err(e) => println!("Unit tests: unavailable ({})", e),
        }
        println!("Primary: {}", primary_backend);
        println!("Refiner: {}", refiner_backend);
        println!(
            "Verifier: {} {} (in {})",
            verifier_config.command.display(),
            verifier_config.args.join(" "),
            verifier_config.project_dir.display()
        );
        println!("Max rounds: {}", config.max_rounds());
        return Ok(());
    }

    let primary = create_generator(
        primary_backend,
        config.primary_generator_config(&working_dir)?,
    );
    let refiner = create_generator(
        refiner_backend,
        config.refiner_generator_config(&working_dir)?,
    );
    let verifier = LeanVerifier::new(verifier_config);

    ensure_available(primary.as_ref(), "Primary").await?;
    ensure_available(refiner.as_ref(), "Refiner").await?;
    if !verifier.is_available().await {
        anyhow::bail!(
            "Proof checker '{}' is not available. Make sure it's installed and in PATH.",
            verifier.config().command.display()
        );
    }

    let logger = match cli.log_file {
        Some(ref path) => Logger::with_file(log_format, path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?,
        None => Logger::new(log_format),
    };

    let mut runner = LoopRunner::new(
        primary.as_ref(),
        refiner.as_ref(),
        &verifier,
        Arc::new(logger),
    )
    .with_retry_policy(config.retry_policy()?);

    if !cli.no_session {
        match SessionWriter::new(&task.description) {
            Ok(session) => runner = runner.with_session(Arc::new(session)),
            Err(e) => warn!(error = %e, "Could not create session file, continuing without"),
        }
    }

    let context = LoopContext::new(task)
        .with_task_dir(absolute(&cli.task_dir))
        .with_max_rounds(config.max_rounds());

    let outcome = runner.run(context).await?;

    if cli.json_output {
        let json = serde_json::to_string_pretty(&outcome)?;
        println!("{}", json);
    } else {
        print_summary(&outcome);
        print!("{}", render_result(outcome.result()));
    }

    Ok(())
}

async fn ensure_available(generator: &dyn Generator, role: &str) -> Result<()> {
    if !generator.is_available().await {
        anyhow::bail!(
            "{} generator '{}' ({}) is not available. Check that it is installed or that its API key is set.",
            role,
            generator.name(),
            generator.backend()
        );
    }
    Ok(())
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

fn preview(text: &str, max_chars: usize) -> String {
    let single_line = text.trim().replace('\n', " ");
    if single_line.chars().count() > max_chars {
        format!("{}...", single_line.chars().take(max_chars).collect::<String>())
    } else {
        single_line
    }
}

/// The two output sections, each fragment printed verbatim after its header
fn render_result(result: &ProofResult) -> String {
    format!(
        "\n=== Generated CODE ===\n{}\n\n=== Generated PROOF ===\n{}\n",
        result.code, result.proof
    )
}

fn print_summary(outcome: &LoopOutcome) {
    match outcome {
        LoopOutcome::Verified {
            rounds,
            total_duration_secs,
            ..
        } => {
            eprintln!();
            eprintln!("{}", "=== VERIFIED ===".bright_green().bold());
            eprintln!("Rounds: {}", rounds);
            eprintln!("Duration: {:.1}s", total_duration_secs);
        }
        LoopOutcome::Exhausted {
            rounds,
            last_error,
            total_duration_secs,
            ..
        } => {
            eprintln!();
            eprintln!("{}", "=== UNVERIFIED ===".bright_yellow().bold());
            eprintln!("No round passed the proof checker ({} rounds)", rounds);
            eprintln!("Duration: {:.1}s", total_duration_secs);
            if let Some(first) = last_error.lines().next() {
                eprintln!("Last error: {}", first);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_positional_argument() {
        let cli = Cli::try_parse_from(["proofloops", "tasks/task_id_0"]).unwrap();
        assert_eq!(cli.task_dir, PathBuf::from("tasks/task_id_0"));
        assert!(!cli.dry_run);
    }

    #[test]
    fn test_argument_count_is_enforced() {
        assert!(Cli::try_parse_from(["proofloops"]).is_err());
        assert!(Cli::try_parse_from(["proofloops", "a", "b"]).is_err());
    }

    #[test]
    fn test_render_result_sections() {
        let rendered = render_result(&ProofResult::new("n + 1", "simp"));
        assert_eq!(
            rendered,
            "\n=== Generated CODE ===\nn + 1\n\n=== Generated PROOF ===\nsimp\n"
        );
    }

    #[test]
    fn test_preview_truncates() {
        assert_eq!(preview("short\ntext", 20), "short text");
        assert_eq!(preview("abcdef", 3), "abc...");
    }
}
