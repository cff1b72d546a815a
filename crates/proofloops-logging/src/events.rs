use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

/// Which generator a round talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeneratorRole {
    /// First-round generator
    Primary,
    /// Generator used for error-feedback rounds
    Refiner,
}

impl std::fmt::Display for GeneratorRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GeneratorRole::Primary => write!(f, "primary"),
            GeneratorRole::Refiner => write!(f, "refiner"),
        }
    }
}

/// Structured log events for the refinement loop
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LogEvent {
    LoopStarted {
        description_preview: String,
        template_lines: usize,
        max_rounds: usize,
    },
    RoundStarted {
        round: usize,
        role: GeneratorRole,
        generator: String,
    },
    /// A generator call failed and will be retried after a delay
    GenerationRetry {
        round: usize,
        attempt: usize,
        error: String,
        delay_secs: f64,
    },
    GenerationCompleted {
        round: usize,
        attempts: usize,
        response_chars: usize,
        duration_secs: f64,
    },
    /// Every allowed attempt of a generator call failed
    GenerationFailed {
        round: usize,
        error: String,
    },
    FragmentsExtracted {
        round: usize,
        method: String,
        code_lines: usize,
        proof_lines: usize,
    },
    VerificationCompleted {
        round: usize,
        success: bool,
        duration_secs: f64,
        diagnostic_lines: usize,
    },
    LoopVerified {
        rounds: usize,
        duration_secs: f64,
    },
    RoundsExhausted {
        rounds: usize,
        duration_secs: f64,
    },
}

impl LogEvent {
    /// Add a timestamp to serialize with the event
    fn with_timestamp(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or_default();
        if let Some(obj) = value.as_object_mut() {
            obj.insert(
                "timestamp".to_string(),
                serde_json::Value::String(chrono::Utc::now().to_rfc3339()),
            );
        }
        value
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable format with colors and visual structure
    #[default]
    Pretty,
    /// JSON lines format for machine consumption
    Json,
    /// Compact single-line format
    Compact,
}

/// Logger for loop events - handles both console output and file logging
pub struct Logger {
    format: LogFormat,
    file_writer: Option<Mutex<File>>,
}

impl Logger {
    pub fn new(format: LogFormat) -> Self {
        Self {
            format,
            file_writer: None,
        }
    }

    /// Create a logger with file output in addition to console
    pub fn with_file(format: LogFormat, log_path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;

        Ok(Self {
            format,
            file_writer: Some(Mutex::new(file)),
        })
    }

    pub fn log(&self, event: &LogEvent) {
        // File output is always JSON
        if let Some(ref writer) = self.file_writer {
            if let Ok(mut file) = writer.lock() {
                let json = event.with_timestamp();
                let _ = writeln!(file, "{}", json);
            }
        }

        match self.format {
            LogFormat::Json => self.log_json(event),
            LogFormat::Pretty => self.log_pretty(event),
            LogFormat::Compact => self.log_compact(event),
        }
    }

    fn log_json(&self, event: &LogEvent) {
        if let Ok(json) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{}", json);
        }
    }

    fn log_pretty(&self, event: &LogEvent) {
        let mut stderr = std::io::stderr();
        match event {
            LogEvent::LoopStarted {
                description_preview,
                template_lines,
                max_rounds,
            } => {
                let _ = writeln!(stderr);
                let _ = writeln!(
                    stderr,
                    "{}",
                    "╭─────────────────────────────────────────────────────────────────────╮"
                        .bright_blue()
                );
                let _ = writeln!(
                    stderr,
                    "{}  {}{}",
                    "│".bright_blue(),
                    "proofloops".bold().bright_white(),
                    " ".repeat(57) + &"│".bright_blue().to_string()
                );
                let _ = writeln!(
                    stderr,
                    "{}  {} {}",
                    "│".bright_blue(),
                    "Task:".dimmed(),
                    Self::truncate_with_padding(description_preview, 60, 61).dimmed()
                );
                let _ = writeln!(
                    stderr,
                    "{}  {} {}",
                    "│".bright_blue(),
                    "Template:".dimmed(),
                    Self::truncate_with_padding(
                        &format!("{} lines, up to {} rounds", template_lines, max_rounds),
                        56,
                        57
                    )
                    .dimmed()
                );
                let _ = writeln!(
                    stderr,
                    "{}",
                    "╰─────────────────────────────────────────────────────────────────────╯"
                        .bright_blue()
                );
                let _ = writeln!(stderr);
            }
            LogEvent::RoundStarted {
                round,
                role,
                generator,
            } => {
                let round_text = format!("─ Round {} ", round + 1);
                let padding = "─".repeat(67 - round_text.chars().count());
                let _ = writeln!(
                    stderr,
                    "{}{}{}",
                    "┌".bright_blue(),
                    round_text.bright_blue().bold(),
                    padding.bright_blue()
                );
                let _ = writeln!(stderr);
                let _ = writeln!(
                    stderr,
                    "  {} {} {}",
                    "▶".bright_cyan(),
                    role.to_string().to_uppercase().bright_cyan().bold(),
                    format!("({})", generator).dimmed()
                );
            }
            LogEvent::GenerationRetry {
                attempt,
                error,
                delay_secs,
                ..
            } => {
                let _ = writeln!(
                    stderr,
                    "    {} Attempt {} failed, retrying in {:.0}s: {}",
                    "⚠".bright_yellow(),
                    attempt,
                    delay_secs,
                    error.bright_yellow()
                );
            }
            LogEvent::GenerationCompleted {
                response_chars,
                duration_secs,
                ..
            } => {
                let _ = writeln!(
                    stderr,
                    "    {} Response: {} chars ({:.1}s)",
                    "✓".bright_green(),
                    response_chars,
                    duration_secs
                );
            }
            LogEvent::GenerationFailed { round, error } => {
                let _ = writeln!(stderr);
                let _ = writeln!(
                    stderr,
                    "{} Generation failed in round {}: {}",
                    "✗".bright_red(),
                    round + 1,
                    error.bright_red()
                );
            }
            LogEvent::FragmentsExtracted {
                method,
                code_lines,
                proof_lines,
                ..
            } => {
                let _ = writeln!(
                    stderr,
                    "    {} {} code {}, proof {} (via {})",
                    "✂".dimmed(),
                    "Fragments:".dimmed(),
                    Self::plural(*code_lines, "line"),
                    Self::plural(*proof_lines, "line"),
                    method
                );
                let _ = writeln!(stderr);
            }
            LogEvent::VerificationCompleted {
                success,
                duration_secs,
                diagnostic_lines,
                ..
            } => {
                let _ = writeln!(
                    stderr,
                    "  {} {}",
                    "▶".bright_magenta(),
                    "VERIFIER".bright_magenta().bold()
                );
                let verdict = if *success {
                    format!("✓ Verified ({:.1}s)", duration_secs)
                        .bright_green()
                        .to_string()
                } else {
                    format!(
                        "✗ Rejected ({:.1}s, {})",
                        duration_secs,
                        Self::plural(*diagnostic_lines, "diagnostic line")
                    )
                    .bright_red()
                    .to_string()
                };
                let _ = writeln!(stderr, "    {}", verdict);
                let _ = writeln!(stderr);
                let _ = writeln!(
                    stderr,
                    "{}",
                    "└─────────────────────────────────────────────────────────────────────┘"
                        .bright_blue()
                );
                let _ = writeln!(stderr);
            }
            LogEvent::LoopVerified { .. } => {
                // The final outcome is printed by the binary
            }
            LogEvent::RoundsExhausted { rounds, .. } => {
                let _ = writeln!(
                    stderr,
                    "{} No verified result after {} rounds",
                    "⚠".bright_yellow(),
                    rounds
                );
            }
        }
    }

    fn log_compact(&self, event: &LogEvent) {
        let mut stderr = std::io::stderr();
        let timestamp = chrono::Utc::now().format("%H:%M:%S");
        let msg = match event {
            LogEvent::LoopStarted { max_rounds, .. } => {
                format!("[{}] loop:start max={}", timestamp, max_rounds)
            }
            LogEvent::RoundStarted { round, role, .. } => {
                format!("[{}] round:start:{} {}", timestamp, round + 1, role)
            }
            LogEvent::GenerationRetry {
                round,
                attempt,
                error,
                ..
            } => format!(
                "[{}] gen:retry:{} attempt={} {}",
                timestamp,
                round + 1,
                attempt,
                error
            ),
            LogEvent::GenerationCompleted {
                round,
                response_chars,
                duration_secs,
                ..
            } => format!(
                "[{}] gen:done:{} {}c {:.1}s",
                timestamp,
                round + 1,
                response_chars,
                duration_secs
            ),
            LogEvent::GenerationFailed { round, error } => {
                format!("[{}] gen:error:{} {}", timestamp, round + 1, error)
            }
            LogEvent::FragmentsExtracted {
                round,
                method,
                code_lines,
                proof_lines,
            } => format!(
                "[{}] extract:{} {} code={} proof={}",
                timestamp,
                round + 1,
                method,
                code_lines,
                proof_lines
            ),
            LogEvent::VerificationCompleted {
                round,
                success,
                duration_secs,
                ..
            } => format!(
                "[{}] verify:{} {} {:.1}s",
                timestamp,
                round + 1,
                if *success { "ok" } else { "fail" },
                duration_secs
            ),
            LogEvent::LoopVerified {
                rounds,
                duration_secs,
            } => format!(
                "[{}] loop:verified:{} {:.1}s",
                timestamp, rounds, duration_secs
            ),
            LogEvent::RoundsExhausted {
                rounds,
                duration_secs,
            } => format!(
                "[{}] loop:exhausted:{} {:.1}s",
                timestamp, rounds, duration_secs
            ),
        };
        let _ = writeln!(stderr, "{}", msg);
    }

    fn plural(count: usize, noun: &str) -> String {
        if count == 1 {
            format!("{} {}", count, noun)
        } else {
            format!("{} {}s", count, noun)
        }
    }

    /// Truncate a string and pad to exact width
    fn truncate_with_padding(s: &str, max_len: usize, total_width: usize) -> String {
        let single_line = s.replace('\n', " ");
        let truncated = if single_line.chars().count() > max_len {
            let head: String = single_line.chars().take(max_len - 3).collect();
            format!("{}...", head)
        } else {
            single_line
        };

        let padding_needed = total_width.saturating_sub(truncated.chars().count() + 1); // +1 for trailing │
        format!("{}{}│", truncated, " ".repeat(padding_needed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_with_tag() {
        let event = LogEvent::RoundStarted {
            round: 1,
            role: GeneratorRole::Refiner,
            generator: "OpenAI".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "round_started");
        assert_eq!(json["role"], "refiner");
        assert_eq!(json["round"], 1);
    }

    #[test]
    fn test_file_output_is_timestamped_json() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("logs").join("run.jsonl");
        let logger = Logger::with_file(LogFormat::Compact, &path).unwrap();

        logger.log(&LogEvent::LoopVerified {
            rounds: 2,
            duration_secs: 1.5,
        });

        let content = std::fs::read_to_string(&path).unwrap();
        let line: serde_json::Value = serde_json::from_str(content.trim()).unwrap();
        assert_eq!(line["event"], "loop_verified");
        assert_eq!(line["rounds"], 2);
        assert!(line["timestamp"].is_string());
    }

    #[test]
    fn test_truncate_with_padding() {
        let padded = Logger::truncate_with_padding("short", 10, 12);
        assert_eq!(padded, "short      │");

        let truncated = Logger::truncate_with_padding("a long\ndescription", 8, 10);
        assert_eq!(truncated, "a lon... │");
    }
}
