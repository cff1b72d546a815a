use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::GeneratorRole;

/// Fields of the first line of a session file
#[derive(Debug, Serialize)]
pub struct SessionStart<'a> {
    pub task_dir: Option<&'a Path>,
    pub description: &'a str,
    pub template: &'a str,
    pub primary_generator: &'a str,
    pub refiner_generator: &'a str,
    pub primary_model: Option<&'a str>,
    pub refiner_model: Option<&'a str>,
    pub max_rounds: usize,
}

/// Fields of one round line. Borrowed from the caller's round record so this
/// crate stays independent of proofloops-core.
#[derive(Debug, Serialize)]
pub struct SessionRound<'a> {
    pub round: usize,
    pub role: GeneratorRole,
    pub generation_attempts: usize,
    pub response: &'a str,
    pub code: &'a str,
    pub proof: &'a str,
    pub extraction: &'a str,
    pub verified: bool,
    pub diagnostic: &'a str,
    pub duration_secs: f64,
}

/// Represents each line type in the session JSONL file.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum SessionLine<'a> {
    SessionStart {
        timestamp: DateTime<Utc>,
        #[serde(flatten)]
        start: &'a SessionStart<'a>,
    },
    Round {
        timestamp: DateTime<Utc>,
        #[serde(flatten)]
        round: &'a SessionRound<'a>,
    },
    SessionEnd {
        timestamp: DateTime<Utc>,
        outcome: &'a str,
        rounds: usize,
        error: Option<&'a str>,
        duration_secs: f64,
    },
}

/// Writes session data as JSONL to a file in ~/.local/share/proofloops/sessions/.
pub struct SessionWriter {
    file: Mutex<BufWriter<File>>,
    path: PathBuf,
}

impl SessionWriter {
    /// Create a session file in the default sessions directory, named from the
    /// current UTC timestamp and a hash of the task description.
    pub fn new(description: &str) -> io::Result<Self> {
        Self::in_dir(&Self::sessions_dir()?, description)
    }

    /// Create a session file in `dir`, creating the directory if needed.
    pub fn in_dir(dir: &Path, description: &str) -> io::Result<Self> {
        fs::create_dir_all(dir)?;

        let timestamp_str = Utc::now().format("%Y-%m-%dT%H-%M-%S%.3fZ").to_string();

        let mut hasher = Sha256::new();
        hasher.update(description.as_bytes());
        let hash = hex::encode(hasher.finalize());
        let short_hash = &hash[..6];

        let path = dir.join(format!("{}_{}.jsonl", timestamp_str, short_hash));
        let file = File::create(&path)?;

        Ok(Self {
            file: Mutex::new(BufWriter::new(file)),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write_start(&self, start: &SessionStart<'_>) {
        self.write_line(&SessionLine::SessionStart {
            timestamp: Utc::now(),
            start,
        });
    }

    pub fn write_round(&self, round: &SessionRound<'_>) {
        self.write_line(&SessionLine::Round {
            timestamp: Utc::now(),
            round,
        });
    }

    /// Write the closing line. `error` is set when the loop aborted.
    pub fn write_end(&self, outcome: &str, rounds: usize, error: Option<&str>, duration_secs: f64) {
        self.write_line(&SessionLine::SessionEnd {
            timestamp: Utc::now(),
            outcome,
            rounds,
            error,
            duration_secs,
        });
    }

    fn write_line(&self, line: &SessionLine<'_>) {
        if let Ok(json) = serde_json::to_string(line) {
            if let Ok(mut writer) = self.file.lock() {
                let _ = writeln!(writer, "{}", json);
                let _ = writer.flush();
            }
        }
    }

    fn sessions_dir() -> io::Result<PathBuf> {
        let data_dir = dirs::data_dir().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                "Could not determine data directory",
            )
        })?;
        Ok(data_dir.join("proofloops").join("sessions"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn read_lines(path: &Path) -> Vec<serde_json::Value> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn test_file_name_uses_description_hash() {
        let dir = TempDir::new().unwrap();
        let writer = SessionWriter::in_dir(dir.path(), "prove add_comm").unwrap();

        let name = writer.path().file_name().unwrap().to_string_lossy().to_string();
        let mut hasher = Sha256::new();
        hasher.update(b"prove add_comm");
        let expected = &hex::encode(hasher.finalize())[..6];
        assert!(name.ends_with(&format!("_{}.jsonl", expected)));
    }

    #[test]
    fn test_writes_session_lines() {
        let dir = TempDir::new().unwrap();
        let writer = SessionWriter::in_dir(dir.path(), "desc").unwrap();

        writer.write_start(&SessionStart {
            task_dir: Some(Path::new("tasks/task_id_0")),
            description: "desc",
            template: "def f := {{code}}",
            primary_generator: "openai",
            refiner_generator: "openai",
            primary_model: Some("gpt-4o"),
            refiner_model: Some("o3-mini"),
            max_rounds: 3,
        });
        writer.write_round(&SessionRound {
            round: 0,
            role: GeneratorRole::Primary,
            generation_attempts: 1,
            response: "-- << CODE START >>1-- << CODE END >>",
            code: "1",
            proof: "",
            extraction: "markers",
            verified: false,
            diagnostic: "error: unsolved goals",
            duration_secs: 2.0,
        });
        writer.write_end("exhausted", 3, None, 9.5);

        let lines = read_lines(writer.path());
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["type"], "session_start");
        assert_eq!(lines[0]["refiner_model"], "o3-mini");
        assert_eq!(lines[0]["task_dir"], "tasks/task_id_0");
        assert_eq!(lines[1]["type"], "round");
        assert_eq!(lines[1]["role"], "primary");
        assert_eq!(lines[1]["diagnostic"], "error: unsolved goals");
        assert_eq!(lines[2]["type"], "session_end");
        assert_eq!(lines[2]["outcome"], "exhausted");
        assert!(lines[2]["error"].is_null());
    }
}
