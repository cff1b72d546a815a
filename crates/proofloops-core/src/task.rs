use std::path::Path;

use crate::TaskError;

pub const DESCRIPTION_FILE: &str = "description.txt";
pub const TEMPLATE_FILE: &str = "task.lean";
pub const TESTS_FILE: &str = "tests.lean";

/// A problem description and the Lean template whose placeholders get filled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub description: String,
    pub template: String,
}

impl Task {
    pub fn new(description: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            template: template.into(),
        }
    }

    /// Read `description.txt` and `task.lean` from a task directory, unchanged
    pub fn from_dir(task_dir: &Path) -> Result<Self, TaskError> {
        Ok(Self {
            description: read_file(task_dir, DESCRIPTION_FILE)?,
            template: read_template(task_dir)?,
        })
    }
}

/// Read the unit tests (`tests.lean`) of a task directory
pub fn read_unit_tests(task_dir: &Path) -> Result<String, TaskError> {
    read_file(task_dir, TESTS_FILE)
}

/// Read the template (`task.lean`) of a task directory
pub fn read_template(task_dir: &Path) -> Result<String, TaskError> {
    read_file(task_dir, TEMPLATE_FILE)
}

fn read_file(task_dir: &Path, name: &str) -> Result<String, TaskError> {
    let path = task_dir.join(name);
    std::fs::read_to_string(&path).map_err(|source| TaskError::Read { path, source })
}
