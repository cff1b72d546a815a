use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use proofloops_agent::ChatMessage;
use proofloops_fragments::{ExtractionMethod, Fragments, RoundPrompts};
use proofloops_logging::GeneratorRole;

use crate::Task;

/// Rounds attempted before giving up
pub const DEFAULT_MAX_ROUNDS: usize = 3;

/// What one round hands to the next: the last fragments and the last
/// verifier diagnostic. Nothing else crosses a round boundary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoundState {
    pub fragments: Fragments,
    pub last_error: String,
}

/// Record of a single round
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundRecord {
    pub round: usize,
    pub role: GeneratorRole,
    pub generation_attempts: usize,
    pub response: String,
    pub fragments: Fragments,
    pub extraction: ExtractionMethod,
    pub verified: bool,
    pub diagnostic: String,
    pub duration_secs: f64,
    pub timestamp: DateTime<Utc>,
}

/// Shared context for the refinement loop
#[derive(Debug, Clone)]
pub struct LoopContext {
    pub task: Task,
    /// Directory the task was loaded from, if any
    pub task_dir: Option<PathBuf>,
    /// Current round number (0-indexed)
    pub round: usize,
    pub max_rounds: usize,
    pub state: RoundState,
    pub history: Vec<RoundRecord>,
    started_at: Instant,
}

impl LoopContext {
    pub fn new(task: Task) -> Self {
        Self {
            task,
            task_dir: None,
            round: 0,
            max_rounds: DEFAULT_MAX_ROUNDS,
            state: RoundState::default(),
            history: Vec::new(),
            started_at: Instant::now(),
        }
    }

    pub fn with_max_rounds(mut self, max: usize) -> Self {
        self.max_rounds = max;
        self
    }

    pub fn with_task_dir(mut self, dir: PathBuf) -> Self {
        self.task_dir = Some(dir);
        self
    }

    pub fn increment_round(&mut self) {
        self.round += 1;
    }

    pub fn push_record(&mut self, record: RoundRecord) {
        self.history.push(record);
    }

    pub fn total_duration(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn should_continue(&self) -> bool {
        self.round < self.max_rounds
    }

    /// The first round goes to the primary generator, later ones to the refiner
    pub fn current_role(&self) -> GeneratorRole {
        if self.round == 0 {
            GeneratorRole::Primary
        } else {
            GeneratorRole::Refiner
        }
    }

    /// Messages for the current round
    pub fn current_messages(&self) -> Vec<ChatMessage> {
        match self.current_role() {
            GeneratorRole::Primary => {
                RoundPrompts::build_initial_messages(&self.task.description, &self.task.template)
            }
            GeneratorRole::Refiner => RoundPrompts::build_refinement_messages(
                &self.task.description,
                &self.task.template,
                &self.state.fragments.code,
                &self.state.fragments.proof,
                &self.state.last_error,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proofloops_agent::Role;

    fn context() -> LoopContext {
        LoopContext::new(Task::new("Add one.", "def f := {{code}}\n{{proof}}"))
    }

    #[test]
    fn test_round_zero_uses_initial_prompt() {
        let ctx = context();
        assert_eq!(ctx.current_role(), GeneratorRole::Primary);

        let messages = ctx.current_messages();
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[0].content.contains("Fill the implementation"));
    }

    #[test]
    fn test_later_rounds_carry_state() {
        let mut ctx = context();
        ctx.state = RoundState {
            fragments: Fragments::new("n + 2", "rfl"),
            last_error: "type mismatch".to_string(),
        };
        ctx.increment_round();

        assert_eq!(ctx.current_role(), GeneratorRole::Refiner);
        let user = &ctx.current_messages()[1].content;
        assert!(user.contains("Last implementation:\nn + 2"));
        assert!(user.contains("Lean Error Message:\ntype mismatch"));
    }

    #[test]
    fn test_should_continue_respects_max_rounds() {
        let mut ctx = context().with_max_rounds(2);
        assert!(ctx.should_continue());
        ctx.increment_round();
        assert!(ctx.should_continue());
        ctx.increment_round();
        assert!(!ctx.should_continue());
    }
}
