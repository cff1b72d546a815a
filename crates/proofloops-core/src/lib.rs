mod context;
mod error;
mod loop_runner;
mod outcome;
mod retry;
mod task;

pub use context::{LoopContext, RoundRecord, RoundState, DEFAULT_MAX_ROUNDS};
pub use error::{LoopError, TaskError};
pub use loop_runner::LoopRunner;
pub use outcome::{LoopOutcome, ProofResult, PLACEHOLDER_FRAGMENT};
pub use retry::RetryPolicy;
pub use task::{
    read_template, read_unit_tests, Task, DESCRIPTION_FILE, TEMPLATE_FILE, TESTS_FILE,
};
