use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoopError {
    #[error("Generation failed in round {} after {attempts} attempt(s): {source}", .round + 1)]
    Generation {
        round: usize,
        attempts: usize,
        #[source]
        source: proofloops_agent::GeneratorError,
    },
}

#[derive(Error, Debug)]
pub enum TaskError {
    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
