use serde::{Deserialize, Serialize};
use std::time::Duration;

use proofloops_fragments::Fragments;

use crate::RoundRecord;

/// Stand-in for a fragment that was never extracted
pub const PLACEHOLDER_FRAGMENT: &str = "sorry";

/// The code and proof produced for a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofResult {
    pub code: String,
    pub proof: String,
}

impl ProofResult {
    pub fn new(code: impl Into<String>, proof: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            proof: proof.into(),
        }
    }

    /// Best-effort result: empty fragments become `sorry`
    pub fn with_placeholders(fragments: &Fragments) -> Self {
        let or_placeholder = |s: &str| {
            if s.is_empty() {
                PLACEHOLDER_FRAGMENT.to_string()
            } else {
                s.to_string()
            }
        };
        Self {
            code: or_placeholder(&fragments.code),
            proof: or_placeholder(&fragments.proof),
        }
    }
}

impl From<Fragments> for ProofResult {
    fn from(fragments: Fragments) -> Self {
        Self {
            code: fragments.code,
            proof: fragments.proof,
        }
    }
}

/// The final outcome of a refinement loop
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LoopOutcome {
    /// The verifier accepted a filled template
    Verified {
        rounds: usize,
        result: ProofResult,
        #[serde(skip)]
        history: Vec<RoundRecord>,
        total_duration_secs: f64,
    },
    /// Every round was rejected; the result is best effort
    Exhausted {
        rounds: usize,
        result: ProofResult,
        last_error: String,
        #[serde(skip)]
        history: Vec<RoundRecord>,
        total_duration_secs: f64,
    },
}

impl LoopOutcome {
    pub fn verified(
        rounds: usize,
        result: ProofResult,
        history: Vec<RoundRecord>,
        duration: Duration,
    ) -> Self {
        Self::Verified {
            rounds,
            result,
            history,
            total_duration_secs: duration.as_secs_f64(),
        }
    }

    pub fn exhausted(
        rounds: usize,
        result: ProofResult,
        last_error: String,
        history: Vec<RoundRecord>,
        duration: Duration,
    ) -> Self {
        Self::Exhausted {
            rounds,
            result,
            last_error,
            history,
            total_duration_secs: duration.as_secs_f64(),
        }
    }

    pub fn rounds(&self) -> usize {
        match self {
            Self::Verified { rounds, .. } => *rounds,
            Self::Exhausted { rounds, .. } => *rounds,
        }
    }

    pub fn result(&self) -> &ProofResult {
        match self {
            Self::Verified { result, .. } => result,
            Self::Exhausted { result, .. } => result,
        }
    }

    pub fn into_result(self) -> ProofResult {
        match self {
            Self::Verified { result, .. } => result,
            Self::Exhausted { result, .. } => result,
        }
    }

    pub fn history(&self) -> &[RoundRecord] {
        match self {
            Self::Verified { history, .. } => history,
            Self::Exhausted { history, .. } => history,
        }
    }

    pub fn is_verified(&self) -> bool {
        matches!(self, Self::Verified { .. })
    }

    /// Short label used in logs and session files
    pub fn status(&self) -> &'static str {
        match self {
            Self::Verified { .. } => "verified",
            Self::Exhausted { .. } => "exhausted",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders_only_fill_empty_fragments() {
        assert_eq!(
            ProofResult::with_placeholders(&Fragments::default()),
            ProofResult::new("sorry", "sorry")
        );
        assert_eq!(
            ProofResult::with_placeholders(&Fragments::new("n + 1", "")),
            ProofResult::new("n + 1", "sorry")
        );
    }

    #[test]
    fn test_outcome_json_shape() {
        let outcome = LoopOutcome::exhausted(
            3,
            ProofResult::new("x", "sorry"),
            "error: unsolved goals".to_string(),
            Vec::new(),
            Duration::from_secs(2),
        );

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "exhausted");
        assert_eq!(json["result"]["code"], "x");
        assert_eq!(json["last_error"], "error: unsolved goals");
        assert!(json.get("history").is_none());
        assert_eq!(outcome.status(), "exhausted");
        assert!(!outcome.is_verified());
    }
}
