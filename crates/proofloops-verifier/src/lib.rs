//! # proofloops-verifier
//!
//! Checks filled templates with an external proof checker.
//!
//! - [`Verifier`] - the checking capability used by the refinement loop
//! - [`LeanVerifier`] - runs `lake env lean <file>` (or a configured command)

mod lean;

pub use lean::{LeanVerifier, VerifierConfig};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Result of checking one filled document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verification {
    pub success: bool,
    /// Checker output; empty or irrelevant when `success` is true
    pub diagnostic: String,
}

impl Verification {
    pub fn passed() -> Self {
        Self {
            success: true,
            diagnostic: String::new(),
        }
    }

    pub fn failed(diagnostic: impl Into<String>) -> Self {
        Self {
            success: false,
            diagnostic: diagnostic.into(),
        }
    }
}

/// External checker for filled templates.
///
/// Checking never errors: problems running the checker itself are reported
/// as a failed [`Verification`] carrying the reason.
#[async_trait]
pub trait Verifier: Send + Sync {
    fn name(&self) -> &str;

    async fn execute(&self, document: &str) -> Verification;

    /// Check if the underlying checker can be run
    async fn is_available(&self) -> bool;
}
