use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::template::{CODE_PLACEHOLDER, PROOF_PLACEHOLDER};

const CODE_START: &str = "-- << CODE START >>";
const CODE_END: &str = "-- << CODE END >>";
const PROOF_START: &str = "-- << PROOF START >>";
const PROOF_END: &str = "-- << PROOF END >>";

/// The implementation and proof text pulled out of a generator response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragments {
    pub code: String,
    pub proof: String,
}

impl Fragments {
    pub fn new(code: impl Into<String>, proof: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            proof: proof.into(),
        }
    }
}

/// How the fragments of a round were obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    /// Both `-- << ... START >>` / `-- << ... END >>` pairs were found
    Markers,
    /// Recovered by splitting on the raw placeholder tokens
    Fallback,
    /// Nothing usable in the response; previous fragments kept
    Unchanged,
}

impl std::fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractionMethod::Markers => write!(f, "markers"),
            ExtractionMethod::Fallback => write!(f, "fallback"),
            ExtractionMethod::Unchanged => write!(f, "unchanged"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub fragments: Fragments,
    pub method: ExtractionMethod,
}

/// Extract code and proof fragments from a generator response.
///
/// Marker blocks are tried first:
/// ```text
/// -- << CODE START >>
/// ...
/// -- << CODE END >>
/// -- << PROOF START >>
/// ...
/// -- << PROOF END >>
/// ```
/// When either pair is missing, the response is split on `{{code}}` and
/// `{{proof}}\n` instead. If neither works the `previous` fragments are
/// returned untouched. Never fails.
///
/// Fragments are replaced as a pair: a response with a complete code block
/// but no proof block does not update the code on its own, so the code and
/// proof handed to the next round always come from the same response.
pub fn extract_fragments(response: &str, previous: &Fragments) -> Extraction {
    debug!(response_len = response.len(), "Extracting fragments");

    if let Some(fragments) = extract_from_markers(response) {
        return Extraction {
            fragments,
            method: ExtractionMethod::Markers,
        };
    }

    if let Some(fragments) = extract_from_placeholders(response) {
        debug!("Markers missing, recovered fragments from placeholder tokens");
        return Extraction {
            fragments,
            method: ExtractionMethod::Fallback,
        };
    }

    debug!("No fragments found in response, keeping previous");
    Extraction {
        fragments: previous.clone(),
        method: ExtractionMethod::Unchanged,
    }
}

fn extract_from_markers(response: &str) -> Option<Fragments> {
    let code = between(response, CODE_START, CODE_END)?;
    let proof = between(response, PROOF_START, PROOF_END)?;
    Some(Fragments::new(code, proof))
}

/// Text between the first `start` and the first `end` that follows it, trimmed
fn between<'a>(text: &'a str, start: &str, end: &str) -> Option<&'a str> {
    let from = text.find(start)? + start.len();
    let rest = &text[from..];
    let to = rest.find(end)?;
    Some(rest[..to].trim())
}

fn extract_from_placeholders(response: &str) -> Option<Fragments> {
    // Only the text between the first and second `{{code}}` is considered
    let segment = response.split(CODE_PLACEHOLDER).nth(1)?;

    let proof_token = format!("{}\n", PROOF_PLACEHOLDER);
    let mut pieces = segment.split(proof_token.as_str());
    let code = pieces.next()?.trim();
    let proof = pieces.next()?.trim();
    Some(Fragments::new(code, proof))
}
