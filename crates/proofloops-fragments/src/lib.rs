mod extract;
mod prompts;
mod template;

pub use extract::{extract_fragments, Extraction, ExtractionMethod, Fragments};
pub use prompts::RoundPrompts;
pub use template::{fill_template, missing_placeholders, CODE_PLACEHOLDER, PROOF_PLACEHOLDER};
