use proofloops_agent::ChatMessage;

const INITIAL_SYSTEM: &str =
    "You are a Lean 4 expert. Fill the implementation and proof placeholders.";

const REFINEMENT_SYSTEM: &str = "You are a Lean 4 expert. The previous code failed with an error. \
Please fix the implementation or proof accordingly.";

/// Prompt templates for the generation rounds
pub struct RoundPrompts;

impl RoundPrompts {
    /// Messages for the first round, sent to the primary generator
    pub fn build_initial_messages(problem_description: &str, template: &str) -> Vec<ChatMessage> {
        let user = format!(
            "Problem Description:\n{description}\n\n\
             Lean Template (with {{code}} and {{proof}}):\n{template}",
            description = problem_description,
            template = template,
        );

        vec![ChatMessage::system(INITIAL_SYSTEM), ChatMessage::user(user)]
    }

    /// Messages for later rounds, carrying the failed attempt and the verifier output
    pub fn build_refinement_messages(
        problem_description: &str,
        template: &str,
        last_code: &str,
        last_proof: &str,
        last_error: &str,
    ) -> Vec<ChatMessage> {
        let user = format!(
            "Problem Description:\n{description}\n\n\
             Lean Template:\n{template}\n\n\
             Last implementation:\n{code}\n\n\
             Last proof:\n{proof}\n\n\
             Lean Error Message:\n{error}",
            description = problem_description,
            template = template,
            code = last_code,
            proof = last_proof,
            error = last_error,
        );

        vec![ChatMessage::system(REFINEMENT_SYSTEM), ChatMessage::user(user)]
    }
}
