use crate::Fragments;

pub const CODE_PLACEHOLDER: &str = "{{code}}";
pub const PROOF_PLACEHOLDER: &str = "{{proof}}";

/// Substitute the fragments into the template.
///
/// Plain string replacement of every `{{code}}` and `{{proof}}`; no other
/// syntax is recognised. Code is substituted first, so a `{{proof}}` token
/// inside the code fragment is replaced as well.
pub fn fill_template(template: &str, fragments: &Fragments) -> String {
    template
        .replace(CODE_PLACEHOLDER, &fragments.code)
        .replace(PROOF_PLACEHOLDER, &fragments.proof)
}

/// Placeholders that do not occur in the template
pub fn missing_placeholders(template: &str) -> Vec<&'static str> {
    [CODE_PLACEHOLDER, PROOF_PLACEHOLDER]
        .into_iter()
        .filter(|placeholder| !template.contains(placeholder))
        .collect()
}
