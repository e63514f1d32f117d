//! System prompt assembly

use crate::types::Prompt;

/// Build the effective system prompt for a chat turn: the project's own
/// system prompt, followed by every prompt snippet appended verbatim.
pub fn build_system_prompt(project_prompt: &str, snippets: &[Prompt]) -> String {
    let mut system_prompt = project_prompt.to_string();

    if !snippets.is_empty() {
        system_prompt.push_str("\n\nAdditional context:\n");
        for snippet in snippets {
            system_prompt.push_str(&format!("\n{}:\n{}\n", snippet.name, snippet.content));
        }
    }

    system_prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn no_snippets_leaves_the_prompt_alone() {
        assert_eq!(build_system_prompt("Be helpful.", &[]), "Be helpful.");
    }

    #[test]
    fn snippets_are_appended_verbatim() {
        let project_id = Uuid::new_v4();
        let snippets = vec![
            Prompt::new("Tone", "Stay formal.", project_id),
            Prompt::new("Glossary", "SLA means service level agreement.", project_id),
        ];

        let prompt = build_system_prompt("Be helpful.", &snippets);

        assert_eq!(
            prompt,
            "Be helpful.\n\nAdditional context:\n\nTone:\nStay formal.\n\nGlossary:\nSLA means service level agreement.\n"
        );
    }
}
