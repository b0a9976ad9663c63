//! Prompt templates for the secondary model.

use super::extract::{Extracted, ExtractionKind};

const NO_OUTPUT: &str = "(the session produced no usable output)";

/// Plain conversational request, no session involved.
pub fn direct(input: &str, persona: &str, context: &str) -> String {
    format!(
        "Context: {}\nUser Query: {}\n\n{}",
        context, input, persona
    )
}

/// Final reply built from what the session produced.
pub fn assisted(input: &str, extracted: &Extracted, persona: &str, context: &str) -> String {
    let heading = match extracted.kind {
        ExtractionKind::KeyLines => "Key output from the assistant session:",
        ExtractionKind::Fragments => "Excerpts from the assistant session's reply:",
        ExtractionKind::RawTail | ExtractionKind::Empty => "Output from the assistant session:",
    };
    let body = if extracted.is_empty() {
        NO_OUTPUT.to_string()
    } else {
        extracted.text()
    };

    format!(
        "Context: {}\n\n{}\n{}\n\nUser Query: {}\n\n{}\n\n\
         Please respond incorporating the session output with your personality. \
         Stick to what the output above actually shows and interpret it through your character.",
        context, heading, body, input, persona
    )
}

/// The session is blocked on a prompt that must not be answered
/// automatically; ask the user instead.
pub fn escalation(input: &str, evidence: &str, persona: &str, context: &str) -> String {
    format!(
        "Context: {}\n\n\
         The assistant session stopped and is asking for confirmation before it continues:\n{}\n\n\
         User Query: {}\n\n{}\n\n\
         Nothing has been approved yet. Explain briefly what the session wants to do, \
         then ask the user to confirm whether it should go ahead.",
        context, evidence, input, persona
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assisted_prompt_embeds_everything() {
        let extracted = Extracted {
            kind: ExtractionKind::KeyLines,
            items: vec!["notes.txt".to_string(), "build.sh".to_string()],
        };
        let prompt = assisted("list files here", &extracted, "You are Ani.", "No previous context.");
        assert!(prompt.starts_with("Context: No previous context."));
        assert!(prompt.contains("Key output from the assistant session:\nnotes.txt\nbuild.sh"));
        assert!(prompt.contains("User Query: list files here"));
        assert!(prompt.contains("You are Ani."));
    }

    #[test]
    fn assisted_prompt_marks_missing_output() {
        let extracted = Extracted {
            kind: ExtractionKind::Empty,
            items: Vec::new(),
        };
        assert!(assisted("x", &extracted, "p", "c").contains(NO_OUTPUT));
    }

    #[test]
    fn escalation_prompt_asks_for_confirmation() {
        let prompt = escalation(
            "clean up logs",
            "Delete file temp.log?\nDo you want to proceed?",
            "You are Ani.",
            "No previous context.",
        );
        assert!(prompt.contains("Delete file temp.log?"));
        assert!(prompt.contains("ask the user to confirm"));
    }

    #[test]
    fn direct_prompt_layout() {
        assert_eq!(
            direct("hi", "You are Ani.", "No previous context."),
            "Context: No previous context.\nUser Query: hi\n\nYou are Ani."
        );
    }
}
