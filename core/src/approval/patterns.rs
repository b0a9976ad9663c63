//! Ordered table of confirmation-prompt shapes, plus the shapes that name
//! the operation a prompt is asking about.
//!
//! Earlier entries win. Each shape carries the exact token that answers it
//! affirmatively; nothing else is ever written alongside that token.

use regex::Regex;

#[derive(Debug, Clone)]
pub struct PromptPattern {
    pub name: &'static str,
    pub pattern: Regex,
    pub ack: &'static str,
}

impl PromptPattern {
    pub fn new(name: &'static str, pattern: &str, ack: &'static str) -> Self {
        Self {
            name,
            pattern: Regex::new(pattern)
                .unwrap_or_else(|e| panic!("invalid prompt pattern {:?}: {}", pattern, e)),
            ack,
        }
    }
}

pub fn default_patterns() -> Vec<PromptPattern> {
    vec![
        // "❯ 1. Yes" / "1) Yes, and don't ask again"
        PromptPattern::new("numbered_menu", r"(?im)(?:^|\s|❯|›|>)1[.)]\s*yes\b", "1"),
        PromptPattern::new("bracketed_yes_no", r"[\[(]Y/n[\])]", "Y"),
        PromptPattern::new("yes_no", r"(?i)[\[(]\s*y(?:es)?\s*/\s*n(?:o)?\s*[\])]", "y"),
        PromptPattern::new("proceed", r"(?i)\bproceed\s*\?", "y"),
        PromptPattern::new(
            "press_to_continue",
            r"(?i)\bpress\s+(?:any\s+key|enter|return)\s+to\s+continue\b",
            "\r",
        ),
    ]
}

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid operation pattern {:?}: {}", pattern, e))
}

/// Shapes that name an operation; capture group 1 is the command text.
pub fn operation_patterns() -> Vec<Regex> {
    vec![
        // "● Bash(ls -la)"
        compile(r"(?i)\b(?:bash|shell|run|execute|exec|command)\s*\(\s*([^)\n]+?)\s*\)"),
        // "Bash command" header with the command on the next line
        compile(r"(?im)^\s*(?:bash|shell)\s+command\s*:?\s*$\n\s*(\S[^\n]*)"),
        // "Run ls -la?" / "Execute `make release`"
        compile(r"(?i)\b(?:run|execute)\s+(?:the\s+)?(?:command\s+)?[\x60'\x22]?([a-z0-9_./-][^?\n\x60'\x22]*)"),
    ]
}

/// Every operation named in `text`, in pattern order.
pub fn named_operations<'t>(operations: &[Regex], text: &'t str) -> Vec<&'t str> {
    operations
        .iter()
        .flat_map(|re| re.captures_iter(text))
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .filter(|op| !op.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_match(text: &str) -> Option<&'static str> {
        default_patterns()
            .into_iter()
            .find(|p| p.pattern.is_match(text))
            .map(|p| p.name)
    }

    #[test]
    fn recognizes_prompt_shapes() {
        assert_eq!(first_match("❯ 1. Yes\n  2. No"), Some("numbered_menu"));
        assert_eq!(first_match("Overwrite? [Y/n]"), Some("bracketed_yes_no"));
        assert_eq!(first_match("Continue (y/n)"), Some("yes_no"));
        assert_eq!(first_match("Are you sure [y/N]"), Some("yes_no"));
        assert_eq!(first_match("Do you want to proceed?"), Some("proceed"));
        assert_eq!(first_match("Press Enter to continue"), Some("press_to_continue"));
        assert_eq!(first_match("Listed 3 files in src"), None);
    }

    #[test]
    fn menu_outranks_proceed_question() {
        assert_eq!(
            first_match("Do you want to proceed?\n❯ 1. Yes\n  2. No"),
            Some("numbered_menu")
        );
    }

    #[test]
    fn finds_named_operations() {
        let ops = operation_patterns();
        assert_eq!(named_operations(&ops, "● Bash(make release)"), vec!["make release"]);
        assert_eq!(
            named_operations(&ops, "Bash command\n  grep -rn TODO src\nDo you want to proceed?"),
            vec!["grep -rn TODO src"]
        );
        assert_eq!(named_operations(&ops, "Run `ls -la`? [Y/n]"), vec!["ls -la"]);
        assert!(named_operations(&ops, "Do you want to proceed?\n❯ 1. Yes").is_empty());
    }

    #[test]
    fn version_numbers_are_not_menus() {
        assert_eq!(first_match("node v21.1.0 yesterday"), None);
    }
}
