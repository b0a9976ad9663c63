//! Stream Classifier
//!
//! Turns one raw PTY chunk into the ordered list of semantic lines it
//! carries. Escape sequences, carriage returns, box-drawing frames,
//! spinner/animation lines, static UI chrome and parenthetical timing
//! annotations are discarded.
//!
//! The only state is the rule table; `classify` is otherwise a pure
//! function of its input, and each chunk is classified on its own.

use crate::trace_log;
use regex::Regex;
use std::sync::OnceLock;

/// What a matching rule does to a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineAction {
    /// Discard the whole line.
    Drop,
    /// Remove the matched text and keep classifying the remainder.
    Strip,
}

/// One entry of the ordered noise table.
#[derive(Debug, Clone)]
pub struct NoiseRule {
    pub name: &'static str,
    pub pattern: Regex,
    pub action: LineAction,
}

impl NoiseRule {
    pub fn new(name: &'static str, pattern: &str, action: LineAction) -> Self {
        Self {
            name,
            pattern: compile(pattern),
            action,
        }
    }
}

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid built-in pattern {:?}: {}", pattern, e))
}

/// A leading glyph, one word, a trailing ellipsis, optionally followed by
/// a parenthetical ("✻ Thinking… (3s · esc to interrupt)").
pub const ANIMATION_PATTERN: &str =
    r"^[^\p{L}\p{N}\s]\s*\p{L}+(?:…|\.{3})\s*(?:\(.*\))?$";

/// "(3s)", "(2.4s · ↑ 120 tokens)", "(1m 12s)"
pub const TIMING_PATTERN: &str =
    r"\(\s*\d+(?:\.\d+)?\s*(?:ms|s|m|sec|secs|seconds)\b[^)]*\)";

/// Default ordered table: animation first, then static chrome, then
/// annotation stripping.
pub fn default_rules() -> Vec<NoiseRule> {
    use LineAction::{Drop, Strip};
    vec![
        NoiseRule::new("animation", ANIMATION_PATTERN, Drop),
        NoiseRule::new("help_hint", r"(?i)\?\s+for\s+shortcuts", Drop),
        NoiseRule::new("interrupt_hint", r"(?i)\besc\s+to\s+interrupt\b", Drop),
        NoiseRule::new("expand_hint", r"(?i)\bctrl\+r\s+to\s+expand\b", Drop),
        NoiseRule::new("mode_hint", r"(?i)\bshift\+tab\s+to\s+cycle\b", Drop),
        NoiseRule::new(
            "permission_mode",
            r"(?i)\b(?:auto-accept\s+edits|bypass\s+permissions|plan\s+mode)\s+on\b",
            Drop,
        ),
        NoiseRule::new("exit_hint", r"(?i)\bpress\s+ctrl-?c\s+again\s+to\s+exit\b", Drop),
        NoiseRule::new(
            "update_banner",
            r"(?i)\b(?:update\s+available|new\s+version\s+available|auto-?updat(?:e|ing)\b)",
            Drop,
        ),
        NoiseRule::new(
            "usage_limit",
            r"(?i)\b(?:usage\s+limit|approaching\s+(?:your\s+)?(?:opus\s+)?limit|limit\s+will\s+reset)\b",
            Drop,
        ),
        NoiseRule::new("welcome_banner", r"(?i)\bwelcome\s+to\s+claude\b", Drop),
        NoiseRule::new("tip_line", r"(?i)^tip:", Drop),
        NoiseRule::new("compact_notice", r"(?i)\bcontext\s+left\s+until\s+auto-compact\b", Drop),
        NoiseRule::new("timing_annotation", TIMING_PATTERN, Strip),
    ]
}

fn escape_pattern() -> &'static Regex {
    static ESCAPES: OnceLock<Regex> = OnceLock::new();
    ESCAPES.get_or_init(|| {
        compile(concat!(
            // OSC: ESC ] ... (BEL | ESC \)
            r"\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)?",
            // CSI: ESC [ params intermediates final
            r"|\x1b\[[0-?]*[ -/]*[@-~]",
            // charset designation: ESC ( B
            r"|\x1b[()*+][0-9A-Za-z]",
            // two-byte escapes: ESC 7, ESC M, ...
            r"|\x1b[0-9=>@-_a-z]",
            // bare 8-bit CSI
            r"|\x{9b}[0-?]*[ -/]*[@-~]",
            // dangling ESC at the end of a chunk
            r"|\x1b$",
        ))
    })
}

/// Strip color/cursor escape sequences and carriage returns.
pub fn strip_escapes(text: &str) -> String {
    escape_pattern().replace_all(text, "").replace('\r', "")
}

/// Box-drawing, block and vertical-bar characters used as decorative frames.
fn is_framing(c: char) -> bool {
    matches!(c, '\u{2500}'..='\u{257F}' | '\u{2580}'..='\u{259F}' | '|' | '¦')
        || c.is_whitespace()
}

/// Trim decorative framing from both ends of a line.
pub fn trim_framing(line: &str) -> &str {
    line.trim_matches(is_framing)
}

/// Minimum retained length: a line survives only with more than this many
/// characters left.
const MIN_LINE_CHARS: usize = 2;

#[derive(Debug, Clone)]
pub struct StreamClassifier {
    rules: Vec<NoiseRule>,
}

impl Default for StreamClassifier {
    fn default() -> Self {
        Self::new(default_rules())
    }
}

impl StreamClassifier {
    pub fn new(rules: Vec<NoiseRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[NoiseRule] {
        &self.rules
    }

    /// Classify a raw chunk. Invalid UTF-8 is replaced, not rejected.
    pub fn classify(&self, chunk: &[u8]) -> Vec<String> {
        self.classify_str(&String::from_utf8_lossy(chunk))
    }

    pub fn classify_str(&self, chunk: &str) -> Vec<String> {
        strip_escapes(chunk)
            .split('\n')
            .filter_map(|line| self.classify_line(line))
            .collect()
    }

    /// Classify a single, already escape-free line.
    pub fn classify_line(&self, line: &str) -> Option<String> {
        let mut current = trim_framing(line).to_string();
        if current.is_empty() {
            return None;
        }

        for rule in &self.rules {
            if !rule.pattern.is_match(&current) {
                continue;
            }
            match rule.action {
                LineAction::Drop => {
                    trace_log!("Dropped line ({}): {:?}", rule.name, current);
                    return None;
                }
                LineAction::Strip => {
                    let stripped = trim_framing(&rule.pattern.replace_all(&current, "")).to_string();
                    current = stripped;
                }
            }
        }

        if current.chars().count() > MIN_LINE_CHARS {
            Some(current)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(input: &str) -> Vec<String> {
        StreamClassifier::default().classify(input.as_bytes())
    }

    #[test]
    fn animation_only_chunk_yields_nothing() {
        let chunk = "✻ Thinking…\r\n· Pondering...\n✢ Working… (3s · esc to interrupt)\n* Brewing...\n";
        assert!(classify(chunk).is_empty());
    }

    #[test]
    fn animation_lines_inside_escapes_are_dropped() {
        let chunk = "\x1b[2K\x1b[1G\x1b[38;5;174m✶\x1b[39m \x1b[1mSimmering…\x1b[22m\r";
        assert!(classify(chunk).is_empty());
    }

    #[test]
    fn strips_colors_and_cursor_moves() {
        let chunk = "\x1b[1;32mCargo.toml\x1b[0m\r\n\x1b[2A\x1b[Ksrc/main.rs\r\n";
        assert_eq!(classify(chunk), vec!["Cargo.toml", "src/main.rs"]);
    }

    #[test]
    fn strips_osc_title_sequences() {
        assert_eq!(strip_escapes("\x1b]0;claude\x07README.md"), "README.md");
        assert_eq!(strip_escapes("\x1b]2;t\x1b\\done"), "done");
    }

    #[test]
    fn trims_box_framing() {
        let chunk = "╭──────────────╮\n│ main.rs      │\n│ lib.rs       │\n╰──────────────╯\n";
        assert_eq!(classify(chunk), vec!["main.rs", "lib.rs"]);
    }

    #[test]
    fn drops_static_chrome() {
        let chunk = concat!(
            "? for shortcuts\n",
            "⏵⏵ auto-accept edits on (shift+tab to cycle)\n",
            "✓ Update available! Run: npm i -g @anthropic-ai/claude-code\n",
            "Approaching usage limit · resets at 9pm\n",
            "Press Ctrl-C again to exit\n",
            "Found 3 files\n",
        );
        assert_eq!(classify(chunk), vec!["Found 3 files"]);
    }

    #[test]
    fn strips_timing_annotations() {
        assert_eq!(
            classify("● Bash(ls -la) (2.4s)\n"),
            vec!["● Bash(ls -la)"]
        );
        assert_eq!(
            classify("Listed 12 paths (1m 3s · ↑ 400 tokens)\n"),
            vec!["Listed 12 paths"]
        );
    }

    #[test]
    fn keeps_only_lines_longer_than_two_chars() {
        assert_eq!(classify("ok\n> \nabc\n"), vec!["abc"]);
    }

    #[test]
    fn discards_empty_lines() {
        assert!(classify("\n\n   \n\r\n").is_empty());
    }

    #[test]
    fn preserves_line_order() {
        let chunk = "first line\n✻ Thinking…\nsecond line\n│ third line │\n";
        assert_eq!(classify(chunk), vec!["first line", "second line", "third line"]);
    }

    #[test]
    fn mixed_listing_with_framing_and_animation() {
        let chunk = "╭───╮\n│ notes.txt │\n✻ Thinking…\n│ build.sh │\n╰───╯\n";
        assert_eq!(classify(chunk), vec!["notes.txt", "build.sh"]);
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let lines = StreamClassifier::default().classify(b"data\xff.bin\n");
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("data"));
    }

    #[test]
    fn custom_rule_table() {
        let classifier = StreamClassifier::new(vec![NoiseRule::new(
            "noisy",
            r"^DEBUG",
            LineAction::Drop,
        )]);
        assert_eq!(classifier.classify_str("DEBUG x\nkeep me\n"), vec!["keep me"]);
        // without the default table animation lines survive
        assert_eq!(classifier.classify_str("✻ Thinking…\n"), vec!["✻ Thinking…"]);
    }
}
