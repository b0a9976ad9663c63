//! Prompt Interceptor
//!
//! Looks at the recent window of session output and decides whether the
//! subordinate is blocked on a confirmation prompt, and if so whether that
//! prompt may be answered automatically.
//!
//! A matched prompt (see [`patterns`]) is `Unsafe` when the evidence names a
//! mutating verb anywhere, or names an operation (`Bash(make release)`,
//! `Run cargo build?`) whose command is not an allow-listed read-only verb.
//! Anything else is `Safe`. Unsafe prompts are never answered here.

pub mod allowlist;
pub mod patterns;

pub use allowlist::{OperationCategory, VerbAllowlist};
pub use patterns::{default_patterns, operation_patterns, PromptPattern};

use crate::config::ApprovalConfig;
use crate::session::Line;
use crate::trace_log;
use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    None,
    Safe,
    Unsafe,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptClassification {
    pub kind: PromptKind,
    /// The window the decision was made on, lines joined with '\n'
    pub evidence_text: String,
    /// Name of the matching prompt shape
    pub pattern: Option<&'static str>,
    /// Affirmative token for the matched shape
    pub ack: Option<&'static str>,
    /// Why a prompt was judged unsafe
    pub reason: Option<String>,
}

impl PromptClassification {
    fn none(evidence_text: String) -> Self {
        Self {
            kind: PromptKind::None,
            evidence_text,
            pattern: None,
            ack: None,
            reason: None,
        }
    }

    pub fn is_prompt(&self) -> bool {
        self.kind != PromptKind::None
    }

    /// The token to write, only ever present for a safe prompt.
    pub fn ack_token(&self) -> Option<&'static str> {
        match self.kind {
            PromptKind::Safe => self.ack,
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PromptInterceptor {
    patterns: Vec<PromptPattern>,
    operations: Vec<Regex>,
    allowlist: VerbAllowlist,
}

impl Default for PromptInterceptor {
    fn default() -> Self {
        Self::new(default_patterns(), VerbAllowlist::default())
    }
}

impl PromptInterceptor {
    pub fn new(patterns: Vec<PromptPattern>, allowlist: VerbAllowlist) -> Self {
        Self {
            patterns,
            operations: operation_patterns(),
            allowlist,
        }
    }

    /// Default prompt shapes with the allow-list extended from config
    pub fn from_config(config: &ApprovalConfig) -> Self {
        Self::new(default_patterns(), VerbAllowlist::from_config(config))
    }

    pub fn allowlist(&self) -> &VerbAllowlist {
        &self.allowlist
    }

    pub fn classify(&self, window: &[Line]) -> PromptClassification {
        let text = window
            .iter()
            .map(|l| l.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        self.classify_text(text)
    }

    pub fn classify_text(&self, evidence_text: impl Into<String>) -> PromptClassification {
        let evidence_text = evidence_text.into();

        let Some(matched) = self
            .patterns
            .iter()
            .find(|p| p.pattern.is_match(&evidence_text))
        else {
            return PromptClassification::none(evidence_text);
        };

        let mut classification = PromptClassification {
            kind: PromptKind::Unsafe,
            evidence_text,
            pattern: Some(matched.name),
            ack: Some(matched.ack),
            reason: None,
        };

        if let Some(verb) = self.allowlist.find_mutating(&classification.evidence_text) {
            classification.reason = Some(format!("mutating verb '{}'", verb));
        } else if let Some(op) = self.unrecognized_operation(&classification.evidence_text) {
            classification.reason = Some(format!("unrecognized operation '{}'", op));
        } else {
            match self.allowlist.find_read_only(&classification.evidence_text) {
                Some((verb, category)) => {
                    trace_log!("Prompt '{}' is read-only: {} ({})", matched.name, verb, category)
                }
                None => trace_log!("Prompt '{}' names no operation", matched.name),
            }
            classification.kind = PromptKind::Safe;
        }

        classification
    }

    /// First named operation whose command word is not read-only.
    fn unrecognized_operation(&self, text: &str) -> Option<String> {
        patterns::named_operations(&self.operations, text)
            .into_iter()
            .find(|op| {
                allowlist::words(op)
                    .next()
                    .map_or(true, |command| self.allowlist.read_only_category(&command).is_none())
            })
            .map(str::to_string)
    }
}
