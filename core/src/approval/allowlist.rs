//! Verb allow-list for prompt auto-approval
//!
//! A confirmation prompt is never answered automatically when its evidence
//! names a mutating verb, or names an operation whose command is not one of
//! the read-only verbs listed here.

use crate::config::ApprovalConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Categories of read-only operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationCategory {
    Listing,
    Searching,
    Metadata,
    Counting,
}

impl std::fmt::Display for OperationCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationCategory::Listing => write!(f, "listing"),
            OperationCategory::Searching => write!(f, "searching"),
            OperationCategory::Metadata => write!(f, "metadata"),
            OperationCategory::Counting => write!(f, "counting"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerbAllowlist {
    /// Listing verbs (exact words)
    listing: HashSet<String>,
    /// Searching verbs (exact words)
    searching: HashSet<String>,
    /// Metadata inspection verbs (exact words)
    metadata: HashSet<String>,
    /// Word/line counting verbs (exact words)
    counting: HashSet<String>,
    /// Mutating verb stems; a word starting with any of these is mutating
    mutating_stems: Vec<String>,
    /// Mutating verbs that only count as exact words (rm, mv, ...)
    mutating_exact: HashSet<String>,
}

fn set(words: &[&str]) -> HashSet<String> {
    words.iter().map(|w| w.to_string()).collect()
}

impl Default for VerbAllowlist {
    fn default() -> Self {
        VerbAllowlist {
            listing: set(&["ls", "list", "lists", "listing", "tree", "dir"]),
            searching: set(&[
                "grep", "rg", "find", "search", "searching", "glob", "locate", "fd",
            ]),
            metadata: set(&["stat", "du", "df", "pwd", "which", "whoami", "uname"]),
            counting: set(&["wc", "count", "counting"]),
            mutating_stems: [
                "writ", "wrote", "delet", "modif", "install", "creat", "remov", "edit",
                "overwrit", "renam", "replac", "updat", "upgrad", "chang", "append", "insert",
                "truncat", "format", "commit", "push", "reset", "patch", "kill", "uninstall",
                "move", "copy", "save", "apply", "drop",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            mutating_exact: set(&[
                "rm", "rmdir", "mv", "cp", "mkdir", "touch", "chmod", "chown", "ln", "dd",
                "sed", "tee", "npm", "pip", "cargo", "apt", "brew", "git", "sudo",
            ]),
        }
    }
}

/// Lowercased alphanumeric words of `text`, in order.
pub fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
}

impl VerbAllowlist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in lists extended with the verbs from `[approval]`.
    pub fn from_config(config: &ApprovalConfig) -> Self {
        let mut allow = Self::default();
        for (category, verbs) in [
            (OperationCategory::Listing, &config.listing),
            (OperationCategory::Searching, &config.searching),
            (OperationCategory::Metadata, &config.metadata),
            (OperationCategory::Counting, &config.counting),
        ] {
            for verb in verbs {
                allow.add_read_only(category, verb.as_str());
            }
        }
        for verb in &config.mutating {
            allow.add_mutating(verb.as_str());
        }
        allow
    }

    /// Category of `word` if it is an allow-listed read-only verb.
    pub fn read_only_category(&self, word: &str) -> Option<OperationCategory> {
        if self.listing.contains(word) {
            Some(OperationCategory::Listing)
        } else if self.searching.contains(word) {
            Some(OperationCategory::Searching)
        } else if self.metadata.contains(word) {
            Some(OperationCategory::Metadata)
        } else if self.counting.contains(word) {
            Some(OperationCategory::Counting)
        } else {
            None
        }
    }

    pub fn is_mutating(&self, word: &str) -> bool {
        self.mutating_exact.contains(word)
            || self.mutating_stems.iter().any(|stem| word.starts_with(stem.as_str()))
    }

    /// First read-only verb found in `text`, with its category.
    pub fn find_read_only(&self, text: &str) -> Option<(String, OperationCategory)> {
        words(text).find_map(|w| self.read_only_category(&w).map(|c| (w, c)))
    }

    /// First mutating verb found anywhere in `text`.
    pub fn find_mutating(&self, text: &str) -> Option<String> {
        words(text).find(|w| self.is_mutating(w))
    }

    pub fn add_read_only(&mut self, category: OperationCategory, word: impl Into<String>) {
        let word = word.into().to_lowercase();
        match category {
            OperationCategory::Listing => self.listing.insert(word),
            OperationCategory::Searching => self.searching.insert(word),
            OperationCategory::Metadata => self.metadata.insert(word),
            OperationCategory::Counting => self.counting.insert(word),
        };
    }

    pub fn add_mutating(&mut self, word: impl Into<String>) {
        self.mutating_exact.insert(word.into().to_lowercase());
    }
}
