//! Conversation history
//!
//! Completed interactions are appended to a JSON-lines file and scored so
//! the most relevant ones can be summarized into later prompts.
//!
//! Score is `0.4 * emotional_weight + 0.6 * relevance`.

use crate::config::Config;
use crate::error::Result;
use crate::orchestrator::SourceTag;
use crate::{debug_log, warn_log};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

const EMOTIONAL_KEYWORDS: &[&str] = &["love", "hate", "excited", "frustrated", "happy", "sad", "angry"];

/// Inputs longer than this are cut in summaries
const SUMMARY_INPUT_CHARS: usize = 100;

pub const NO_CONTEXT: &str = "No previous context.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub user_input: String,
    /// Classified session content the reply was built from, if any
    #[serde(default)]
    pub session_content: String,
    pub reply: String,
    pub source: SourceTag,
    pub emotional_weight: f64,
    pub relevance: f64,
}

impl HistoryEntry {
    pub fn new(
        user_input: impl Into<String>,
        session_content: impl Into<String>,
        reply: impl Into<String>,
        source: SourceTag,
        technical: bool,
    ) -> Self {
        let user_input = user_input.into();
        let reply = reply.into();
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            emotional_weight: emotional_weight(&user_input, &reply),
            relevance: relevance(technical),
            user_input,
            session_content: session_content.into(),
            reply,
            source,
        }
    }

    pub fn score(&self) -> f64 {
        0.4 * self.emotional_weight + 0.6 * self.relevance
    }
}

pub fn emotional_weight(user_input: &str, reply: &str) -> f64 {
    let input = user_input.to_lowercase();
    let reply = reply.to_lowercase();
    if EMOTIONAL_KEYWORDS
        .iter()
        .any(|k| input.contains(k) || reply.contains(k))
    {
        0.8
    } else {
        0.5
    }
}

/// Requests naming a technical keyword score higher, however they were answered.
pub fn relevance(technical: bool) -> f64 {
    if technical {
        0.7
    } else {
        0.5
    }
}

pub struct HistoryStore {
    path: PathBuf,
    entries: Vec<HistoryEntry>,
    max_entries: usize,
}

impl HistoryStore {
    /// Open (or create) the store at `path`. Malformed lines are skipped.
    pub fn open(path: impl Into<PathBuf>, max_entries: usize) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut store = Self {
            path,
            entries: Vec::new(),
            max_entries: max_entries.max(1),
        };
        store.load()?;
        Ok(store)
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::open(config.history_path(), config.history.max_entries)
    }

    fn load(&mut self) -> Result<()> {
        if !self.path.exists() {
            return Ok(());
        }

        let reader = BufReader::new(fs::File::open(&self.path)?);
        for (number, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<HistoryEntry>(&line) {
                Ok(entry) => self.entries.push(entry),
                Err(e) => warn_log!(
                    "Skipping malformed history line {} in {}: {}",
                    number + 1,
                    self.path.display(),
                    e
                ),
            }
        }
        debug_log!("Loaded {} history entries", self.entries.len());
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// Append one interaction, pruning once the store outgrows its limit.
    pub fn record(&mut self, entry: HistoryEntry) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", serde_json::to_string(&entry)?)?;
        self.entries.push(entry);

        if self.entries.len() > self.max_entries {
            self.prune(self.max_entries)?;
        }
        Ok(())
    }

    /// Highest-scoring entries first; ties go to the newest.
    pub fn relevant(&self, limit: usize) -> Vec<&HistoryEntry> {
        let mut ranked: Vec<(usize, &HistoryEntry)> = self.entries.iter().enumerate().collect();
        ranked.sort_by(|(ia, a), (ib, b)| {
            b.score()
                .partial_cmp(&a.score())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(ib.cmp(ia))
        });
        ranked.into_iter().take(limit).map(|(_, e)| e).collect()
    }

    pub fn summary(&self, limit: usize) -> String {
        summarize(&self.relevant(limit))
    }

    /// Keep only the `max_entries` best-scoring entries. Returns how many
    /// were removed.
    pub fn prune(&mut self, max_entries: usize) -> Result<usize> {
        if self.entries.len() <= max_entries {
            return Ok(0);
        }

        let keep: std::collections::HashSet<Uuid> =
            self.relevant(max_entries).iter().map(|e| e.id).collect();
        let before = self.entries.len();
        self.entries.retain(|e| keep.contains(&e.id));
        self.rewrite()?;

        let removed = before - self.entries.len();
        debug_log!("Pruned {} history entries", removed);
        Ok(removed)
    }

    fn rewrite(&self) -> Result<()> {
        let mut content = String::new();
        for entry in &self.entries {
            content.push_str(&serde_json::to_string(entry)?);
            content.push('\n');
        }
        let tmp = self.path.with_extension("jsonl.tmp");
        fs::write(&tmp, content)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// Render entries as the context block embedded in prompts.
pub fn summarize(entries: &[&HistoryEntry]) -> String {
    if entries.is_empty() {
        return NO_CONTEXT.to_string();
    }

    let lines: Vec<String> = entries
        .iter()
        .map(|e| {
            let input = if e.user_input.chars().count() > SUMMARY_INPUT_CHARS {
                let cut: String = e.user_input.chars().take(SUMMARY_INPUT_CHARS).collect();
                format!("{}...", cut)
            } else {
                e.user_input.clone()
            };
            format!("User: {}", input)
        })
        .collect();
    format!("Recent context:\n{}", lines.join("\n"))
}
