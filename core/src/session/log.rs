//! Output Log
//!
//! Ordered, append-only record of classified lines with a bounded ring
//! buffer underneath. When the buffer grows past `capacity` the oldest
//! entries are dropped until `low_watermark` remain, so truncation happens
//! in bursts rather than on every append.
//!
//! Length is *logical*: it counts every line ever appended and never goes
//! down, even when old entries are truncated away. Request cursors are
//! recorded against this length, so a cursor stays valid across truncation.
//!
//! Access contract: exactly one writer (the session output handler) and one
//! reader (the orchestrator's polling loop). Readers only consume lines
//! whose index is below the length they observed.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;

/// One classified line of subordinate output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Line {
    pub text: String,
    pub sequence_index: u64,
}

#[derive(Debug)]
pub struct OutputLog {
    lines: VecDeque<Line>,
    capacity: usize,
    low_watermark: usize,
    next_index: u64,
}

impl OutputLog {
    pub fn new(capacity: usize, low_watermark: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            lines: VecDeque::with_capacity(capacity),
            capacity,
            low_watermark: low_watermark.min(capacity - 1),
            next_index: 0,
        }
    }

    /// Append lines in order and return them with their sequence indices.
    pub fn extend<I>(&mut self, texts: I) -> Vec<Line>
    where
        I: IntoIterator<Item = String>,
    {
        let mut appended = Vec::new();
        for text in texts {
            let line = Line {
                text,
                sequence_index: self.next_index,
            };
            self.next_index += 1;
            self.lines.push_back(line.clone());
            appended.push(line);
        }
        self.truncate_if_needed();
        appended
    }

    pub fn push(&mut self, text: impl Into<String>) -> Line {
        let mut appended = self.extend(std::iter::once(text.into()));
        // extend() always yields exactly one line for one input
        appended.remove(0)
    }

    fn truncate_if_needed(&mut self) {
        if self.lines.len() > self.capacity {
            let excess = self.lines.len() - self.low_watermark;
            self.lines.drain(..excess);
        }
    }

    /// Logical length: total lines ever appended.
    pub fn len(&self) -> u64 {
        self.next_index
    }

    pub fn is_empty(&self) -> bool {
        self.next_index == 0
    }

    /// Lines currently held in the buffer.
    pub fn retained(&self) -> usize {
        self.lines.len()
    }

    /// Surviving lines whose index is at or after `cursor`.
    pub fn since(&self, cursor: u64) -> Vec<Line> {
        self.lines
            .iter()
            .filter(|l| l.sequence_index >= cursor)
            .cloned()
            .collect()
    }

    /// The last `n` surviving lines.
    pub fn tail(&self, n: usize) -> Vec<Line> {
        let start = self.lines.len().saturating_sub(n);
        self.lines.range(start..).cloned().collect()
    }
}

/// Cloneable handle to the process-wide Output Log.
#[derive(Debug, Clone)]
pub struct SharedOutputLog {
    inner: Arc<RwLock<OutputLog>>,
}

impl SharedOutputLog {
    pub fn new(capacity: usize, low_watermark: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(OutputLog::new(capacity, low_watermark))),
        }
    }

    pub fn append(&self, texts: Vec<String>) -> Vec<Line> {
        if texts.is_empty() {
            return Vec::new();
        }
        self.inner.write().extend(texts)
    }

    pub fn len(&self) -> u64 {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    pub fn retained(&self) -> usize {
        self.inner.read().retained()
    }

    pub fn since(&self, cursor: u64) -> Vec<Line> {
        self.inner.read().since(cursor)
    }

    pub fn tail(&self, n: usize) -> Vec<Line> {
        self.inner.read().tail(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(range: std::ops::Range<usize>) -> Vec<String> {
        range.map(|i| format!("line {}", i)).collect()
    }

    #[test]
    fn appends_in_order_with_indices() {
        let mut log = OutputLog::new(10, 5);
        let appended = log.extend(texts(0..3));
        assert_eq!(appended.len(), 3);
        assert_eq!(appended[2].sequence_index, 2);
        assert_eq!(log.len(), 3);
        assert_eq!(log.since(1).len(), 2);
    }

    #[test]
    fn truncates_down_to_low_watermark() {
        let mut log = OutputLog::new(10, 5);
        log.extend(texts(0..10));
        assert_eq!(log.retained(), 10);

        log.push("line 10");
        assert_eq!(log.retained(), 5);
        assert_eq!(log.len(), 11);

        let survivors = log.since(0);
        let indices: Vec<u64> = survivors.iter().map(|l| l.sequence_index).collect();
        assert_eq!(indices, vec![6, 7, 8, 9, 10]);
        assert_eq!(survivors[0].text, "line 6");
    }

    #[test]
    fn length_never_decreases_across_truncation() {
        let mut log = OutputLog::new(8, 2);
        let mut last = 0;
        for batch in 0..20 {
            log.extend(texts(batch * 3..batch * 3 + 3));
            assert!(log.len() >= last);
            last = log.len();

            let survivors = log.since(0);
            assert!(survivors
                .windows(2)
                .all(|w| w[0].sequence_index < w[1].sequence_index));
        }
        assert_eq!(log.len(), 60);
    }

    #[test]
    fn since_respects_cursor() {
        let mut log = OutputLog::new(100, 50);
        log.extend(texts(0..10));
        let window = log.since(7);
        assert_eq!(window.len(), 3);
        assert_eq!(window[0].text, "line 7");
        assert!(log.since(10).is_empty());
    }

    #[test]
    fn shared_handle_sees_writer_appends() {
        let log = SharedOutputLog::new(10, 5);
        let reader = log.clone();
        assert!(reader.is_empty());
        log.append(vec!["main.rs".to_string()]);
        assert_eq!(reader.len(), 1);
        assert_eq!(reader.tail(1)[0].text, "main.rs");
        assert!(log.append(Vec::new()).is_empty());
    }
}
