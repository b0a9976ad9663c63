//! Key-content extraction
//!
//! Picks the lines of a finished session response that carry file, path or
//! status signal. When none qualify, falls back to a few sentence-like
//! fragments, and finally to the raw tail. The result depends only on the
//! slice passed in.

use crate::session::Line;
use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionKind {
    KeyLines,
    Fragments,
    RawTail,
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    pub kind: ExtractionKind,
    pub items: Vec<String>,
}

impl Extracted {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn text(&self) -> String {
        self.items.join("\n")
    }
}

/// Leading glyphs the subordinate uses for tool calls and results
const STATUS_MARKERS: &[char] = &['⎿', '●', '⏺', '✓', '✗', '✔', '✘', '•'];

/// Input-box markers in front of an echoed request
const ECHO_MARKERS: &[char] = &['>', '❯', ' '];

/// A partial echo shorter than this is treated as ordinary output
const MIN_ECHO_PREFIX: usize = 12;

struct Signals {
    listing: Regex,
    bullet: Regex,
    filename: Regex,
    path: Regex,
    sentence: Regex,
}

fn signals() -> &'static Signals {
    static SIGNALS: OnceLock<Signals> = OnceLock::new();
    SIGNALS.get_or_init(|| {
        let compile = |p: &str| {
            Regex::new(p).unwrap_or_else(|e| panic!("invalid extraction pattern {:?}: {}", p, e))
        };
        Signals {
            // `ls -l` rows and their "total N" header
            listing: compile(r"^(?:[dlcbps-][rwxsStT-]{9}[@+.]?\s|total\s+\d+$)"),
            bullet: compile(r"^(?:[-*+]|\d+[.)])\s+\S"),
            filename: compile(r"(?:^|[\s(`'\x22])[\w.-]*\w\.[A-Za-z][A-Za-z0-9]{0,7}(?:$|[\s):,`'\x22])"),
            path: compile(r"(?:^|\s)(?:~|\.{1,2})?/?[\w.-]+/[\w./-]*"),
            sentence: compile(r"[A-Z][^.!?]{10,}[.!?]"),
        }
    })
}

pub fn is_key_line(text: &str) -> bool {
    let s = signals();
    text.starts_with(STATUS_MARKERS)
        || s.listing.is_match(text)
        || s.bullet.is_match(text)
        || s.filename.is_match(text)
        || s.path.is_match(text)
}

#[derive(Debug, Clone)]
pub struct KeyContentExtractor {
    max_key_lines: usize,
    max_fragments: usize,
}

impl KeyContentExtractor {
    pub fn new(max_key_lines: usize, max_fragments: usize) -> Self {
        Self {
            max_key_lines: max_key_lines.max(1),
            max_fragments: max_fragments.max(1),
        }
    }

    /// `request` is the text written to the session; its echo is skipped.
    pub fn extract(&self, slice: &[Line], request: &str) -> Extracted {
        let lines: Vec<&str> = strip_echo(slice, request)
            .into_iter()
            .map(|l| l.text.trim())
            .filter(|t| !t.is_empty())
            .collect();

        let key: Vec<String> = lines
            .iter()
            .filter(|t| is_key_line(t))
            .take(self.max_key_lines)
            .map(|t| t.to_string())
            .collect();
        if !key.is_empty() {
            return Extracted {
                kind: ExtractionKind::KeyLines,
                items: key,
            };
        }

        let raw = lines.join(" ");
        let fragments: Vec<String> = signals()
            .sentence
            .find_iter(&raw)
            .take(self.max_fragments)
            .map(|m| m.as_str().trim().to_string())
            .collect();
        if !fragments.is_empty() {
            return Extracted {
                kind: ExtractionKind::Fragments,
                items: fragments,
            };
        }

        let start = lines.len().saturating_sub(self.max_key_lines);
        let tail: Vec<String> = lines[start..].iter().map(|t| t.to_string()).collect();
        Extracted {
            kind: if tail.is_empty() {
                ExtractionKind::Empty
            } else {
                ExtractionKind::RawTail
            },
            items: tail,
        }
    }
}

/// `slice` without the session's echo of `request`. The echo may be wrapped
/// over several lines, at a word boundary or mid-word.
pub fn strip_echo<'a>(slice: &'a [Line], request: &str) -> Vec<&'a Line> {
    let request = normalize(request);
    if request.is_empty() {
        return slice.iter().collect();
    }

    let mut kept = Vec::with_capacity(slice.len());
    // Echo text seen so far while a wrapped echo is still incomplete
    let mut partial: Option<String> = None;
    for line in slice {
        let body = normalize(line.text.trim().trim_start_matches(ECHO_MARKERS));

        if let Some(so_far) = partial.take() {
            if let Some(next) = continue_echo(&so_far, &body, &request) {
                if next.len() < request.len() {
                    partial = Some(next);
                }
                continue;
            }
        }

        if starts_echo(&body, &request) {
            if body.len() < request.len() {
                partial = Some(body);
            }
            continue;
        }
        kept.push(line);
    }
    kept
}

fn starts_echo(body: &str, request: &str) -> bool {
    !body.is_empty()
        && (body == request
            || (body.chars().count() >= MIN_ECHO_PREFIX && request.starts_with(body)))
}

fn continue_echo(so_far: &str, body: &str, request: &str) -> Option<String> {
    if body.is_empty() {
        return None;
    }
    [format!("{} {}", so_far, body), format!("{}{}", so_far, body)]
        .into_iter()
        .find(|joined| request.starts_with(joined.as_str()))
}

fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slice(texts: &[&str]) -> Vec<Line> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| Line {
                text: t.to_string(),
                sequence_index: 100 + i as u64,
            })
            .collect()
    }

    fn extractor() -> KeyContentExtractor {
        KeyContentExtractor::new(40, 3)
    }

    #[test]
    fn keeps_filenames_markers_and_listings() {
        let lines = slice(&[
            "I'll take a look at the directory.",
            "● Bash(ls -la)",
            "⎿ total 16",
            "drwxr-xr-x  4 ani staff  128 Jan  1 10:00 src",
            "-rw-r--r--  1 ani staff  512 Jan  1 10:00 Cargo.toml",
            "notes.txt",
            "Here is what I found",
        ]);
        let extracted = extractor().extract(&lines, "list files here");
        assert_eq!(extracted.kind, ExtractionKind::KeyLines);
        assert_eq!(
            extracted.items,
            vec![
                "● Bash(ls -la)",
                "⎿ total 16",
                "drwxr-xr-x  4 ani staff  128 Jan  1 10:00 src",
                "-rw-r--r--  1 ani staff  512 Jan  1 10:00 Cargo.toml",
                "notes.txt",
            ]
        );
    }

    #[test]
    fn paths_and_bullets_count_as_signal() {
        assert!(is_key_line("src/orchestrator/mod.rs"));
        assert!(is_key_line("- first item"));
        assert!(is_key_line("2. second item"));
        assert!(!is_key_line("The build finished without problems"));
        assert!(!is_key_line("version 1.2 is out"));
    }

    #[test]
    fn falls_back_to_sentence_fragments() {
        let lines = slice(&[
            "Sure thing, happy to help you today!",
            "The project compiles cleanly.",
            "Nothing else to report here at all.",
            "One more sentence that should be cut.",
        ]);
        let extracted = extractor().extract(&lines, "how is it going");
        assert_eq!(extracted.kind, ExtractionKind::Fragments);
        assert_eq!(extracted.items.len(), 3);
        assert_eq!(extracted.items[0], "Sure thing, happy to help you today!");
    }

    #[test]
    fn raw_tail_when_nothing_else_qualifies() {
        let lines = slice(&["ok then", "done"]);
        let extracted = extractor().extract(&lines, "go");
        assert_eq!(extracted.kind, ExtractionKind::RawTail);
        assert_eq!(extracted.text(), "ok then\ndone");
    }

    #[test]
    fn skips_the_echoed_request() {
        let lines = slice(&["> list files here", "main.rs"]);
        let extracted = extractor().extract(&lines, "list files here");
        assert_eq!(extracted.items, vec!["main.rs"]);
        assert_eq!(extractor().extract(&[], "x").kind, ExtractionKind::Empty);
    }

    #[test]
    fn skips_a_wrapped_echo() {
        let request =
            "list files here (please actually run the command and show the output, don't just describe it)";
        // hard wrap at 80 columns, mid-word
        let lines = slice(&[
            "> list files here (please actually run the command and show the output, don't j",
            "ust describe it)",
            "ok then",
        ]);
        let extracted = extractor().extract(&lines, request);
        assert_eq!(extracted.kind, ExtractionKind::RawTail);
        assert_eq!(extracted.items, vec!["ok then"]);

        // soft wrap at a word boundary, over three lines
        let lines = slice(&[
            "❯ list files here (please actually run",
            "the command and show the output,",
            "don't just describe it)",
            "notes.txt",
        ]);
        let kept: Vec<&str> = strip_echo(&lines, request)
            .into_iter()
            .map(|l| l.text.as_str())
            .collect();
        assert_eq!(kept, vec!["notes.txt"]);
    }

    #[test]
    fn short_output_that_prefixes_the_request_is_kept() {
        let lines = slice(&["list", "main.rs"]);
        assert_eq!(strip_echo(&lines, "list files here").len(), 2);
        assert_eq!(strip_echo(&lines, "").len(), 2);
    }

    #[test]
    fn key_lines_are_bounded() {
        let names: Vec<String> = (0..10).map(|i| format!("file{}.rs", i)).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let extracted = KeyContentExtractor::new(4, 3).extract(&slice(&refs), "");
        assert_eq!(extracted.items.len(), 4);
        assert_eq!(extracted.items[3], "file3.rs");
    }

    #[test]
    fn extraction_is_deterministic() {
        let lines = slice(&["● Read(src/main.rs)", "fn main() {}", "Looks fine to me overall."]);
        let a = extractor().extract(&lines, "check main");
        let b = extractor().extract(&lines, "check main");
        assert_eq!(a, b);
    }
}
