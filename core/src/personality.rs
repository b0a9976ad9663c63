//! Personality Source
//!
//! Persona text is re-read from disk on every request so edits take effect
//! without a restart.

use crate::config::PersonalityConfig;
use crate::warn_log;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct PersonalitySource {
    path: PathBuf,
    default_text: String,
}

impl PersonalitySource {
    pub fn new(path: impl Into<PathBuf>, default_text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            default_text: default_text.into(),
        }
    }

    pub fn from_config(config: &PersonalityConfig) -> Self {
        Self::new(config.path.clone(), config.default_text.clone())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current persona text. Missing, unreadable or blank files yield the
    /// default.
    pub fn load(&self) -> String {
        match std::fs::read_to_string(&self.path) {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => self.default_text.clone(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => self.default_text.clone(),
            Err(e) => {
                warn_log!("Could not read personality file {}: {}", self.path.display(), e);
                self.default_text.clone()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const DEFAULT: &str = "You are a helpful AI assistant.";

    #[test]
    fn missing_file_falls_back_to_default() {
        let dir = TempDir::new().unwrap();
        let source = PersonalitySource::new(dir.path().join("personality.txt"), DEFAULT);
        assert_eq!(source.load(), DEFAULT);
    }

    #[test]
    fn reads_and_trims_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("personality.txt");
        std::fs::write(&path, "\n  You are Ani, cheerful and concise.  \n").unwrap();
        let source = PersonalitySource::new(&path, DEFAULT);
        assert_eq!(source.load(), "You are Ani, cheerful and concise.");
    }

    #[test]
    fn edits_are_picked_up_on_next_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("personality.txt");
        std::fs::write(&path, "first").unwrap();
        let source = PersonalitySource::new(&path, DEFAULT);
        assert_eq!(source.load(), "first");

        std::fs::write(&path, "second").unwrap();
        assert_eq!(source.load(), "second");
    }

    #[test]
    fn blank_file_falls_back_to_default() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("personality.txt");
        std::fs::write(&path, "   \n").unwrap();
        assert_eq!(PersonalitySource::new(&path, DEFAULT).load(), DEFAULT);
    }

    #[test]
    fn directory_path_is_unreadable_and_falls_back() {
        let dir = TempDir::new().unwrap();
        assert_eq!(PersonalitySource::new(dir.path(), DEFAULT).load(), DEFAULT);
    }
}
