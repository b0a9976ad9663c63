//! Configuration Store
//!
//! Loads and saves the TOML config file. Every field carries a serde
//! default, so a partial file only overrides what it names.

use crate::error::{AniError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Unified Ani configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub secondary: SecondaryConfig,

    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    #[serde(default)]
    pub personality: PersonalityConfig,

    #[serde(default)]
    pub history: HistoryConfig,

    #[serde(default)]
    pub approval: ApprovalConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Subordinate process settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Start the subordinate process at all
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Program to run inside the pseudo-terminal
    #[serde(default = "default_session_command")]
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Working directory (defaults to the current directory)
    #[serde(default)]
    pub cwd: Option<PathBuf>,
    #[serde(default = "default_rows")]
    pub rows: u16,
    #[serde(default = "default_cols")]
    pub cols: u16,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            command: default_session_command(),
            args: Vec::new(),
            cwd: None,
            rows: default_rows(),
            cols: default_cols(),
        }
    }
}

/// Secondary text-generation endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecondaryConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_model")]
    pub model: String,
    /// Budget for a single generate round trip
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Budget for the connection check
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Sent as the `system` field of every generate call
    #[serde(default)]
    pub system_prompt: Option<String>,
}

impl Default for SecondaryConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            model: default_model(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            system_prompt: None,
        }
    }
}

impl SecondaryConfig {
    pub fn base_url(&self) -> String {
        if self.host.starts_with("http://") || self.host.starts_with("https://") {
            format!("{}:{}", self.host.trim_end_matches('/'), self.port)
        } else {
            format!("http://{}:{}", self.host, self.port)
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Polling protocol tuning.
///
/// The tick constants are empirical; none of them is derived from anything
/// the subordinate process guarantees.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    /// Overall budget, in ticks, before a request times out
    #[serde(default = "default_max_ticks")]
    pub max_ticks: u32,
    /// Consecutive no-growth ticks that count as stable
    #[serde(default = "default_stability_ticks")]
    pub stability_ticks: u32,
    /// Trailing lines handed to the prompt interceptor
    #[serde(default = "default_prompt_window")]
    pub prompt_window: usize,
    #[serde(default = "default_log_capacity")]
    pub log_capacity: usize,
    /// Retained line count after the log overflows
    #[serde(default = "default_log_low_watermark")]
    pub log_low_watermark: usize,
    #[serde(default = "default_max_key_lines")]
    pub max_key_lines: usize,
    #[serde(default = "default_max_fragments")]
    pub max_fragments: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
            max_ticks: default_max_ticks(),
            stability_ticks: default_stability_ticks(),
            prompt_window: default_prompt_window(),
            log_capacity: default_log_capacity(),
            log_low_watermark: default_log_low_watermark(),
            max_key_lines: default_max_key_lines(),
            max_fragments: default_max_fragments(),
        }
    }
}

impl OrchestratorConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonalityConfig {
    #[serde(default = "default_personality_path")]
    pub path: PathBuf,
    #[serde(default = "default_personality_text")]
    pub default_text: String,
}

impl Default for PersonalityConfig {
    fn default() -> Self {
        Self {
            path: default_personality_path(),
            default_text: default_personality_text(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// JSON-lines file; defaults to `<data_dir>/history.jsonl`
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Entries summarized into each composed prompt
    #[serde(default = "default_context_limit")]
    pub context_limit: usize,
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
            context_limit: default_context_limit(),
            max_entries: default_max_entries(),
        }
    }
}

/// Verbs added to the built-in prompt auto-approval lists
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApprovalConfig {
    #[serde(default)]
    pub listing: Vec<String>,
    #[serde(default)]
    pub searching: Vec<String>,
    #[serde(default)]
    pub metadata: Vec<String>,
    #[serde(default)]
    pub counting: Vec<String>,
    /// Words that always make a prompt unsafe
    #[serde(default)]
    pub mutating: Vec<String>,
}

impl ApprovalConfig {
    /// Every configured read-only verb
    pub fn read_only(&self) -> impl Iterator<Item = &String> {
        self.listing
            .iter()
            .chain(&self.searching)
            .chain(&self.metadata)
            .chain(&self.counting)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Mirror diagnostic logs to `<data_dir>/debug.log`
    #[serde(default = "default_true")]
    pub file: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: true,
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_session_command() -> String {
    "claude".to_string()
}
fn default_rows() -> u16 {
    24
}
fn default_cols() -> u16 {
    80
}
fn default_host() -> String {
    "localhost".to_string()
}
fn default_port() -> u16 {
    11434
}
fn default_model() -> String {
    "gemma3n:e4b".to_string()
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_connect_timeout_secs() -> u64 {
    10
}
fn default_tick_ms() -> u64 {
    500
}
fn default_max_ticks() -> u32 {
    60
}
fn default_stability_ticks() -> u32 {
    4
}
fn default_prompt_window() -> usize {
    8
}
fn default_log_capacity() -> usize {
    1000
}
fn default_log_low_watermark() -> usize {
    500
}
fn default_max_key_lines() -> usize {
    40
}
fn default_max_fragments() -> usize {
    3
}
fn default_personality_path() -> PathBuf {
    PathBuf::from("personality.txt")
}
fn default_personality_text() -> String {
    "You are a helpful AI assistant.".to_string()
}
fn default_context_limit() -> usize {
    5
}
fn default_max_entries() -> usize {
    1000
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Config = toml::from_str(&content).map_err(|e| AniError::InvalidConfig {
            message: format!("{}: {}", path.as_ref().display(), e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| AniError::InvalidConfig {
            message: e.to_string(),
        })?;
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load from the first standard location, or fall back to defaults.
    ///
    /// A file that exists but does not parse is an error, not a silent default.
    pub fn load_or_default() -> Result<(Self, Option<PathBuf>)> {
        match super::find_config_file() {
            Some(path) => {
                let config = Self::load(&path)?;
                Ok((config, Some(path)))
            }
            None => Ok((Self::default(), None)),
        }
    }

    /// Get default config file path
    pub fn default_path() -> Option<PathBuf> {
        super::get_config_dir().map(|d| d.join("config.toml"))
    }

    /// History file, resolved against the data directory when unset
    pub fn history_path(&self) -> PathBuf {
        self.history
            .path
            .clone()
            .unwrap_or_else(|| super::get_data_dir().join("history.jsonl"))
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let invalid = |message: &str| {
            Err(AniError::InvalidConfig {
                message: message.to_string(),
            })
        };

        let o = &self.orchestrator;
        if o.max_ticks == 0 {
            return invalid("orchestrator.max_ticks must be greater than 0");
        }
        if o.stability_ticks == 0 {
            return invalid("orchestrator.stability_ticks must be greater than 0");
        }
        if o.tick_ms == 0 {
            return invalid("orchestrator.tick_ms must be greater than 0");
        }
        if o.prompt_window == 0 {
            return invalid("orchestrator.prompt_window must be greater than 0");
        }
        if o.log_low_watermark >= o.log_capacity {
            return invalid("orchestrator.log_low_watermark must be below log_capacity");
        }
        if self.session.rows == 0 || self.session.cols == 0 {
            return invalid("session.rows and session.cols must be greater than 0");
        }
        if self.session.enabled && self.session.command.trim().is_empty() {
            return invalid("session.command must not be empty");
        }
        if let Some(verb) = self
            .approval
            .read_only()
            .find(|v| self.approval.mutating.iter().any(|m| m.eq_ignore_ascii_case(v)))
        {
            return Err(AniError::InvalidConfig {
                message: format!("approval: '{}' is listed as both read-only and mutating", verb),
            });
        }
        if self.logging.level.parse::<crate::logger::Level>().is_err() {
            return invalid("logging.level must be one of trace, debug, info, warn, error");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.secondary.base_url(), "http://localhost:11434");
        assert_eq!(config.orchestrator.log_capacity, 1000);
        assert_eq!(config.orchestrator.log_low_watermark, 500);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [secondary]
            host = "10.10.20.19"

            [orchestrator]
            max_ticks = 10
            "#,
        )
        .unwrap();

        assert_eq!(config.secondary.host, "10.10.20.19");
        assert_eq!(config.secondary.port, 11434);
        assert_eq!(config.orchestrator.max_ticks, 10);
        assert_eq!(config.orchestrator.stability_ticks, 4);
        assert_eq!(config.session.command, "claude");
    }

    #[test]
    fn test_validate_rejects_bad_watermark() {
        let mut config = Config::default();
        config.orchestrator.log_low_watermark = config.orchestrator.log_capacity;
        assert!(matches!(
            config.validate(),
            Err(AniError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_zero_ticks() {
        let mut config = Config::default();
        config.orchestrator.max_ticks = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ani").join("config.toml");

        let mut config = Config::default();
        config.secondary.model = "llama3".to_string();
        config.session.args = vec!["--verbose".to_string()];
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.secondary.model, "llama3");
        assert_eq!(loaded.session.args, vec!["--verbose".to_string()]);
    }

    #[test]
    fn test_approval_section() {
        let config: Config = toml::from_str(
            r#"
            [approval]
            metadata = ["lsof"]
            mutating = ["shred"]
            "#,
        )
        .unwrap();
        assert_eq!(config.approval.metadata, vec!["lsof".to_string()]);
        assert!(config.approval.listing.is_empty());
        assert!(config.validate().is_ok());

        let mut config = config;
        config.approval.listing.push("Shred".to_string());
        assert!(matches!(
            config.validate(),
            Err(AniError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_base_url_with_scheme() {
        let secondary = SecondaryConfig {
            host: "https://models.internal/".to_string(),
            port: 8443,
            ..SecondaryConfig::default()
        };
        assert_eq!(secondary.base_url(), "https://models.internal:8443");
    }
}
