//! Configuration management
//!
//! All configuration types are exported from this module.

pub mod store;

pub use store::{
    ApprovalConfig, Config, HistoryConfig, LoggingConfig, OrchestratorConfig, PersonalityConfig,
    SecondaryConfig, SessionConfig,
};

use std::path::PathBuf;

/// Find the configuration file in standard locations
pub fn find_config_file() -> Option<PathBuf> {
    if let Ok(cwd) = std::env::current_dir() {
        let path = cwd.join("ani.toml");
        if path.exists() {
            return Some(path);
        }
    }

    if let Some(dir) = get_config_dir() {
        let path = dir.join("config.toml");
        if path.exists() {
            return Some(path);
        }
    }

    None
}

/// Get the configuration directory path
pub fn get_config_dir() -> Option<PathBuf> {
    use dirs::config_dir;
    use home::home_dir;

    if let Some(dir) = config_dir() {
        return Some(dir.join("ani"));
    }

    if let Some(home) = home_dir() {
        return Some(home.join(".config").join("ani"));
    }

    None
}

/// Directory for history and diagnostic logs
pub fn get_data_dir() -> PathBuf {
    dirs::data_dir()
        .or_else(|| home::home_dir().map(|h| h.join(".local").join("share")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ani")
}
