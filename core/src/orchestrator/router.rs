//! Routing: decide whether a request needs the session at all.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// User-selected routing mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutingMode {
    /// Keyword table decides
    #[default]
    Auto,
    /// Never touch the session
    Direct,
    /// Always go through the session
    Session,
}

impl FromStr for RoutingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(RoutingMode::Auto),
            "direct" | "chat" => Ok(RoutingMode::Direct),
            "session" | "claude" => Ok(RoutingMode::Session),
            other => Err(format!("unknown mode '{}' (expected auto, direct or session)", other)),
        }
    }
}

impl std::fmt::Display for RoutingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RoutingMode::Auto => write!(f, "auto"),
            RoutingMode::Direct => write!(f, "direct"),
            RoutingMode::Session => write!(f, "session"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Direct,
    Session,
}

/// Why a route was picked: the keyword group, or the forcing source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteReason {
    Technical,
    Workspace,
    NoKeyword,
    Prefix,
    Mode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDecision {
    pub route: Route,
    pub reason: RouteReason,
    /// Input with any routing prefix removed
    pub text: String,
    /// Names a technical keyword, whatever the route
    pub technical: bool,
}

const TECHNICAL_KEYWORDS: &[&str] = &[
    "code",
    "function",
    "debug",
    "error",
    "programming",
    "algorithm",
    "api",
    "database",
    "server",
    "framework",
    "library",
    "bug",
    "test",
];

const WORKSPACE_KEYWORDS: &[&str] = &[
    "file",
    "files",
    "folder",
    "directory",
    "list",
    "run",
    "git",
    "build",
    "repo",
    "project",
];

/// Requests that tend to get a description instead of an actual listing
const LISTING_PHRASES: &[&str] = &[
    "list files",
    "list the files",
    "what files",
    "which files",
    "show files",
    "show me the files",
    "show directory",
    "show the directory",
    "files here",
    "in this directory",
    "in this folder",
];

const CLARIFY_SUFFIX: &str =
    " (please actually run the command and show the output, don't just describe it)";

#[derive(Debug, Clone, Default)]
pub struct Router {
    mode: RoutingMode,
}

fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
}

fn matches_keyword(word: &str, table: &[&str]) -> bool {
    table
        .iter()
        .any(|k| word == *k || word.strip_suffix('s') == Some(*k))
}

impl Router {
    pub fn new(mode: RoutingMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> RoutingMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: RoutingMode) {
        self.mode = mode;
    }

    pub fn route(&self, input: &str) -> RouteDecision {
        let trimmed = input.trim();

        let (route, reason, text) = if let Some(rest) = trimmed.strip_prefix('!') {
            (Route::Session, RouteReason::Prefix, rest.trim_start())
        } else if let Some(rest) = trimmed.strip_prefix('?') {
            (Route::Direct, RouteReason::Prefix, rest.trim_start())
        } else {
            match self.mode {
                RoutingMode::Direct => (Route::Direct, RouteReason::Mode, trimmed),
                RoutingMode::Session => (Route::Session, RouteReason::Mode, trimmed),
                RoutingMode::Auto => {
                    let (route, reason) = classify_keywords(trimmed);
                    (route, reason, trimmed)
                }
            }
        };

        RouteDecision {
            route,
            reason,
            text: text.to_string(),
            technical: is_technical(text),
        }
    }

    /// Input as written to the session, with the clarifying suffix when the
    /// request is an ambiguous listing/file request.
    pub fn clarify(&self, input: &str) -> String {
        if needs_clarification(input) {
            format!("{}{}", input, CLARIFY_SUFFIX)
        } else {
            input.to_string()
        }
    }
}

fn classify_keywords(text: &str) -> (Route, RouteReason) {
    let mut workspace = false;
    for word in words(text) {
        if matches_keyword(&word, TECHNICAL_KEYWORDS) {
            return (Route::Session, RouteReason::Technical);
        }
        workspace |= matches_keyword(&word, WORKSPACE_KEYWORDS);
    }
    if workspace {
        (Route::Session, RouteReason::Workspace)
    } else {
        (Route::Direct, RouteReason::NoKeyword)
    }
}

pub fn is_technical(text: &str) -> bool {
    words(text).any(|w| matches_keyword(&w, TECHNICAL_KEYWORDS))
}

pub fn needs_clarification(input: &str) -> bool {
    let normalized = words(input).collect::<Vec<_>>().join(" ");
    LISTING_PHRASES.iter().any(|p| normalized.contains(p))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_mode_uses_keyword_table() {
        let router = Router::default();
        assert_eq!(router.route("list files here").route, Route::Session);
        assert_eq!(router.route("list files here").reason, RouteReason::Workspace);
        assert_eq!(router.route("why does this function panic?").reason, RouteReason::Technical);
        assert_eq!(router.route("Fix the failing tests").route, Route::Session);
        assert_eq!(router.route("how are you today?").route, Route::Direct);
    }

    #[test]
    fn keywords_match_whole_words() {
        let router = Router::default();
        // "latest" contains "test" but is not the word
        assert_eq!(router.route("what's the latest news?").route, Route::Direct);
    }

    #[test]
    fn prefixes_force_a_route() {
        let router = Router::new(RoutingMode::Direct);
        let forced = router.route("!  what time is it");
        assert_eq!(forced.route, Route::Session);
        assert_eq!(forced.reason, RouteReason::Prefix);
        assert_eq!(forced.text, "what time is it");

        let router = Router::default();
        let forced = router.route("?list your favourite files");
        assert_eq!(forced.route, Route::Direct);
        assert_eq!(forced.text, "list your favourite files");
    }

    #[test]
    fn technical_flag_ignores_the_route() {
        assert!(Router::new(RoutingMode::Direct).route("debug this").technical);
        assert!(Router::default().route("?why does the test fail").technical);
        assert!(!Router::default().route("list files here").technical);
        assert!(!Router::new(RoutingMode::Session).route("hello").technical);
    }

    #[test]
    fn fixed_modes_override_keywords() {
        assert_eq!(Router::new(RoutingMode::Direct).route("debug this").route, Route::Direct);
        assert_eq!(Router::new(RoutingMode::Session).route("hello").route, Route::Session);
    }

    #[test]
    fn clarify_only_touches_listing_requests() {
        let router = Router::default();
        assert!(router.clarify("list files here").ends_with(CLARIFY_SUFFIX));
        assert!(router.clarify("What files are in src?").ends_with(CLARIFY_SUFFIX));
        assert_eq!(router.clarify("run the build"), "run the build");
    }

    #[test]
    fn parses_modes() {
        assert_eq!("Session".parse::<RoutingMode>(), Ok(RoutingMode::Session));
        assert_eq!("direct".parse::<RoutingMode>(), Ok(RoutingMode::Direct));
        assert!("sideways".parse::<RoutingMode>().is_err());
    }
}
