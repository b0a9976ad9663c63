//! Subordinate session
//!
//! - [`pty`]: process lifecycle on a pseudo-terminal
//! - [`classifier`]: raw chunk to semantic lines
//! - [`log`]: the bounded, append-only Output Log

pub mod classifier;
pub mod log;
pub mod pty;

pub use classifier::{LineAction, NoiseRule, StreamClassifier};
pub use log::{Line, OutputLog, SharedOutputLog};
pub use pty::SessionManager;

use crate::error::Result;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    Starting,
    Running,
    Exited,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Starting => write!(f, "starting"),
            SessionState::Running => write!(f, "running"),
            SessionState::Exited => write!(f, "exited"),
        }
    }
}

/// What the orchestrator needs from a live session.
///
/// Output does not flow through this trait: the session appends classified
/// lines to the shared Output Log and the orchestrator polls that.
pub trait SessionTransport: Send + Sync {
    /// Send raw bytes to the subordinate's input.
    fn write(&self, bytes: &[u8]) -> Result<()>;

    fn state(&self) -> SessionState;

    /// Terminate the subordinate. Calling it again is a no-op.
    fn kill(&self);

    fn is_running(&self) -> bool {
        self.state() == SessionState::Running
    }
}
