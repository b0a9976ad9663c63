pub mod logger;

pub mod approval;
pub mod config;
pub mod error;
pub mod event_bus;
pub mod history;
pub mod llm;
pub mod orchestrator;
pub mod personality;
pub mod session;

// Re-exports for convenience
pub use config::Config;
pub use error::{AniError, Result};
pub use event_bus::{CoreEvent, EventBus};
pub use history::HistoryStore;
pub use llm::{OllamaClient, SecondaryModel};
pub use orchestrator::{Orchestrator, OrchestratorState, Outcome, RoutingMode, SourceTag};
pub use personality::PersonalitySource;
pub use session::{SessionManager, SessionState, SessionTransport, SharedOutputLog, StreamClassifier};
