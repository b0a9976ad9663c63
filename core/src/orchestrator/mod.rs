//! Response Orchestrator
//!
//! Turns one user request into one reply. Requests that need the session are
//! written to it, then the classified Output Log is polled on a fixed tick
//! until the output settles, a confirmation prompt shows up, or the tick
//! budget runs out:
//!
//! ```text
//! Idle -> Dispatched -> Polling -> Stable         -> Completed
//!                               -> PromptDetected -> (safe) Polling
//!                                                 -> (unsafe) Escalated
//!                               -> TimedOut       -> direct path
//! ```
//!
//! Anything that leaves the session unusable sends the request down the
//! direct path instead of failing it. Secondary model errors are returned.

pub mod compose;
pub mod extract;
pub mod router;

pub use extract::{ExtractionKind, Extracted, KeyContentExtractor};
pub use router::{Route, RouteDecision, RouteReason, Router, RoutingMode};

use crate::approval::{PromptInterceptor, PromptKind};
use crate::config::OrchestratorConfig;
use crate::error::{AniError, Result};
use crate::event_bus::{CoreEvent, EventBus};
use crate::history::{HistoryEntry, HistoryStore, NO_CONTEXT};
use crate::llm::SecondaryModel;
use crate::personality::PersonalitySource;
use crate::session::{Line, SessionState, SessionTransport, SharedOutputLog};
use crate::{debug_log, error_log, info_log, trace_log, warn_log};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OrchestratorState {
    Idle,
    Dispatched,
    Polling,
    Stable,
    PromptDetected,
    TimedOut,
    Completed,
    Escalated,
    Failed,
}

impl std::fmt::Display for OrchestratorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            OrchestratorState::Idle => "idle",
            OrchestratorState::Dispatched => "dispatched",
            OrchestratorState::Polling => "polling",
            OrchestratorState::Stable => "stable",
            OrchestratorState::PromptDetected => "prompt detected",
            OrchestratorState::TimedOut => "timed out",
            OrchestratorState::Completed => "completed",
            OrchestratorState::Escalated => "escalated",
            OrchestratorState::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// Where the reply text came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceTag {
    Direct,
    Assisted,
    AssistedWithEscalation,
}

impl std::fmt::Display for SourceTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceTag::Direct => write!(f, "direct"),
            SourceTag::Assisted => write!(f, "assisted"),
            SourceTag::AssistedWithEscalation => write!(f, "assisted_with_escalation"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub text: String,
    pub source: SourceTag,
}

/// Result of the session leg of a request
enum SessionLeg {
    Done { outcome: Outcome, content: String },
    /// Timed out or lost the session; answer directly
    FallBack,
}

/// Polling tuning, copied out of the config
#[derive(Debug, Clone, Copy)]
struct Tuning {
    tick: Duration,
    max_ticks: u32,
    stability_ticks: u32,
    prompt_window: usize,
}

impl From<&OrchestratorConfig> for Tuning {
    fn from(config: &OrchestratorConfig) -> Self {
        Self {
            tick: config.tick_interval(),
            max_ticks: config.max_ticks.max(1),
            stability_ticks: config.stability_ticks.max(1),
            prompt_window: config.prompt_window.max(1),
        }
    }
}

pub struct Orchestrator {
    session: Option<Arc<dyn SessionTransport>>,
    log: SharedOutputLog,
    model: Arc<dyn SecondaryModel>,
    personality: PersonalitySource,
    history: Option<Mutex<HistoryStore>>,
    context_limit: usize,
    interceptor: PromptInterceptor,
    extractor: KeyContentExtractor,
    router: RwLock<Router>,
    tuning: Tuning,
    state: Mutex<OrchestratorState>,
    events: EventBus,
    /// Single-flight guard: held for the whole of `submit`
    in_flight: tokio::sync::Mutex<()>,
}

impl Orchestrator {
    /// An orchestrator without a session; every request goes direct until
    /// one is attached with [`Orchestrator::with_session`].
    pub fn new(
        config: &OrchestratorConfig,
        log: SharedOutputLog,
        model: Arc<dyn SecondaryModel>,
        personality: PersonalitySource,
        events: EventBus,
    ) -> Self {
        Self {
            session: None,
            log,
            model,
            personality,
            history: None,
            context_limit: 5,
            interceptor: PromptInterceptor::default(),
            extractor: KeyContentExtractor::new(config.max_key_lines, config.max_fragments),
            router: RwLock::new(Router::default()),
            tuning: Tuning::from(config),
            state: Mutex::new(OrchestratorState::Idle),
            events,
            in_flight: tokio::sync::Mutex::new(()),
        }
    }

    pub fn with_session(mut self, session: Arc<dyn SessionTransport>) -> Self {
        self.session = Some(session);
        self
    }

    pub fn with_history(mut self, history: HistoryStore, context_limit: usize) -> Self {
        self.history = Some(Mutex::new(history));
        self.context_limit = context_limit;
        self
    }

    pub fn with_interceptor(mut self, interceptor: PromptInterceptor) -> Self {
        self.interceptor = interceptor;
        self
    }

    pub fn with_mode(self, mode: RoutingMode) -> Self {
        self.router.write().set_mode(mode);
        self
    }

    pub fn mode(&self) -> RoutingMode {
        self.router.read().mode()
    }

    pub fn set_mode(&self, mode: RoutingMode) {
        info_log!("Routing mode set to {}", mode);
        self.router.write().set_mode(mode);
    }

    pub fn state(&self) -> OrchestratorState {
        *self.state.lock()
    }

    pub fn session_state(&self) -> Option<SessionState> {
        self.session.as_ref().map(|s| s.state())
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Last `n` lines of the Output Log, for display only.
    pub fn log_snapshot(&self, n: usize) -> Vec<Line> {
        self.log.tail(n)
    }

    pub fn history_len(&self) -> usize {
        self.history.as_ref().map(|h| h.lock().len()).unwrap_or(0)
    }

    fn set_state(&self, state: OrchestratorState) {
        *self.state.lock() = state;
        trace_log!("Orchestrator state: {}", state);
        self.events.publish(CoreEvent::StateChanged { state });
    }

    /// Answer one request. Concurrent calls are rejected with
    /// [`AniError::Busy`].
    pub async fn submit(&self, input: &str) -> Result<Outcome> {
        let _guard = self.in_flight.try_lock().map_err(|_| AniError::Busy)?;

        let decision = self.router.read().route(input);
        debug_log!(
            "Orchestrator::submit: route={:?} reason={:?}",
            decision.route,
            decision.reason
        );
        let persona = self.personality.load();
        let context = self.context_summary();

        let result = match decision.route {
            Route::Direct => self
                .answer_direct(&decision.text, &persona, &context)
                .await
                .map(|o| (o, String::new())),
            Route::Session => match self.run_session(&decision.text, &persona, &context).await {
                Ok(SessionLeg::Done { outcome, content }) => Ok((outcome, content)),
                Ok(SessionLeg::FallBack) => self
                    .answer_direct(&decision.text, &persona, &context)
                    .await
                    .map(|o| (o, String::new())),
                Err(e) if e.is_degrading() => {
                    warn_log!("Session unusable ({}), answering directly", e);
                    self.answer_direct(&decision.text, &persona, &context)
                        .await
                        .map(|o| (o, String::new()))
                }
                Err(e) => Err(e),
            },
        };

        let outcome = match result {
            Ok((outcome, content)) => {
                self.set_state(OrchestratorState::Completed);
                self.remember(&decision, &content, &outcome);
                Ok(outcome)
            }
            Err(e) => {
                error_log!("Request failed: {}", e);
                self.set_state(OrchestratorState::Failed);
                Err(e)
            }
        };
        self.set_state(OrchestratorState::Idle);
        outcome
    }

    async fn answer_direct(&self, input: &str, persona: &str, context: &str) -> Result<Outcome> {
        let prompt = compose::direct(input, persona, context);
        let text = self.model.generate(&prompt).await?;
        Ok(Outcome {
            text,
            source: SourceTag::Direct,
        })
    }

    async fn run_session(&self, input: &str, persona: &str, context: &str) -> Result<SessionLeg> {
        let session = match &self.session {
            Some(session) if session.is_running() => session.clone(),
            _ => {
                self.set_state(OrchestratorState::Failed);
                return Err(AniError::SessionUnavailable);
            }
        };

        let cursor = self.log.len();
        let request = self.router.read().clarify(input);
        self.set_state(OrchestratorState::Dispatched);
        send(session.as_ref(), format!("{}\r", request).as_bytes())?;
        debug_log!("Dispatched request at cursor {}", cursor);

        self.set_state(OrchestratorState::Polling);
        let tuning = self.tuning;
        let mut last_len = cursor;
        let mut scan_from = cursor;
        let mut no_growth = 0u32;

        for tick in 1..=tuning.max_ticks {
            tokio::time::sleep(tuning.tick).await;

            if !session.is_running() {
                warn_log!("Session exited while polling (tick {})", tick);
                return Ok(SessionLeg::FallBack);
            }

            let len = self.log.len();
            if len > last_len {
                last_len = len;
                no_growth = 0;

                let prompt = self.interceptor.classify(&self.prompt_window(scan_from, &request));
                match prompt.kind {
                    PromptKind::None => {}
                    PromptKind::Safe => {
                        self.set_state(OrchestratorState::PromptDetected);
                        if let Some(token) = prompt.ack_token() {
                            info_log!(
                                "Auto-approving prompt ({}) with {:?}",
                                prompt.pattern.unwrap_or("unknown"),
                                token
                            );
                            send(session.as_ref(), token.as_bytes())?;
                            self.events.publish(CoreEvent::PromptAutoApproved {
                                token: token.to_string(),
                                evidence: prompt.evidence_text.clone(),
                            });
                        }
                        scan_from = len;
                        self.set_state(OrchestratorState::Polling);
                    }
                    PromptKind::Unsafe => {
                        self.set_state(OrchestratorState::PromptDetected);
                        warn_log!(
                            "Escalating prompt: {}",
                            prompt.reason.as_deref().unwrap_or("unsafe")
                        );
                        self.set_state(OrchestratorState::Escalated);
                        self.events.publish(CoreEvent::Escalated {
                            evidence: prompt.evidence_text.clone(),
                        });

                        let text = self
                            .model
                            .generate(&compose::escalation(
                                input,
                                &prompt.evidence_text,
                                persona,
                                context,
                            ))
                            .await?;
                        return Ok(SessionLeg::Done {
                            outcome: Outcome {
                                text,
                                source: SourceTag::AssistedWithEscalation,
                            },
                            content: prompt.evidence_text,
                        });
                    }
                }
            } else {
                no_growth += 1;
                if no_growth >= tuning.stability_ticks && len > cursor {
                    self.set_state(OrchestratorState::Stable);
                    debug_log!("Output stable after {} ticks ({} new lines)", tick, len - cursor);
                    return self.complete(cursor, &request, input, persona, context).await;
                }
            }
        }

        warn_log!("No stable output after {} ticks, answering directly", tuning.max_ticks);
        self.set_state(OrchestratorState::TimedOut);
        self.events.publish(CoreEvent::TimedOut {
            ticks: tuning.max_ticks,
        });
        Ok(SessionLeg::FallBack)
    }

    async fn complete(
        &self,
        cursor: u64,
        request: &str,
        input: &str,
        persona: &str,
        context: &str,
    ) -> Result<SessionLeg> {
        let slice = self.log.since(cursor);
        let extracted = self.extractor.extract(&slice, request);
        debug_log!(
            "Extracted {} items ({:?}) from {} lines",
            extracted.items.len(),
            extracted.kind,
            slice.len()
        );

        let prompt = compose::assisted(input, &extracted, persona, context);
        let text = self.model.generate(&prompt).await?;
        Ok(SessionLeg::Done {
            outcome: Outcome {
                text,
                source: SourceTag::Assisted,
            },
            content: extracted.text(),
        })
    }

    /// Last K lines after `scan_from`, minus the echo of the request so the
    /// user's own wording never counts as prompt evidence.
    fn prompt_window(&self, scan_from: u64, request: &str) -> Vec<Line> {
        let pending = self.log.since(scan_from);
        let unechoed = extract::strip_echo(&pending, request);
        let start = unechoed.len().saturating_sub(self.tuning.prompt_window);
        unechoed[start..].iter().map(|l| (*l).clone()).collect()
    }

    fn context_summary(&self) -> String {
        match &self.history {
            Some(history) => history.lock().summary(self.context_limit),
            None => NO_CONTEXT.to_string(),
        }
    }

    fn remember(&self, decision: &RouteDecision, content: &str, outcome: &Outcome) {
        let Some(history) = &self.history else {
            return;
        };
        let entry = HistoryEntry::new(
            decision.text.as_str(),
            content,
            outcome.text.clone(),
            outcome.source,
            decision.technical,
        );
        if let Err(e) = history.lock().record(entry) {
            warn_log!("Could not record history: {}", e);
        }
    }
}

/// Write to the session. A failed write means the session is gone, so io
/// errors become [`AniError::SessionUnavailable`] and the request degrades.
fn send(session: &dyn SessionTransport, bytes: &[u8]) -> Result<()> {
    session.write(bytes).map_err(|e| match e {
        AniError::Io(io) => {
            warn_log!("Session write failed: {}", io);
            AniError::SessionUnavailable
        }
        other => other,
    })
}
