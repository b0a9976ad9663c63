//! Observer side-channel
//!
//! Broadcasts what the session and the orchestrator are doing so a front end
//! can render progress. Nothing in the request/response path waits on a
//! subscriber; a lagging receiver simply misses events.

use crate::orchestrator::OrchestratorState;
use crate::session::Line;
use tokio::sync::broadcast;

const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub enum CoreEvent {
    SessionStarted { pid: Option<u32> },
    SessionExited { code: Option<u32> },
    /// Incremental snapshot of classified lines just appended to the log
    LinesAppended { lines: Vec<Line> },
    StateChanged { state: OrchestratorState },
    PromptAutoApproved { token: String, evidence: String },
    Escalated { evidence: String },
    TimedOut { ticks: u32 },
}

#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish without caring whether anyone listens.
    pub fn publish(&self, event: CoreEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_to_every_subscriber() {
        let bus = EventBus::default();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        bus.publish(CoreEvent::TimedOut { ticks: 3 });

        assert_eq!(a.recv().await.unwrap(), CoreEvent::TimedOut { ticks: 3 });
        assert_eq!(b.recv().await.unwrap(), CoreEvent::TimedOut { ticks: 3 });
    }

    #[test]
    fn publish_without_subscribers_is_fine() {
        let bus = EventBus::new(4);
        bus.publish(CoreEvent::SessionExited { code: Some(0) });
        assert_eq!(bus.subscriber_count(), 0);
    }
}
