//! Event system for controller observation
//!
//! Provides:
//! - Event types for connection edges and machine state changes
//! - Event dispatcher for publishing events to subscribers

use crate::status::TaskState;
use tokio::sync::broadcast;

/// Controller event types
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    /// Controller became reachable
    Connected,
    /// Controller stopped answering polls
    Disconnected(String),
    /// Task state changed between two polls
    StateChanged {
        /// State seen on the previous poll
        from: TaskState,
        /// State seen on this poll
        to: TaskState,
    },
    /// A state command was issued
    CommandIssued(TaskState),
    /// Error occurred
    Error(String),
}

impl std::fmt::Display for ControllerEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControllerEvent::Connected => write!(f, "Controller detected"),
            ControllerEvent::Disconnected(reason) => {
                write!(f, "Controller not detected ({})", reason)
            }
            ControllerEvent::StateChanged { from, to } => write!(f, "State: {} -> {}", from, to),
            ControllerEvent::CommandIssued(state) => write!(f, "Commanded {}", state),
            ControllerEvent::Error(msg) => write!(f, "Error: {}", msg),
        }
    }
}

/// Event dispatcher for publishing events to subscribers
#[derive(Clone)]
pub struct EventDispatcher {
    /// Broadcast sender channel for controller events.
    tx: broadcast::Sender<ControllerEvent>,
}

impl EventDispatcher {
    /// Create a new event dispatcher
    ///
    /// # Arguments
    /// * `buffer_size` - Size of the broadcast buffer (default 100)
    pub fn new(buffer_size: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer_size);
        Self { tx }
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<ControllerEvent> {
        self.tx.subscribe()
    }

    /// Publish an event to all subscribers
    ///
    /// Returns the number of subscribers that received it; publishing with
    /// nobody listening is not an error.
    pub fn publish(&self, event: ControllerEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    /// Get number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new(100)
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_subscribers() {
        let dispatcher = EventDispatcher::default();
        let mut rx = dispatcher.subscribe();
        assert_eq!(dispatcher.subscriber_count(), 1);

        assert_eq!(dispatcher.publish(ControllerEvent::Connected), 1);
        assert_eq!(rx.recv().await.unwrap(), ControllerEvent::Connected);
    }

    #[test]
    fn test_publish_without_subscribers() {
        let dispatcher = EventDispatcher::new(4);
        assert_eq!(dispatcher.publish(ControllerEvent::Connected), 0);
    }

    #[test]
    fn test_event_display() {
        let event = ControllerEvent::StateChanged {
            from: TaskState::Estop,
            to: TaskState::EstopReset,
        };
        assert_eq!(event.to_string(), "State: ESTOP -> ESTOP_RESET");
    }
}
