//! Controller availability tracking
//!
//! The display keeps polling whether or not the controller is running. The
//! monitor folds each poll outcome into an explicit connection state and
//! reports only the edges, so an absent controller is announced once rather
//! than on every refresh.

use lcnckit_core::{ControllerError, ControllerEvent, EventDispatcher, StatusSnapshot};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether the controller is answering polls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// No poll has completed yet
    Unknown,
    /// Last poll succeeded
    Connected,
    /// Last poll failed
    Disconnected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "Unknown"),
            Self::Connected => write!(f, "Connected"),
            Self::Disconnected => write!(f, "Disconnected"),
        }
    }
}

/// Edge reported by the monitor
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionTransition {
    /// Controller became reachable
    Detected,
    /// Controller stopped answering
    NotDetected(ControllerError),
}

/// Tracks controller availability across polls
#[derive(Debug)]
pub struct ConnectionMonitor {
    state: ConnectionState,
    dispatcher: Option<EventDispatcher>,
    lost_count: u64,
}

impl ConnectionMonitor {
    /// Create a monitor in the `Unknown` state
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Unknown,
            dispatcher: None,
            lost_count: 0,
        }
    }

    /// Builder method to publish edges as controller events
    pub fn with_dispatcher(mut self, dispatcher: EventDispatcher) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Current state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Whether the last poll succeeded
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// How many times the controller has gone missing
    pub fn lost_count(&self) -> u64 {
        self.lost_count
    }

    /// Fold one poll outcome into the state
    ///
    /// Hands back the snapshot when the poll succeeded, so callers can skip
    /// redrawing while the controller is absent, and the transition when
    /// this poll crossed an edge. Logs and publishes only on transitions.
    pub fn observe(
        &mut self,
        outcome: Result<StatusSnapshot, ControllerError>,
    ) -> (Option<StatusSnapshot>, Option<ConnectionTransition>) {
        match outcome {
            Ok(snapshot) => {
                let transition = if self.state != ConnectionState::Connected {
                    tracing::info!("Controller detected");
                    self.publish(ControllerEvent::Connected);
                    Some(ConnectionTransition::Detected)
                } else {
                    None
                };
                self.state = ConnectionState::Connected;
                (Some(snapshot), transition)
            }
            Err(err) => {
                let transition = if self.state != ConnectionState::Disconnected {
                    tracing::warn!("Controller not detected: {}", err);
                    self.lost_count += 1;
                    self.publish(ControllerEvent::Disconnected(err.to_string()));
                    Some(ConnectionTransition::NotDetected(err))
                } else {
                    tracing::trace!("Controller still absent: {}", err);
                    None
                };
                self.state = ConnectionState::Disconnected;
                (None, transition)
            }
        }
    }

    fn publish(&self, event: ControllerEvent) {
        if let Some(dispatcher) = &self.dispatcher {
            dispatcher.publish(event);
        }
    }
}

impl Default for ConnectionMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline() -> Result<StatusSnapshot, ControllerError> {
        Err(ControllerError::NotDetected {
            reason: "no shared memory".to_string(),
        })
    }

    fn online() -> Result<StatusSnapshot, ControllerError> {
        Ok(StatusSnapshot::from_fields(Vec::<(String, _)>::new()))
    }

    #[test]
    fn test_absent_controller_reported_once() {
        let mut monitor = ConnectionMonitor::new();
        let transitions: Vec<_> = (0..10)
            .filter_map(|_| monitor.observe(offline()).1)
            .collect();
        assert_eq!(transitions.len(), 1);
        assert!(matches!(
            transitions[0],
            ConnectionTransition::NotDetected(_)
        ));
        assert_eq!(monitor.state(), ConnectionState::Disconnected);
        assert_eq!(monitor.lost_count(), 1);
    }

    #[test]
    fn test_each_loss_reported() {
        let mut monitor = ConnectionMonitor::new();
        let pattern = [true, false, false, true, true, false, true, false];
        let mut losses = 0;
        let mut detections = 0;
        for up in pattern {
            let outcome = if up { online() } else { offline() };
            match monitor.observe(outcome).1 {
                Some(ConnectionTransition::Detected) => detections += 1,
                Some(ConnectionTransition::NotDetected(_)) => losses += 1,
                None => {}
            }
        }
        assert_eq!(losses, 3);
        assert_eq!(detections, 3);
        assert_eq!(monitor.lost_count(), 3);
    }

    #[test]
    fn test_snapshot_passed_through() {
        let mut monitor = ConnectionMonitor::new();
        let (snap, transition) = monitor.observe(online());
        assert!(snap.is_some());
        assert_eq!(transition, Some(ConnectionTransition::Detected));
        assert!(monitor.is_connected());

        let (snap, transition) = monitor.observe(online());
        assert!(snap.is_some());
        assert_eq!(transition, None);
    }

    #[test]
    fn test_edges_published() {
        let dispatcher = EventDispatcher::new(8);
        let mut rx = dispatcher.subscribe();
        let mut monitor = ConnectionMonitor::new().with_dispatcher(dispatcher);

        monitor.observe(online());
        monitor.observe(online());
        monitor.observe(offline());
        monitor.observe(offline());

        assert_eq!(rx.try_recv().unwrap(), ControllerEvent::Connected);
        assert!(matches!(
            rx.try_recv().unwrap(),
            ControllerEvent::Disconnected(_)
        ));
        assert!(rx.try_recv().is_err());
    }
}
