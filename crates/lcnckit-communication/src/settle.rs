//! Waiting for commanded state changes to land
//!
//! A command returns before the controller acts on it. `SettleStrategy`
//! decides how the harness waits before taking the "after" snapshot: either a
//! fixed delay, or polling until the target state is observed with an
//! explicit timeout. A poll after the grace period must match the snapshot
//! that first showed the target.

use crate::controller::StatusChannel;
use lcnckit_core::{ControllerError, StatusDiffer, StatusSnapshot, TaskState};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// How to wait for a command to take effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SettleStrategy {
    /// Sleep for a fixed time, then poll once
    Fixed {
        /// Delay in milliseconds
        delay_ms: u64,
    },
    /// Poll until the target state appears or the timeout expires
    PollUntil {
        /// Give up after this many milliseconds
        timeout_ms: u64,
        /// Pause between polls in milliseconds
        interval_ms: u64,
        /// Extra wait after the target is seen, followed by one more poll
        grace_ms: u64,
    },
}

impl SettleStrategy {
    /// Longest time this strategy can block, excluding poll cost
    pub fn budget(&self) -> Duration {
        match self {
            SettleStrategy::Fixed { delay_ms } => Duration::from_millis(*delay_ms),
            SettleStrategy::PollUntil {
                timeout_ms,
                grace_ms,
                ..
            } => Duration::from_millis(timeout_ms + grace_ms),
        }
    }
}

impl Default for SettleStrategy {
    fn default() -> Self {
        SettleStrategy::PollUntil {
            timeout_ms: 2000,
            interval_ms: 10,
            grace_ms: 50,
        }
    }
}

/// Poll until `predicate` holds for a snapshot
///
/// Returns the first matching snapshot. On timeout the error names `target`
/// and the last state seen.
pub fn wait_until<S, P>(
    channel: &mut S,
    target: &str,
    timeout: Duration,
    interval: Duration,
    predicate: P,
) -> Result<StatusSnapshot, ControllerError>
where
    S: StatusChannel + ?Sized,
    P: Fn(&StatusSnapshot) -> bool,
{
    let started = Instant::now();
    loop {
        let snapshot = channel.poll()?;
        if predicate(&snapshot) {
            tracing::debug!("reached {} after {:?}", target, started.elapsed());
            return Ok(snapshot);
        }
        if started.elapsed() >= timeout {
            let last_state = snapshot
                .task_state()
                .map(|s| s.to_string())
                .unwrap_or_else(|e| e.to_string());
            return Err(ControllerError::Timeout {
                target: target.to_string(),
                last_state,
                timeout_ms: timeout.as_millis() as u64,
            });
        }
        std::thread::sleep(interval);
    }
}

/// Wait for `target` according to `strategy` and return the settled snapshot
///
/// With `Fixed`, the snapshot is returned whatever state it shows; the caller
/// checks it. With `PollUntil`, reaching the timeout is an error, and so is
/// any change between the target snapshot and the poll after the grace period.
pub fn settle<S>(
    channel: &mut S,
    target: TaskState,
    strategy: SettleStrategy,
) -> Result<StatusSnapshot, ControllerError>
where
    S: StatusChannel + ?Sized,
{
    settle_command(channel, target, None, strategy)
}

/// Like [`settle`], but for a command issued when the controller echoed
/// `issued_after`
///
/// A command to the state the machine is already in leaves `task_state`
/// untouched, so polling also waits for the echoed command serial to move
/// past `issued_after`. Controllers that report no serial fall back to the
/// state check alone.
pub fn settle_command<S>(
    channel: &mut S,
    target: TaskState,
    issued_after: Option<i64>,
    strategy: SettleStrategy,
) -> Result<StatusSnapshot, ControllerError>
where
    S: StatusChannel + ?Sized,
{
    match strategy {
        SettleStrategy::Fixed { delay_ms } => {
            std::thread::sleep(Duration::from_millis(delay_ms));
            channel.poll()
        }
        SettleStrategy::PollUntil {
            timeout_ms,
            interval_ms,
            grace_ms,
        } => {
            let reached = wait_until(
                channel,
                &target.to_string(),
                Duration::from_millis(timeout_ms),
                Duration::from_millis(interval_ms),
                |snap| {
                    let acknowledged = match (issued_after, snap.echo_serial()) {
                        (Some(before), Some(now)) => now > before,
                        _ => true,
                    };
                    acknowledged && snap.task_state().ok() == Some(target)
                },
            )?;
            if grace_ms == 0 {
                return Ok(reached);
            }
            std::thread::sleep(Duration::from_millis(grace_ms));
            let settled = channel.poll()?;
            if settled != reached {
                let diff = StatusDiffer::diff(&reached, &settled);
                let mut fields = diff.modified_names();
                fields.extend(diff.added.iter().cloned());
                fields.extend(diff.removed.iter().cloned());
                tracing::warn!(
                    "status kept changing for {}ms after reaching {}: {:?}",
                    grace_ms,
                    target,
                    fields
                );
                return Err(ControllerError::Unsettled {
                    target: target.to_string(),
                    fields,
                });
            }
            Ok(settled)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::CommandChannel;
    use crate::simulator::SimulatedController;
    use lcnckit_core::FieldValue;

    /// Status channel that holds its task state while velocity keeps moving
    struct DriftingChannel {
        base: StatusSnapshot,
        polls: u32,
    }

    impl StatusChannel for DriftingChannel {
        fn poll(&mut self) -> Result<StatusSnapshot, ControllerError> {
            self.polls += 1;
            Ok(self
                .base
                .with_field("current_vel", FieldValue::Float(f64::from(self.polls))))
        }
    }

    #[test]
    fn test_poll_until_waits_for_delayed_controller() {
        let mut sim = SimulatedController::new().with_response_delay(Duration::from_millis(30));
        sim.set_state(TaskState::EstopReset).unwrap();
        let strategy = SettleStrategy::PollUntil {
            timeout_ms: 1000,
            interval_ms: 5,
            grace_ms: 0,
        };
        let snap = settle(&mut sim, TaskState::EstopReset, strategy).unwrap();
        assert_eq!(snap.task_state().unwrap(), TaskState::EstopReset);
        assert!(sim.poll_count() > 1);
    }

    #[test]
    fn test_poll_until_times_out() {
        let mut sim = SimulatedController::new();
        let strategy = SettleStrategy::PollUntil {
            timeout_ms: 30,
            interval_ms: 5,
            grace_ms: 0,
        };
        let err = settle(&mut sim, TaskState::On, strategy).unwrap_err();
        assert_eq!(
            err,
            ControllerError::Timeout {
                target: "ON".to_string(),
                last_state: "ESTOP".to_string(),
                timeout_ms: 30,
            }
        );
    }

    #[test]
    fn test_fixed_delay_polls_once() {
        let mut sim = SimulatedController::new();
        sim.set_state(TaskState::EstopReset).unwrap();
        let snap = settle(&mut sim, TaskState::EstopReset, SettleStrategy::Fixed { delay_ms: 1 })
            .unwrap();
        assert_eq!(snap.task_state().unwrap(), TaskState::EstopReset);
        assert_eq!(sim.poll_count(), 1);
    }

    #[test]
    fn test_grace_period_polls_again() {
        let mut sim = SimulatedController::new();
        sim.set_state(TaskState::EstopReset).unwrap();
        let strategy = SettleStrategy::PollUntil {
            timeout_ms: 100,
            interval_ms: 5,
            grace_ms: 5,
        };
        settle(&mut sim, TaskState::EstopReset, strategy).unwrap();
        assert_eq!(sim.poll_count(), 2);
    }

    #[test]
    fn test_change_during_grace_period_is_an_error() {
        let mut sim = SimulatedController::new();
        sim.set_state(TaskState::EstopReset).unwrap();
        let mut channel = DriftingChannel {
            base: sim.poll().unwrap(),
            polls: 0,
        };
        let strategy = SettleStrategy::PollUntil {
            timeout_ms: 100,
            interval_ms: 1,
            grace_ms: 5,
        };
        let err = settle(&mut channel, TaskState::EstopReset, strategy).unwrap_err();
        assert_eq!(
            err,
            ControllerError::Unsettled {
                target: "ESTOP_RESET".to_string(),
                fields: vec!["current_vel".to_string()],
            }
        );
        assert_eq!(channel.polls, 2);
    }

    #[test]
    fn test_drift_ignored_without_grace_period() {
        let mut sim = SimulatedController::new();
        sim.set_state(TaskState::EstopReset).unwrap();
        let mut channel = DriftingChannel {
            base: sim.poll().unwrap(),
            polls: 0,
        };
        let strategy = SettleStrategy::PollUntil {
            timeout_ms: 100,
            interval_ms: 1,
            grace_ms: 0,
        };
        assert!(settle(&mut channel, TaskState::EstopReset, strategy).is_ok());
    }

    #[test]
    fn test_unavailable_controller_propagates() {
        let mut sim = SimulatedController::new();
        sim.set_available(false);
        let err = settle(&mut sim, TaskState::Estop, SettleStrategy::default()).unwrap_err();
        assert!(matches!(err, ControllerError::NotDetected { .. }));
    }

    #[test]
    fn test_same_state_command_waits_for_echo() {
        let mut sim = SimulatedController::new();
        sim.set_state(TaskState::EstopReset).unwrap();
        let before = sim.poll().unwrap();

        let mut delayed = sim.clone().with_response_delay(Duration::from_millis(30));
        delayed.set_state(TaskState::EstopReset).unwrap();
        let strategy = SettleStrategy::PollUntil {
            timeout_ms: 1000,
            interval_ms: 5,
            grace_ms: 0,
        };
        let snap =
            settle_command(&mut delayed, TaskState::EstopReset, before.echo_serial(), strategy)
                .unwrap();
        assert!(snap.echo_serial() > before.echo_serial());
    }

    #[test]
    fn test_budget() {
        assert_eq!(
            SettleStrategy::default().budget(),
            Duration::from_millis(2050)
        );
    }
}
