//! Transition scenarios
//!
//! A scenario is an ordered list of commands, each paired with the shape of
//! status change it must produce. Controller state is cumulative (the estop
//! has to be reset before the machine can be switched on), so steps only make
//! sense in the order given.

use lcnckit_core::diff::check_count;
use lcnckit_core::{StatusDiff, StatusSnapshot, TaskState, VerificationError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Expected outcome of one command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionExpectation {
    /// State requested from the controller
    pub command: TaskState,
    /// Fields expected to appear
    pub added: usize,
    /// Fields expected to disappear
    pub removed: usize,
    /// Fields expected to change value
    pub modified: usize,
    /// Resulting `task_state`
    pub state: TaskState,
    /// Resulting `estop` flag
    pub estop: i64,
}

impl TransitionExpectation {
    /// Expectation with no fields added or removed
    pub const fn new(command: TaskState, modified: usize, state: TaskState, estop: i64) -> Self {
        Self {
            command,
            added: 0,
            removed: 0,
            modified,
            state,
            estop,
        }
    }

    /// Every way `diff` and `after` disagree with this expectation
    ///
    /// An empty result means the transition matched.
    pub fn check(&self, diff: &StatusDiff, after: &StatusSnapshot) -> Vec<VerificationError> {
        let mut failures = Vec::new();

        let counts = [
            check_count("added", self.added, &diff.added),
            check_count("removed", self.removed, &diff.removed),
            check_count("modified", self.modified, diff.modified.keys()),
        ];
        failures.extend(counts.into_iter().filter_map(Result::err));

        match after.task_state() {
            Ok(state) if state == self.state => {}
            Ok(state) => failures.push(VerificationError::StateMismatch {
                expected: self.state.to_string(),
                actual: state.to_string(),
            }),
            Err(err) => failures.push(VerificationError::StateMismatch {
                expected: self.state.to_string(),
                actual: err.to_string(),
            }),
        }

        match after.estop() {
            Ok(estop) if estop == self.estop => {}
            Ok(estop) => failures.push(VerificationError::EstopMismatch {
                expected: self.estop,
                actual: estop,
            }),
            Err(_) => failures.push(VerificationError::MissingField {
                field: lcnckit_core::status::ESTOP_FIELD.to_string(),
            }),
        }

        failures
    }
}

impl fmt::Display for TransitionExpectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> ({}, {}, {}, {}, {})",
            self.command, self.added, self.removed, self.modified, self.state, self.estop
        )
    }
}

/// Ordered sequence of expected transitions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Short identifier used on the command line
    pub name: String,
    /// One-line description
    #[serde(default)]
    pub description: String,
    /// Commands issued before the first step to reach the starting state
    #[serde(default)]
    pub setup: Vec<TaskState>,
    /// Steps in the order they must run
    pub steps: Vec<TransitionExpectation>,
}

impl Scenario {
    /// Estop reset, estop, estop reset
    pub fn estop_cycle() -> Self {
        Self {
            name: "estop".to_string(),
            description: "Reset, trip and reset the emergency stop".to_string(),
            setup: vec![TaskState::EstopReset],
            steps: vec![
                TransitionExpectation::new(TaskState::EstopReset, 1, TaskState::EstopReset, 0),
                TransitionExpectation::new(TaskState::Estop, 3, TaskState::Estop, 1),
                TransitionExpectation::new(TaskState::EstopReset, 3, TaskState::EstopReset, 0),
            ],
        }
    }

    /// Machine on, off, on from a reset estop
    pub fn power_cycle() -> Self {
        Self {
            name: "power".to_string(),
            description: "Switch the machine on, off and on again".to_string(),
            setup: vec![TaskState::EstopReset],
            steps: vec![
                TransitionExpectation::new(TaskState::On, 5, TaskState::On, 0),
                TransitionExpectation::new(TaskState::Off, 3, TaskState::Off, 1),
                TransitionExpectation::new(TaskState::On, 3, TaskState::On, 1),
            ],
        }
    }

    /// Load scenarios from a JSON file holding an array of scenarios
    pub fn load_all(path: &Path) -> lcnckit_core::Result<Vec<Scenario>> {
        let content = std::fs::read_to_string(path)?;
        let scenarios: Vec<Scenario> = serde_json::from_str(&content)?;
        if let Some(empty) = scenarios.iter().find(|s| s.steps.is_empty()) {
            return Err(lcnckit_core::Error::other(format!(
                "scenario '{}' has no steps",
                empty.name
            )));
        }
        Ok(scenarios)
    }
}

/// Scenarios shipped with the harness, in the order they should run
pub fn builtin_scenarios() -> Vec<Scenario> {
    vec![Scenario::estop_cycle(), Scenario::power_cycle()]
}

/// Find a built-in scenario by name
pub fn find_builtin(name: &str) -> Option<Scenario> {
    builtin_scenarios().into_iter().find(|s| s.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lcnckit_core::{FieldValue, StatusDiffer};

    fn status(state: TaskState, estop: i64, echo: i64) -> StatusSnapshot {
        StatusSnapshot::from_fields([
            ("task_state", FieldValue::Int(state.code())),
            ("estop", FieldValue::Int(estop)),
            ("echo_serial_number", FieldValue::Int(echo)),
        ])
    }

    #[test]
    fn test_matching_transition() {
        let before = status(TaskState::EstopReset, 0, 1);
        let after = status(TaskState::Estop, 1, 2);
        let diff = StatusDiffer::diff(&before, &after);
        let expected = TransitionExpectation::new(TaskState::Estop, 3, TaskState::Estop, 1);
        assert!(expected.check(&diff, &after).is_empty());
    }

    #[test]
    fn test_mismatches_collected() {
        let before = status(TaskState::EstopReset, 0, 1);
        let after = status(TaskState::EstopReset, 0, 2);
        let diff = StatusDiffer::diff(&before, &after);
        let expected = TransitionExpectation::new(TaskState::Estop, 3, TaskState::Estop, 1);

        let failures = expected.check(&diff, &after);
        assert_eq!(failures.len(), 3);
        assert!(matches!(
            failures[0],
            VerificationError::CountMismatch { expected: 3, actual: 1, .. }
        ));
        assert!(matches!(failures[1], VerificationError::StateMismatch { .. }));
        assert!(matches!(
            failures[2],
            VerificationError::EstopMismatch { expected: 1, actual: 0 }
        ));
    }

    #[test]
    fn test_builtin_tables() {
        let estop = Scenario::estop_cycle();
        let tuples: Vec<_> = estop
            .steps
            .iter()
            .map(|s| (s.added, s.removed, s.modified, s.state, s.estop))
            .collect();
        assert_eq!(
            tuples,
            vec![
                (0, 0, 1, TaskState::EstopReset, 0),
                (0, 0, 3, TaskState::Estop, 1),
                (0, 0, 3, TaskState::EstopReset, 0),
            ]
        );

        let power = Scenario::power_cycle();
        let tuples: Vec<_> = power
            .steps
            .iter()
            .map(|s| (s.added, s.removed, s.modified, s.state, s.estop))
            .collect();
        assert_eq!(
            tuples,
            vec![
                (0, 0, 5, TaskState::On, 0),
                (0, 0, 3, TaskState::Off, 1),
                (0, 0, 3, TaskState::On, 1),
            ]
        );
    }

    #[test]
    fn test_find_builtin() {
        assert_eq!(find_builtin("power").unwrap().steps.len(), 3);
        assert!(find_builtin("spindle").is_none());
    }

    #[test]
    fn test_scenario_json_shape() {
        let json = r#"{
            "name": "trip",
            "steps": [
                {"command": "ESTOP", "added": 0, "removed": 0, "modified": 3,
                 "state": "ESTOP", "estop": 1}
            ]
        }"#;
        let scenario: Scenario = serde_json::from_str(json).unwrap();
        assert!(scenario.setup.is_empty());
        assert_eq!(scenario.steps[0].command, TaskState::Estop);
    }

    #[test]
    fn test_expectation_display() {
        let step = TransitionExpectation::new(TaskState::On, 5, TaskState::On, 0);
        assert_eq!(step.to_string(), "ON -> (0, 0, 5, ON, 0)");
    }
}
