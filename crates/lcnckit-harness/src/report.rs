//! Verification reports
//!
//! Every run produces a serialisable record of what was expected and what was
//! observed, down to the names of the fields each command modified.

use crate::scenario::TransitionExpectation;
use chrono::{DateTime, Utc};
use lcnckit_core::{StatusDiff, StatusSnapshot, TaskState};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// What a command actually did
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservedTransition {
    /// Fields that appeared
    pub added: usize,
    /// Fields that disappeared
    pub removed: usize,
    /// Fields whose value changed
    pub modified: usize,
    /// `None` when the settled snapshot had no readable `task_state`
    pub state: Option<TaskState>,
    /// `None` when the settled snapshot had no readable `estop`
    pub estop: Option<i64>,
    /// Names of the modified fields, sorted
    pub modified_fields: Vec<String>,
}

impl ObservedTransition {
    /// Summarise `diff`, reading state and estop from the settled snapshot
    pub fn from_diff(diff: &StatusDiff, after: &StatusSnapshot) -> Self {
        let (added, removed, modified) = diff.counts();
        Self {
            added,
            removed,
            modified,
            state: after.task_state().ok(),
            estop: after.estop().ok(),
            modified_fields: diff.modified_names(),
        }
    }
}

impl fmt::Display for ObservedTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self
            .state
            .map(|s| s.to_string())
            .unwrap_or_else(|| "?".to_string());
        let estop = self
            .estop
            .map(|e| e.to_string())
            .unwrap_or_else(|| "?".to_string());
        write!(
            f,
            "({}, {}, {}, {}, {})",
            self.added, self.removed, self.modified, state, estop
        )
    }
}

/// Outcome of one step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    Passed,
    Failed,
    /// Not run because an earlier step failed
    Skipped,
}

/// Record of one command and its verification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepReport {
    /// Zero-based position in the scenario
    pub index: usize,
    /// Command and signature the step checks for
    pub expected: TransitionExpectation,
    /// `None` when the step was skipped or the controller failed
    pub observed: Option<ObservedTransition>,
    /// Verdict
    pub outcome: StepOutcome,
    /// Human-readable failure reasons
    pub failures: Vec<String>,
    /// Time from the before poll to the settled snapshot
    pub elapsed_ms: u64,
}

impl StepReport {
    /// Report for a step that never ran
    pub fn skipped(index: usize, expected: TransitionExpectation) -> Self {
        Self {
            index,
            expected,
            observed: None,
            outcome: StepOutcome::Skipped,
            failures: Vec::new(),
            elapsed_ms: 0,
        }
    }

    /// Whether the step ran and matched
    pub fn passed(&self) -> bool {
        self.outcome == StepOutcome::Passed
    }
}

/// Record of one scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioReport {
    /// Scenario name
    pub name: String,
    pub started_at: DateTime<Utc>,
    /// Why setup failed, if it did; no steps run in that case
    pub setup_failure: Option<String>,
    /// One entry per step, skipped ones included
    pub steps: Vec<StepReport>,
}

impl ScenarioReport {
    /// Setup succeeded and every step passed
    pub fn passed(&self) -> bool {
        self.setup_failure.is_none() && self.steps.iter().all(StepReport::passed)
    }

    /// First failing step, if any
    pub fn first_failure(&self) -> Option<&StepReport> {
        self.steps
            .iter()
            .find(|s| s.outcome == StepOutcome::Failed)
    }
}

/// Outcome of the two-poll consistency check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsistencyReport {
    /// Fields present and equal in both polls
    pub shared_fields: usize,
    /// Required number of shared fields
    pub minimum: usize,
    /// Why the check failed, if it did
    pub failure: Option<String>,
    /// Declared status fields the controller did not report
    #[serde(default)]
    pub missing_fields: Vec<String>,
    /// Reported fields outside the declared schema
    #[serde(default)]
    pub undeclared_fields: Vec<String>,
}

impl ConsistencyReport {
    pub fn passed(&self) -> bool {
        self.failure.is_none()
    }
}

/// Record of a whole verification run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Unique id for this run
    pub run_id: Uuid,
    /// Name of the controller under test
    pub controller: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// `None` when the consistency check was skipped
    pub consistency: Option<ConsistencyReport>,
    /// Scenario reports in run order
    pub scenarios: Vec<ScenarioReport>,
}

impl RunReport {
    /// Start an empty report for `controller`, stamped now
    pub fn new(controller: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            run_id: Uuid::new_v4(),
            controller: controller.into(),
            started_at: now,
            finished_at: now,
            consistency: None,
            scenarios: Vec::new(),
        }
    }

    /// Whether every check in the run passed
    pub fn passed(&self) -> bool {
        self.consistency.as_ref().map_or(true, ConsistencyReport::passed)
            && self.scenarios.iter().all(ScenarioReport::passed)
    }

    /// Number of failed checks (consistency counts as one)
    pub fn failure_count(&self) -> usize {
        let consistency = self
            .consistency
            .as_ref()
            .map_or(0, |c| usize::from(!c.passed()));
        consistency + self.scenarios.iter().filter(|s| !s.passed()).count()
    }

    /// Pretty-printed JSON form of the report
    pub fn to_json(&self) -> lcnckit_core::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Run {} against {}", self.run_id, self.controller)?;
        if let Some(consistency) = &self.consistency {
            match &consistency.failure {
                None => writeln!(
                    f,
                    "  consistency: ok ({} shared fields)",
                    consistency.shared_fields
                )?,
                Some(reason) => writeln!(f, "  consistency: FAILED {}", reason)?,
            }
        }
        for scenario in &self.scenarios {
            let verdict = if scenario.passed() { "ok" } else { "FAILED" };
            writeln!(f, "  {}: {}", scenario.name, verdict)?;
            if let Some(reason) = &scenario.setup_failure {
                writeln!(f, "    setup: {}", reason)?;
            }
            for step in &scenario.steps {
                let observed = step
                    .observed
                    .as_ref()
                    .map(|o| o.to_string())
                    .unwrap_or_else(|| "-".to_string());
                writeln!(
                    f,
                    "    [{}] {:?} expected {} observed {}",
                    step.index, step.outcome, step.expected, observed
                )?;
                for failure in &step.failures {
                    writeln!(f, "      {}", failure)?;
                }
            }
        }
        write!(f, "{} failure(s)", self.failure_count())
    }
}
