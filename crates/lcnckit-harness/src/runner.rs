//! Scenario runner
//!
//! For each step the runner polls the controller, issues the command, waits
//! for it to settle, diffs the two snapshots and checks the diff against the
//! expectation. A mismatch fails the scenario and skips its remaining steps;
//! it never aborts the whole run.

use crate::report::{
    ConsistencyReport, ObservedTransition, RunReport, ScenarioReport, StepOutcome, StepReport,
};
use crate::scenario::{Scenario, TransitionExpectation};
use chrono::Utc;
use lcnckit_communication::{settle_command, MachineController, SettleStrategy};
use lcnckit_core::{
    ControllerError, ControllerEvent, EventDispatcher, StatusDiff, StatusDiffer, StatusSnapshot,
    TaskState, VerificationError, MIN_SHARED_FIELDS,
};
use std::time::Instant;

/// Drives scenarios against a controller
#[derive(Debug, Clone)]
pub struct TransitionRunner {
    strategy: SettleStrategy,
    min_shared_fields: usize,
    dispatcher: Option<EventDispatcher>,
}

impl TransitionRunner {
    /// Create a runner that settles each command with `strategy`
    pub fn new(strategy: SettleStrategy) -> Self {
        Self {
            strategy,
            min_shared_fields: MIN_SHARED_FIELDS,
            dispatcher: None,
        }
    }

    /// Builder method to change the consistency threshold
    pub fn with_min_shared_fields(mut self, min_shared_fields: usize) -> Self {
        self.min_shared_fields = min_shared_fields;
        self
    }

    /// Builder method to publish issued commands and state changes
    pub fn with_dispatcher(mut self, dispatcher: EventDispatcher) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Settling strategy applied after every command
    pub fn strategy(&self) -> SettleStrategy {
        self.strategy
    }

    /// Poll twice with no command in between and require a stable status
    pub fn check_consistency<C>(&self, controller: &mut C) -> ConsistencyReport
    where
        C: MachineController + ?Sized,
    {
        let polled = controller
            .poll()
            .and_then(|first| controller.poll().map(|second| (first, second)));

        let mut report = ConsistencyReport {
            shared_fields: 0,
            minimum: self.min_shared_fields,
            failure: None,
            missing_fields: Vec::new(),
            undeclared_fields: Vec::new(),
        };

        match polled {
            Ok((first, second)) => {
                let diff = StatusDiffer::diff(&first, &second);
                report.shared_fields = diff.unchanged.len();
                report.failure = diff
                    .ensure_consistent(self.min_shared_fields)
                    .err()
                    .map(|e| e.to_string());
                report.missing_fields = first
                    .missing_schema_fields()
                    .into_iter()
                    .map(String::from)
                    .collect();
                report.undeclared_fields = first
                    .undeclared_fields()
                    .into_iter()
                    .map(String::from)
                    .collect();
                if !report.missing_fields.is_empty() || !report.undeclared_fields.is_empty() {
                    tracing::warn!(
                        "Status schema drift: missing {:?}, undeclared {:?}",
                        report.missing_fields,
                        report.undeclared_fields
                    );
                }
            }
            Err(err) => report.failure = Some(err.to_string()),
        }

        match &report.failure {
            None => tracing::info!(
                "Status consistent across polls ({} fields)",
                report.shared_fields
            ),
            Some(reason) => tracing::warn!("Consistency check failed: {}", reason),
        }
        report
    }

    /// Run one scenario: setup commands, then each step in order
    pub fn run_scenario<C>(&self, controller: &mut C, scenario: &Scenario) -> ScenarioReport
    where
        C: MachineController + ?Sized,
    {
        let span = tracing::info_span!("scenario", name = %scenario.name);
        let _enter = span.enter();

        let mut report = ScenarioReport {
            name: scenario.name.clone(),
            started_at: Utc::now(),
            setup_failure: None,
            steps: Vec::with_capacity(scenario.steps.len()),
        };

        if let Err(reason) = self.run_setup(controller, &scenario.setup) {
            tracing::warn!("Setup failed: {}", reason);
            report.setup_failure = Some(reason);
            report.steps = scenario
                .steps
                .iter()
                .enumerate()
                .map(|(i, step)| StepReport::skipped(i, *step))
                .collect();
            return report;
        }

        let mut failed = false;
        for (index, expected) in scenario.steps.iter().enumerate() {
            if failed {
                report.steps.push(StepReport::skipped(index, *expected));
                continue;
            }
            let step = self.run_step(controller, index, expected);
            failed = !step.passed();
            report.steps.push(step);
        }

        if report.passed() {
            tracing::info!("Scenario passed");
        } else {
            tracing::warn!("Scenario failed");
        }
        report
    }

    /// Run the consistency check (if asked) and every scenario in order
    pub fn run<C>(&self, controller: &mut C, scenarios: &[Scenario], consistency: bool) -> RunReport
    where
        C: MachineController + ?Sized,
    {
        let mut report = RunReport::new(controller.name());
        tracing::info!(run_id = %report.run_id, "Starting verification run");

        if consistency {
            report.consistency = Some(self.check_consistency(controller));
        }
        for scenario in scenarios {
            report.scenarios.push(self.run_scenario(controller, scenario));
        }

        report.finished_at = Utc::now();
        report
    }

    /// Issue one step and verify it
    pub fn run_step<C>(
        &self,
        controller: &mut C,
        index: usize,
        expected: &TransitionExpectation,
    ) -> StepReport
    where
        C: MachineController + ?Sized,
    {
        let started = Instant::now();
        let outcome = self.transition(controller, expected.command);
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let (observed, failures) = match outcome {
            Ok((diff, after)) => {
                tracing::debug!("{} produced {}", expected.command, diff);
                let failures: Vec<String> = expected
                    .check(&diff, &after)
                    .iter()
                    .map(ToString::to_string)
                    .collect();
                (Some(ObservedTransition::from_diff(&diff, &after)), failures)
            }
            Err(err) => (None, vec![err.to_string()]),
        };

        let outcome = if failures.is_empty() {
            StepOutcome::Passed
        } else {
            for failure in &failures {
                tracing::warn!("Step {} ({}): {}", index, expected.command, failure);
            }
            StepOutcome::Failed
        };

        StepReport {
            index,
            expected: *expected,
            observed,
            outcome,
            failures,
            elapsed_ms,
        }
    }

    /// Bring the controller to the scenario's starting state
    ///
    /// Setup commands may change any number of fields but must not add or
    /// remove any, and a reset must leave the estop clear.
    fn run_setup<C>(&self, controller: &mut C, setup: &[TaskState]) -> Result<(), String>
    where
        C: MachineController + ?Sized,
    {
        for &command in setup {
            let (diff, after) = self
                .transition(controller, command)
                .map_err(|e| format!("{}: {}", command, e))?;
            verify_setup(command, &diff, &after).map_err(|e| format!("{}: {}", command, e))?;
        }
        Ok(())
    }

    fn transition<C>(
        &self,
        controller: &mut C,
        command: TaskState,
    ) -> Result<(StatusDiff, StatusSnapshot), ControllerError>
    where
        C: MachineController + ?Sized,
    {
        let before = controller.poll()?;
        self.publish(ControllerEvent::CommandIssued(command));
        controller.set_state(command)?;
        let after = settle_command(controller, command, before.echo_serial(), self.strategy)?;

        if let (Ok(from), Ok(to)) = (before.task_state(), after.task_state()) {
            if from != to {
                self.publish(ControllerEvent::StateChanged { from, to });
            }
        }
        Ok((StatusDiffer::diff(&before, &after), after))
    }

    fn publish(&self, event: ControllerEvent) {
        if let Some(dispatcher) = &self.dispatcher {
            dispatcher.publish(event);
        }
    }
}

impl Default for TransitionRunner {
    fn default() -> Self {
        Self::new(SettleStrategy::default())
    }
}

fn verify_setup(
    command: TaskState,
    diff: &StatusDiff,
    after: &StatusSnapshot,
) -> Result<(), VerificationError> {
    lcnckit_core::diff::check_count("added", 0, &diff.added)?;
    lcnckit_core::diff::check_count("removed", 0, &diff.removed)?;

    let state = after
        .task_state()
        .map_err(|_| VerificationError::MissingField {
            field: lcnckit_core::status::TASK_STATE_FIELD.to_string(),
        })?;
    if state != command {
        return Err(VerificationError::StateMismatch {
            expected: command.to_string(),
            actual: state.to_string(),
        });
    }

    if command == TaskState::EstopReset {
        let estop = after.estop().map_err(|_| VerificationError::MissingField {
            field: lcnckit_core::status::ESTOP_FIELD.to_string(),
        })?;
        if estop != 0 {
            return Err(VerificationError::EstopMismatch {
                expected: 0,
                actual: estop,
            });
        }
    }
    Ok(())
}
