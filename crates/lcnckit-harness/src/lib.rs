//! # LcncKit Harness
//!
//! Verifies that a controller responds to state commands with exactly the
//! expected shape of status change. Provides:
//! - `Scenario` and `TransitionExpectation`, ordered expectation tables
//! - The built-in estop and power scenarios
//! - `TransitionRunner`, which issues commands and checks each diff
//! - Serialisable run reports

pub mod report;
pub mod runner;
pub mod scenario;

pub use report::{
    ConsistencyReport, ObservedTransition, RunReport, ScenarioReport, StepOutcome, StepReport,
};
pub use runner::TransitionRunner;
pub use scenario::{builtin_scenarios, find_builtin, Scenario, TransitionExpectation};
