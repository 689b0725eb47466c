//! # LcncKit
//!
//! Diagnostic front-end and transition test harness for a LinuxCNC-style
//! motion controller. It polls the controller's status interface, shows the
//! active G-codes and M-codes, and verifies that estop and power commands
//! change exactly the expected status fields.
//!
//! ## Architecture
//!
//! LcncKit is organized as a workspace with multiple crates:
//!
//! 1. **lcnckit-core** - Status model, field schema, status differ, code tables, events
//! 2. **lcnckit-communication** - Controller traits, simulator, availability tracking, settling
//! 3. **lcnckit-harness** - Transition scenarios, runner, reports
//! 4. **lcnckit-settings** - JSON/TOML configuration
//! 5. **lcnckit** - Main binary that integrates all crates

pub mod display;

pub use display::{run_monitor, CodeDisplay, MonitorSummary};

pub use lcnckit_core::{
    ControllerError, ControllerEvent, Error, EventDispatcher, FieldValue, Result, StatusDiff,
    StatusDiffer, StatusSnapshot, TaskState, VerificationError,
};

pub use lcnckit_communication::{
    ConnectionMonitor, ConnectionState, MachineController, SettleStrategy, SimulatedController,
};

pub use lcnckit_harness::{RunReport, Scenario, TransitionExpectation, TransitionRunner};

pub use lcnckit_settings::{Config, ControllerBackend, ControllerSettings};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Initialize logging
///
/// Sets up structured logging with:
/// - Output on stderr, leaving stdout for tables and reports
/// - RUST_LOG environment variable support, INFO (DEBUG when verbose) otherwise
/// - Pretty or JSON formatting
pub fn init_logging(json: bool, verbose: bool) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let default_level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    let env_filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();

    if json {
        let fmt_layer = fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_current_span(true);
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;
    } else {
        let fmt_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_level(true)
            .with_thread_names(true)
            .with_line_number(true)
            .pretty();
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;
    }

    Ok(())
}

/// Build the controller selected in the settings
pub fn build_controller(settings: &ControllerSettings) -> SimulatedController {
    match settings.backend {
        ControllerBackend::Simulator => {
            SimulatedController::new().with_response_delay(settings.response_delay())
        }
    }
}
