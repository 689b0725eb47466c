//! Simulated controller
//!
//! An in-process stand-in for the motion controller's status and command
//! interfaces. It publishes every declared status field and reproduces the
//! field-change shape of the reference controller's machine-state
//! transitions, which makes it usable for dry runs of the harness and for
//! tests.
//!
//! State model:
//! - every accepted command bumps `echo_serial_number`
//! - `estop` is latched by ESTOP and OFF and cleared only by ESTOP_RESET
//! - the first ON after an estop reset arms motion (`enabled`,
//!   `motion_mode`); ESTOP and ESTOP_RESET disarm it, OFF leaves it armed
//! - every ON issues a fresh motion enable, bumping `id`
//! - ON is rejected while in ESTOP

use crate::controller::{CommandChannel, MachineController, StatusChannel};
use lcnckit_core::status::schema::{ESTOP_FIELD, GCODES_FIELD, MCODES_FIELD, TASK_STATE_FIELD};
use lcnckit_core::{ControllerError, FieldValue, StatusSnapshot, TaskState, STATUS_FIELDS};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Free motion mode
const MOTION_MODE_FREE: i64 = 1;
/// Teleop motion mode, entered when motion is armed
const MOTION_MODE_TELEOP: i64 = 3;

const DEFAULT_GCODES: [i64; 16] = [
    0, 800, 170, 400, 210, 900, 940, 540, 490, 990, 640, -1, 911, 500, 970, 80,
];
const DEFAULT_MCODES: [i64; 10] = [0, -1, 5, -1, 9, -1, 48, -1, 53, -1];

#[derive(Debug)]
struct PendingCommand {
    target: TaskState,
    due: Instant,
}

#[derive(Debug)]
struct SimState {
    available: bool,
    response_delay: Duration,
    task_state: TaskState,
    estop: bool,
    motion_armed: bool,
    motion_id: i64,
    echo_serial_number: i64,
    gcodes: Vec<i64>,
    mcodes: Vec<i64>,
    pending: Vec<PendingCommand>,
    commands: Vec<TaskState>,
    polls: u64,
}

impl SimState {
    fn new() -> Self {
        Self {
            available: true,
            response_delay: Duration::ZERO,
            task_state: TaskState::Estop,
            estop: true,
            motion_armed: false,
            motion_id: 0,
            echo_serial_number: 0,
            gcodes: DEFAULT_GCODES.to_vec(),
            mcodes: DEFAULT_MCODES.to_vec(),
            pending: Vec::new(),
            commands: Vec::new(),
            polls: 0,
        }
    }

    fn apply(&mut self, target: TaskState) {
        self.echo_serial_number += 1;
        match target {
            TaskState::Estop => {
                self.task_state = TaskState::Estop;
                self.estop = true;
                self.motion_armed = false;
            }
            TaskState::EstopReset => {
                self.task_state = TaskState::EstopReset;
                self.estop = false;
                self.motion_armed = false;
            }
            TaskState::Off => {
                self.task_state = next_task_state(self.task_state, target);
                self.estop = true;
            }
            TaskState::On => {
                if !self.task_state.allows_power_on() {
                    tracing::debug!("simulator ignored ON while in {}", self.task_state);
                    return;
                }
                self.task_state = TaskState::On;
                self.motion_armed = true;
                self.motion_id += 1;
            }
        }
    }

    fn apply_due(&mut self, now: Instant) {
        let (due, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|cmd| cmd.due <= now);
        self.pending = waiting;
        for cmd in due {
            self.apply(cmd.target);
        }
    }

    /// Task state once every queued command has landed
    fn eventual_state(&self) -> TaskState {
        self.pending
            .iter()
            .fold(self.task_state, |state, cmd| next_task_state(state, cmd.target))
    }

    fn snapshot(&self) -> StatusSnapshot {
        let mut fields: BTreeMap<String, FieldValue> = STATUS_FIELDS
            .iter()
            .map(|name| (name.to_string(), default_value(name)))
            .collect();

        let mut set = |name: &str, value: FieldValue| {
            fields.insert(name.to_string(), value);
        };
        set(TASK_STATE_FIELD, FieldValue::Int(self.task_state.code()));
        set(ESTOP_FIELD, FieldValue::Int(i64::from(self.estop)));
        set("enabled", FieldValue::Bool(self.motion_armed));
        set(
            "motion_mode",
            FieldValue::Int(if self.motion_armed {
                MOTION_MODE_TELEOP
            } else {
                MOTION_MODE_FREE
            }),
        );
        set("id", FieldValue::Int(self.motion_id));
        set(
            "echo_serial_number",
            FieldValue::Int(self.echo_serial_number),
        );
        set(GCODES_FIELD, FieldValue::int_tuple(&self.gcodes));
        set(MCODES_FIELD, FieldValue::int_tuple(&self.mcodes));

        StatusSnapshot::new(fields)
    }
}

/// Task state after `target` lands on a machine in `current`
///
/// OFF and ON leave a machine in ESTOP where it is.
fn next_task_state(current: TaskState, target: TaskState) -> TaskState {
    match target {
        TaskState::Off | TaskState::On if current == TaskState::Estop => TaskState::Estop,
        _ => target,
    }
}

/// Resting value of a status field that the state model does not drive
fn default_value(name: &str) -> FieldValue {
    let zeros = |n: usize| FieldValue::float_tuple(&vec![0.0; n]);
    match name {
        "acceleration" | "max_acceleration" => FieldValue::Float(1200.0),
        "max_velocity" => FieldValue::Float(100.0),
        "actual_position" | "dtg" | "g5x_offset" | "g92_offset" | "position"
        | "probed_position" | "tool_offset" => zeros(9),
        "joint_actual_position" | "joint_position" => zeros(3),
        "ain" | "aout" => zeros(4),
        "din" | "dout" => FieldValue::int_tuple(&[0; 4]),
        "homed" | "limit" => FieldValue::int_tuple(&[0; 3]),
        "angular_units" | "linear_units" | "feedrate" | "rapidrate" => FieldValue::Float(1.0),
        "cycle_time" => FieldValue::Float(0.001),
        "current_vel" | "delay_left" | "distance_to_go" | "rotation_xy" | "velocity" => {
            FieldValue::Float(0.0)
        }
        "adaptive_feed_enabled" | "input_timeout" | "paused" | "probe_tripped" | "probing"
        | "queue_full" => FieldValue::Bool(false),
        "block_delete" | "feed_hold_enabled" | "feed_override_enabled" | "inpos"
        | "optional_stop" => FieldValue::Bool(true),
        "axes" | "joints" => FieldValue::Int(3),
        "axis_mask" => FieldValue::Int(7),
        "exec_state" | "program_units" => FieldValue::Int(2),
        "g5x_index" | "interp_state" | "kinematics_type" | "spindles" | "state"
        | "task_mode" => FieldValue::Int(1),
        "pocket_prepped" => FieldValue::Int(-1),
        "command" | "file" => FieldValue::Text(String::new()),
        "ini_filename" => FieldValue::Text("sim.ini".to_string()),
        "misc_error" => FieldValue::Tuple(Vec::new()),
        "settings" => FieldValue::float_tuple(&[0.0, 0.0, 0.0]),
        "axis" => FieldValue::Tuple(
            (0..3)
                .map(|_| {
                    FieldValue::record([
                        ("max_position_limit", FieldValue::Float(200.0)),
                        ("min_position_limit", FieldValue::Float(0.0)),
                        ("velocity", FieldValue::Float(0.0)),
                    ])
                })
                .collect(),
        ),
        "joint" => FieldValue::Tuple(
            (0..3)
                .map(|_| {
                    FieldValue::record([
                        ("fault", FieldValue::Int(0)),
                        ("ferror_current", FieldValue::Float(0.0)),
                        ("homed", FieldValue::Int(0)),
                        ("inpos", FieldValue::Int(1)),
                    ])
                })
                .collect(),
        ),
        "spindle" => FieldValue::Tuple(vec![FieldValue::record([
            ("brake", FieldValue::Int(1)),
            ("direction", FieldValue::Int(0)),
            ("enabled", FieldValue::Int(0)),
            ("override", FieldValue::Float(1.0)),
            ("speed", FieldValue::Float(0.0)),
        ])]),
        "tool_table" => FieldValue::Tuple(vec![FieldValue::record([
            ("diameter", FieldValue::Float(0.0)),
            ("id", FieldValue::Int(-1)),
            ("zoffset", FieldValue::Float(0.0)),
        ])]),
        _ => FieldValue::Int(0),
    }
}

/// In-process controller model
///
/// Clones share the same machine, so a test can keep one clone to flip
/// availability while the harness drives another.
#[derive(Debug, Clone)]
pub struct SimulatedController {
    name: String,
    inner: Arc<Mutex<SimState>>,
}

impl SimulatedController {
    /// Create a simulator powered up in ESTOP
    pub fn new() -> Self {
        Self {
            name: "simulator".to_string(),
            inner: Arc::new(Mutex::new(SimState::new())),
        }
    }

    /// Builder method to delay command effects
    pub fn with_response_delay(self, delay: Duration) -> Self {
        self.inner.lock().response_delay = delay;
        self
    }

    /// Builder method to set the reported active codes
    pub fn with_active_codes(self, gcodes: Vec<i64>, mcodes: Vec<i64>) -> Self {
        self.set_active_codes(gcodes, mcodes);
        self
    }

    /// Make the controller reachable or not
    pub fn set_available(&self, available: bool) {
        self.inner.lock().available = available;
    }

    /// Whether polls currently succeed
    pub fn is_available(&self) -> bool {
        self.inner.lock().available
    }

    /// Replace the reported active codes
    pub fn set_active_codes(&self, gcodes: Vec<i64>, mcodes: Vec<i64>) {
        let mut state = self.inner.lock();
        state.gcodes = gcodes;
        state.mcodes = mcodes;
    }

    /// Every command accepted so far, in order
    pub fn commands(&self) -> Vec<TaskState> {
        self.inner.lock().commands.clone()
    }

    /// Number of successful polls
    pub fn poll_count(&self) -> u64 {
        self.inner.lock().polls
    }

    /// Current task state, ignoring anything still pending
    pub fn task_state(&self) -> TaskState {
        self.inner.lock().task_state
    }
}

impl Default for SimulatedController {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusChannel for SimulatedController {
    fn poll(&mut self) -> Result<StatusSnapshot, ControllerError> {
        let mut state = self.inner.lock();
        if !state.available {
            return Err(ControllerError::NotDetected {
                reason: "simulator offline".to_string(),
            });
        }
        state.apply_due(Instant::now());
        state.polls += 1;
        Ok(state.snapshot())
    }
}

impl CommandChannel for SimulatedController {
    fn set_state(&mut self, target: TaskState) -> Result<(), ControllerError> {
        let mut state = self.inner.lock();
        if !state.available {
            return Err(ControllerError::NotDetected {
                reason: "simulator offline".to_string(),
            });
        }
        if target == TaskState::On && !state.eventual_state().allows_power_on() {
            return Err(ControllerError::CommandRejected {
                reason: "machine cannot be switched on while in ESTOP".to_string(),
            });
        }

        tracing::debug!("simulator accepted {}", target);
        state.commands.push(target);
        if state.response_delay.is_zero() {
            state.apply(target);
        } else {
            let due = Instant::now() + state.response_delay;
            state.pending.push(PendingCommand { target, due });
        }
        Ok(())
    }
}

impl MachineController for SimulatedController {
    fn name(&self) -> &str {
        &self.name
    }
}
