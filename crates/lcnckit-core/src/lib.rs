//! # LcncKit Core
//!
//! Core types for observing an external CNC motion controller.
//! Provides the status data model, the declared status schema, the
//! status differ used to verify state transitions, G-code labelling,
//! and controller events.

pub mod diff;
pub mod error;
pub mod event;
pub mod gcode;
pub mod status;

pub use diff::{FieldChange, StatusDiff, StatusDiffer};
pub use error::{ControllerError, Error, Result, VerificationError};
pub use event::{ControllerEvent, EventDispatcher};
pub use gcode::{
    gcode_label, lookup_gcode, mcode_label, render_code_table, CodeRow, DEFAULT_DISPLAY_ROWS,
    UNKNOWN_CODE_MARKER,
};
pub use status::{FieldValue, StatusSnapshot, TaskState, MIN_SHARED_FIELDS, STATUS_FIELDS};
