//! Error handling for LcncKit
//!
//! Provides error types for each layer of the harness:
//! - Controller errors (status polling and command issuance)
//! - Verification errors (observed transition vs. expected signature)
//!
//! All error types use `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Controller error type
///
/// Represents failures talking to the external motion controller through its
/// status or command interface.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ControllerError {
    /// The controller runtime is not running or its status channel is absent
    #[error("Controller not detected: {reason}")]
    NotDetected {
        /// Why the controller could not be reached.
        reason: String,
    },

    /// Polling the status channel failed after the controller was reached
    #[error("Status poll failed: {reason}")]
    PollFailed {
        /// The reason the poll failed.
        reason: String,
    },

    /// Command was rejected by the controller
    #[error("Command rejected: {reason}")]
    CommandRejected {
        /// The reason the command was rejected.
        reason: String,
    },

    /// Waiting for a commanded state timed out
    #[error("Controller did not reach {target} within {timeout_ms}ms (last state: {last_state})")]
    Timeout {
        /// The state that was being waited for.
        target: String,
        /// The last state observed before giving up.
        last_state: String,
        /// The timeout duration in milliseconds.
        timeout_ms: u64,
    },

    /// Status reported a state code outside the known task states
    #[error("Unknown task state code: {code}")]
    UnknownState {
        /// The unrecognised state code.
        code: i64,
    },

    /// A snapshot lacked a field the caller depends on
    #[error("Status field '{field}' missing or mistyped")]
    MissingField {
        /// The field name.
        field: String,
    },

    /// Status was still changing after the commanded state was reached
    #[error("Status kept changing after reaching {target}: {fields:?}")]
    Unsettled {
        /// The state that was reached.
        target: String,
        /// Fields that changed during the grace period.
        fields: Vec<String>,
    },
}

/// Verification error type
///
/// Raised when an observed status transition disagrees with its expected
/// signature. Fatal to one scenario, never to the process.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VerificationError {
    /// A diff partition had the wrong number of fields
    #[error("Expected {expected} {partition} field(s), observed {actual}: {fields:?}")]
    CountMismatch {
        /// Which partition (added, removed, modified).
        partition: String,
        /// The expected count.
        expected: usize,
        /// The observed count.
        actual: usize,
        /// The field names that made up the observed partition.
        fields: Vec<String>,
    },

    /// The resulting task state differed
    #[error("Expected task state {expected}, observed {actual}")]
    StateMismatch {
        /// The expected task state.
        expected: String,
        /// The observed task state.
        actual: String,
    },

    /// The resulting estop flag differed
    #[error("Expected estop {expected}, observed {actual}")]
    EstopMismatch {
        /// The expected estop flag.
        expected: i64,
        /// The observed estop flag.
        actual: i64,
    },

    /// Too few fields were shared between two consecutive polls
    #[error("Only {actual} shared status fields, expected at least {minimum}")]
    InsufficientFields {
        /// The configured minimum.
        minimum: usize,
        /// The observed shared count.
        actual: usize,
    },

    /// A field the verification reads was absent from the snapshot
    #[error("Snapshot is missing field '{field}'")]
    MissingField {
        /// The field name.
        field: String,
    },
}

/// Main error type for LcncKit
///
/// A unified error type that can represent any error from all layers.
#[derive(Error, Debug)]
pub enum Error {
    /// Controller error
    #[error(transparent)]
    Controller(#[from] ControllerError),

    /// Verification error
    #[error(transparent)]
    Verification(#[from] VerificationError),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Controller(ControllerError::Timeout { .. }))
    }

    /// Check if the controller could not be reached
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            Error::Controller(ControllerError::NotDetected { .. })
                | Error::Controller(ControllerError::PollFailed { .. })
        )
    }

    /// Check if this is a controller error
    pub fn is_controller_error(&self) -> bool {
        matches!(self, Error::Controller(_))
    }

    /// Check if this is a verification mismatch
    pub fn is_verification_error(&self) -> bool {
        matches!(self, Error::Verification(_))
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;
