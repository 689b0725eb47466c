//! Controller interface
//!
//! The motion controller is an external runtime reached through a fixed
//! status interface and a fixed command interface. These traits are the seam
//! a binding to the real runtime implements; the harness only ever talks to
//! the controller through them.

use lcnckit_core::{ControllerError, StatusSnapshot, TaskState};

/// Read side of the controller: refresh and capture status
pub trait StatusChannel {
    /// Refresh the controller's status and capture every field
    ///
    /// Fails with `ControllerError::NotDetected` when the runtime is not
    /// running.
    fn poll(&mut self) -> Result<StatusSnapshot, ControllerError>;
}

/// Write side of the controller: request a machine state
pub trait CommandChannel {
    /// Request a machine state
    ///
    /// Returns once the request is queued; completion is only observable
    /// through later polls.
    fn set_state(&mut self, target: TaskState) -> Result<(), ControllerError>;
}

/// A controller reachable for both status and commands
pub trait MachineController: StatusChannel + CommandChannel {
    /// Name used in logs and reports
    fn name(&self) -> &str;
}

impl<T: StatusChannel + ?Sized> StatusChannel for Box<T> {
    fn poll(&mut self) -> Result<StatusSnapshot, ControllerError> {
        (**self).poll()
    }
}

impl<T: CommandChannel + ?Sized> CommandChannel for Box<T> {
    fn set_state(&mut self, target: TaskState) -> Result<(), ControllerError> {
        (**self).set_state(target)
    }
}

impl<T: MachineController + ?Sized> MachineController for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }
}
