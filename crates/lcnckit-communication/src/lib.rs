//! # LcncKit Communication
//!
//! The boundary between the harness and the external motion controller.
//! Defines the status and command channel traits, an in-process simulated
//! controller, availability tracking for the display loop, and the strategies
//! used to wait for commanded state changes.

pub mod connection;
pub mod controller;
pub mod settle;
pub mod simulator;

pub use connection::{ConnectionMonitor, ConnectionState, ConnectionTransition};
pub use controller::{CommandChannel, MachineController, StatusChannel};
pub use settle::{settle, settle_command, wait_until, SettleStrategy};
pub use simulator::SimulatedController;
