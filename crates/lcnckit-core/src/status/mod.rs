//! Controller status data model
//!
//! This module provides:
//! - `FieldValue`, the value of one status field (scalar, tuple, or record)
//! - `StatusSnapshot`, an immutable capture of every field at one poll
//! - `TaskState`, the controller's enumerated machine states
//! - The declared status schema

pub mod schema;

use crate::error::ControllerError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub use schema::{
    is_status_field, ECHO_SERIAL_FIELD, ESTOP_FIELD, GCODES_FIELD, MCODES_FIELD,
    MIN_SHARED_FIELDS, STATUS_FIELDS, TASK_STATE_FIELD,
};

/// Value of a single status field
///
/// Compared by structural equality: two tuples are equal when their elements
/// are, two records when their keys and values are.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Boolean flag
    Bool(bool),
    /// Integer scalar (codes, counters, enumerations)
    Int(i64),
    /// Floating point scalar
    Float(f64),
    /// Text scalar (file names, messages)
    Text(String),
    /// Fixed-size tuple of values (positions, code arrays)
    Tuple(Vec<FieldValue>),
    /// Nested record (per-joint, per-spindle, settings blocks)
    Record(BTreeMap<String, FieldValue>),
}

impl FieldValue {
    /// Tuple of integers
    pub fn int_tuple(values: &[i64]) -> Self {
        FieldValue::Tuple(values.iter().map(|v| FieldValue::Int(*v)).collect())
    }

    /// Tuple of floats
    pub fn float_tuple(values: &[f64]) -> Self {
        FieldValue::Tuple(values.iter().map(|v| FieldValue::Float(*v)).collect())
    }

    /// Record from name/value pairs
    pub fn record<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, FieldValue)>,
        K: Into<String>,
    {
        FieldValue::Record(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Integer view; booleans read as 0/1 the way the controller reports flags
    pub fn as_int(&self) -> Option<i64> {
        match self {
            FieldValue::Int(v) => Some(*v),
            FieldValue::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    /// Float view of a numeric field
    pub fn as_float(&self) -> Option<f64> {
        match self {
            FieldValue::Float(v) => Some(*v),
            FieldValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Text view
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Tuple elements
    pub fn as_tuple(&self) -> Option<&[FieldValue]> {
        match self {
            FieldValue::Tuple(items) => Some(items),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Int(v) => write!(f, "{}", v),
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::Text(s) => write!(f, "{:?}", s),
            FieldValue::Tuple(items) => {
                write!(f, "(")?;
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
            FieldValue::Record(entries) => {
                write!(f, "{{")?;
                for (idx, (key, value)) in entries.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Int(v)
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        FieldValue::Int(i64::from(v))
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

impl From<Vec<FieldValue>> for FieldValue {
    fn from(v: Vec<FieldValue>) -> Self {
        FieldValue::Tuple(v)
    }
}

/// Machine task state reported in `task_state` and accepted by the command
/// interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    /// Emergency stop asserted
    Estop,
    /// Emergency stop cleared, machine still powered off
    EstopReset,
    /// Machine off
    Off,
    /// Machine on and enabled
    On,
}

impl TaskState {
    /// All states in code order
    pub const ALL: [TaskState; 4] = [
        TaskState::Estop,
        TaskState::EstopReset,
        TaskState::Off,
        TaskState::On,
    ];

    /// Numeric code used on the controller's wire
    pub fn code(&self) -> i64 {
        match self {
            TaskState::Estop => 1,
            TaskState::EstopReset => 2,
            TaskState::Off => 3,
            TaskState::On => 4,
        }
    }

    /// Decode a controller state code
    pub fn from_code(code: i64) -> Result<Self, ControllerError> {
        match code {
            1 => Ok(TaskState::Estop),
            2 => Ok(TaskState::EstopReset),
            3 => Ok(TaskState::Off),
            4 => Ok(TaskState::On),
            other => Err(ControllerError::UnknownState { code: other }),
        }
    }

    /// Whether the machine may be switched on from this state
    pub fn allows_power_on(&self) -> bool {
        !matches!(self, TaskState::Estop)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Estop => write!(f, "ESTOP"),
            Self::EstopReset => write!(f, "ESTOP_RESET"),
            Self::Off => write!(f, "OFF"),
            Self::On => write!(f, "ON"),
        }
    }
}

impl FromStr for TaskState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "estop" => Ok(TaskState::Estop),
            "estop-reset" | "reset" => Ok(TaskState::EstopReset),
            "off" => Ok(TaskState::Off),
            "on" => Ok(TaskState::On),
            other => Err(format!("unknown task state '{}'", other)),
        }
    }
}

/// Immutable capture of the controller's status fields at one poll
///
/// Equality compares fields only; the capture time is informational.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusSnapshot {
    fields: BTreeMap<String, FieldValue>,
    captured_at: DateTime<Utc>,
}

impl StatusSnapshot {
    /// Capture a snapshot from a field map, stamped now
    pub fn new(fields: BTreeMap<String, FieldValue>) -> Self {
        Self {
            fields,
            captured_at: Utc::now(),
        }
    }

    /// Capture a snapshot from name/value pairs
    pub fn from_fields<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, FieldValue)>,
        K: Into<String>,
    {
        Self::new(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Copy of this snapshot with one field replaced or inserted
    pub fn with_field(&self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        let mut fields = self.fields.clone();
        fields.insert(name.into(), value.into());
        Self {
            fields,
            captured_at: self.captured_at,
        }
    }

    /// Copy of this snapshot without the named field
    pub fn without_field(&self, name: &str) -> Self {
        let mut fields = self.fields.clone();
        fields.remove(name);
        Self {
            fields,
            captured_at: self.captured_at,
        }
    }

    /// Value of a field
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Whether the snapshot carries a field
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// All field names, sorted
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Field map
    pub fn fields(&self) -> &BTreeMap<String, FieldValue> {
        &self.fields
    }

    /// Number of fields captured
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether no fields were captured
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// When the poll happened
    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    /// Declared schema fields this snapshot lacks
    pub fn missing_schema_fields(&self) -> Vec<&'static str> {
        STATUS_FIELDS
            .iter()
            .copied()
            .filter(|name| !self.fields.contains_key(*name))
            .collect()
    }

    /// Fields this snapshot carries that the schema does not declare
    pub fn undeclared_fields(&self) -> Vec<&str> {
        self.field_names()
            .filter(|name| !is_status_field(name))
            .collect()
    }

    fn int_field(&self, name: &str) -> Result<i64, ControllerError> {
        self.get(name)
            .and_then(FieldValue::as_int)
            .ok_or_else(|| ControllerError::MissingField {
                field: name.to_string(),
            })
    }

    /// Decoded `task_state`
    pub fn task_state(&self) -> Result<TaskState, ControllerError> {
        TaskState::from_code(self.int_field(TASK_STATE_FIELD)?)
    }

    /// Raw `estop` flag
    pub fn estop(&self) -> Result<i64, ControllerError> {
        self.int_field(ESTOP_FIELD)
    }

    /// Serial number of the last command the controller took, if reported
    pub fn echo_serial(&self) -> Option<i64> {
        self.get(ECHO_SERIAL_FIELD).and_then(FieldValue::as_int)
    }

    /// Active G-code identifiers, empty when the field is absent
    pub fn gcodes(&self) -> Vec<i64> {
        self.code_list(GCODES_FIELD)
    }

    /// Active M-code identifiers, empty when the field is absent
    pub fn mcodes(&self) -> Vec<i64> {
        self.code_list(MCODES_FIELD)
    }

    fn code_list(&self, name: &str) -> Vec<i64> {
        self.get(name)
            .and_then(FieldValue::as_tuple)
            .map(|items| items.iter().filter_map(FieldValue::as_int).collect())
            .unwrap_or_default()
    }
}

impl PartialEq for StatusSnapshot {
    fn eq(&self, other: &Self) -> bool {
        self.fields == other.fields
    }
}
