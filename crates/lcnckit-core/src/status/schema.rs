//! Declared status schema
//!
//! The controller's status object exposes a flat set of named fields. Rather
//! than discovering them at runtime, the harness declares the documented
//! schema here so snapshots are checkable and diffs stay meaningful across
//! controller versions.

/// Every field the controller's status interface documents, sorted.
///
/// The poll operation itself is not a field.
pub const STATUS_FIELDS: &[&str] = &[
    "acceleration",
    "active_queue",
    "actual_position",
    "adaptive_feed_enabled",
    "ain",
    "angular_units",
    "aout",
    "axes",
    "axis",
    "axis_mask",
    "block_delete",
    "call_level",
    "command",
    "current_line",
    "current_vel",
    "cycle_time",
    "debug",
    "delay_left",
    "din",
    "distance_to_go",
    "dout",
    "dtg",
    "echo_serial_number",
    "enabled",
    "estop",
    "exec_state",
    "feed_hold_enabled",
    "feed_override_enabled",
    "feedrate",
    "file",
    "flood",
    "g5x_index",
    "g5x_offset",
    "g92_offset",
    "gcodes",
    "homed",
    "id",
    "ini_filename",
    "inpos",
    "input_timeout",
    "interp_state",
    "interpreter_errcode",
    "joint",
    "joint_actual_position",
    "joint_position",
    "joints",
    "kinematics_type",
    "limit",
    "linear_units",
    "lube",
    "lube_level",
    "max_acceleration",
    "max_velocity",
    "mcodes",
    "misc_error",
    "mist",
    "motion_line",
    "motion_mode",
    "motion_type",
    "num_extrajoints",
    "optional_stop",
    "paused",
    "pocket_prepped",
    "position",
    "probe_tripped",
    "probe_val",
    "probed_position",
    "probing",
    "program_units",
    "queue",
    "queue_full",
    "queued_mdi_commands",
    "rapidrate",
    "read_line",
    "rotation_xy",
    "settings",
    "spindle",
    "spindles",
    "state",
    "task_mode",
    "task_paused",
    "task_state",
    "tool_from_pocket",
    "tool_in_spindle",
    "tool_offset",
    "tool_table",
    "velocity",
];

/// Shared-field floor for the reference controller build.
///
/// Two consecutive polls must share at least this many identical fields.
pub const MIN_SHARED_FIELDS: usize = 86;

/// Field holding the machine's task state code
pub const TASK_STATE_FIELD: &str = "task_state";

/// Field holding the estop flag
pub const ESTOP_FIELD: &str = "estop";

/// Field echoing the serial number of the last command the controller took
pub const ECHO_SERIAL_FIELD: &str = "echo_serial_number";

/// Field holding the active G-code identifiers
pub const GCODES_FIELD: &str = "gcodes";

/// Field holding the active M-code identifiers
pub const MCODES_FIELD: &str = "mcodes";

/// Check whether a name is part of the declared schema
pub fn is_status_field(name: &str) -> bool {
    STATUS_FIELDS.binary_search(&name).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_sorted_and_unique() {
        for pair in STATUS_FIELDS.windows(2) {
            assert!(pair[0] < pair[1], "{} !< {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_schema_covers_minimum() {
        assert!(STATUS_FIELDS.len() >= MIN_SHARED_FIELDS);
        assert!(!STATUS_FIELDS.contains(&"poll"));
    }

    #[test]
    fn test_is_status_field() {
        assert!(is_status_field(TASK_STATE_FIELD));
        assert!(is_status_field(ESTOP_FIELD));
        assert!(is_status_field(GCODES_FIELD));
        assert!(!is_status_field("poll"));
    }
}
