//! Status diffing
//!
//! Compares two status snapshots and partitions their fields into added,
//! removed, modified and unchanged sets. Verifying a commanded transition
//! checks the *shape* of the change (how many fields moved) as well as the
//! end state, which catches side effects a state check alone would miss.

use crate::error::VerificationError;
use crate::status::{FieldValue, StatusSnapshot};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Old and new value of a modified field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    /// Value before the transition
    pub before: FieldValue,
    /// Value after the transition
    pub after: FieldValue,
}

/// Field-set difference between two snapshots
///
/// The four partitions are disjoint and together cover every field name that
/// appears in either snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusDiff {
    /// Fields present only in the later snapshot
    pub added: BTreeSet<String>,
    /// Fields present only in the earlier snapshot
    pub removed: BTreeSet<String>,
    /// Fields present in both whose values differ
    pub modified: BTreeMap<String, FieldChange>,
    /// Fields present in both with equal values
    pub unchanged: BTreeSet<String>,
}

impl StatusDiff {
    /// Whether nothing was added, removed or modified
    pub fn is_identical(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }

    /// (added, removed, modified) cardinalities
    pub fn counts(&self) -> (usize, usize, usize) {
        (self.added.len(), self.removed.len(), self.modified.len())
    }

    /// Number of fields present in both snapshots
    pub fn shared_count(&self) -> usize {
        self.modified.len() + self.unchanged.len()
    }

    /// Names of the modified fields, sorted
    pub fn modified_names(&self) -> Vec<String> {
        self.modified.keys().cloned().collect()
    }

    /// Every field name covered by the diff
    pub fn all_fields(&self) -> BTreeSet<String> {
        self.added
            .iter()
            .chain(self.removed.iter())
            .chain(self.modified.keys())
            .chain(self.unchanged.iter())
            .cloned()
            .collect()
    }

    /// Assert the diff of two back-to-back polls shows a stable controller
    ///
    /// No field may appear, disappear or change, and at least `min_shared`
    /// fields must be present in both polls.
    pub fn ensure_consistent(&self, min_shared: usize) -> Result<(), VerificationError> {
        check_count("added", 0, &self.added)?;
        check_count("removed", 0, &self.removed)?;
        check_count("modified", 0, self.modified.keys())?;
        if self.unchanged.len() < min_shared {
            return Err(VerificationError::InsufficientFields {
                minimum: min_shared,
                actual: self.unchanged.len(),
            });
        }
        Ok(())
    }
}

/// Compare a partition's size against an expectation
pub fn check_count<'a, I>(
    partition: &str,
    expected: usize,
    fields: I,
) -> Result<(), VerificationError>
where
    I: IntoIterator<Item = &'a String>,
{
    let fields: Vec<String> = fields.into_iter().cloned().collect();
    if fields.len() == expected {
        return Ok(());
    }
    Err(VerificationError::CountMismatch {
        partition: partition.to_string(),
        expected,
        actual: fields.len(),
        fields,
    })
}

impl fmt::Display for StatusDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (added, removed, modified) = self.counts();
        write!(
            f,
            "+{} -{} ~{} ={}",
            added,
            removed,
            modified,
            self.unchanged.len()
        )?;
        for (name, change) in &self.modified {
            write!(f, "\n  {}: {} -> {}", name, change.before, change.after)?;
        }
        for name in &self.added {
            write!(f, "\n  + {}", name)?;
        }
        for name in &self.removed {
            write!(f, "\n  - {}", name)?;
        }
        Ok(())
    }
}

/// Computes `StatusDiff`s
///
/// Stateless; never touches its inputs.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusDiffer;

impl StatusDiffer {
    /// Diff `before` against `after`
    pub fn diff(before: &StatusSnapshot, after: &StatusSnapshot) -> StatusDiff {
        let old = before.fields();
        let new = after.fields();

        let mut diff = StatusDiff::default();

        for (name, old_value) in old {
            match new.get(name) {
                None => {
                    diff.removed.insert(name.clone());
                }
                Some(new_value) if new_value == old_value => {
                    diff.unchanged.insert(name.clone());
                }
                Some(new_value) => {
                    diff.modified.insert(
                        name.clone(),
                        FieldChange {
                            before: old_value.clone(),
                            after: new_value.clone(),
                        },
                    );
                }
            }
        }

        diff.added = new
            .keys()
            .filter(|name| !old.contains_key(*name))
            .cloned()
            .collect();

        diff
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(pairs: &[(&str, i64)]) -> StatusSnapshot {
        StatusSnapshot::from_fields(pairs.iter().map(|(k, v)| (*k, FieldValue::Int(*v))))
    }

    #[test]
    fn test_identical_snapshots() {
        let a = snap(&[("task_state", 2), ("estop", 0), ("echo_serial_number", 4)]);
        let diff = StatusDiffer::diff(&a, &a.clone());
        assert!(diff.is_identical());
        assert_eq!(diff.unchanged.len(), 3);
        assert!(diff.ensure_consistent(3).is_ok());
    }

    #[test]
    fn test_partitions() {
        let a = snap(&[("task_state", 2), ("estop", 0), ("gone", 1)]);
        let b = snap(&[("task_state", 1), ("estop", 0), ("new", 5)]);
        let diff = StatusDiffer::diff(&a, &b);

        assert_eq!(diff.counts(), (1, 1, 1));
        assert!(diff.added.contains("new"));
        assert!(diff.removed.contains("gone"));
        assert_eq!(
            diff.modified.get("task_state"),
            Some(&FieldChange {
                before: FieldValue::Int(2),
                after: FieldValue::Int(1),
            })
        );
        assert!(diff.unchanged.contains("estop"));
        assert_eq!(diff.shared_count(), 2);
        assert_eq!(diff.all_fields().len(), 4);
    }

    #[test]
    fn test_nested_values_compare_structurally() {
        let joint = |enabled: bool| {
            FieldValue::Tuple(vec![
                FieldValue::record([("enabled", FieldValue::Bool(enabled))]),
                FieldValue::record([("enabled", FieldValue::Bool(false))]),
            ])
        };
        let a = StatusSnapshot::from_fields([("joint", joint(false))]);
        let b = StatusSnapshot::from_fields([("joint", joint(false))]);
        let c = StatusSnapshot::from_fields([("joint", joint(true))]);

        assert!(StatusDiffer::diff(&a, &b).is_identical());
        assert_eq!(StatusDiffer::diff(&a, &c).modified_names(), vec!["joint"]);
    }

    #[test]
    fn test_consistency_rejects_changes() {
        let a = snap(&[("task_state", 2), ("estop", 0)]);
        let b = a.with_field("estop", 1);
        let err = StatusDiffer::diff(&a, &b).ensure_consistent(1).unwrap_err();
        assert_eq!(
            err,
            VerificationError::CountMismatch {
                partition: "modified".to_string(),
                expected: 0,
                actual: 1,
                fields: vec!["estop".to_string()],
            }
        );
    }

    #[test]
    fn test_consistency_rejects_thin_status() {
        let a = snap(&[("task_state", 2)]);
        let err = StatusDiffer::diff(&a, &a).ensure_consistent(86).unwrap_err();
        assert_eq!(
            err,
            VerificationError::InsufficientFields {
                minimum: 86,
                actual: 1
            }
        );
    }

    #[test]
    fn test_display_lists_changes() {
        let a = snap(&[("estop", 0)]);
        let b = snap(&[("estop", 1)]);
        let text = StatusDiffer::diff(&a, &b).to_string();
        assert_eq!(text, "+0 -0 ~1 =0\n  estop: 0 -> 1");
    }
}
