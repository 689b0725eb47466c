use lcnckit_core::{FieldValue, StatusDiffer, StatusSnapshot};
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

fn field_value() -> impl Strategy<Value = FieldValue> {
    prop_oneof![
        any::<bool>().prop_map(FieldValue::Bool),
        (-3i64..3).prop_map(FieldValue::Int),
        prop::collection::vec(-2i64..2, 0..3).prop_map(|v| FieldValue::int_tuple(&v)),
    ]
}

fn snapshot() -> impl Strategy<Value = StatusSnapshot> {
    prop::collection::btree_map("[a-f]{1,2}", field_value(), 0..12).prop_map(StatusSnapshot::new)
}

proptest! {
    #[test]
    fn partitions_are_disjoint(before in snapshot(), after in snapshot()) {
        let diff = StatusDiffer::diff(&before, &after);
        let modified: BTreeSet<String> = diff.modified.keys().cloned().collect();

        prop_assert!(diff.added.is_disjoint(&diff.removed));
        prop_assert!(diff.added.is_disjoint(&modified));
        prop_assert!(diff.added.is_disjoint(&diff.unchanged));
        prop_assert!(diff.removed.is_disjoint(&modified));
        prop_assert!(diff.removed.is_disjoint(&diff.unchanged));
        prop_assert!(modified.is_disjoint(&diff.unchanged));
    }

    #[test]
    fn partitions_cover_both_key_sets(before in snapshot(), after in snapshot()) {
        let diff = StatusDiffer::diff(&before, &after);
        let expected: BTreeSet<String> = before
            .field_names()
            .chain(after.field_names())
            .map(str::to_string)
            .collect();
        prop_assert_eq!(diff.all_fields(), expected);
    }

    #[test]
    fn diff_against_self_is_identical(snap in snapshot()) {
        let diff = StatusDiffer::diff(&snap, &snap.clone());
        prop_assert!(diff.is_identical());
        prop_assert_eq!(diff.unchanged.len(), snap.len());
    }

    #[test]
    fn swapping_inputs_swaps_added_and_removed(before in snapshot(), after in snapshot()) {
        let forward = StatusDiffer::diff(&before, &after);
        let backward = StatusDiffer::diff(&after, &before);
        prop_assert_eq!(&forward.added, &backward.removed);
        prop_assert_eq!(&forward.removed, &backward.added);
        prop_assert_eq!(forward.modified.len(), backward.modified.len());
    }
}

#[test]
fn diff_leaves_inputs_untouched() {
    let before = StatusSnapshot::from_fields([("estop", FieldValue::Int(1))]);
    let after = StatusSnapshot::from_fields([("estop", FieldValue::Int(0))]);
    let before_copy: BTreeMap<String, FieldValue> = before.fields().clone();

    let _ = StatusDiffer::diff(&before, &after);

    assert_eq!(before.fields(), &before_copy);
    assert_eq!(after.get("estop"), Some(&FieldValue::Int(0)));
}
