use lcnckit_core::{FieldValue, StatusDiffer, StatusSnapshot, TaskState, VerificationError};
use lcnckit_harness::TransitionExpectation;
use proptest::prelude::*;

fn snapshot(changed: usize, offset: i64) -> StatusSnapshot {
    let mut snap = StatusSnapshot::from_fields([
        ("task_state", FieldValue::Int(TaskState::On.code())),
        ("estop", FieldValue::Int(0)),
    ]);
    for i in 0..changed {
        snap = snap.with_field(format!("counter_{}", i), offset);
    }
    snap
}

proptest! {
    #[test]
    fn modified_count_checked_exactly(actual in 0usize..12, expected in 0usize..12) {
        let before = snapshot(actual, 0);
        let after = snapshot(actual, 1);
        let diff = StatusDiffer::diff(&before, &after);
        let expectation = TransitionExpectation::new(TaskState::On, expected, TaskState::On, 0);

        let failures = expectation.check(&diff, &after);
        if actual == expected {
            prop_assert!(failures.is_empty());
        } else {
            prop_assert_eq!(failures.len(), 1);
            match &failures[0] {
                VerificationError::CountMismatch { partition, fields, .. } => {
                    prop_assert_eq!(partition.as_str(), "modified");
                    prop_assert_eq!(fields.len(), actual);
                }
                other => prop_assert!(false, "unexpected failure {:?}", other),
            }
        }
    }

    #[test]
    fn estop_checked_independently_of_counts(estop in 0i64..2, expected in 0i64..2) {
        let before = snapshot(0, 0);
        let after = before.with_field("estop", estop);
        let diff = StatusDiffer::diff(&before, &after);
        let modified = usize::from(estop != 0);
        let expectation = TransitionExpectation::new(TaskState::On, modified, TaskState::On, expected);

        let failures = expectation.check(&diff, &after);
        prop_assert_eq!(failures.is_empty(), estop == expected);
    }
}
