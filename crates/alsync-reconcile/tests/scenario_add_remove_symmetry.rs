//! Scenario: add / remove symmetry
//!
//! unknown -> known -> unknown produces exactly one add followed by exactly
//! one remove, and the id can be re-added afterwards. Removing an id that was
//! never known is silent.

use alsync_reconcile::*;
use alsync_testkit::{alarm, deleted, RecordingScheduler, SchedulerCall};

#[test]
fn add_then_remove_in_order() {
    let sched = RecordingScheduler::new();
    let mut rec = Reconciler::new(sched.clone());

    rec.apply_snapshot(Some(&[alarm("x", "2030-01-01T10:00:00Z")]))
        .unwrap();
    rec.apply_snapshot(Some(&[deleted("x")])).unwrap();

    assert!(!rec.registry().contains("x"));
    assert_eq!(
        sched.calls(),
        vec![
            SchedulerCall::add("x", 1_893_492_000),
            SchedulerCall::remove("x"),
        ]
    );
}

#[test]
fn add_and_remove_within_one_snapshot_keep_record_order() {
    let sched = RecordingScheduler::new();
    let mut rec = Reconciler::new(sched.clone());

    let snapshot = vec![alarm("x", "2030-01-01T10:00:00Z"), deleted("x")];
    let report = rec.apply_snapshot(Some(&snapshot)).unwrap();

    assert_eq!(report.added_ids(), vec!["x"]);
    assert_eq!(report.removed_ids(), vec!["x"]);
    assert_eq!(
        sched.calls(),
        vec![
            SchedulerCall::add("x", 1_893_492_000),
            SchedulerCall::remove("x"),
        ]
    );
    assert!(rec.registry().is_empty());
}

#[test]
fn removed_id_can_be_added_again() {
    let sched = RecordingScheduler::new();
    let mut rec = Reconciler::new(sched.clone());

    rec.apply_snapshot(Some(&[alarm("x", "2030-01-01T10:00:00Z")]))
        .unwrap();
    rec.apply_snapshot(Some(&[deleted("x")])).unwrap();
    rec.apply_snapshot(Some(&[alarm("x", "2030-01-01T11:00:00Z")]))
        .unwrap();

    assert_eq!(rec.registry().ids(), &["x"]);
    assert_eq!(sched.adds().len(), 2);
    assert_eq!(sched.removes(), vec!["x".to_string()]);
}

#[test]
fn removing_unknown_id_is_silent() {
    let sched = RecordingScheduler::new();
    let mut rec = Reconciler::new(sched.clone());

    let t = rec.process_record(&deleted("ghost")).unwrap();

    assert_eq!(
        t,
        Transition::NotKnown {
            id: "ghost".to_string()
        }
    );
    assert!(sched.calls().is_empty());
    assert!(rec.registry().is_empty());
}
