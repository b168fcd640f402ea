// tests/coordinators.rs

use std::collections::BTreeSet;

use taskqueue::engine::{ExclusionCoordinator, VitalBarrier};
use taskqueue::task::Task;
use taskqueue::types::TaskId;

fn categories(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|n| n.to_string()).collect()
}

fn ids(n: usize) -> Vec<TaskId> {
    (0..n).map(|_| Task::from_fn(|| {}).id()).collect()
}

#[test]
fn empty_category_set_always_acquires() {
    let mut exclusion = ExclusionCoordinator::new();
    let id = ids(1)[0];
    assert!(exclusion.try_acquire(&BTreeSet::new(), id, &[]));
}

#[test]
fn slot_goes_to_lowest_sequence_number_first() {
    let mut exclusion = ExclusionCoordinator::new();
    let gpu = categories(&["gpu"]);
    let t = ids(3);

    // Registered out of order: t[2] (seq 2) before t[1] (seq 1).
    exclusion.register(&gpu, t[0], (0, 0));
    exclusion.register(&gpu, t[2], (2, 2));
    exclusion.register(&gpu, t[1], (1, 1));

    assert!(!exclusion.try_acquire(&gpu, t[1], &[]));
    assert!(exclusion.try_acquire(&gpu, t[0], &[]));
    assert!(!exclusion.try_acquire(&gpu, t[1], &[]), "slot is held");

    assert_eq!(exclusion.release(&gpu, t[0]), vec![t[1]]);
    assert!(!exclusion.try_acquire(&gpu, t[2], &[]));
    assert!(exclusion.try_acquire(&gpu, t[1], &[]));
    assert_eq!(exclusion.release(&gpu, t[1]), vec![t[2]]);
}

#[test]
fn inherited_barrier_position_goes_ahead_of_later_sequence() {
    let mut exclusion = ExclusionCoordinator::new();
    let x = categories(&["x"]);
    let t = ids(2);

    // t[0] was enqueued first but sits behind a vital task at position 0;
    // t[1] was produced by that vital task and shares its position.
    exclusion.register(&x, t[0], (1, 1));
    exclusion.register(&x, t[1], (0, 2));

    assert!(!exclusion.try_acquire(&x, t[0], &[]));
    assert!(exclusion.try_acquire(&x, t[1], &[]));
    assert_eq!(exclusion.release(&x, t[1]), vec![t[0]]);
}

#[test]
fn lent_slot_only_goes_to_produced_tasks() {
    let mut exclusion = ExclusionCoordinator::new();
    let x = categories(&["x"]);
    let t = ids(3);
    let (producer, other, child) = (t[0], t[1], t[2]);

    exclusion.register(&x, producer, (0, 0));
    assert!(exclusion.try_acquire(&x, producer, &[]));
    exclusion.register(&x, other, (1, 1));
    exclusion.register(&x, child, (0, 2));

    exclusion.lend(&x, producer);
    assert_eq!(exclusion.holder_of("x"), None);
    assert_eq!(exclusion.lent_by("x"), Some(producer));
    assert!(!exclusion.try_acquire(&x, other, &[]));
    assert!(exclusion.try_acquire(&x, child, &[producer]));

    assert!(exclusion.release(&x, child).is_empty(), "still lent");
    assert!(!exclusion.try_acquire(&x, other, &[]));
    assert_eq!(exclusion.release(&x, producer), vec![other]);
    assert!(exclusion.try_acquire(&x, other, &[]));
}

#[test]
fn multi_category_acquisition_is_all_or_nothing() {
    let mut exclusion = ExclusionCoordinator::new();
    let both = categories(&["a", "b"]);
    let only_b = categories(&["b"]);
    let t = ids(3);

    exclusion.register(&only_b, t[0], (0, 0));
    exclusion.register(&both, t[1], (1, 1));
    assert!(exclusion.try_acquire(&only_b, t[0], &[]));

    assert!(!exclusion.try_acquire(&both, t[1], &[]));
    assert_eq!(exclusion.holder_of("a"), None, "nothing taken on failure");
    assert!(exclusion.is_waiting("a", t[1]));

    exclusion.release(&only_b, t[0]);
    assert!(exclusion.try_acquire(&both, t[1], &[]));
    assert_eq!(exclusion.holder_of("a"), Some(t[1]));
    assert_eq!(exclusion.holder_of("b"), Some(t[1]));
}

#[test]
fn releasing_a_waiter_removes_it_from_line() {
    let mut exclusion = ExclusionCoordinator::new();
    let gpu = categories(&["gpu"]);
    let t = ids(3);

    exclusion.register(&gpu, t[0], (0, 0));
    exclusion.register(&gpu, t[1], (1, 1));
    exclusion.register(&gpu, t[2], (2, 2));
    assert!(exclusion.try_acquire(&gpu, t[0], &[]));

    exclusion.release(&gpu, t[1]);
    assert_eq!(exclusion.waiting_in("gpu"), 1);
    assert_eq!(exclusion.release(&gpu, t[0]), vec![t[2]]);

    exclusion.release(&gpu, t[2]);
    assert_eq!(exclusion.waiting_in("gpu"), 0);
    assert_eq!(exclusion.holder_of("gpu"), None);
}

#[test]
fn registering_twice_keeps_one_place_in_line() {
    let mut exclusion = ExclusionCoordinator::new();
    let gpu = categories(&["gpu"]);
    let t = ids(1);

    exclusion.register(&gpu, t[0], (0, 0));
    exclusion.register(&gpu, t[0], (0, 0));
    assert_eq!(exclusion.waiting_in("gpu"), 1);
}

#[test]
fn vital_barrier_blocks_positions_after_unfinished_vital_tasks() {
    let mut barrier = VitalBarrier::new();
    barrier.register(2);
    barrier.register(5);

    assert!(barrier.is_clear_for(0));
    assert!(barrier.is_clear_for(2), "a vital task does not block itself");
    assert_eq!(barrier.blocker_for(3), Some(2));
    assert_eq!(barrier.blocker_for(9), Some(2));

    assert!(barrier.finish(2));
    assert!(!barrier.finish(2));
    assert!(barrier.is_clear_for(5));
    assert_eq!(barrier.blocker_for(6), Some(5));

    barrier.finish(5);
    assert_eq!(barrier.unfinished(), 0);
    assert!(barrier.is_clear_for(u64::MAX));
}
