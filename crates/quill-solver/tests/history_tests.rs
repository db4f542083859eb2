use super::*;
use crate::fixtures::fixture;

#[test]
fn history_records_and_retrieves_facts() {
    let f = fixture();
    let a = f.string(&[f.nonnull]);
    let b = f.string(&[f.nullable]);

    let mut history = VisitHistory::new();
    assert_eq!(history.get(&a, &b, f.nullable), None);

    history.add(&a, &b, f.nullable, true);
    assert_eq!(history.get(&a, &b, f.nullable), Some(true));
    assert!(history.contains_true(&a, &b, f.nullable));

    // The ordered pair matters.
    assert_eq!(history.get(&b, &a, f.nullable), None);
    // So does the hierarchy top.
    assert_eq!(history.get(&a, &b, f.tainted), None);
}

#[test]
fn negative_facts_can_be_stored_and_overwritten() {
    let f = fixture();
    let a = f.string(&[f.nonnull]);
    let b = f.string(&[f.nullable]);

    let mut history = VisitHistory::new();
    history.add(&a, &b, f.nullable, false);
    assert_eq!(history.get(&a, &b, f.nullable), Some(false));
    assert!(!history.contains_true(&a, &b, f.nullable));

    history.add(&a, &b, f.nullable, true);
    assert_eq!(history.get(&a, &b, f.nullable), Some(true));
}

#[test]
fn add_if_true_forgets_negative_results() {
    let f = fixture();
    let a = f.string(&[f.nonnull]);
    let b = f.string(&[f.nullable]);

    let mut history = VisitHistory::new();
    history.add_if_true(&a, &b, f.nullable, false);
    assert_eq!(history.get(&a, &b, f.nullable), None);

    history.add_if_true(&a, &b, f.nullable, true);
    assert_eq!(history.get(&a, &b, f.nullable), Some(true));
}

#[test]
fn clear_discards_everything() {
    let f = fixture();
    let a = f.string(&[]);
    let mut history = VisitHistory::new();
    history.add(&a, &a, f.nullable, true);
    assert_eq!(history.len(), 1);
    history.clear();
    assert!(history.is_empty());
}

#[test]
fn depth_counter_enter_leave() {
    let mut counter = DepthCounter::new(2);
    assert!(counter.enter());
    assert!(counter.enter());
    assert_eq!(counter.depth(), 2);
    assert!(!counter.enter());
    assert!(counter.is_exceeded());

    counter.leave();
    counter.leave();
    assert_eq!(counter.depth(), 0);
    // Sticky until reset.
    assert!(counter.is_exceeded());
    counter.reset();
    assert!(!counter.is_exceeded());
}

#[cfg(debug_assertions)]
#[test]
#[should_panic(expected = "depth 0")]
fn depth_counter_detects_unbalanced_leave() {
    let mut counter = DepthCounter::new(2);
    counter.leave();
}
