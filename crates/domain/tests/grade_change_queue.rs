use clubhouse_domain::grade_sync::{GradeChangeEvent, GradeChangeQueue};
use clubhouse_domain::members::Grade;

fn event(member_id: &str, old: u16, new: u16) -> GradeChangeEvent {
    GradeChangeEvent::new(member_id, Some(Grade(old)), Some(Grade(new))).expect("valid event")
}

#[test]
fn pending_grade_change_coalesces_until_drained() {
    let queue = GradeChangeQueue::new();
    assert_eq!(queue.count(), 0);

    assert!(queue.try_enqueue(event("A", 5, 6)));
    assert_eq!(queue.count(), 1);

    assert!(!queue.try_enqueue(event("A", 6, 7)));
    assert_eq!(queue.count(), 1);

    let drained = queue.dequeue_all(10);
    assert_eq!(drained.len(), 1);
    assert_eq!(drained[0].member_id(), "A");
    assert_eq!(drained[0].old_grade(), Some(Grade(5)));
    assert_eq!(drained[0].new_grade(), Some(Grade(6)));
    assert_eq!(queue.count(), 0);

    assert!(queue.try_enqueue(event("A", 6, 7)));
}

#[test]
fn drained_batches_follow_enqueue_order_across_calls() {
    let queue = GradeChangeQueue::new();
    for (index, member) in ["m1", "m2", "m3", "m4", "m5"].iter().enumerate() {
        let grade = index as u16;
        assert!(queue.try_enqueue(event(member, grade, grade + 1)));
    }

    let first: Vec<_> = queue
        .dequeue_all(2)
        .iter()
        .map(|event| event.member_id().to_string())
        .collect();
    let second: Vec<_> = queue
        .dequeue_all(2)
        .iter()
        .map(|event| event.member_id().to_string())
        .collect();
    let rest: Vec<_> = queue
        .dequeue_all(2)
        .iter()
        .map(|event| event.member_id().to_string())
        .collect();

    assert_eq!(first, vec!["m1", "m2"]);
    assert_eq!(second, vec!["m3", "m4"]);
    assert_eq!(rest, vec!["m5"]);
    assert!(queue.is_empty());
}
