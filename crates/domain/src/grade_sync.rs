use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use crate::DomainResult;
use crate::error::DomainError;
use crate::members::Grade;
use crate::util::now_ms;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "GradeChangeRecord")]
pub struct GradeChangeEvent {
    member_id: String,
    old_grade: Option<Grade>,
    new_grade: Option<Grade>,
    queued_at_ms: i64,
}

#[derive(Deserialize)]
struct GradeChangeRecord {
    member_id: String,
    old_grade: Option<Grade>,
    new_grade: Option<Grade>,
    queued_at_ms: i64,
}

impl TryFrom<GradeChangeRecord> for GradeChangeEvent {
    type Error = DomainError;

    fn try_from(record: GradeChangeRecord) -> Result<Self, Self::Error> {
        let mut event = Self::new(record.member_id, record.old_grade, record.new_grade)?;
        event.queued_at_ms = record.queued_at_ms;
        Ok(event)
    }
}

impl GradeChangeEvent {
    pub fn new(
        member_id: impl Into<String>,
        old_grade: Option<Grade>,
        new_grade: Option<Grade>,
    ) -> DomainResult<Self> {
        let member_id = member_id.into();
        let member_id = member_id.trim();
        if member_id.is_empty() {
            return Err(DomainError::Validation("member_id is required".into()));
        }
        Ok(Self {
            member_id: member_id.to_string(),
            old_grade,
            new_grade,
            queued_at_ms: now_ms(),
        })
    }

    pub fn member_id(&self) -> &str {
        &self.member_id
    }

    pub fn old_grade(&self) -> Option<Grade> {
        self.old_grade
    }

    pub fn new_grade(&self) -> Option<Grade> {
        self.new_grade
    }

    pub fn queued_at_ms(&self) -> i64 {
        self.queued_at_ms
    }
}

#[derive(Default)]
struct QueueState {
    pending: VecDeque<GradeChangeEvent>,
    in_flight: HashSet<String>,
}

#[derive(Default)]
pub struct GradeChangeQueue {
    state: Mutex<QueueState>,
}

impl GradeChangeQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns `false` when an event for the same member is already pending.
    /// The newer event is dropped in that case.
    pub fn try_enqueue(&self, event: GradeChangeEvent) -> bool {
        let mut state = self.lock();
        if !state.in_flight.insert(event.member_id.clone()) {
            return false;
        }
        state.pending.push_back(event);
        true
    }

    pub fn dequeue_all(&self, max_items: usize) -> Vec<GradeChangeEvent> {
        let mut state = self.lock();
        let take = max_items.min(state.pending.len());
        let mut drained = Vec::with_capacity(take);
        for _ in 0..take {
            let Some(event) = state.pending.pop_front() else {
                break;
            };
            state.in_flight.remove(&event.member_id);
            drained.push(event);
        }
        drained
    }

    pub fn count(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn event(member_id: &str, old: Option<u16>, new: Option<u16>) -> GradeChangeEvent {
        GradeChangeEvent::new(member_id, old.map(Grade), new.map(Grade)).expect("valid event")
    }

    #[test]
    fn event_rejects_blank_member_id() {
        let result = GradeChangeEvent::new("   ", None, Some(Grade(3)));
        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[test]
    fn decoded_event_goes_through_validation() {
        let blank = serde_json::json!({
            "member_id": " ",
            "old_grade": null,
            "new_grade": 4,
            "queued_at_ms": 1_700_000_000_000_i64
        });
        assert!(serde_json::from_value::<GradeChangeEvent>(blank).is_err());

        let valid = serde_json::json!({
            "member_id": " m1 ",
            "old_grade": 3,
            "new_grade": 4,
            "queued_at_ms": 1_700_000_000_000_i64
        });
        let event: GradeChangeEvent = serde_json::from_value(valid).expect("decode");
        assert_eq!(event.member_id(), "m1");
        assert_eq!(event.new_grade(), Some(Grade(4)));
        assert_eq!(event.queued_at_ms(), 1_700_000_000_000);
    }

    #[test]
    fn event_trims_member_id() {
        let event = event("  member-a ", None, Some(3));
        assert_eq!(event.member_id(), "member-a");
        assert!(event.queued_at_ms() > 0);
    }

    #[test]
    fn duplicate_member_is_rejected_until_dequeued() {
        let queue = GradeChangeQueue::new();
        assert!(queue.try_enqueue(event("a", Some(1), Some(2))));
        assert!(!queue.try_enqueue(event("a", Some(2), Some(3))));
        assert_eq!(queue.count(), 1);

        let drained = queue.dequeue_all(10);
        assert_eq!(drained.len(), 1);
        assert!(queue.try_enqueue(event("a", Some(2), Some(3))));
    }

    #[test]
    fn dedup_is_by_member_only() {
        let queue = GradeChangeQueue::new();
        assert!(queue.try_enqueue(event("a", Some(1), Some(2))));
        assert!(!queue.try_enqueue(event("a", Some(1), Some(2))));
        assert!(!queue.try_enqueue(event("a", None, None)));
        assert!(queue.try_enqueue(event("b", Some(1), Some(2))));
        assert_eq!(queue.count(), 2);
    }

    #[test]
    fn dequeue_preserves_enqueue_order() {
        let queue = GradeChangeQueue::new();
        for member in ["m1", "m2", "m3"] {
            assert!(queue.try_enqueue(event(member, None, Some(1))));
        }
        let ids: Vec<_> = queue
            .dequeue_all(3)
            .into_iter()
            .map(|event| event.member_id().to_string())
            .collect();
        assert_eq!(ids, vec!["m1", "m2", "m3"]);
    }

    #[test]
    fn dequeue_respects_batch_bound() {
        let queue = GradeChangeQueue::new();
        for member in ["m1", "m2", "m3"] {
            queue.try_enqueue(event(member, None, Some(1)));
        }
        assert_eq!(queue.dequeue_all(2).len(), 2);
        assert_eq!(queue.count(), 1);
        assert!(!queue.try_enqueue(event("m3", None, Some(2))));
        assert!(queue.try_enqueue(event("m1", None, Some(2))));
    }

    #[test]
    fn dequeue_on_empty_queue_returns_nothing() {
        let queue = GradeChangeQueue::new();
        assert!(queue.dequeue_all(5).is_empty());
        assert!(queue.dequeue_all(0).is_empty());
        assert!(queue.is_empty());
    }

    #[test]
    fn concurrent_producers_never_duplicate_a_member() {
        let queue = Arc::new(GradeChangeQueue::new());
        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let queue = queue.clone();
                std::thread::spawn(move || {
                    let mut accepted = 0usize;
                    for n in 0..100u16 {
                        let member = format!("member-{n}");
                        if queue.try_enqueue(event(&member, None, Some(worker))) {
                            accepted += 1;
                        }
                    }
                    accepted
                })
            })
            .collect();

        let accepted: usize = handles
            .into_iter()
            .map(|handle| handle.join().expect("producer thread"))
            .sum();
        assert_eq!(accepted, 100);
        assert_eq!(queue.count(), 100);

        let mut ids: Vec<_> = queue
            .dequeue_all(usize::MAX)
            .into_iter()
            .map(|event| event.member_id().to_string())
            .collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 100);
    }
}
