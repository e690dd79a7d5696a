use std::sync::Arc;

use crate::DomainResult;
use crate::grade_sync::{GradeChangeEvent, GradeChangeQueue};
use crate::members::Grade;
use crate::ports::achievements::ReconciliationStore;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReconcileOutcome {
    MemberNotFound,
    NoGrade,
    UpToDate { grade: Grade },
    Assigned { grade: Grade, inserted: usize },
}

impl ReconcileOutcome {
    pub fn inserted(&self) -> usize {
        match self {
            Self::Assigned { inserted, .. } => *inserted,
            _ => 0,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AuditSummary {
    pub scanned: usize,
    pub drifted: usize,
    pub enqueued: usize,
}

#[derive(Clone)]
pub struct AchievementReconciler {
    store: Arc<dyn ReconciliationStore>,
}

impl AchievementReconciler {
    pub fn new(store: Arc<dyn ReconciliationStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn ReconciliationStore> {
        &self.store
    }

    pub async fn reconcile_member(&self, member_id: &str) -> DomainResult<ReconcileOutcome> {
        let Some(member) = self.store.find_member(member_id).await? else {
            tracing::warn!(member_id, "member not found, discarding grade sync");
            return Ok(ReconcileOutcome::MemberNotFound);
        };
        let Some(grade) = member.grade else {
            tracing::warn!(member_id, "member has no grade, nothing to sync");
            return Ok(ReconcileOutcome::NoGrade);
        };

        let assigned = self.store.assigned_achievement_ids(member_id).await?;
        let catalog = self.store.achievement_ids_for_grade(grade).await?;

        let mut missing: Vec<String> = catalog.difference(&assigned).cloned().collect();
        if missing.is_empty() {
            tracing::debug!(member_id, %grade, "achievements already aligned");
            return Ok(ReconcileOutcome::UpToDate { grade });
        }
        missing.sort();

        self.store.insert_assignments(member_id, &missing).await?;
        tracing::info!(
            member_id,
            %grade,
            inserted = missing.len(),
            "assigned missing achievements"
        );
        Ok(ReconcileOutcome::Assigned {
            grade,
            inserted: missing.len(),
        })
    }

    /// Scans for members whose assignments do not cover their current grade
    /// and queues a grade change for each. A failed candidate load aborts the
    /// whole audit; individual duplicates are simply not counted.
    pub async fn audit(&self, queue: &GradeChangeQueue) -> DomainResult<AuditSummary> {
        let candidates = self.store.audit_candidates().await?;
        let mut summary = AuditSummary {
            scanned: candidates.len(),
            ..AuditSummary::default()
        };

        for candidate in candidates.into_iter().filter(|row| row.is_drifted()) {
            summary.drifted += 1;
            let event = match GradeChangeEvent::new(
                candidate.member_id.as_str(),
                candidate.first_observed_grade(),
                Some(candidate.grade),
            ) {
                Ok(event) => event,
                Err(err) => {
                    tracing::warn!(error = %err, "skipping malformed audit candidate");
                    continue;
                }
            };
            if queue.try_enqueue(event) {
                summary.enqueued += 1;
            }
        }

        Ok(summary)
    }
}
