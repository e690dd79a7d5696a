use std::collections::HashSet;

use crate::DomainResult;
use crate::members::{AuditCandidate, Grade, MemberSnapshot};
use crate::ports::BoxFuture;

/// Narrow view of the member/achievement store used by the sync engine.
///
/// Every call is its own short-lived scope; implementations must not share a
/// transaction or session between concurrent callers.
pub trait ReconciliationStore: Send + Sync {
    fn find_member(&self, member_id: &str) -> BoxFuture<'_, DomainResult<Option<MemberSnapshot>>>;

    fn achievement_ids_for_grade(&self, grade: Grade)
    -> BoxFuture<'_, DomainResult<HashSet<String>>>;

    fn assigned_achievement_ids(&self, member_id: &str)
    -> BoxFuture<'_, DomainResult<HashSet<String>>>;

    /// Inserts one "assigned, not achieved" record per id inside a single
    /// transaction. Either every record is written or none is.
    fn insert_assignments(
        &self,
        member_id: &str,
        achievement_ids: &[String],
    ) -> BoxFuture<'_, DomainResult<()>>;

    /// Active members with a grade, each with the distinct grades found among
    /// their assigned achievements. Only the startup audit calls this.
    fn audit_candidates(&self) -> BoxFuture<'_, DomainResult<Vec<AuditCandidate>>>;
}
