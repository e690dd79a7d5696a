use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use clubhouse_domain::DomainResult;
use clubhouse_domain::error::DomainError;
use clubhouse_domain::members::{AchievementAssignment, AuditCandidate, Grade, MemberSnapshot};
use clubhouse_domain::ports::BoxFuture;
use clubhouse_domain::ports::achievements::ReconciliationStore;
use clubhouse_domain::ports::health::StoreHealth;
use tokio::sync::RwLock;

/// Process-local member/achievement store.
///
/// Lock order is members, then catalog, then assignments.
#[derive(Default)]
pub struct InMemoryAchievementStore {
    members: Arc<RwLock<HashMap<String, MemberSnapshot>>>,
    catalog: Arc<RwLock<HashMap<String, Grade>>>,
    assignments: Arc<RwLock<HashMap<String, Vec<AchievementAssignment>>>>,
    failing_writes: Arc<RwLock<HashSet<String>>>,
}

impl InMemoryAchievementStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn upsert_member(&self, member: MemberSnapshot) {
        self.members
            .write()
            .await
            .insert(member.member_id.clone(), member);
    }

    pub async fn add_achievement(&self, achievement_id: impl Into<String>, grade: Grade) {
        self.catalog
            .write()
            .await
            .insert(achievement_id.into(), grade);
    }

    /// Seeds an assignment directly, bypassing reconciliation.
    pub async fn assign(&self, member_id: &str, achievement_id: &str) {
        self.assignments
            .write()
            .await
            .entry(member_id.to_string())
            .or_default()
            .push(AchievementAssignment::pending(member_id, achievement_id));
    }

    pub async fn assignments_for(&self, member_id: &str) -> Vec<AchievementAssignment> {
        self.assignments
            .read()
            .await
            .get(member_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Makes every subsequent insert for `member_id` fail before writing.
    pub async fn fail_writes_for(&self, member_id: &str) {
        self.failing_writes
            .write()
            .await
            .insert(member_id.to_string());
    }

    pub async fn clear_write_failures(&self) {
        self.failing_writes.write().await.clear();
    }
}

impl ReconciliationStore for InMemoryAchievementStore {
    fn find_member(&self, member_id: &str) -> BoxFuture<'_, DomainResult<Option<MemberSnapshot>>> {
        let member_id = member_id.to_string();
        let members = self.members.clone();
        Box::pin(async move { Ok(members.read().await.get(&member_id).cloned()) })
    }

    fn achievement_ids_for_grade(
        &self,
        grade: Grade,
    ) -> BoxFuture<'_, DomainResult<HashSet<String>>> {
        let catalog = self.catalog.clone();
        Box::pin(async move {
            Ok(catalog
                .read()
                .await
                .iter()
                .filter(|(_, achievement_grade)| **achievement_grade == grade)
                .map(|(achievement_id, _)| achievement_id.clone())
                .collect())
        })
    }

    fn assigned_achievement_ids(
        &self,
        member_id: &str,
    ) -> BoxFuture<'_, DomainResult<HashSet<String>>> {
        let member_id = member_id.to_string();
        let assignments = self.assignments.clone();
        Box::pin(async move {
            Ok(assignments
                .read()
                .await
                .get(&member_id)
                .map(|rows| rows.iter().map(|row| row.achievement_id.clone()).collect())
                .unwrap_or_default())
        })
    }

    fn insert_assignments(
        &self,
        member_id: &str,
        achievement_ids: &[String],
    ) -> BoxFuture<'_, DomainResult<()>> {
        let member_id = member_id.to_string();
        let achievement_ids = achievement_ids.to_vec();
        let members = self.members.clone();
        let catalog = self.catalog.clone();
        let assignments = self.assignments.clone();
        let failing_writes = self.failing_writes.clone();
        Box::pin(async move {
            if failing_writes.read().await.contains(&member_id) {
                return Err(DomainError::Storage(format!(
                    "write rejected for member {member_id}"
                )));
            }
            if !members.read().await.contains_key(&member_id) {
                return Err(DomainError::Validation(format!("unknown member {member_id}")));
            }

            let catalog = catalog.read().await;
            let mut assignments = assignments.write().await;
            let existing = assignments.entry(member_id.clone()).or_default();

            // Validate the whole batch before touching the rows so a bad id
            // leaves the member unchanged.
            let mut batch = HashSet::with_capacity(achievement_ids.len());
            for achievement_id in &achievement_ids {
                if !catalog.contains_key(achievement_id) {
                    return Err(DomainError::Validation(format!(
                        "unknown achievement {achievement_id}"
                    )));
                }
                let already_assigned = existing
                    .iter()
                    .any(|row| &row.achievement_id == achievement_id);
                if already_assigned || !batch.insert(achievement_id.as_str()) {
                    return Err(DomainError::Conflict(format!("{member_id}/{achievement_id}")));
                }
            }

            existing.extend(
                achievement_ids
                    .iter()
                    .map(|achievement_id| AchievementAssignment::pending(&member_id, achievement_id)),
            );
            Ok(())
        })
    }

    fn audit_candidates(&self) -> BoxFuture<'_, DomainResult<Vec<AuditCandidate>>> {
        let members = self.members.clone();
        let catalog = self.catalog.clone();
        let assignments = self.assignments.clone();
        Box::pin(async move {
            let members = members.read().await;
            let catalog = catalog.read().await;
            let assignments = assignments.read().await;

            let mut candidates: Vec<AuditCandidate> = members
                .values()
                .filter(|member| member.active)
                .filter_map(|member| {
                    let grade = member.grade?;
                    let assigned_grades: BTreeSet<Grade> = assignments
                        .get(&member.member_id)
                        .into_iter()
                        .flatten()
                        .filter_map(|row| catalog.get(&row.achievement_id).copied())
                        .collect();
                    Some(AuditCandidate {
                        member_id: member.member_id.clone(),
                        grade,
                        assigned_grades,
                    })
                })
                .collect();
            candidates.sort_by(|left, right| left.member_id.cmp(&right.member_id));
            Ok(candidates)
        })
    }
}

impl StoreHealth for InMemoryAchievementStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    fn health_check(&self) -> BoxFuture<'_, DomainResult<()>> {
        Box::pin(async { Ok(()) })
    }
}
