use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use clubhouse_domain::DomainResult;
use clubhouse_domain::error::DomainError;
use clubhouse_domain::members::{AchievementAssignment, AuditCandidate, Grade, MemberSnapshot};
use clubhouse_domain::ports::BoxFuture;
use clubhouse_domain::ports::achievements::ReconciliationStore;
use clubhouse_domain::util::format_ms_rfc3339;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use surrealdb::Surreal;
use surrealdb::engine::any::Any;

use crate::db::DbConfig;

const INSERT_ASSIGNMENTS_QUERY: &str = "BEGIN TRANSACTION; \
     FOR $row IN $rows { \
        CREATE type::record('member_achievement', [$row.member_id, $row.achievement_id]) SET \
            assignment_id = $row.assignment_id, \
            member_id = $row.member_id, \
            achievement_id = $row.achievement_id, \
            achieved = false, \
            achieved_at = NONE, \
            assigned_at = <datetime>$row.assigned_at; \
     }; \
     COMMIT TRANSACTION;";

const AUDIT_CANDIDATES_QUERY: &str = "SELECT member_id, grade, active FROM member \
        WHERE active = true ORDER BY member_id; \
     SELECT achievement_id, grade FROM achievement; \
     SELECT member_id, achievement_id FROM member_achievement;";

/// SurrealDB-backed store over the `member`, `achievement` and
/// `member_achievement` tables.
#[derive(Clone)]
pub struct SurrealAchievementStore {
    client: Arc<Surreal<Any>>,
}

impl SurrealAchievementStore {
    pub fn with_client(client: Arc<Surreal<Any>>) -> Self {
        Self { client }
    }

    pub async fn connect(db_config: &DbConfig) -> anyhow::Result<Self> {
        Ok(Self {
            client: db_config.connect().await?,
        })
    }

    fn map_surreal_error(err: surrealdb::Error) -> DomainError {
        let error_message = err.to_string().to_lowercase();
        if error_message.contains("already exists")
            || error_message.contains("duplicate")
            || error_message.contains("unique")
        {
            return DomainError::Conflict(error_message);
        }
        DomainError::Storage(format!("surreal query failed: {error_message}"))
    }

    fn decode_rows<T>(rows: Vec<Value>, what: &str) -> DomainResult<Vec<T>>
    where
        T: for<'de> Deserialize<'de>,
    {
        rows.into_iter()
            .map(|row| {
                serde_json::from_value::<T>(row)
                    .map_err(|err| DomainError::Storage(format!("invalid {what} row: {err}")))
            })
            .collect()
    }

    async fn select_ids(
        &self,
        query: &'static str,
        key: &'static str,
        value: Value,
    ) -> DomainResult<HashSet<String>> {
        let mut response = self
            .client
            .query(query)
            .bind((key, value))
            .await
            .map_err(Self::map_surreal_error)?;
        let rows: Vec<Value> = response
            .take(0)
            .map_err(|err| DomainError::Storage(format!("invalid query result: {err}")))?;
        Ok(Self::decode_rows::<SurrealIdRow>(rows, "achievement id")?
            .into_iter()
            .map(|row| row.achievement_id)
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct SurrealMemberRow {
    member_id: String,
    grade: Option<u16>,
    active: bool,
}

#[derive(Debug, Deserialize)]
struct SurrealIdRow {
    achievement_id: String,
}

#[derive(Debug, Serialize)]
struct SurrealAssignmentCreateRow {
    assignment_id: String,
    member_id: String,
    achievement_id: String,
    assigned_at: String,
}

impl From<AchievementAssignment> for SurrealAssignmentCreateRow {
    fn from(assignment: AchievementAssignment) -> Self {
        Self {
            assignment_id: assignment.assignment_id,
            member_id: assignment.member_id,
            achievement_id: assignment.achievement_id,
            assigned_at: format_ms_rfc3339(assignment.assigned_at_ms),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SurrealCatalogRow {
    achievement_id: String,
    grade: u16,
}

#[derive(Debug, Deserialize)]
struct SurrealAssignmentRow {
    member_id: String,
    achievement_id: String,
}

fn join_audit_rows(
    members: Vec<SurrealMemberRow>,
    catalog: Vec<SurrealCatalogRow>,
    assignments: Vec<SurrealAssignmentRow>,
) -> Vec<AuditCandidate> {
    let grades: HashMap<String, Grade> = catalog
        .into_iter()
        .map(|row| (row.achievement_id, Grade(row.grade)))
        .collect();
    let mut candidates: BTreeMap<String, AuditCandidate> = members
        .into_iter()
        .filter(|row| row.active)
        .filter_map(|row| {
            let grade = Grade(row.grade?);
            Some((
                row.member_id.clone(),
                AuditCandidate {
                    member_id: row.member_id,
                    grade,
                    assigned_grades: BTreeSet::new(),
                },
            ))
        })
        .collect();
    for assignment in assignments {
        let Some(candidate) = candidates.get_mut(&assignment.member_id) else {
            continue;
        };
        if let Some(grade) = grades.get(&assignment.achievement_id) {
            candidate.assigned_grades.insert(*grade);
        }
    }
    candidates.into_values().collect()
}

impl ReconciliationStore for SurrealAchievementStore {
    fn find_member(&self, member_id: &str) -> BoxFuture<'_, DomainResult<Option<MemberSnapshot>>> {
        let member_id = member_id.to_string();
        let client = self.client.clone();
        Box::pin(async move {
            let mut response = client
                .query(
                    "SELECT member_id, grade, active FROM member \
                     WHERE member_id = $member_id LIMIT 1",
                )
                .bind(("member_id", member_id))
                .await
                .map_err(Self::map_surreal_error)?;
            let rows: Vec<Value> = response
                .take(0)
                .map_err(|err| DomainError::Storage(format!("invalid query result: {err}")))?;
            let mut members = Self::decode_rows::<SurrealMemberRow>(rows, "member")?;
            Ok(members.pop().map(|row| MemberSnapshot {
                member_id: row.member_id,
                grade: row.grade.map(Grade),
                active: row.active,
            }))
        })
    }

    fn achievement_ids_for_grade(
        &self,
        grade: Grade,
    ) -> BoxFuture<'_, DomainResult<HashSet<String>>> {
        Box::pin(async move {
            self.select_ids(
                "SELECT achievement_id FROM achievement WHERE grade = $grade",
                "grade",
                Value::from(grade.level()),
            )
            .await
        })
    }

    fn assigned_achievement_ids(
        &self,
        member_id: &str,
    ) -> BoxFuture<'_, DomainResult<HashSet<String>>> {
        let member_id = member_id.to_string();
        Box::pin(async move {
            self.select_ids(
                "SELECT achievement_id FROM member_achievement WHERE member_id = $member_id",
                "member_id",
                Value::from(member_id),
            )
            .await
        })
    }

    fn insert_assignments(
        &self,
        member_id: &str,
        achievement_ids: &[String],
    ) -> BoxFuture<'_, DomainResult<()>> {
        let rows: Vec<SurrealAssignmentCreateRow> = achievement_ids
            .iter()
            .map(|achievement_id| AchievementAssignment::pending(member_id, achievement_id).into())
            .collect();
        let member_id = member_id.to_string();
        let client = self.client.clone();
        Box::pin(async move {
            if rows.is_empty() {
                return Ok(());
            }
            let rows = serde_json::to_value(&rows).map_err(|err| {
                DomainError::Storage(format!("failed to encode assignment rows: {err}"))
            })?;
            let response = client
                .query(INSERT_ASSIGNMENTS_QUERY)
                .bind(("rows", rows))
                .await
                .map_err(Self::map_surreal_error)?;
            response.check().map_err(Self::map_surreal_error)?;
            tracing::debug!(member_id, "assignment transaction committed");
            Ok(())
        })
    }

    fn audit_candidates(&self) -> BoxFuture<'_, DomainResult<Vec<AuditCandidate>>> {
        let client = self.client.clone();
        Box::pin(async move {
            let mut response = client
                .query(AUDIT_CANDIDATES_QUERY)
                .await
                .map_err(Self::map_surreal_error)?;
            let member_rows: Vec<Value> = response
                .take(0)
                .map_err(|err| DomainError::Storage(format!("invalid query result: {err}")))?;
            let catalog_rows: Vec<Value> = response
                .take(1)
                .map_err(|err| DomainError::Storage(format!("invalid query result: {err}")))?;
            let assignment_rows: Vec<Value> = response
                .take(2)
                .map_err(|err| DomainError::Storage(format!("invalid query result: {err}")))?;
            Ok(join_audit_rows(
                Self::decode_rows(member_rows, "member")?,
                Self::decode_rows(catalog_rows, "achievement")?,
                Self::decode_rows(assignment_rows, "assignment")?,
            ))
        })
    }
}
