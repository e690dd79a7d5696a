use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::util::{now_ms, uuid_v7_without_dashes};

/// Grade level a member is enrolled in. Achievements are scoped to one grade.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct Grade(pub u16);

impl Grade {
    pub fn new(level: u16) -> Self {
        Self(level)
    }

    pub fn level(self) -> u16 {
        self.0
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u16> for Grade {
    fn from(level: u16) -> Self {
        Self(level)
    }
}

/// The slice of a member record the sync engine reads.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct MemberSnapshot {
    pub member_id: String,
    pub grade: Option<Grade>,
    pub active: bool,
}

impl MemberSnapshot {
    pub fn new(member_id: impl Into<String>, grade: Option<Grade>, active: bool) -> Self {
        Self {
            member_id: member_id.into(),
            grade,
            active,
        }
    }
}

/// Join record between a member and an achievement.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AchievementAssignment {
    pub assignment_id: String,
    pub member_id: String,
    pub achievement_id: String,
    pub achieved: bool,
    pub achieved_at_ms: Option<i64>,
    pub assigned_at_ms: i64,
}

impl AchievementAssignment {
    /// Assigned but not yet achieved. The sync engine only ever creates these.
    pub fn pending(member_id: impl Into<String>, achievement_id: impl Into<String>) -> Self {
        Self {
            assignment_id: uuid_v7_without_dashes(),
            member_id: member_id.into(),
            achievement_id: achievement_id.into(),
            achieved: false,
            achieved_at_ms: None,
            assigned_at_ms: now_ms(),
        }
    }
}

/// One row of the startup audit scan: an active, graded member together with
/// the distinct grades represented among their current assignments.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuditCandidate {
    pub member_id: String,
    pub grade: Grade,
    pub assigned_grades: BTreeSet<Grade>,
}

impl AuditCandidate {
    pub fn is_drifted(&self) -> bool {
        !self.assigned_grades.contains(&self.grade)
    }

    pub fn first_observed_grade(&self) -> Option<Grade> {
        self.assigned_grades.iter().next().copied()
    }
}
