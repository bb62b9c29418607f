use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConflictKind {
    TeacherConflict { teacher_id: i64, with_session: i64 },
    RoomConflict { room_id: i64, with_session: i64 },
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictKind::TeacherConflict { teacher_id, with_session } => write!(
                f,
                "teacher {} is already teaching session {} at that time",
                teacher_id, with_session
            ),
            ConflictKind::RoomConflict { room_id, with_session } => write!(
                f,
                "room {} is already occupied by session {} at that time",
                room_id, with_session
            ),
        }
    }
}

/// Why a validated session was not published.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    Conflict(ConflictKind),
    QuotaExceeded,
    NoTeacherAttached,
    MalformedTime(String),
    NoFreeSlot,
    /// Left the validated state while the run was in progress.
    NoLongerValidated,
}

impl SkipReason {
    /// Conflicts and quota overruns get one more chance in the retry pass.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SkipReason::Conflict(_) | SkipReason::QuotaExceeded)
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, SkipReason::Conflict(_) | SkipReason::NoFreeSlot)
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Conflict(kind) => write!(f, "{}", kind),
            SkipReason::QuotaExceeded => f.write_str("quota exceeded"),
            SkipReason::NoTeacherAttached => f.write_str("no teacher attached"),
            SkipReason::MalformedTime(value) => write!(f, "malformed time: {}", value),
            SkipReason::NoFreeSlot => f.write_str("no free slot found in the weekly catalogue"),
            SkipReason::NoLongerValidated => f.write_str("session is no longer validated"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SkippedSession {
    pub session_id: i64,
    pub reason: String,
}

/// Audit record of one publication batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationRun {
    pub id: String,
    pub ran_at: DateTime<Utc>,
    pub published_count: i64,
    pub skipped_count: i64,
    pub conflicts_count: i64,
    pub quota_alerts_count: i64,
    pub skipped_details: Vec<SkippedSession>,
}

/// Storage shape of [`AutomationRun`]; the skip list is kept as JSON text.
#[derive(Debug, Clone, FromRow)]
pub struct AutomationRunRow {
    pub id: String,
    pub ran_at: DateTime<Utc>,
    pub published_count: i64,
    pub skipped_count: i64,
    pub conflicts_count: i64,
    pub quota_alerts_count: i64,
    pub skipped_details: String,
}

impl TryFrom<AutomationRunRow> for AutomationRun {
    type Error = serde_json::Error;

    fn try_from(row: AutomationRunRow) -> Result<Self, Self::Error> {
        Ok(AutomationRun {
            id: row.id,
            ran_at: row.ran_at,
            published_count: row.published_count,
            skipped_count: row.skipped_count,
            conflicts_count: row.conflicts_count,
            quota_alerts_count: row.quota_alerts_count,
            skipped_details: serde_json::from_str(&row.skipped_details)?,
        })
    }
}
