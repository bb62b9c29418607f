use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Hour budget of one teacher for one subject. `used_quota` and
/// `remaining_quota` are a cache of the published sessions.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Quota {
    pub id: i64,
    pub subject_id: i64,
    pub teacher_id: i64,
    pub total_quota: f64,
    pub used_quota: f64,
    pub remaining_quota: f64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaStatus {
    NotProgrammed,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaReport {
    pub subject_id: i64,
    pub teacher_id: i64,
    pub total: f64,
    pub used: f64,
    pub remaining: f64,
    pub status: QuotaStatus,
    pub percentage: f64,
}
