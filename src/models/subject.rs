use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A taught subject. The teacher is optional upstream, which the scheduler
/// treats as a data-integrity gap rather than a crash.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Subject {
    pub id: i64,
    pub name: String,
    pub teacher_id: Option<i64>,
    pub programmer_id: Option<i64>,
    /// Configured hour budget.
    pub total_hour: f64,
    /// Minimum room capacity; 0 means any room will do.
    pub expected_students: i64,
    pub room_type: Option<String>,
}
