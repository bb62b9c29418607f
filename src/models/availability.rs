use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::AppError;
use crate::timeslot::{Day, TimeWindow};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum AvailabilityStatus {
    Pending,
    Used,
}

/// A window a teacher offers for teaching a subject.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Availability {
    pub id: i64,
    pub subject_id: i64,
    pub day: Day,
    pub start_time: String,
    pub end_time: String,
    pub establishment_id: Option<i64>,
    pub status: AvailabilityStatus,
    pub created_at: DateTime<Utc>,
}

impl Availability {
    pub fn window(&self) -> Result<TimeWindow, AppError> {
        TimeWindow::parse(&self.start_time, &self.end_time)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAvailabilityRequest {
    pub subject_id: i64,
    pub day: Day,
    pub start_time: String,
    pub end_time: String,
    pub establishment_id: Option<i64>,
}

/// An availability left pending by a conversion pass.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeferredAvailability {
    pub availability_id: i64,
    pub reason: String,
}
