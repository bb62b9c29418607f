use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use tracing::warn;

use crate::error::AppError;
use crate::timeslot::{Day, TimeWindow};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum SessionStatus {
    Draft,
    Validated,
    Published,
}

/// A scheduled class occurrence.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Session {
    pub id: i64,
    pub subject_id: i64,
    pub room_id: Option<i64>,
    pub academic_year_id: Option<i64>,
    pub availability_id: Option<i64>,
    pub day: Day,
    pub start_time: String,
    pub end_time: String,
    pub status: SessionStatus,
    /// Hours counted against the quota when the session was published.
    pub hours_used: f64,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn window(&self) -> Result<TimeWindow, AppError> {
        TimeWindow::parse(&self.start_time, &self.end_time)
    }
}

/// A session row joined with its subject's teacher.
#[derive(Debug, Clone, FromRow)]
pub struct BookedSession {
    pub id: i64,
    pub subject_id: i64,
    pub teacher_id: Option<i64>,
    pub room_id: Option<i64>,
    pub day: Day,
    pub start_time: String,
    pub end_time: String,
    pub status: SessionStatus,
}

/// Parsed occupancy of a room and a teacher.
#[derive(Debug, Clone, PartialEq)]
pub struct Booking {
    pub session_id: i64,
    pub subject_id: i64,
    pub teacher_id: Option<i64>,
    pub room_id: Option<i64>,
    pub day: Day,
    pub window: TimeWindow,
    pub status: SessionStatus,
}

impl Booking {
    /// Rows whose times cannot be parsed are dropped with a warning: a broken
    /// neighbour must not block scheduling of everything else on that day.
    pub fn from_rows(rows: Vec<BookedSession>) -> Vec<Booking> {
        rows.into_iter()
            .filter_map(|row| match TimeWindow::parse(&row.start_time, &row.end_time) {
                Ok(window) => Some(Booking {
                    session_id: row.id,
                    subject_id: row.subject_id,
                    teacher_id: row.teacher_id,
                    room_id: row.room_id,
                    day: row.day,
                    window,
                    status: row.status,
                }),
                Err(e) => {
                    warn!("ignoring session {} with unreadable times: {}", row.id, e);
                    None
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSessionRequest {
    pub subject_id: i64,
    pub day: Day,
    pub start_time: String,
    pub end_time: String,
    pub room_id: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateSessionRequest {
    pub day: Option<Day>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub room_id: Option<i64>,
}
