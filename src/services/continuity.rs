//! Room placement: same-day continuity first, best fit second.

use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::debug;

use crate::db;
use crate::error::AppError;
use crate::models::{Booking, Subject};
use crate::services::room_finder::{self, RoomRequest};
use crate::timeslot::{Day, TimeWindow};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomSource {
    /// Reused from an earlier session of the same subject that day.
    Continuity,
    BestFit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoomChoice {
    pub room_id: i64,
    pub source: RoomSource,
}

/// Room of the most recently created session of the subject on that day.
pub async fn continuity_room(
    conn: &mut SqliteConnection,
    subject_id: i64,
    day: Day,
    exclude_session_id: Option<i64>,
) -> Result<Option<i64>, AppError> {
    let previous = db::sessions::find_latest_roomed(conn, subject_id, day, exclude_session_id).await?;
    Ok(previous.and_then(|s| s.room_id))
}

/// Campuses of an establishment; `None` (search everywhere) when the request
/// is unscoped or the establishment has no campus.
pub async fn campus_scope(
    conn: &mut SqliteConnection,
    establishment_id: Option<i64>,
) -> Result<Option<Vec<i64>>, AppError> {
    let Some(establishment_id) = establishment_id else {
        return Ok(None);
    };
    let campuses = db::rooms::fetch_campus_ids(conn, establishment_id).await?;
    Ok(if campuses.is_empty() { None } else { Some(campuses) })
}

/// Continuity wins over best fit, even when the continuity room is a worse
/// fit: a subject taught in several slots of one day stays in one room.
pub async fn choose_room(
    conn: &mut SqliteConnection,
    subject: &Subject,
    day: Day,
    window: TimeWindow,
    campuses: Option<&[i64]>,
    exclude_session_id: Option<i64>,
) -> Result<Option<RoomChoice>, AppError> {
    if let Some(room_id) = continuity_room(conn, subject.id, day, exclude_session_id).await? {
        debug!("subject {} keeps room {} on {}", subject.id, room_id, day);
        return Ok(Some(RoomChoice {
            room_id,
            source: RoomSource::Continuity,
        }));
    }

    let rooms = db::rooms::fetch_rooms(conn).await?;
    let rows = db::sessions::fetch_bookings_on_day(conn, day, false, exclude_session_id).await?;
    let bookings = Booking::from_rows(rows);

    let request = RoomRequest {
        capacity: subject.expected_students,
        room_type: subject.room_type.as_deref().filter(|t| !t.is_empty()),
        campuses,
        day,
        window,
    };

    Ok(room_finder::find_room(&rooms, &bookings, &request).map(|room| RoomChoice {
        room_id: room.id,
        source: RoomSource::BestFit,
    }))
}
