//! Teacher and room double-booking checks against the published timetable.

use sqlx::SqliteConnection;

use crate::db;
use crate::error::AppError;
use crate::models::{Booking, ConflictKind, Session, SessionStatus};
use crate::timeslot::{Day, TimeWindow};

/// Placement being checked.
#[derive(Debug, Clone, Copy)]
pub struct Placement {
    pub session_id: Option<i64>,
    pub teacher_id: Option<i64>,
    pub room_id: Option<i64>,
    pub day: Day,
    pub window: TimeWindow,
}

/// Teacher conflicts are reported before room conflicts.
pub fn detect_conflict(placement: &Placement, bookings: &[Booking]) -> Option<ConflictKind> {
    let clashing: Vec<&Booking> = bookings
        .iter()
        .filter(|b| b.status == SessionStatus::Published)
        .filter(|b| Some(b.session_id) != placement.session_id)
        .filter(|b| b.day == placement.day && b.window.overlaps(&placement.window))
        .collect();

    if let Some(teacher_id) = placement.teacher_id {
        if let Some(b) = clashing.iter().find(|b| b.teacher_id == Some(teacher_id)) {
            return Some(ConflictKind::TeacherConflict {
                teacher_id,
                with_session: b.session_id,
            });
        }
    }

    if let Some(room_id) = placement.room_id {
        if let Some(b) = clashing.iter().find(|b| b.room_id == Some(room_id)) {
            return Some(ConflictKind::RoomConflict {
                room_id,
                with_session: b.session_id,
            });
        }
    }

    None
}

/// Loads the published sessions of the day and checks `placement` against
/// them.
pub async fn check_placement(
    conn: &mut SqliteConnection,
    placement: &Placement,
) -> Result<Option<ConflictKind>, AppError> {
    let rows = db::sessions::fetch_bookings_on_day(conn, placement.day, true, placement.session_id).await?;
    Ok(detect_conflict(placement, &Booking::from_rows(rows)))
}

pub async fn check_session(
    conn: &mut SqliteConnection,
    session: &Session,
    teacher_id: i64,
    window: TimeWindow,
) -> Result<Option<ConflictKind>, AppError> {
    let placement = Placement {
        session_id: Some(session.id),
        teacher_id: Some(teacher_id),
        room_id: session.room_id,
        day: session.day,
        window,
    };
    check_placement(conn, &placement).await
}
