//! Read-only slot advice for manual scheduling screens.

use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};

use crate::config::SchedulingSettings;
use crate::db;
use crate::error::AppError;
use crate::models::{Booking, Room, Subject};
use crate::services::conflict::{self, Placement};
use crate::services::continuity;
use crate::services::room_finder::{self, RoomRequest};
use crate::state::AppState;
use crate::timeslot::{Day, TimeWindow};

#[derive(Debug, Clone, Deserialize)]
pub struct SuggestSlotQuery {
    pub subject_id: i64,
    pub day: Day,
    pub start_time: String,
    pub end_time: String,
    pub campus_id: Option<i64>,
    pub exclude_session_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotSuggestion {
    pub day: Day,
    pub start_time: String,
    pub end_time: String,
    pub room_id: i64,
    pub room_code: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SlotAdvice {
    /// The requested slot, when it can be taken as is.
    pub current: Option<SlotSuggestion>,
    /// Why the requested slot cannot be taken.
    pub reason: Option<String>,
    pub suggestions: Vec<SlotSuggestion>,
}

pub struct SlotAdvisor {
    db: SqlitePool,
    settings: SchedulingSettings,
}

/// Everything needed to judge a slot without further queries.
struct Snapshot<'a> {
    subject: &'a Subject,
    rooms: Vec<Room>,
    /// Every session of every status, minus the excluded one.
    bookings: Vec<Booking>,
    campuses: Option<Vec<i64>>,
    exclude_session_id: Option<i64>,
}

impl SlotAdvisor {
    pub fn new(state: &AppState) -> Self {
        Self {
            db: state.db.clone(),
            settings: state.settings.clone(),
        }
    }

    pub async fn suggest(&self, query: &SuggestSlotQuery) -> Result<SlotAdvice, AppError> {
        let window = TimeWindow::parse_strict(&query.start_time, &query.end_time)?;
        let mut conn = self.db.acquire().await?;

        let subject = db::subjects::find_subject(&mut conn, query.subject_id)
            .await?
            .ok_or(AppError::NotFound)?;

        let rows = db::sessions::fetch_bookings(&mut conn, false, query.exclude_session_id).await?;
        let snapshot = Snapshot {
            subject: &subject,
            rooms: db::rooms::fetch_rooms(&mut conn).await?,
            bookings: Booking::from_rows(rows),
            campuses: query.campus_id.map(|c| vec![c]),
            exclude_session_id: query.exclude_session_id,
        };

        let (current, reason) = match evaluate(&mut conn, &snapshot, query.day, window).await? {
            Ok(slot) => (Some(slot), None),
            Err(reason) => (None, Some(reason)),
        };

        let mut suggestions = Vec::new();
        for (day, slot) in self.settings.catalogue.walk(query.day, window) {
            if suggestions.len() >= self.settings.max_suggestions {
                break;
            }
            if let Ok(found) = evaluate(&mut conn, &snapshot, day, slot).await? {
                suggestions.push(found);
            }
        }

        Ok(SlotAdvice {
            current,
            reason,
            suggestions,
        })
    }
}

/// `Ok(Err(reason))` when the slot cannot be used.
async fn evaluate(
    conn: &mut SqliteConnection,
    snapshot: &Snapshot<'_>,
    day: Day,
    window: TimeWindow,
) -> Result<Result<SlotSuggestion, String>, AppError> {
    let placement = Placement {
        session_id: snapshot.exclude_session_id,
        teacher_id: snapshot.subject.teacher_id,
        room_id: None,
        day,
        window,
    };
    if let Some(kind) = conflict::detect_conflict(&placement, &snapshot.bookings) {
        return Ok(Err(kind.to_string()));
    }

    // A continuity room is only offered when it is actually free here.
    let continuity = continuity::continuity_room(conn, snapshot.subject.id, day, snapshot.exclude_session_id)
        .await?
        .filter(|room_id| !room_finder::is_room_busy(*room_id, day, window, &snapshot.bookings))
        .and_then(|room_id| snapshot.rooms.iter().find(|r| r.id == room_id));

    let room = continuity.or_else(|| {
        let request = RoomRequest {
            capacity: snapshot.subject.expected_students,
            room_type: snapshot.subject.room_type.as_deref().filter(|t| !t.is_empty()),
            campuses: snapshot.campuses.as_deref(),
            day,
            window,
        };
        room_finder::find_room(&snapshot.rooms, &snapshot.bookings, &request)
    });

    Ok(match room {
        Some(room) => Ok(SlotSuggestion {
            day,
            start_time: window.start_str(),
            end_time: window.end_str(),
            room_id: room.id,
            room_code: room.code.clone(),
        }),
        None => Err("no room available".to_string()),
    })
}
