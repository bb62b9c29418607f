use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::models::{BookedSession, Session, SessionStatus};
use crate::timeslot::Day;

pub async fn find_session(conn: &mut SqliteConnection, id: i64) -> Result<Option<Session>, sqlx::Error> {
    sqlx::query_as::<_, Session>(
        r#"
        SELECT id, subject_id, room_id, academic_year_id, availability_id,
               day, start_time, end_time, status, hours_used, created_at
        FROM sessions
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
}

/// Sessions in `status`, oldest id first.
pub async fn fetch_by_status(
    conn: &mut SqliteConnection,
    status: SessionStatus,
) -> Result<Vec<Session>, sqlx::Error> {
    sqlx::query_as::<_, Session>(
        r#"
        SELECT id, subject_id, room_id, academic_year_id, availability_id,
               day, start_time, end_time, status, hours_used, created_at
        FROM sessions
        WHERE status = ?1
        ORDER BY id
        "#,
    )
    .bind(status)
    .fetch_all(&mut *conn)
    .await
}

pub async fn fetch_sessions(conn: &mut SqliteConnection) -> Result<Vec<Session>, sqlx::Error> {
    sqlx::query_as::<_, Session>(
        r#"
        SELECT id, subject_id, room_id, academic_year_id, availability_id,
               day, start_time, end_time, status, hours_used, created_at
        FROM sessions
        ORDER BY id
        "#,
    )
    .fetch_all(&mut *conn)
    .await
}

/// Sessions on `day` with their teacher. `published_only` restricts to the
/// published timetable; otherwise drafts and validated sessions count too.
pub async fn fetch_bookings_on_day(
    conn: &mut SqliteConnection,
    day: Day,
    published_only: bool,
    exclude_session_id: Option<i64>,
) -> Result<Vec<BookedSession>, sqlx::Error> {
    sqlx::query_as::<_, BookedSession>(
        r#"
        SELECT s.id, s.subject_id, sub.teacher_id, s.room_id,
               s.day, s.start_time, s.end_time, s.status
        FROM sessions s
        JOIN subjects sub ON sub.id = s.subject_id
        WHERE s.day = ?1
          AND (?2 = 0 OR s.status = ?3)
          AND (?4 IS NULL OR s.id != ?4)
        ORDER BY s.id
        "#,
    )
    .bind(day)
    .bind(published_only)
    .bind(SessionStatus::Published)
    .bind(exclude_session_id)
    .fetch_all(&mut *conn)
    .await
}

/// Sessions of every day, with the same filters as [`fetch_bookings_on_day`].
pub async fn fetch_bookings(
    conn: &mut SqliteConnection,
    published_only: bool,
    exclude_session_id: Option<i64>,
) -> Result<Vec<BookedSession>, sqlx::Error> {
    sqlx::query_as::<_, BookedSession>(
        r#"
        SELECT s.id, s.subject_id, sub.teacher_id, s.room_id,
               s.day, s.start_time, s.end_time, s.status
        FROM sessions s
        JOIN subjects sub ON sub.id = s.subject_id
        WHERE (?1 = 0 OR s.status = ?2)
          AND (?3 IS NULL OR s.id != ?3)
        ORDER BY s.id
        "#,
    )
    .bind(published_only)
    .bind(SessionStatus::Published)
    .bind(exclude_session_id)
    .fetch_all(&mut *conn)
    .await
}

/// Most recently created session of `subject_id` on `day` that already has
/// a room.
pub async fn find_latest_roomed(
    conn: &mut SqliteConnection,
    subject_id: i64,
    day: Day,
    exclude_session_id: Option<i64>,
) -> Result<Option<Session>, sqlx::Error> {
    sqlx::query_as::<_, Session>(
        r#"
        SELECT id, subject_id, room_id, academic_year_id, availability_id,
               day, start_time, end_time, status, hours_used, created_at
        FROM sessions
        WHERE subject_id = ?1
          AND day = ?2
          AND room_id IS NOT NULL
          AND (?3 IS NULL OR id != ?3)
        ORDER BY created_at DESC, id DESC
        LIMIT 1
        "#,
    )
    .bind(subject_id)
    .bind(day)
    .bind(exclude_session_id)
    .fetch_optional(&mut *conn)
    .await
}

/// `(start_time, end_time)` of every published session of a subject.
pub async fn fetch_published_times(
    conn: &mut SqliteConnection,
    subject_id: i64,
) -> Result<Vec<(String, String)>, sqlx::Error> {
    sqlx::query_as::<_, (String, String)>(
        "SELECT start_time, end_time FROM sessions WHERE subject_id = ?1 AND status = ?2 ORDER BY id",
    )
    .bind(subject_id)
    .bind(SessionStatus::Published)
    .fetch_all(&mut *conn)
    .await
}

#[derive(Debug, Clone)]
pub struct NewSession {
    pub subject_id: i64,
    pub room_id: Option<i64>,
    pub academic_year_id: Option<i64>,
    pub availability_id: Option<i64>,
    pub day: Day,
    pub start_time: String,
    pub end_time: String,
    pub status: SessionStatus,
}

pub async fn insert_session(
    conn: &mut SqliteConnection,
    session: NewSession,
    now: DateTime<Utc>,
) -> Result<Session, sqlx::Error> {
    sqlx::query_as::<_, Session>(
        r#"
        INSERT INTO sessions
            (subject_id, room_id, academic_year_id, availability_id,
             day, start_time, end_time, status, hours_used, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0, ?9)
        RETURNING id, subject_id, room_id, academic_year_id, availability_id,
                  day, start_time, end_time, status, hours_used, created_at
        "#,
    )
    .bind(session.subject_id)
    .bind(session.room_id)
    .bind(session.academic_year_id)
    .bind(session.availability_id)
    .bind(session.day)
    .bind(session.start_time)
    .bind(session.end_time)
    .bind(session.status)
    .bind(now)
    .fetch_one(&mut *conn)
    .await
}

pub async fn update_slot(
    conn: &mut SqliteConnection,
    id: i64,
    day: Day,
    start_time: &str,
    end_time: &str,
    room_id: Option<i64>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE sessions SET day = ?1, start_time = ?2, end_time = ?3, room_id = ?4 WHERE id = ?5",
    )
    .bind(day)
    .bind(start_time)
    .bind(end_time)
    .bind(room_id)
    .bind(id)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    Ok(result > 0)
}

/// Moves a session from `from` to `to`. Returns false if it was no longer in
/// `from`.
pub async fn transition_status(
    conn: &mut SqliteConnection,
    id: i64,
    from: SessionStatus,
    to: SessionStatus,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE sessions SET status = ?1 WHERE id = ?2 AND status = ?3")
        .bind(to)
        .bind(id)
        .bind(from)
        .execute(&mut *conn)
        .await?
        .rows_affected();

    Ok(result > 0)
}

pub async fn assign_room(conn: &mut SqliteConnection, id: i64, room_id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE sessions SET room_id = ?1 WHERE id = ?2")
        .bind(room_id)
        .bind(id)
        .execute(&mut *conn)
        .await?
        .rows_affected();

    Ok(result > 0)
}

/// Writes the quota snapshot only; no other column is touched.
pub async fn set_hours_used(conn: &mut SqliteConnection, id: i64, hours: f64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE sessions SET hours_used = ?1 WHERE id = ?2")
        .bind(hours)
        .bind(id)
        .execute(&mut *conn)
        .await?
        .rows_affected();

    Ok(result > 0)
}

pub async fn delete_session(conn: &mut SqliteConnection, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM sessions WHERE id = ?1")
        .bind(id)
        .execute(&mut *conn)
        .await?
        .rows_affected();

    Ok(result > 0)
}
