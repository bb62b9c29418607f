use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::models::{Availability, AvailabilityStatus, NewAvailabilityRequest};

pub async fn insert_availability(
    conn: &mut SqliteConnection,
    req: &NewAvailabilityRequest,
    now: DateTime<Utc>,
) -> Result<Availability, sqlx::Error> {
    sqlx::query_as::<_, Availability>(
        r#"
        INSERT INTO availabilities
            (subject_id, day, start_time, end_time, establishment_id, status, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        RETURNING id, subject_id, day, start_time, end_time, establishment_id, status, created_at
        "#,
    )
    .bind(req.subject_id)
    .bind(req.day)
    .bind(&req.start_time)
    .bind(&req.end_time)
    .bind(req.establishment_id)
    .bind(AvailabilityStatus::Pending)
    .bind(now)
    .fetch_one(&mut *conn)
    .await
}

pub async fn find_availability(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<Option<Availability>, sqlx::Error> {
    sqlx::query_as::<_, Availability>(
        r#"
        SELECT id, subject_id, day, start_time, end_time, establishment_id, status, created_at
        FROM availabilities
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
}

pub async fn fetch_pending(conn: &mut SqliteConnection) -> Result<Vec<Availability>, sqlx::Error> {
    sqlx::query_as::<_, Availability>(
        r#"
        SELECT id, subject_id, day, start_time, end_time, establishment_id, status, created_at
        FROM availabilities
        WHERE status = ?1
        ORDER BY id
        "#,
    )
    .bind(AvailabilityStatus::Pending)
    .fetch_all(&mut *conn)
    .await
}

/// Flips pending -> used. Returns false when another caller got there first.
pub async fn mark_used(conn: &mut SqliteConnection, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE availabilities SET status = ?1 WHERE id = ?2 AND status = ?3")
        .bind(AvailabilityStatus::Used)
        .bind(id)
        .bind(AvailabilityStatus::Pending)
        .execute(&mut *conn)
        .await?
        .rows_affected();

    Ok(result > 0)
}
