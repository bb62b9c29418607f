use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::models::Quota;

pub async fn find_quota(
    conn: &mut SqliteConnection,
    subject_id: i64,
    teacher_id: i64,
) -> Result<Option<Quota>, sqlx::Error> {
    sqlx::query_as::<_, Quota>(
        r#"
        SELECT id, subject_id, teacher_id, total_quota, used_quota, remaining_quota, updated_at
        FROM quotas
        WHERE subject_id = ?1 AND teacher_id = ?2
        "#,
    )
    .bind(subject_id)
    .bind(teacher_id)
    .fetch_optional(&mut *conn)
    .await
}

/// Inserts a fresh quota unless one already exists for the pair.
pub async fn insert_if_missing(
    conn: &mut SqliteConnection,
    subject_id: i64,
    teacher_id: i64,
    total: f64,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO quotas (subject_id, teacher_id, total_quota, used_quota, remaining_quota, updated_at)
        VALUES (?1, ?2, ?3, 0, ?3, ?4)
        ON CONFLICT (subject_id, teacher_id) DO NOTHING
        "#,
    )
    .bind(subject_id)
    .bind(teacher_id)
    .bind(total)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn set_total(
    conn: &mut SqliteConnection,
    id: i64,
    total: f64,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE quotas SET total_quota = ?1, remaining_quota = ?1 - used_quota, updated_at = ?2 WHERE id = ?3",
    )
    .bind(total)
    .bind(now)
    .bind(id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Adds `delta` hours in a single statement so concurrent writers cannot
/// lose an update. Used hours never drop below zero.
pub async fn add_used(
    conn: &mut SqliteConnection,
    subject_id: i64,
    teacher_id: i64,
    delta: f64,
    now: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE quotas
        SET used_quota = MAX(used_quota + ?1, 0),
            remaining_quota = total_quota - MAX(used_quota + ?1, 0),
            updated_at = ?2
        WHERE subject_id = ?3 AND teacher_id = ?4
        "#,
    )
    .bind(delta)
    .bind(now)
    .bind(subject_id)
    .bind(teacher_id)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    Ok(result > 0)
}

/// Like [`add_used`], but only when the result stays within
/// `total_quota + margin`. False when the row is missing or the limit would
/// be passed; the check and the write are one statement.
pub async fn add_used_within(
    conn: &mut SqliteConnection,
    subject_id: i64,
    teacher_id: i64,
    delta: f64,
    margin: f64,
    now: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE quotas
        SET used_quota = MAX(used_quota + ?1, 0),
            remaining_quota = total_quota - MAX(used_quota + ?1, 0),
            updated_at = ?2
        WHERE subject_id = ?3 AND teacher_id = ?4
          AND used_quota + ?1 <= total_quota + ?5
        "#,
    )
    .bind(delta)
    .bind(now)
    .bind(subject_id)
    .bind(teacher_id)
    .bind(margin)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    Ok(result > 0)
}

pub async fn set_used(
    conn: &mut SqliteConnection,
    id: i64,
    used: f64,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE quotas SET used_quota = ?1, remaining_quota = total_quota - ?1, updated_at = ?2 WHERE id = ?3",
    )
    .bind(used)
    .bind(now)
    .bind(id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Quotas that are used up or have at most `ratio` of their total left.
pub async fn fetch_nearly_exhausted(
    conn: &mut SqliteConnection,
    ratio: f64,
) -> Result<Vec<Quota>, sqlx::Error> {
    sqlx::query_as::<_, Quota>(
        r#"
        SELECT id, subject_id, teacher_id, total_quota, used_quota, remaining_quota, updated_at
        FROM quotas
        WHERE remaining_quota <= 0
           OR (total_quota > 0 AND remaining_quota / total_quota <= ?1)
        ORDER BY id
        "#,
    )
    .bind(ratio)
    .fetch_all(&mut *conn)
    .await
}
