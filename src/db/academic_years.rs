use chrono::NaiveDate;
use sqlx::SqliteConnection;

use crate::models::AcademicYear;

/// The year whose range contains `today`. When ranges overlap the one ending
/// last wins.
pub async fn find_active(
    conn: &mut SqliteConnection,
    today: NaiveDate,
) -> Result<Option<AcademicYear>, sqlx::Error> {
    sqlx::query_as::<_, AcademicYear>(
        r#"
        SELECT id, label, start_date, end_date
        FROM academic_years
        WHERE start_date <= ?1 AND end_date >= ?1
        ORDER BY end_date DESC, id DESC
        LIMIT 1
        "#,
    )
    .bind(today)
    .fetch_optional(&mut *conn)
    .await
}

pub async fn insert_academic_year(
    conn: &mut SqliteConnection,
    label: &str,
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> Result<AcademicYear, sqlx::Error> {
    sqlx::query_as::<_, AcademicYear>(
        r#"
        INSERT INTO academic_years (label, start_date, end_date)
        VALUES (?1, ?2, ?3)
        RETURNING id, label, start_date, end_date
        "#,
    )
    .bind(label)
    .bind(start_date)
    .bind(end_date)
    .fetch_one(&mut *conn)
    .await
}
