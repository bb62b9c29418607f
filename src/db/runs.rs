use sqlx::SqliteConnection;
use tracing::error;

use crate::error::AppError;
use crate::models::{AutomationRun, AutomationRunRow};

pub async fn insert_run(conn: &mut SqliteConnection, run: &AutomationRun) -> Result<(), AppError> {
    let details = serde_json::to_string(&run.skipped_details)
        .map_err(|e| {
            error!("failed to serialize skip list: {}", e);
            AppError::InternalServerError
        })?;

    sqlx::query(
        r#"
        INSERT INTO automation_runs
            (id, ran_at, published_count, skipped_count, conflicts_count,
             quota_alerts_count, skipped_details)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(&run.id)
    .bind(run.ran_at)
    .bind(run.published_count)
    .bind(run.skipped_count)
    .bind(run.conflicts_count)
    .bind(run.quota_alerts_count)
    .bind(details)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Newest first.
pub async fn fetch_runs(conn: &mut SqliteConnection, limit: i64) -> Result<Vec<AutomationRun>, AppError> {
    let rows = sqlx::query_as::<_, AutomationRunRow>(
        r#"
        SELECT id, ran_at, published_count, skipped_count, conflicts_count,
               quota_alerts_count, skipped_details
        FROM automation_runs
        ORDER BY ran_at DESC, rowid DESC
        LIMIT ?1
        "#,
    )
    .bind(limit)
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter()
        .map(|row| {
            let id = row.id.clone();
            AutomationRun::try_from(row)
                .map_err(|e| {
                    error!("corrupt skip list in run {}: {}", id, e);
                    AppError::InternalServerError
                })
        })
        .collect()
}
