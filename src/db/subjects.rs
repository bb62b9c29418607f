use sqlx::SqliteConnection;

use crate::models::Subject;

pub async fn find_subject(conn: &mut SqliteConnection, id: i64) -> Result<Option<Subject>, sqlx::Error> {
    sqlx::query_as::<_, Subject>(
        r#"
        SELECT id, name, teacher_id, programmer_id, total_hour, expected_students, room_type
        FROM subjects
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
}

#[derive(Debug, Clone, Default)]
pub struct NewSubject {
    pub name: String,
    pub teacher_id: Option<i64>,
    pub programmer_id: Option<i64>,
    pub total_hour: f64,
    pub expected_students: i64,
    pub room_type: Option<String>,
}

pub async fn insert_subject(conn: &mut SqliteConnection, subject: NewSubject) -> Result<Subject, sqlx::Error> {
    sqlx::query_as::<_, Subject>(
        r#"
        INSERT INTO subjects (name, teacher_id, programmer_id, total_hour, expected_students, room_type)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        RETURNING id, name, teacher_id, programmer_id, total_hour, expected_students, room_type
        "#,
    )
    .bind(subject.name)
    .bind(subject.teacher_id)
    .bind(subject.programmer_id)
    .bind(subject.total_hour)
    .bind(subject.expected_students)
    .bind(subject.room_type)
    .fetch_one(&mut *conn)
    .await
}

pub async fn update_total_hour(conn: &mut SqliteConnection, id: i64, total_hour: f64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE subjects SET total_hour = ?1 WHERE id = ?2")
        .bind(total_hour)
        .bind(id)
        .execute(&mut *conn)
        .await?
        .rows_affected();

    Ok(result > 0)
}
