use sqlx::SqliteConnection;

use crate::models::{Role, User};

pub async fn fetch_admin_ids(conn: &mut SqliteConnection) -> Result<Vec<i64>, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE role = ?1 ORDER BY id")
        .bind(Role::Admin)
        .fetch_all(&mut *conn)
        .await
}

pub async fn insert_user(
    conn: &mut SqliteConnection,
    name: &str,
    role: Role,
) -> Result<User, sqlx::Error> {
    sqlx::query_as::<_, User>("INSERT INTO users (name, role) VALUES (?1, ?2) RETURNING id, name, role")
        .bind(name)
        .bind(role)
        .fetch_one(&mut *conn)
        .await
}
