use sqlx::SqliteConnection;

use crate::models::Room;

pub async fn fetch_rooms(conn: &mut SqliteConnection) -> Result<Vec<Room>, sqlx::Error> {
    sqlx::query_as::<_, Room>(
        r#"
        SELECT id, code, capacity, room_type, is_available, campus_id
        FROM rooms
        ORDER BY id
        "#,
    )
    .fetch_all(&mut *conn)
    .await
}

pub async fn find_room(conn: &mut SqliteConnection, id: i64) -> Result<Option<Room>, sqlx::Error> {
    sqlx::query_as::<_, Room>(
        "SELECT id, code, capacity, room_type, is_available, campus_id FROM rooms WHERE id = ?1",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
}

pub async fn fetch_campus_ids(
    conn: &mut SqliteConnection,
    establishment_id: i64,
) -> Result<Vec<i64>, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT id FROM campuses WHERE establishment_id = ?1 ORDER BY id")
        .bind(establishment_id)
        .fetch_all(&mut *conn)
        .await
}

pub async fn insert_establishment(conn: &mut SqliteConnection, name: &str) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("INSERT INTO establishments (name) VALUES (?1) RETURNING id")
        .bind(name)
        .fetch_one(&mut *conn)
        .await
}

pub async fn insert_campus(
    conn: &mut SqliteConnection,
    establishment_id: i64,
    name: &str,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("INSERT INTO campuses (establishment_id, name) VALUES (?1, ?2) RETURNING id")
        .bind(establishment_id)
        .bind(name)
        .fetch_one(&mut *conn)
        .await
}

#[derive(Debug, Clone)]
pub struct NewRoom {
    pub code: String,
    pub capacity: i64,
    pub room_type: Option<String>,
    pub is_available: bool,
    pub campus_id: Option<i64>,
}

pub async fn insert_room(conn: &mut SqliteConnection, room: NewRoom) -> Result<Room, sqlx::Error> {
    sqlx::query_as::<_, Room>(
        r#"
        INSERT INTO rooms (code, capacity, room_type, is_available, campus_id)
        VALUES (?1, ?2, ?3, ?4, ?5)
        RETURNING id, code, capacity, room_type, is_available, campus_id
        "#,
    )
    .bind(room.code)
    .bind(room.capacity)
    .bind(room.room_type)
    .bind(room.is_available)
    .bind(room.campus_id)
    .fetch_one(&mut *conn)
    .await
}
