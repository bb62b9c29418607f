use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Room {
    pub id: i64,
    pub code: String,
    pub capacity: i64,
    pub room_type: Option<String>,
    pub is_available: bool,
    pub campus_id: Option<i64>,
}
