use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Film {
    pub film_id: i64,
    pub film_title: String,
    pub duration_minutes: i32,
    pub rating: f64,
}
