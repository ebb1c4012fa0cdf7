use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::FromRow;

/// Сеанс вместе с полями фильма и зала, как его показывает админка.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SessionDetails {
    pub session_id: i64,
    pub film_id: i64,
    pub hall_id: i64,
    pub start_time: NaiveDateTime,
    pub price: f64,
    pub film_title: String,
    pub hall_number: i32,
    pub rows_count: i32,
    pub seats_per_row: i32,
}
