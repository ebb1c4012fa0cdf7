use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Hall {
    pub hall_id: i64,
    pub hall_number: i32,
    pub rows_count: i32,
    pub seats_per_row: i32,
}

impl Hall {
    /// Вместимость зала. Всегда вычисляется, в БД не хранится.
    pub fn capacity(&self) -> i32 {
        self.rows_count * self.seats_per_row
    }
}
