use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Ticket {
    pub ticket_id: i64,
    pub session_id: i64,
    pub row_number: i32,
    pub seat_number: i32,
    pub customer_name: Option<String>,
    pub is_occupied: bool,
}

/// Билет вместе с полями сеанса, фильма и зала.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TicketDetails {
    pub ticket_id: i64,
    pub session_id: i64,
    pub row_number: i32,
    pub seat_number: i32,
    pub customer_name: Option<String>,
    pub is_occupied: bool,
    pub start_time: NaiveDateTime,
    pub film_title: String,
    pub hall_number: i32,
}
