//! tickets.rs
//!
//! Журнал билетов: поиск с фильтрами по связке билет-сеанс-фильм-зал,
//! ручное добавление билета, изменение занятости и сводная статистика.
//!
//! Бизнес-правило занятости: свободное место никогда не хранит имя
//! покупателя - при is_occupied = false customer_name принудительно NULL.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::extract::{Json, Query};
use crate::models::{Ticket, TicketDetails};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tickets", get(list_tickets).post(create_ticket))
        .route("/tickets/stats", get(ticket_stats))
        .route(
            "/tickets/{id}",
            axum::routing::put(update_ticket).delete(delete_ticket),
        )
}

/* ---------- построение запроса ---------- */

#[derive(Debug, Default, Deserialize)]
struct TicketFilters {
    film_id: Option<i64>,
    hall_id: Option<i64>,
    session_id: Option<i64>,
    customer_name: Option<String>,
    is_occupied: Option<bool>,
}

const LIST_BASE: &str = "SELECT t.ticket_id, t.session_id, t.row_number, t.seat_number, \
     t.customer_name, t.is_occupied, s.start_time, f.film_title, h.hall_number \
     FROM tickets t \
     JOIN sessions s ON t.session_id = s.session_id \
     JOIN films f ON s.film_id = f.film_id \
     JOIN halls h ON s.hall_id = h.hall_id";

/// Текст SQL для списка билетов. В строку попадают только номера
/// плейсхолдеров, значения всегда передаются через bind - в том же
/// порядке, в котором условия добавляются здесь.
fn build_list_query(filters: &TicketFilters) -> String {
    let mut sql = String::from(LIST_BASE);

    let mut clauses: Vec<String> = Vec::new();
    let mut idx = 1;
    if filters.film_id.is_some() {
        clauses.push(format!("f.film_id = ${idx}"));
        idx += 1;
    }
    if filters.hall_id.is_some() {
        clauses.push(format!("h.hall_id = ${idx}"));
        idx += 1;
    }
    if filters.session_id.is_some() {
        clauses.push(format!("t.session_id = ${idx}"));
        idx += 1;
    }
    if filters.customer_name.is_some() {
        clauses.push(format!("t.customer_name ILIKE ${idx}"));
        idx += 1;
    }
    if filters.is_occupied.is_some() {
        clauses.push(format!("t.is_occupied = ${idx}"));
    }

    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }

    // В разрезе одного сеанса билеты идут по схеме зала, иначе по id.
    if filters.session_id.is_some() {
        sql.push_str(" ORDER BY t.row_number, t.seat_number");
    } else {
        sql.push_str(" ORDER BY t.ticket_id");
    }

    sql
}

/// Экранирует спецсимволы LIKE в пользовательской подстроке,
/// чтобы фильтр не принимал `%`/`_` за шаблон.
fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/* ---------- helpers ---------- */

async fn fetch_ticket_details(
    pool: &sqlx::PgPool,
    ticket_id: i64,
) -> sqlx::Result<Option<TicketDetails>> {
    sqlx::query_as::<_, TicketDetails>(
        r#"
        SELECT t.ticket_id, t.session_id, t.row_number, t.seat_number,
               t.customer_name, t.is_occupied, s.start_time, f.film_title, h.hall_number
        FROM tickets t
        JOIN sessions s ON t.session_id = s.session_id
        JOIN films f ON s.film_id = f.film_id
        JOIN halls h ON s.hall_id = h.hall_id
        WHERE t.ticket_id = $1
        "#,
    )
    .bind(ticket_id)
    .fetch_optional(pool)
    .await
}

// Пустое или пробельное имя покупателя считаем отсутствующим.
fn normalize_customer(name: Option<String>) -> Option<String> {
    name.filter(|s| !s.trim().is_empty())
}

/// Имя покупателя, которое попадет в запись: свободное место хранится
/// без имени, что бы ни пришло в запросе.
fn stored_customer_name(is_occupied: bool, name: Option<String>) -> Option<String> {
    if is_occupied {
        normalize_customer(name)
    } else {
        None
    }
}

/* ---------- handlers ---------- */

// GET /api/tickets
async fn list_tickets(
    State(state): State<Arc<AppState>>,
    Query(filters): Query<TicketFilters>,
) -> AppResult<impl IntoResponse> {
    let sql = build_list_query(&filters);

    // Порядок bind строго повторяет порядок условий в build_list_query.
    let mut query = sqlx::query_as::<_, TicketDetails>(&sql);
    if let Some(film_id) = filters.film_id {
        query = query.bind(film_id);
    }
    if let Some(hall_id) = filters.hall_id {
        query = query.bind(hall_id);
    }
    if let Some(session_id) = filters.session_id {
        query = query.bind(session_id);
    }
    if let Some(ref customer_name) = filters.customer_name {
        query = query.bind(format!("%{}%", escape_like(customer_name)));
    }
    if let Some(is_occupied) = filters.is_occupied {
        query = query.bind(is_occupied);
    }

    let tickets = query.fetch_all(&state.db.pool).await?;
    Ok(Json(tickets))
}

// POST /api/tickets
#[derive(Debug, Deserialize, Validate)]
struct CreateTicketRequest {
    #[validate(range(min = 1, message = "session_id должен быть больше 0"))]
    session_id: i64,
    #[validate(range(min = 1, message = "номер ряда должен быть больше 0"))]
    row_number: i32,
    #[validate(range(min = 1, message = "номер места должен быть больше 0"))]
    seat_number: i32,
    customer_name: Option<String>,
    #[serde(default)]
    is_occupied: bool,
}

async fn create_ticket(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateTicketRequest>,
) -> AppResult<impl IntoResponse> {
    req.validate()?;

    let (rows_count, seats_per_row) = sqlx::query_as::<_, (i32, i32)>(
        "SELECT h.rows_count, h.seats_per_row
         FROM sessions s
         JOIN halls h ON s.hall_id = h.hall_id
         WHERE s.session_id = $1",
    )
    .bind(req.session_id)
    .fetch_optional(&state.db.pool)
    .await?
    .ok_or_else(|| AppError::Validation("Указанный сеанс не существует".to_string()))?;

    if req.row_number > rows_count || req.seat_number > seats_per_row {
        return Err(AppError::Validation(format!(
            "Ряд {}, место {} выходит за пределы зала ({} рядов по {} мест)",
            req.row_number, req.seat_number, rows_count, seats_per_row
        )));
    }

    let taken = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(
            SELECT 1 FROM tickets
            WHERE session_id = $1 AND row_number = $2 AND seat_number = $3
        )",
    )
    .bind(req.session_id)
    .bind(req.row_number)
    .bind(req.seat_number)
    .fetch_one(&state.db.pool)
    .await?;

    if taken {
        return Err(AppError::Conflict(
            "Это место уже занято в данном сеансе".to_string(),
        ));
    }

    let customer_name = stored_customer_name(req.is_occupied, req.customer_name);

    let ticket_id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO tickets (session_id, row_number, seat_number, customer_name, is_occupied)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING ticket_id",
    )
    .bind(req.session_id)
    .bind(req.row_number)
    .bind(req.seat_number)
    .bind(&customer_name)
    .bind(req.is_occupied)
    .fetch_one(&state.db.pool)
    .await?;

    let ticket = fetch_ticket_details(&state.db.pool, ticket_id)
        .await?
        .ok_or_else(|| AppError::Internal("Созданный билет не найден".to_string()))?;

    Ok((StatusCode::CREATED, Json(ticket)))
}

// PUT /api/tickets/{id}
//
// Меняются только занятость и имя покупателя, ряд и место после создания
// неизменны. Свободное место всегда сохраняется без имени.
#[derive(Debug, Deserialize)]
struct UpdateTicketRequest {
    customer_name: Option<String>,
    is_occupied: bool,
}

async fn update_ticket(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateTicketRequest>,
) -> AppResult<impl IntoResponse> {
    let customer_name = stored_customer_name(req.is_occupied, req.customer_name);

    let updated = sqlx::query_as::<_, Ticket>(
        "UPDATE tickets SET customer_name = $1, is_occupied = $2
         WHERE ticket_id = $3
         RETURNING *",
    )
    .bind(&customer_name)
    .bind(req.is_occupied)
    .bind(id)
    .fetch_optional(&state.db.pool)
    .await?;

    if updated.is_none() {
        return Err(AppError::NotFound("Билет не найден".to_string()));
    }

    let ticket = fetch_ticket_details(&state.db.pool, id)
        .await?
        .ok_or_else(|| AppError::Internal("Обновленный билет не найден".to_string()))?;

    Ok(Json(ticket))
}

// DELETE /api/tickets/{id}
async fn delete_ticket(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    let ticket = sqlx::query_as::<_, Ticket>(
        "DELETE FROM tickets WHERE ticket_id = $1 RETURNING *",
    )
    .bind(id)
    .fetch_optional(&state.db.pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Билет не найден".to_string()))?;

    Ok(Json(json!({
        "message": "Билет успешно удален",
        "deleted_ticket": ticket,
    })))
}

/// GET /api/tickets/stats
///
/// Сводка по всему журналу: всего билетов, занято, свободно, доля
/// занятости и выручка (сумма цен сеансов по занятым билетам).
#[derive(Debug, Serialize)]
struct TicketStats {
    total_tickets: i64,
    occupied: i64,
    free: i64,
    occupancy_rate: f64,
    revenue: f64,
}

async fn ticket_stats(State(state): State<Arc<AppState>>) -> AppResult<impl IntoResponse> {
    let (total_tickets, occupied, free, revenue) = sqlx::query_as::<_, (i64, i64, i64, f64)>(
        r#"
        SELECT COUNT(*),
               COUNT(*) FILTER (WHERE t.is_occupied),
               COUNT(*) FILTER (WHERE NOT t.is_occupied),
               COALESCE(SUM(s.price) FILTER (WHERE t.is_occupied), 0)
        FROM tickets t
        JOIN sessions s ON t.session_id = s.session_id
        "#,
    )
    .fetch_one(&state.db.pool)
    .await?;

    let occupancy_rate = if total_tickets > 0 {
        occupied as f64 / total_tickets as f64
    } else {
        0.0
    };

    Ok(Json(TicketStats {
        total_tickets,
        occupied,
        free,
        occupancy_rate,
        revenue,
    }))
}

/* ---------- tests ---------- */

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_filters_orders_by_id() {
        let sql = build_list_query(&TicketFilters::default());
        assert!(!sql.contains("WHERE"));
        assert!(sql.ends_with("ORDER BY t.ticket_id"));
    }

    #[test]
    fn session_filter_orders_by_seat() {
        let filters = TicketFilters {
            session_id: Some(5),
            ..Default::default()
        };
        let sql = build_list_query(&filters);
        assert!(sql.contains("WHERE t.session_id = $1"));
        assert!(sql.ends_with("ORDER BY t.row_number, t.seat_number"));
    }

    #[test]
    fn placeholders_are_numbered_in_bind_order() {
        let filters = TicketFilters {
            film_id: Some(1),
            hall_id: Some(2),
            session_id: Some(3),
            customer_name: Some("Иванов".to_string()),
            is_occupied: Some(true),
        };
        let sql = build_list_query(&filters);
        assert!(sql.contains("f.film_id = $1"));
        assert!(sql.contains("h.hall_id = $2"));
        assert!(sql.contains("t.session_id = $3"));
        assert!(sql.contains("t.customer_name ILIKE $4"));
        assert!(sql.contains("t.is_occupied = $5"));
    }

    #[test]
    fn skipped_filters_do_not_leave_gaps_in_numbering() {
        let filters = TicketFilters {
            hall_id: Some(2),
            is_occupied: Some(false),
            ..Default::default()
        };
        let sql = build_list_query(&filters);
        assert!(sql.contains("h.hall_id = $1"));
        assert!(sql.contains("t.is_occupied = $2"));
        assert!(!sql.contains("$3"));
    }

    #[test]
    fn query_text_never_contains_filter_values() {
        let filters = TicketFilters {
            customer_name: Some("'; DROP TABLE tickets; --".to_string()),
            ..Default::default()
        };
        let sql = build_list_query(&filters);
        assert!(!sql.contains("DROP TABLE"));
    }

    #[test]
    fn like_special_characters_are_escaped() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("Иванов"), "Иванов");
    }

    #[test]
    fn free_seat_never_stores_customer() {
        assert_eq!(
            stored_customer_name(false, Some("Иванов".to_string())),
            None
        );
        assert_eq!(stored_customer_name(false, None), None);
    }

    #[test]
    fn occupied_seat_keeps_normalized_customer() {
        assert_eq!(
            stored_customer_name(true, Some("Иванов".to_string())),
            Some("Иванов".to_string())
        );
        assert_eq!(stored_customer_name(true, Some("   ".to_string())), None);
        assert_eq!(stored_customer_name(true, None), None);
    }

    #[test]
    fn empty_customer_name_is_dropped() {
        assert_eq!(normalize_customer(Some("  ".to_string())), None);
        assert_eq!(normalize_customer(Some(String::new())), None);
        assert_eq!(
            normalize_customer(Some("Петров".to_string())),
            Some("Петров".to_string())
        );
        assert_eq!(normalize_customer(None), None);
    }
}
