//! sessions.rs
//!
//! Планировщик сеансов - ядро консистентности всей системы.
//!
//! Правила:
//! - в одном зале не может быть двух сеансов с разницей начала в 30 минут
//!   и меньше (проверка симметричная, при обновлении сеанс не сравнивается
//!   сам с собой);
//! - при создании сеанса в той же транзакции создается полная сетка билетов
//!   rows_count x seats_per_row, все места свободны;
//! - при смене зала у сеанса сетка пересоздается под размеры нового зала;
//! - удаление сеанса сначала удаляет его билеты, затем сам сеанс.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Router,
};
use chrono::{NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::extract::Json;
use crate::models::{SessionDetails, Ticket};
use crate::AppState;

/// Минимальный интервал между началами сеансов в одном зале.
const MIN_GAP_MINUTES: i64 = 30;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/sessions", get(list_sessions).post(create_session))
        .route(
            "/sessions/{id}",
            axum::routing::put(update_session).delete(delete_session),
        )
        .route("/sessions/{id}/tickets", get(session_tickets))
}

/* ---------- чистая логика ---------- */

/// Пересекаются ли два начала сеансов: |a - b| <= 30 минут, включительно.
fn starts_conflict(a: NaiveDateTime, b: NaiveDateTime) -> bool {
    (a - b).abs() <= TimeDelta::minutes(MIN_GAP_MINUTES)
}

/// Полная сетка мест зала: пары (ряд, место), нумерация с 1, по рядам.
fn seat_grid(rows_count: i32, seats_per_row: i32) -> Vec<(i32, i32)> {
    let mut grid = Vec::with_capacity((rows_count * seats_per_row) as usize);
    for row in 1..=rows_count {
        for seat in 1..=seats_per_row {
            grid.push((row, seat));
        }
    }
    grid
}

/// Разбор времени начала. Админка шлет формат datetime-local,
/// без секунд; с секундами тоже принимаем.
fn parse_start_time(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M"))
        .ok()
}

/* ---------- helpers ---------- */

async fn film_exists(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    film_id: i64,
) -> sqlx::Result<bool> {
    sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM films WHERE film_id = $1)")
        .bind(film_id)
        .fetch_one(&mut **tx)
        .await
}

async fn hall_dimensions(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    hall_id: i64,
) -> sqlx::Result<Option<(i32, i32)>> {
    sqlx::query_as::<_, (i32, i32)>(
        "SELECT rows_count, seats_per_row FROM halls WHERE hall_id = $1",
    )
    .bind(hall_id)
    .fetch_optional(&mut **tx)
    .await
}

/// Проверка пересечения с другими сеансами зала. `exclude_id` исключает
/// сам обновляемый сеанс из сравнения.
async fn check_time_conflict(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    hall_id: i64,
    start_time: NaiveDateTime,
    exclude_id: Option<i64>,
) -> Result<(), AppError> {
    let existing = sqlx::query_as::<_, (i64, NaiveDateTime)>(
        "SELECT session_id, start_time FROM sessions WHERE hall_id = $1",
    )
    .bind(hall_id)
    .fetch_all(&mut **tx)
    .await?;

    for (session_id, existing_start) in existing {
        if Some(session_id) == exclude_id {
            continue;
        }
        if starts_conflict(existing_start, start_time) {
            return Err(AppError::Conflict(format!(
                "Время сеанса пересекается с другим сеансом в этом зале. \
                 Минимальный интервал - {} минут.",
                MIN_GAP_MINUTES
            )));
        }
    }

    Ok(())
}

/// Создает по одному свободному билету на каждое место зала.
/// Возвращает количество созданных билетов.
async fn create_tickets_for_session(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    session_id: i64,
    rows_count: i32,
    seats_per_row: i32,
) -> sqlx::Result<u64> {
    let grid = seat_grid(rows_count, seats_per_row);

    for (row, seat) in &grid {
        sqlx::query(
            "INSERT INTO tickets (session_id, row_number, seat_number, customer_name, is_occupied)
             VALUES ($1, $2, $3, NULL, FALSE)",
        )
        .bind(session_id)
        .bind(row)
        .bind(seat)
        .execute(&mut **tx)
        .await?;
    }

    Ok(grid.len() as u64)
}

async fn fetch_session_details(
    pool: &sqlx::PgPool,
    session_id: i64,
) -> sqlx::Result<Option<SessionDetails>> {
    sqlx::query_as::<_, SessionDetails>(
        r#"
        SELECT s.session_id, s.film_id, s.hall_id, s.start_time, s.price,
               f.film_title, h.hall_number, h.rows_count, h.seats_per_row
        FROM sessions s
        JOIN films f ON s.film_id = f.film_id
        JOIN halls h ON s.hall_id = h.hall_id
        WHERE s.session_id = $1
        "#,
    )
    .bind(session_id)
    .fetch_optional(pool)
    .await
}

/* ---------- handlers ---------- */

// GET /api/sessions
async fn list_sessions(State(state): State<Arc<AppState>>) -> AppResult<impl IntoResponse> {
    let sessions = sqlx::query_as::<_, SessionDetails>(
        r#"
        SELECT s.session_id, s.film_id, s.hall_id, s.start_time, s.price,
               f.film_title, h.hall_number, h.rows_count, h.seats_per_row
        FROM sessions s
        JOIN films f ON s.film_id = f.film_id
        JOIN halls h ON s.hall_id = h.hall_id
        ORDER BY s.start_time DESC
        "#,
    )
    .fetch_all(&state.db.pool)
    .await?;

    Ok(Json(sessions))
}

#[derive(Debug, Deserialize, Validate)]
struct SessionRequest {
    #[validate(range(min = 1, message = "film_id должен быть больше 0"))]
    film_id: i64,
    #[validate(range(min = 1, message = "hall_id должен быть больше 0"))]
    hall_id: i64,
    start_time: String,
    #[validate(range(min = 0.0, message = "цена не может быть отрицательной"))]
    price: f64,
}

#[derive(Debug, Serialize)]
struct CreatedSessionResponse {
    #[serde(flatten)]
    session: SessionDetails,
    tickets_created: u64,
}

/// POST /api/sessions
///
/// Сеанс и его сетка билетов создаются в одной транзакции: либо появляется
/// и сеанс, и все rows_count x seats_per_row билетов, либо ничего.
async fn create_session(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SessionRequest>,
) -> AppResult<impl IntoResponse> {
    req.validate()?;

    let start_time = parse_start_time(&req.start_time).ok_or_else(|| {
        AppError::Validation("Некорректный формат времени начала сеанса".to_string())
    })?;

    let mut tx = state.db.pool.begin().await?;

    if !film_exists(&mut tx, req.film_id).await? {
        return Err(AppError::Validation(
            "Указанный фильм не существует".to_string(),
        ));
    }

    let (rows_count, seats_per_row) = hall_dimensions(&mut tx, req.hall_id)
        .await?
        .ok_or_else(|| AppError::Validation("Указанный зал не существует".to_string()))?;

    check_time_conflict(&mut tx, req.hall_id, start_time, None).await?;

    let session_id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO sessions (film_id, hall_id, start_time, price)
         VALUES ($1, $2, $3, $4)
         RETURNING session_id",
    )
    .bind(req.film_id)
    .bind(req.hall_id)
    .bind(start_time)
    .bind(req.price)
    .fetch_one(&mut *tx)
    .await?;

    let tickets_created =
        create_tickets_for_session(&mut tx, session_id, rows_count, seats_per_row).await?;

    tx.commit().await?;

    tracing::info!(session_id, tickets_created, "session created");

    let session = fetch_session_details(&state.db.pool, session_id)
        .await?
        .ok_or_else(|| AppError::Internal("Созданный сеанс не найден".to_string()))?;

    Ok((
        StatusCode::CREATED,
        Json(CreatedSessionResponse {
            session,
            tickets_created,
        }),
    ))
}

#[derive(Debug, Serialize)]
struct UpdatedSessionResponse {
    #[serde(flatten)]
    session: SessionDetails,
    #[serde(skip_serializing_if = "Option::is_none")]
    tickets_regenerated: Option<u64>,
}

/// PUT /api/sessions/{id}
///
/// Проверки те же, что и при создании, но пересечение времени считается
/// без учета самого обновляемого сеанса. При смене зала старая сетка
/// билетов удаляется и создается новая под размеры нового зала, чтобы
/// количество билетов всегда совпадало с вместимостью.
async fn update_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<SessionRequest>,
) -> AppResult<impl IntoResponse> {
    req.validate()?;

    let start_time = parse_start_time(&req.start_time).ok_or_else(|| {
        AppError::Validation("Некорректный формат времени начала сеанса".to_string())
    })?;

    let mut tx = state.db.pool.begin().await?;

    let current_hall_id = sqlx::query_scalar::<_, i64>(
        "SELECT hall_id FROM sessions WHERE session_id = $1",
    )
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::NotFound("Сеанс не найден".to_string()))?;

    if !film_exists(&mut tx, req.film_id).await? {
        return Err(AppError::Validation(
            "Указанный фильм не существует".to_string(),
        ));
    }

    let (rows_count, seats_per_row) = hall_dimensions(&mut tx, req.hall_id)
        .await?
        .ok_or_else(|| AppError::Validation("Указанный зал не существует".to_string()))?;

    check_time_conflict(&mut tx, req.hall_id, start_time, Some(id)).await?;

    sqlx::query(
        "UPDATE sessions SET film_id = $1, hall_id = $2, start_time = $3, price = $4
         WHERE session_id = $5",
    )
    .bind(req.film_id)
    .bind(req.hall_id)
    .bind(start_time)
    .bind(req.price)
    .bind(id)
    .execute(&mut *tx)
    .await?;

    // Смена зала: старая сетка не имеет смысла в новом зале, пересоздаем.
    let tickets_regenerated = if req.hall_id != current_hall_id {
        sqlx::query("DELETE FROM tickets WHERE session_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let created = create_tickets_for_session(&mut tx, id, rows_count, seats_per_row).await?;
        Some(created)
    } else {
        None
    };

    tx.commit().await?;

    if let Some(count) = tickets_regenerated {
        tracing::info!(session_id = id, tickets = count, "session moved to another hall, ticket grid regenerated");
    }

    let session = fetch_session_details(&state.db.pool, id)
        .await?
        .ok_or_else(|| AppError::Internal("Обновленный сеанс не найден".to_string()))?;

    Ok(Json(UpdatedSessionResponse {
        session,
        tickets_regenerated,
    }))
}

/// DELETE /api/sessions/{id}
async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    let mut tx = state.db.pool.begin().await?;

    let session = sqlx::query_as::<_, SessionDetails>(
        r#"
        SELECT s.session_id, s.film_id, s.hall_id, s.start_time, s.price,
               f.film_title, h.hall_number, h.rows_count, h.seats_per_row
        FROM sessions s
        JOIN films f ON s.film_id = f.film_id
        JOIN halls h ON s.hall_id = h.hall_id
        WHERE s.session_id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::NotFound("Сеанс не найден".to_string()))?;

    let tickets_deleted = sqlx::query("DELETE FROM tickets WHERE session_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    sqlx::query("DELETE FROM sessions WHERE session_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(Json(json!({
        "message": format!("Сеанс успешно удален. Удалено {} билетов.", tickets_deleted),
        "deleted_session": session,
        "deleted_tickets_count": tickets_deleted,
    })))
}

/// GET /api/sessions/{id}/tickets
///
/// Сеанс вместе со всеми его билетами в порядке ряд/место - из этого
/// админка рисует схему зала.
async fn session_tickets(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    let session = fetch_session_details(&state.db.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Сеанс не найден".to_string()))?;

    let tickets = sqlx::query_as::<_, Ticket>(
        "SELECT * FROM tickets WHERE session_id = $1 ORDER BY row_number, seat_number",
    )
    .bind(id)
    .fetch_all(&state.db.pool)
    .await?;

    Ok(Json(json!({
        "session": session,
        "tickets": tickets,
    })))
}

/* ---------- tests ---------- */

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn conflict_inside_window() {
        assert!(starts_conflict(at(12, 0), at(12, 10)));
        assert!(starts_conflict(at(12, 0), at(11, 45)));
        assert!(starts_conflict(at(12, 0), at(12, 0)));
    }

    #[test]
    fn conflict_boundary_is_inclusive() {
        assert!(starts_conflict(at(12, 0), at(12, 30)));
        assert!(starts_conflict(at(12, 30), at(12, 0)));
        assert!(!starts_conflict(at(12, 0), at(12, 31)));
    }

    #[test]
    fn conflict_respects_seconds() {
        let base = at(12, 0);
        let just_over = at(12, 30) + TimeDelta::seconds(1);
        assert!(!starts_conflict(base, just_over));
    }

    #[test]
    fn seat_grid_covers_whole_hall() {
        let grid = seat_grid(2, 3);
        assert_eq!(
            grid,
            vec![(1, 1), (1, 2), (1, 3), (2, 1), (2, 2), (2, 3)]
        );
    }

    #[test]
    fn seat_grid_handles_largest_allowed_hall() {
        // 1000x1000 - максимум, который пропускает валидация залов.
        let grid = seat_grid(1000, 1000);
        assert_eq!(grid.len(), 1_000_000);
        assert_eq!(grid.first(), Some(&(1, 1)));
        assert_eq!(grid.last(), Some(&(1000, 1000)));
    }

    #[test]
    fn seat_grid_has_no_duplicates() {
        let grid = seat_grid(7, 11);
        assert_eq!(grid.len(), 77);
        let unique: std::collections::HashSet<_> = grid.iter().collect();
        assert_eq!(unique.len(), 77);
    }

    #[test]
    fn parses_datetime_local_with_and_without_seconds() {
        assert_eq!(parse_start_time("2024-03-15T18:30"), Some(at(18, 30)));
        assert_eq!(parse_start_time("2024-03-15T18:30:00"), Some(at(18, 30)));
        assert!(parse_start_time("15.03.2024 18:30").is_none());
        assert!(parse_start_time("").is_none());
    }

    proptest! {
        #[test]
        fn conflict_is_symmetric_and_matches_threshold(offset in -10_000i64..10_000) {
            let base = at(12, 0);
            let other = base + TimeDelta::minutes(offset);
            prop_assert_eq!(starts_conflict(base, other), starts_conflict(other, base));
            prop_assert_eq!(starts_conflict(base, other), offset.abs() <= MIN_GAP_MINUTES);
        }
    }
}
