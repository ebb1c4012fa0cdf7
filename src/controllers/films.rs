//! films.rs
//!
//! Справочник фильмов: CRUD, каскадное удаление и отчет по выручке.
//!
//! Удаление фильма затрагивает все его сеансы и их билеты, поэтому
//! выполняется в одной транзакции и возвращает счетчики удаленного.

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
use crate::extract::Json;
use crate::models::Film;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/films", get(list_films).post(create_film))
        .route("/films/revenue", get(films_revenue))
        .route("/films/{id}", axum::routing::put(update_film).delete(delete_film))
}

/* ---------- handlers ---------- */

// GET /api/films
async fn list_films(State(state): State<Arc<AppState>>) -> AppResult<impl IntoResponse> {
    let films = sqlx::query_as::<_, Film>("SELECT * FROM films ORDER BY film_id")
        .fetch_all(&state.db.pool)
        .await?;

    Ok(Json(films))
}

// POST /api/films
#[derive(Debug, Deserialize, Validate)]
struct CreateFilmRequest {
    #[validate(length(min = 1, message = "название фильма не может быть пустым"))]
    film_title: String,
    #[validate(range(min = 1, message = "длительность должна быть больше 0"))]
    duration_minutes: i32,
    #[validate(range(min = 0.0, max = 10.0, message = "рейтинг должен быть от 0 до 10"))]
    rating: f64,
}

async fn create_film(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateFilmRequest>,
) -> AppResult<impl IntoResponse> {
    req.validate()?;

    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM films WHERE film_title = $1)",
    )
    .bind(&req.film_title)
    .fetch_one(&state.db.pool)
    .await?;

    if exists {
        return Err(AppError::Conflict(format!(
            "Фильм \"{}\" уже существует в базе данных",
            req.film_title
        )));
    }

    let film = sqlx::query_as::<_, Film>(
        "INSERT INTO films (film_title, duration_minutes, rating)
         VALUES ($1, $2, $3)
         RETURNING *",
    )
    .bind(&req.film_title)
    .bind(req.duration_minutes)
    .bind(req.rating)
    .fetch_one(&state.db.pool)
    .await?;

    Ok((StatusCode::CREATED, Json(film)))
}

// PUT /api/films/{id}
//
// Название фильма после создания не меняется, обновляются только
// длительность и рейтинг.
#[derive(Debug, Deserialize, Validate)]
struct UpdateFilmRequest {
    #[validate(range(min = 1, message = "длительность должна быть больше 0"))]
    duration_minutes: i32,
    #[validate(range(min = 0.0, max = 10.0, message = "рейтинг должен быть от 0 до 10"))]
    rating: f64,
}

async fn update_film(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateFilmRequest>,
) -> AppResult<impl IntoResponse> {
    req.validate()?;

    let film = sqlx::query_as::<_, Film>(
        "UPDATE films SET duration_minutes = $1, rating = $2 WHERE film_id = $3 RETURNING *",
    )
    .bind(req.duration_minutes)
    .bind(req.rating)
    .bind(id)
    .fetch_optional(&state.db.pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Фильм не найден".to_string()))?;

    Ok(Json(film))
}

/// DELETE /api/films/{id}
///
/// Каскадное удаление: билеты всех сеансов фильма, затем сеансы, затем
/// сам фильм. Все в одной транзакции, при любой ошибке ничего не удаляется.
async fn delete_film(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    let mut tx = state.db.pool.begin().await?;

    let film = sqlx::query_as::<_, Film>("SELECT * FROM films WHERE film_id = $1")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Фильм не найден".to_string()))?;

    let session_ids = sqlx::query_scalar::<_, i64>(
        "SELECT session_id FROM sessions WHERE film_id = $1",
    )
    .bind(id)
    .fetch_all(&mut *tx)
    .await?;

    let tickets_deleted = sqlx::query("DELETE FROM tickets WHERE session_id = ANY($1)")
        .bind(&session_ids)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    let sessions_deleted = sqlx::query("DELETE FROM sessions WHERE film_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    sqlx::query("DELETE FROM films WHERE film_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(
        film_id = id,
        sessions = sessions_deleted,
        tickets = tickets_deleted,
        "film deleted with cascade"
    );

    Ok(Json(json!({
        "message": format!(
            "Фильм успешно удален. Также удалено {} сеансов и {} билетов, связанных с этим фильмом.",
            sessions_deleted, tickets_deleted
        ),
        "deleted_film": film,
        "deleted_sessions_count": sessions_deleted,
        "deleted_tickets_count": tickets_deleted,
    })))
}

/// GET /api/films/revenue
///
/// Выручка по фильмам: количество сеансов, проданных (занятых) билетов и
/// сумма цен сеансов по занятым билетам. Фильмы без сеансов тоже в списке.
#[derive(Debug, Serialize, sqlx::FromRow)]
struct FilmRevenue {
    film_id: i64,
    film_title: String,
    sessions_count: i64,
    tickets_sold: i64,
    revenue: f64,
}

async fn films_revenue(State(state): State<Arc<AppState>>) -> AppResult<impl IntoResponse> {
    let rows = sqlx::query_as::<_, FilmRevenue>(
        r#"
        SELECT f.film_id,
               f.film_title,
               COUNT(DISTINCT s.session_id) AS sessions_count,
               COUNT(t.ticket_id) FILTER (WHERE t.is_occupied) AS tickets_sold,
               COALESCE(SUM(s.price) FILTER (WHERE t.is_occupied), 0) AS revenue
        FROM films f
        LEFT JOIN sessions s ON s.film_id = f.film_id
        LEFT JOIN tickets t ON t.session_id = s.session_id
        GROUP BY f.film_id, f.film_title
        ORDER BY revenue DESC, f.film_id
        "#,
    )
    .fetch_all(&state.db.pool)
    .await?;

    Ok(Json(rows))
}
