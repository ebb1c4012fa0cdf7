//! halls.rs
//!
//! Справочник залов. Вместимость не хранится, а считается как
//! rows_count * seats_per_row. Удаление зала каскадно удаляет его сеансы
//! и билеты в одной транзакции.

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
use crate::models::Hall;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/halls", get(list_halls).post(create_hall))
        .route("/halls/{id}", axum::routing::put(update_hall).delete(delete_hall))
}

/* ---------- helpers ---------- */

// Зал с таким номером уже есть? При обновлении текущий зал исключается.
async fn hall_number_taken(
    pool: &sqlx::PgPool,
    hall_number: i32,
    exclude_id: Option<i64>,
) -> sqlx::Result<bool> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(
            SELECT 1 FROM halls
            WHERE hall_number = $1 AND ($2::bigint IS NULL OR hall_id != $2)
        )",
    )
    .bind(hall_number)
    .bind(exclude_id)
    .fetch_one(pool)
    .await
}

#[derive(Debug, Serialize)]
struct HallResponse {
    #[serde(flatten)]
    hall: Hall,
    capacity: i32,
}

impl From<Hall> for HallResponse {
    fn from(hall: Hall) -> Self {
        let capacity = hall.capacity();
        HallResponse { hall, capacity }
    }
}

/* ---------- handlers ---------- */

// GET /api/halls
async fn list_halls(State(state): State<Arc<AppState>>) -> AppResult<impl IntoResponse> {
    let halls = sqlx::query_as::<_, Hall>("SELECT * FROM halls ORDER BY hall_id")
        .fetch_all(&state.db.pool)
        .await?;

    let payload: Vec<HallResponse> = halls.into_iter().map(HallResponse::from).collect();
    Ok(Json(payload))
}

// POST /api/halls
//
// Верхняя граница размеров держит вместимость зала (rows_count *
// seats_per_row) в пределах i32; та же граница закреплена CHECK-ами в схеме.
#[derive(Debug, Deserialize, Validate)]
struct CreateHallRequest {
    #[validate(range(min = 1, message = "номер зала должен быть больше 0"))]
    hall_number: i32,
    #[validate(range(min = 1, max = 1000, message = "количество рядов должно быть от 1 до 1000"))]
    rows_count: i32,
    #[validate(range(min = 1, max = 1000, message = "количество мест в ряду должно быть от 1 до 1000"))]
    seats_per_row: i32,
}

async fn create_hall(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateHallRequest>,
) -> AppResult<impl IntoResponse> {
    req.validate()?;

    if hall_number_taken(&state.db.pool, req.hall_number, None).await? {
        return Err(AppError::Conflict(format!(
            "Зал с номером {} уже существует",
            req.hall_number
        )));
    }

    let hall = sqlx::query_as::<_, Hall>(
        "INSERT INTO halls (hall_number, rows_count, seats_per_row)
         VALUES ($1, $2, $3)
         RETURNING *",
    )
    .bind(req.hall_number)
    .bind(req.rows_count)
    .bind(req.seats_per_row)
    .fetch_one(&state.db.pool)
    .await?;

    Ok((StatusCode::CREATED, Json(HallResponse::from(hall))))
}

// PUT /api/halls/{id}
//
// Изменение размеров зала не трогает сетки билетов уже созданных сеансов:
// сетка принадлежит сеансу и пересоздается только при смене зала у сеанса.
async fn update_hall(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<CreateHallRequest>,
) -> AppResult<impl IntoResponse> {
    req.validate()?;

    if hall_number_taken(&state.db.pool, req.hall_number, Some(id)).await? {
        return Err(AppError::Conflict(format!(
            "Зал с номером {} уже существует",
            req.hall_number
        )));
    }

    let hall = sqlx::query_as::<_, Hall>(
        "UPDATE halls
         SET hall_number = $1, rows_count = $2, seats_per_row = $3
         WHERE hall_id = $4
         RETURNING *",
    )
    .bind(req.hall_number)
    .bind(req.rows_count)
    .bind(req.seats_per_row)
    .bind(id)
    .fetch_optional(&state.db.pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Зал не найден".to_string()))?;

    Ok(Json(HallResponse::from(hall)))
}

/// DELETE /api/halls/{id}
///
/// Каскадное удаление зала вместе с его сеансами и их билетами.
async fn delete_hall(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    let mut tx = state.db.pool.begin().await?;

    let hall = sqlx::query_as::<_, Hall>("SELECT * FROM halls WHERE hall_id = $1")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Зал не найден".to_string()))?;

    let session_ids = sqlx::query_scalar::<_, i64>(
        "SELECT session_id FROM sessions WHERE hall_id = $1",
    )
    .bind(id)
    .fetch_all(&mut *tx)
    .await?;

    let tickets_deleted = sqlx::query("DELETE FROM tickets WHERE session_id = ANY($1)")
        .bind(&session_ids)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    let sessions_deleted = sqlx::query("DELETE FROM sessions WHERE hall_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    sqlx::query("DELETE FROM halls WHERE hall_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(
        hall_id = id,
        sessions = sessions_deleted,
        tickets = tickets_deleted,
        "hall deleted with cascade"
    );

    Ok(Json(json!({
        "message": format!(
            "Зал успешно удален. Также удалено {} сеансов и {} билетов, связанных с этим залом.",
            sessions_deleted, tickets_deleted
        ),
        "deleted_hall": hall,
        "deleted_sessions_count": sessions_deleted,
        "deleted_tickets_count": tickets_deleted,
    })))
}

/* ---------- tests ---------- */

#[cfg(test)]
mod tests {
    use super::*;

    fn hall_request(rows_count: i32, seats_per_row: i32) -> CreateHallRequest {
        CreateHallRequest {
            hall_number: 1,
            rows_count,
            seats_per_row,
        }
    }

    #[test]
    fn oversized_hall_fails_validation() {
        assert!(hall_request(70_000, 70_000).validate().is_err());
        assert!(hall_request(1001, 10).validate().is_err());
        assert!(hall_request(10, 1001).validate().is_err());
    }

    #[test]
    fn hall_at_limit_passes_validation() {
        assert!(hall_request(1000, 1000).validate().is_ok());
        assert!(hall_request(1, 1).validate().is_ok());
    }

    #[test]
    fn capacity_of_largest_hall_fits_i32() {
        let hall = Hall {
            hall_id: 1,
            hall_number: 1,
            rows_count: 1000,
            seats_per_row: 1000,
        };
        assert_eq!(hall.capacity(), 1_000_000);
    }
}
