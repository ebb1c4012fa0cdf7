use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Ошибки уровня приложения для HTTP-обработчиков.
///
/// Реализует [`IntoResponse`] и всегда отдает JSON вида `{"error": "..."}`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Невалидные данные запроса или ссылка на несуществующую сущность.
    #[error("{0}")]
    Validation(String),

    /// Конфликт: дубликат уникального ключа, пересечение сеансов, занятое место.
    #[error("{0}")]
    Conflict(String),

    /// Сущность с указанным id не найдена.
    #[error("{0}")]
    NotFound(String),

    /// Ошибка базы данных.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Прочие внутренние ошибки.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Alias для возвращаемых значений обработчиков.
pub type AppResult<T> = Result<T, AppError>;

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(format!("Некорректные данные запроса: {errors}"))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            // Конфликты отдаются как 400, так их показывает админка
            AppError::Conflict(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Database(err) => classify_sqlx_error(err),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Внутренняя ошибка сервера".to_string(),
                )
            }
        };

        (status, axum::Json(json!({ "error": message }))).into_response()
    }
}

/// Классификация ошибок sqlx:
/// - `RowNotFound` -> 404;
/// - нарушение уникального ограничения (SQLSTATE 23505, констрейнты `uq_*`) -> 400;
/// - все остальное -> 500 с обезличенным сообщением.
fn classify_sqlx_error(err: &sqlx::Error) -> (StatusCode, String) {
    match err {
        sqlx::Error::RowNotFound => (
            StatusCode::NOT_FOUND,
            "Запись не найдена".to_string(),
        ),
        sqlx::Error::Database(db_err) => {
            if db_err.code().as_deref() == Some("23505") {
                let constraint = db_err.constraint().unwrap_or("unknown");
                if constraint.starts_with("uq_") {
                    return (
                        StatusCode::BAD_REQUEST,
                        "Запись с такими данными уже существует".to_string(),
                    );
                }
            }
            tracing::error!(error = %db_err, "database error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Внутренняя ошибка сервера".to_string(),
            )
        }
        other => {
            tracing::error!(error = %other, "database error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Внутренняя ошибка сервера".to_string(),
            )
        }
    }
}
