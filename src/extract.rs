//! Обертки над экстракторами axum.
//!
//! Стандартные отказы `axum::Json` и `axum::extract::Query` - plain text,
//! а весь API отвечает JSON вида `{"error": "..."}`. Эти обертки
//! переводят отказ экстрактора в [`AppError`], так что битое тело запроса
//! или нечитаемые параметры фильтра приходят клиенту в том же конверте,
//! что и остальные ошибки.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::error::AppError;

/// `axum::Json` с JSON-отказом. В ответах ведет себя как `axum::Json`.
#[derive(Debug, axum::extract::FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct Json<T>(pub T);

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

/// `axum::extract::Query` с JSON-отказом.
#[derive(Debug, axum::extract::FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct Query<T>(pub T);

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(format!("Некорректное тело запроса: {rejection}"))
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Validation(format!("Некорректные параметры запроса: {rejection}"))
    }
}
