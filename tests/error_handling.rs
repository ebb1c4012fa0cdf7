//! Проверки отображения `AppError` в HTTP-ответы.
//!
//! Сервер не нужен: `IntoResponse` вызывается напрямую на значениях
//! ошибок, тело разбирается как JSON.

use axum::response::IntoResponse;
use http_body_util::BodyExt;

use cinema_system::error::AppError;

/// Helper: статус и разобранное JSON-тело ответа.
async fn error_to_response(err: AppError) -> (axum::http::StatusCode, serde_json::Value) {
    let response = err.into_response();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    (status, json)
}

#[tokio::test]
async fn validation_error_returns_400() {
    let err = AppError::Validation("Указанный фильм не существует".to_string());

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, axum::http::StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Указанный фильм не существует");
}

#[tokio::test]
async fn conflict_error_returns_400() {
    let err = AppError::Conflict("Это место уже занято в данном сеансе".to_string());

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, axum::http::StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Это место уже занято в данном сеансе");
}

#[tokio::test]
async fn not_found_error_returns_404() {
    let err = AppError::NotFound("Сеанс не найден".to_string());

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, axum::http::StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "Сеанс не найден");
}

#[tokio::test]
async fn internal_error_returns_500_and_hides_details() {
    let err = AppError::Internal("pool exhausted at pg://secret-host".to_string());

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, axum::http::StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"], "Внутренняя ошибка сервера");
}

#[tokio::test]
async fn row_not_found_maps_to_404() {
    let err = AppError::Database(sqlx::Error::RowNotFound);

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, axum::http::StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "Запись не найдена");
}

#[tokio::test]
async fn unexpected_database_error_maps_to_500() {
    let err = AppError::Database(sqlx::Error::PoolTimedOut);

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, axum::http::StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"], "Внутренняя ошибка сервера");
}

#[tokio::test]
async fn malformed_json_body_rejects_with_json_envelope() {
    use axum::extract::FromRequest;

    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/api/films")
        .header("content-type", "application/json")
        .body(axum::body::Body::from("{это не json"))
        .unwrap();

    let err = cinema_system::extract::Json::<serde_json::Value>::from_request(request, &())
        .await
        .unwrap_err();

    let (status, json) = error_to_response(err).await;
    assert_eq!(status, axum::http::StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().starts_with("Некорректное тело запроса"));
}

#[tokio::test]
async fn unparseable_query_filter_rejects_with_json_envelope() {
    use axum::extract::FromRequestParts;

    #[derive(Debug, serde::Deserialize)]
    struct Filters {
        #[allow(dead_code)]
        film_id: Option<i64>,
    }

    let request = axum::http::Request::builder()
        .uri("/api/tickets?film_id=abc")
        .body(axum::body::Body::empty())
        .unwrap();
    let (mut parts, _) = request.into_parts();

    let err = cinema_system::extract::Query::<Filters>::from_request_parts(&mut parts, &())
        .await
        .unwrap_err();

    let (status, json) = error_to_response(err).await;
    assert_eq!(status, axum::http::StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().starts_with("Некорректные параметры запроса"));
}

#[tokio::test]
async fn every_error_body_has_only_error_key() {
    for err in [
        AppError::Validation("x".to_string()),
        AppError::Conflict("x".to_string()),
        AppError::NotFound("x".to_string()),
        AppError::Internal("x".to_string()),
    ] {
        let (_, json) = error_to_response(err).await;
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), 1);
        assert!(obj.contains_key("error"));
    }
}
