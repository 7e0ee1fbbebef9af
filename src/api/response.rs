use serde::Serialize;
use axum::Json;
use axum::http::StatusCode;

use crate::error::ErrorResponse;

pub fn success<T: Serialize>(data: T) -> (StatusCode, Json<T>) {
    (StatusCode::OK, Json(data))
}

pub fn error(status: StatusCode, category: &str, message: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            error: category.to_string(),
            message: message.into(),
        }),
    )
}
