use axum::{http::StatusCode, Json};

use crate::{errors::ServiceError, ApiResponse};

/// `201 Created` with the standard envelope
pub type CreatedResult<T> = Result<(StatusCode, Json<ApiResponse<T>>), ServiceError>;

pub fn created<T>(data: T) -> (StatusCode, Json<ApiResponse<T>>) {
    (StatusCode::CREATED, Json(ApiResponse::success(data)))
}

pub fn success<T>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse::success(data))
}

/// Success with a human-readable confirmation alongside the data
pub fn confirmed<T>(data: T, message: impl Into<String>) -> Json<ApiResponse<T>> {
    let mut body = ApiResponse::success(data);
    body.message = Some(message.into());
    Json(body)
}
