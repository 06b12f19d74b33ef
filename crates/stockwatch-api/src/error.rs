//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use stockwatch_core::engine::CheckError;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  /// A check that stopped part-way; the response carries what it completed.
  #[error(transparent)]
  Check(#[from] CheckError),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl From<stockwatch_core::Error> for ApiError {
  fn from(e: stockwatch_core::Error) -> Self {
    match e {
      stockwatch_core::Error::Configuration(m) => ApiError::BadRequest(m),
      other => ApiError::Store(Box::new(other)),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    match self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, Json(json!({ "error": m }))).into_response(),
      ApiError::BadRequest(m) => {
        (StatusCode::BAD_REQUEST, Json(json!({ "error": m }))).into_response()
      }
      ApiError::Check(e) if e.cause.is_configuration() => {
        (StatusCode::BAD_REQUEST, Json(json!({ "error": e.cause.to_string() }))).into_response()
      }
      ApiError::Check(e) => (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": e.cause.to_string(), "completed": e.completed })),
      )
        .into_response(),
      ApiError::Store(e) => {
        (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))).into_response()
      }
    }
  }
}
