//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use tandem_core::store::StoreError;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("unauthorized")]
  Unauthorized,

  /// The caller is not a participant. Carries no detail so nothing about the
  /// chat leaks.
  #[error("forbidden")]
  Forbidden,

  #[error("{0}")]
  InvalidOperation(String),

  #[error("{message}")]
  Validation { field: &'static str, message: String },

  #[error("not found: {0}")]
  NotFound(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  /// Classify a backend error: domain rejections map to their client error,
  /// everything else is an internal failure.
  pub fn from_store<E: StoreError>(err: E) -> Self {
    match err.rejection() {
      Some(rejection) => rejection.clone().into(),
      None => ApiError::Store(Box::new(err)),
    }
  }
}

impl From<tandem_core::Error> for ApiError {
  fn from(err: tandem_core::Error) -> Self {
    use tandem_core::Error as E;
    match err {
      E::SelfTarget => ApiError::InvalidOperation(err.to_string()),
      E::NotParticipant { .. } => ApiError::Forbidden,
      E::UserNotFound(_) | E::ChatNotFound(_) => ApiError::NotFound(err.to_string()),
      E::EmptyContent | E::ContentTooLong { .. } => {
        ApiError::Validation { field: "content", message: err.to_string() }
      }
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, body) = match &self {
      ApiError::Unauthorized => {
        (StatusCode::UNAUTHORIZED, json!({ "success": false, "error": "Unauthorized" }))
      }
      ApiError::Forbidden => {
        (StatusCode::FORBIDDEN, json!({ "success": false, "error": "Forbidden" }))
      }
      ApiError::InvalidOperation(m) => {
        (StatusCode::BAD_REQUEST, json!({ "success": false, "error": m }))
      }
      ApiError::Validation { field, message } => (
        StatusCode::BAD_REQUEST,
        json!({
          "success": false,
          "error": "Validation failed",
          "fields": { (*field): [message] },
        }),
      ),
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, json!({ "success": false, "error": m })),
      ApiError::Store(e) => {
        tracing::error!(error = %e, "store operation failed");
        (
          StatusCode::INTERNAL_SERVER_ERROR,
          json!({ "success": false, "error": "Internal server error" }),
        )
      }
    };
    (status, Json(body)).into_response()
  }
}
