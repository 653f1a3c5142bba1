//! Error types. Handler errors are converted once, at the HTTP boundary, into a
//! JSON body `{ "error": ..., "details"?: ... }`.

use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum CompletionError {
  #[error("completion client not initialized")]
  NotConfigured,
  #[error("HTTP error: {0}")]
  Http(#[from] reqwest::Error),
  #[error("API error (HTTP {status}): {message}")]
  Api { status: u16, message: String },
  #[error("completion returned no text")]
  Empty,
}

#[derive(Error, Debug)]
pub enum AppError {
  /// Missing or out-of-range request parameters.
  #[error("{0}")]
  Validation(String),
  /// The completion service is not configured or the call failed.
  #[error("{public}: {details}")]
  UpstreamUnavailable { public: &'static str, details: String },
  #[error("Endpoint not found")]
  NotFound,
}

impl AppError {
  pub fn validation(msg: impl Into<String>) -> Self { AppError::Validation(msg.into()) }

  pub fn upstream(public: &'static str, err: impl std::fmt::Display) -> Self {
    AppError::UpstreamUnavailable { public, details: err.to_string() }
  }

  pub fn status(&self) -> StatusCode {
    match self {
      AppError::Validation(_) => StatusCode::BAD_REQUEST,
      AppError::UpstreamUnavailable { .. } => StatusCode::INTERNAL_SERVER_ERROR,
      AppError::NotFound => StatusCode::NOT_FOUND,
    }
  }
}

impl IntoResponse for AppError {
  fn into_response(self) -> Response {
    let status = self.status();
    let body = match &self {
      AppError::Validation(msg) => json!({ "error": msg }),
      AppError::UpstreamUnavailable { public, details } => {
        error!(target: "story_quiz_backend", %details, "{}", public);
        json!({ "error": public, "details": details })
      }
      AppError::NotFound => json!({ "error": self.to_string() }),
    };
    (status, Json(body)).into_response()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn statuses_follow_error_kind() {
    assert_eq!(AppError::validation("bad").status(), StatusCode::BAD_REQUEST);
    assert_eq!(AppError::upstream("Failed", CompletionError::Empty).status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(AppError::NotFound.status(), StatusCode::NOT_FOUND);
  }

  #[test]
  fn api_error_message_includes_status() {
    let e = CompletionError::Api { status: 401, message: "bad key".into() };
    assert_eq!(e.to_string(), "API error (HTTP 401): bad key");
  }
}
