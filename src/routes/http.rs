//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented; failures leave as `AppError` JSON bodies.

use std::sync::Arc;

use axum::{extract::{rejection::JsonRejection, State}, response::IntoResponse, Json};
use tracing::{info, instrument};

use crate::error::AppError;
use crate::logic::{check_answers, generate_questions, generate_story};
use crate::protocol::*;
use crate::session::GradeReport;
use crate::state::AppState;

const SERVICE_NAME: &str = "story-quiz-backend";

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
  body
    .map(|Json(b)| b)
    .map_err(|rej| AppError::validation(format!("Invalid request body: {}", rej.body_text())))
}

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(HealthOut {
    status: "healthy",
    timestamp: chrono::Utc::now().to_rfc3339(),
    service: SERVICE_NAME,
    completion_client: state.completion.is_some(),
  })
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_post_story(
  State(state): State<Arc<AppState>>,
  body: Result<Json<StoryIn>, JsonRejection>,
) -> Result<Json<StoryOut>, AppError> {
  let out = generate_story(&state, json_body(body)?).await?;
  info!(target: "story", title_len = out.title.len(), story_len = out.story.len(), "HTTP story served");
  Ok(Json(out))
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_post_questions(
  State(state): State<Arc<AppState>>,
  body: Result<Json<QuestionsIn>, JsonRejection>,
) -> Result<Json<QuestionsOut>, AppError> {
  let out = generate_questions(&state, json_body(body)?).await?;
  info!(target: "quiz", quiz_id = %out.quiz_id, count = out.questions.len(), "HTTP questions served");
  Ok(Json(out))
}

#[instrument(level = "info", skip(body))]
pub async fn http_post_check_answers(
  body: Result<Json<CheckAnswersIn>, JsonRejection>,
) -> Result<Json<GradeReport>, AppError> {
  let report = check_answers(json_body(body)?)?;
  info!(target: "quiz", correct = report.correct_count, scored = report.scored_count, percentage = report.percentage, "HTTP answers checked");
  Ok(Json(report))
}

#[instrument(level = "debug")]
pub async fn http_api_not_found() -> AppError { AppError::NotFound }
