//! Public HTTP request/response structs (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::Question;

/// Body of `POST /api/generate-story`. Everything is optional at the serde level
/// so missing fields surface as a 400 with our own message.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryIn {
  #[serde(default)]
  pub language: Option<String>,
  #[serde(default)]
  pub proficiency: Option<String>,
  #[serde(default)]
  pub theme: Option<String>,
  #[serde(default)]
  pub word_count: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct StoryOut {
  pub story: String,
  pub title: String,
}

/// Body of `POST /api/generate-questions`. Older clients send `questionType`.
#[derive(Debug, Default, Deserialize)]
pub struct QuestionsIn {
  #[serde(default)]
  pub story: Option<String>,
  #[serde(default, rename = "type", alias = "questionType")]
  pub question_type: Option<String>,
  #[serde(default)]
  pub language: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionsOut {
  pub quiz_id: String,
  pub questions: Vec<Question>,
}

/// Body of `POST /api/check-answers`: the questions as served plus picks by index.
#[derive(Debug, Deserialize)]
pub struct CheckAnswersIn {
  pub questions: Vec<Question>,
  #[serde(default)]
  pub selections: BTreeMap<usize, String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthOut {
  pub status: &'static str,
  pub timestamp: String,
  pub service: &'static str,
  pub completion_client: bool,
}
