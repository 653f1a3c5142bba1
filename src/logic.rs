//! Core behaviors behind the HTTP handlers:
//!   - story generation (validate, fill prompts, story call then title call)
//!   - quiz generation (one call, then the question parser)
//!   - answer checking through a quiz session

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::completion::{CompletionRequest, TextCompletion};
use crate::config::{LanguageProfile, QuizFormat};
use crate::domain::{Proficiency, QuestionType};
use crate::error::{AppError, CompletionError};
use crate::parser::{parse_questions, revalidate};
use crate::protocol::{CheckAnswersIn, QuestionsIn, QuestionsOut, StoryIn, StoryOut};
use crate::session::{GradeReport, QuizSession};
use crate::state::AppState;
use crate::util::{clean_title, fill_template, preview};

const STORY_FAILED: &str = "Failed to generate story";
const QUESTIONS_FAILED: &str = "Failed to generate questions";

/// Validated story parameters.
#[derive(Debug)]
struct StoryParams {
  language: String,
  proficiency: Proficiency,
  theme: String,
  word_count: u32,
}

fn validate_story(state: &AppState, body: StoryIn) -> Result<StoryParams, AppError> {
  let theme = body.theme.map(|t| t.trim().to_string()).filter(|t| !t.is_empty());
  let proficiency = body.proficiency.filter(|p| !p.trim().is_empty());

  let mut missing = Vec::new();
  if proficiency.is_none() { missing.push("proficiency"); }
  if theme.is_none() { missing.push("theme"); }
  if body.word_count.is_none() { missing.push("wordCount"); }
  let (Some(proficiency), Some(theme), Some(word_count)) = (proficiency, theme, body.word_count) else {
    return Err(AppError::validation(format!("Missing required parameters: {}", missing.join(", "))));
  };

  let proficiency: Proficiency = proficiency
    .parse()
    .map_err(|_| AppError::validation("Invalid proficiency level"))?;

  let limits = &state.config.limits;
  let word_count = u32::try_from(word_count)
    .ok()
    .filter(|w| (limits.min_word_count..=limits.max_word_count).contains(w))
    .ok_or_else(|| {
      AppError::validation(format!(
        "Word count must be between {} and {}",
        limits.min_word_count, limits.max_word_count
      ))
    })?;

  let language = body
    .language
    .map(|l| l.trim().to_string())
    .filter(|l| !l.is_empty())
    .unwrap_or_else(|| state.config.default_language.clone());

  Ok(StoryParams { language, proficiency, theme, word_count })
}

fn client(state: &AppState) -> Result<&Arc<dyn TextCompletion>, CompletionError> {
  state.completion.as_ref().ok_or(CompletionError::NotConfigured)
}

#[instrument(level = "info", skip(state, body))]
pub async fn generate_story(state: &AppState, body: StoryIn) -> Result<StoryOut, AppError> {
  let params = validate_story(state, body)?;
  let client = client(state).map_err(|e| AppError::upstream(STORY_FAILED, e))?;
  let profile = state.config.profile(&params.language);

  let word_count = params.word_count.to_string();
  let vars = [
    ("language", params.language.as_str()),
    ("proficiency", params.proficiency.as_str()),
    ("theme", params.theme.as_str()),
    ("word_count", word_count.as_str()),
    ("extra_instructions", profile.extra_instructions.as_str()),
  ];

  let story = client
    .complete(CompletionRequest {
      system: fill_template(&profile.story_system, &vars),
      user: fill_template(&profile.story_user_template, &vars),
      max_tokens: profile.story.max_tokens_for(params.word_count),
      temperature: profile.story.temperature,
      top_p: profile.story.top_p,
      json_object: false,
    })
    .await
    .map_err(|e| AppError::upstream(STORY_FAILED, e))?
    .trim()
    .to_string();
  if story.is_empty() {
    return Err(AppError::upstream(STORY_FAILED, "No story generated"));
  }

  let title = generate_title(&**client, profile, &vars, &story).await;
  let title = if title.is_empty() {
    format!("{} Story in {}", params.theme, params.language)
  } else {
    title
  };

  info!(
    target: "story",
    language = %params.language,
    proficiency = %params.proficiency,
    words = params.word_count,
    story_len = story.len(),
    title = %preview(&title, 60),
    "Story generated"
  );
  Ok(StoryOut { story, title })
}

/// A failed title call is not fatal; the caller falls back to a generic title.
async fn generate_title(
  client: &dyn TextCompletion,
  profile: &LanguageProfile,
  vars: &[(&str, &str)],
  story: &str,
) -> String {
  let mut vars = vars.to_vec();
  vars.push(("story", story));
  let request = CompletionRequest {
    system: fill_template(&profile.title_system, &vars),
    user: fill_template(&profile.title_user_template, &vars),
    max_tokens: profile.title.max_tokens,
    temperature: profile.title.temperature,
    top_p: profile.title.top_p,
    json_object: false,
  };
  match client.complete(request).await {
    Ok(raw) => clean_title(&raw),
    Err(e) => {
      warn!(target: "story", error = %e, "Title generation failed; using fallback title");
      String::new()
    }
  }
}

#[instrument(level = "info", skip(state, body))]
pub async fn generate_questions(state: &AppState, body: QuestionsIn) -> Result<QuestionsOut, AppError> {
  let story = body.story.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
  let kind = body.question_type.filter(|t| !t.trim().is_empty());
  let (Some(story), Some(kind)) = (story, kind) else {
    return Err(AppError::validation("Missing required parameters: story, type"));
  };
  let kind: QuestionType = kind.parse().map_err(|_| AppError::validation("Invalid question type"))?;

  let client = client(state).map_err(|e| AppError::upstream(QUESTIONS_FAILED, e))?;
  let language = body
    .language
    .map(|l| l.trim().to_string())
    .filter(|l| !l.is_empty())
    .unwrap_or_else(|| state.config.default_language.clone());
  let profile = state.config.profile(&language);

  let vars = [
    ("language", language.as_str()),
    ("story", story.as_str()),
    ("extra_instructions", profile.extra_instructions.as_str()),
  ];
  let (system, user) = profile.question_prompts(kind);

  let raw = client
    .complete(CompletionRequest {
      system: fill_template(system, &vars),
      user: fill_template(user, &vars),
      max_tokens: profile.questions.max_tokens,
      temperature: profile.questions.temperature,
      top_p: profile.questions.top_p,
      json_object: profile.quiz_format == QuizFormat::Structured,
    })
    .await
    .map_err(|e| AppError::upstream(QUESTIONS_FAILED, e))?;
  if raw.trim().is_empty() {
    return Err(AppError::upstream(QUESTIONS_FAILED, "No questions generated"));
  }

  let questions = parse_questions(&raw);
  for (index, q) in questions.iter().enumerate() {
    debug!(target: "quiz", index, kind = q.kind_name(), prompt = %preview(q.prompt(), 40), "Parsed question");
  }
  let quiz_id = Uuid::new_v4().to_string();
  let scorable = questions.iter().filter(|q| q.is_scorable()).count();
  info!(target: "quiz", %quiz_id, %language, kind = kind.as_str(), count = questions.len(), scorable, "Quiz generated");
  Ok(QuestionsOut { quiz_id, questions })
}

/// Grade a submitted quiz by replaying it through a fresh session.
#[instrument(level = "info", skip(body), fields(questions = body.questions.len(), selections = body.selections.len()))]
pub fn check_answers(body: CheckAnswersIn) -> Result<GradeReport, AppError> {
  let questions = body.questions.into_iter().map(revalidate).collect();
  let session = body
    .selections
    .iter()
    .fold(QuizSession::start(questions), |session, (index, label)| session.record_selection(*index, label))
    .grade();
  debug!(target: "quiz", phase = ?session.phase(), answered = session.selection_count(), "Answers checked");
  session.report().cloned().ok_or_else(|| AppError::validation("Quiz could not be graded"))
}

#[cfg(test)]
mod tests {
  use std::collections::BTreeMap;

  use super::*;
  use crate::completion::scripted::ScriptedCompletion;
  use crate::config::AppConfig;
  use crate::domain::{AnswerOption, Question};
  use crate::session::{Outcome, ScoreBand};

  fn state_with(client: Arc<ScriptedCompletion>) -> AppState {
    AppState::new(AppConfig::default(), Some(client as Arc<dyn TextCompletion>))
  }

  fn story_in(proficiency: &str, words: i64) -> StoryIn {
    StoryIn {
      language: None,
      proficiency: Some(proficiency.into()),
      theme: Some("Winter".into()),
      word_count: Some(words),
    }
  }

  fn status_of(err: AppError) -> u16 { err.status().as_u16() }

  #[tokio::test]
  async fn story_validation_rejects_bad_input() {
    let state = state_with(Arc::new(ScriptedCompletion::default()));

    let err = generate_story(&state, StoryIn::default()).await.unwrap_err();
    assert_eq!(err.to_string(), "Missing required parameters: proficiency, theme, wordCount");
    assert_eq!(status_of(err), 400);

    let err = generate_story(&state, story_in("Z9", 200)).await.unwrap_err();
    assert_eq!(err.to_string(), "Invalid proficiency level");

    for words in [49, 1001, -5] {
      let err = generate_story(&state, story_in("b1", words)).await.unwrap_err();
      assert_eq!(err.to_string(), "Word count must be between 50 and 1000");
    }
  }

  #[tokio::test]
  async fn story_then_title_with_russian_defaults() {
    let client = Arc::new(ScriptedCompletion::replying(&["  Жила-была зима.  ", "«Зимняя сказка»"]));
    let state = state_with(client.clone());

    let out = generate_story(&state, story_in("a2", 300)).await.unwrap();
    assert_eq!(out, StoryOut { story: "Жила-была зима.".into(), title: "Зимняя сказка".into() });

    let requests = client.requests.lock().await;
    assert_eq!(requests.len(), 2);
    assert!(requests[0].user.contains("Уровень: A2"));
    assert!(requests[0].user.contains("Тема: Winter"));
    assert_eq!(requests[0].max_tokens, 800);
    assert!(requests[1].user.contains("Жила-была зима."));
    assert_eq!(requests[1].max_tokens, 20);
  }

  #[tokio::test]
  async fn failed_title_falls_back() {
    let client = Arc::new(ScriptedCompletion::new(vec![
      Ok("Once upon a time.".into()),
      Err(CompletionError::Api { status: 429, message: "slow down".into() }),
    ]));
    let state = state_with(client.clone());
    let mut body = story_in("B1", 400);
    body.language = Some("Spanish".into());

    let out = generate_story(&state, body).await.unwrap();
    assert_eq!(out.title, "Winter Story in Spanish");

    let requests = client.requests.lock().await;
    assert!(requests[0].user.starts_with("Generate a short story in Spanish at B1"));
    assert_eq!(requests[0].max_tokens, 800);
    assert_eq!(requests[0].top_p, Some(0.9));
  }

  #[tokio::test]
  async fn missing_client_is_an_upstream_error() {
    let state = AppState::new(AppConfig::default(), None);
    let err = generate_story(&state, story_in("C2", 100)).await.unwrap_err();
    assert_eq!(status_of(err), 500);

    let body = QuestionsIn { story: Some("s".into()), question_type: Some("grammar".into()), language: None };
    let err = generate_questions(&state, body).await.unwrap_err();
    assert_eq!(status_of(err), 500);
  }

  #[tokio::test]
  async fn questions_validation() {
    let state = state_with(Arc::new(ScriptedCompletion::default()));
    let err = generate_questions(&state, QuestionsIn::default()).await.unwrap_err();
    assert_eq!(status_of(err), 400);

    let body = QuestionsIn { story: Some("s".into()), question_type: Some("vocab".into()), language: None };
    let err = generate_questions(&state, body).await.unwrap_err();
    assert_eq!(err.to_string(), "Invalid question type");
  }

  #[tokio::test]
  async fn numbered_quiz_for_russian_profile() {
    let raw = "1. Кто?\nА) a\nБ) b\nВ) c\nГ) d\n2. Где?\nА) a\nБ) b\nВ) c\nГ) d";
    let client = Arc::new(ScriptedCompletion::replying(&[raw]));
    let state = state_with(client.clone());
    let body = QuestionsIn { story: Some("Рассказ".into()), question_type: Some("comprehension".into()), language: None };

    let out = generate_questions(&state, body).await.unwrap();
    assert_eq!(out.questions.len(), 2);
    assert!(out.questions.iter().all(|q| q.kind_name() == "multiple-choice-lines"));
    assert!(Uuid::parse_str(&out.quiz_id).is_ok());

    let requests = client.requests.lock().await;
    assert!(!requests[0].json_object);
    assert!(requests[0].user.contains("Рассказ"));
  }

  #[tokio::test]
  async fn structured_quiz_for_generic_profile() {
    let raw = r#"{"questions":[{"question":"Who?","options":{"A":"x","B":"y","C":"z","D":"w"},"correct":"B"}]}"#;
    let client = Arc::new(ScriptedCompletion::replying(&[raw]));
    let state = state_with(client.clone());
    let body = QuestionsIn { story: Some("A story".into()), question_type: Some("grammar".into()), language: Some("French".into()) };

    let out = generate_questions(&state, body).await.unwrap();
    assert_eq!(out.questions[0].correct_label(), Some("B"));

    let requests = client.requests.lock().await;
    assert!(requests[0].json_object);
    assert!(requests[0].user.contains("grammar questions"));
    assert!(requests[0].user.contains("French story"));
  }

  #[test]
  fn check_answers_grades_submitted_picks() {
    let q = |correct: &str| Question::MultipleChoiceStructured {
      question: "q".into(),
      options: ["A", "B", "C", "D"].iter().map(|l| AnswerOption { label: l.to_string(), text: l.to_string() }).collect(),
      correct: correct.into(),
    };
    let questions = vec![q("A"), q("B"), q("C"), q("D"), q("A")];
    let selections: BTreeMap<usize, String> =
      [(0, "A"), (1, "B"), (2, "C"), (3, "B"), (4, "B")].into_iter().map(|(i, l)| (i, l.to_string())).collect();

    let report = check_answers(CheckAnswersIn { questions, selections }).unwrap();
    assert_eq!(report.correct_count, 3);
    assert_eq!(report.percentage, 60);
    assert_eq!(report.band, ScoreBand::Fair);
  }

  #[test]
  fn check_answers_normalizes_submitted_answer_keys() {
    let q = |correct: &str| Question::MultipleChoiceStructured {
      question: "q".into(),
      options: ["a", "b"].iter().map(|l| AnswerOption { label: l.to_string(), text: l.to_string() }).collect(),
      correct: correct.into(),
    };
    let selections: BTreeMap<usize, String> = [(0, "a".to_string()), (1, "A".to_string())].into_iter().collect();

    let report = check_answers(CheckAnswersIn { questions: vec![q("a"), q("Z")], selections }).unwrap();
    assert_eq!(report.correct_count, 1);
    assert_eq!(report.scored_count, 1);
    assert_eq!(report.percentage, 100);
    assert_eq!(report.results[0].outcome, Outcome::Correct);
    assert_eq!(report.results[1].outcome, Outcome::Unscored);
  }
}
