//! Application configuration: request limits, default language, and per-language
//! prompt profiles. Built-in defaults cover a generic profile (any language, JSON
//! quizzes) and a Russian profile (Russian prompts, numbered-text quizzes).
//! A TOML file named by `APP_CONFIG_PATH` can override any of it.
//!
//! Template placeholders: `{language}`, `{proficiency}`, `{theme}`, `{word_count}`,
//! `{story}`, `{extra_instructions}`.

use std::collections::HashMap;

use serde::Deserialize;
use tracing::{error, info};

use crate::domain::QuestionType;

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct AppConfig {
  pub default_language: String,
  pub limits: Limits,
  /// Profile used for languages without their own entry.
  pub generic: LanguageProfile,
  /// Keyed by lower-case language name.
  pub languages: HashMap<String, LanguageProfile>,
}

impl Default for AppConfig {
  fn default() -> Self {
    let mut languages = HashMap::new();
    languages.insert("russian".to_string(), LanguageProfile::russian());
    Self {
      default_language: "russian".into(),
      limits: Limits::default(),
      generic: LanguageProfile::default(),
      languages,
    }
  }
}

impl AppConfig {
  /// Profile for `language` (case-insensitive), or the generic one.
  pub fn profile(&self, language: &str) -> &LanguageProfile {
    self.languages.get(&language.trim().to_lowercase()).unwrap_or(&self.generic)
  }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Limits {
  pub min_word_count: u32,
  pub max_word_count: u32,
}

impl Default for Limits {
  fn default() -> Self { Self { min_word_count: 50, max_word_count: 1000 } }
}

/// How the model is asked to lay out quiz questions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuizFormat {
  /// `{"questions": [...]}` requested in JSON-object mode.
  Structured,
  /// `1. question` followed by `А) option` lines.
  Numbered,
}

/// Sampling parameters for one kind of call.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(default)]
pub struct Sampling {
  pub max_tokens: u32,
  pub temperature: f32,
  pub top_p: Option<f32>,
}

impl Default for Sampling {
  fn default() -> Self { Self { max_tokens: 1000, temperature: 0.7, top_p: None } }
}

/// Story length budget: `word_count * tokens_per_word`, clamped to `[min_tokens, max_tokens]`.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(default)]
pub struct StoryBudget {
  pub tokens_per_word: f32,
  pub min_tokens: u32,
  pub max_tokens: u32,
  pub temperature: f32,
  pub top_p: Option<f32>,
}

impl Default for StoryBudget {
  fn default() -> Self {
    Self { tokens_per_word: 2.0, min_tokens: 0, max_tokens: 2000, temperature: 0.7, top_p: Some(0.9) }
  }
}

impl StoryBudget {
  pub fn max_tokens_for(&self, word_count: u32) -> u32 {
    let wanted = (word_count as f32 * self.tokens_per_word).floor() as u32;
    wanted.clamp(self.min_tokens, self.max_tokens.max(self.min_tokens))
  }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct LanguageProfile {
  pub quiz_format: QuizFormat,
  /// Appended to prompts through `{extra_instructions}`.
  pub extra_instructions: String,

  pub story_system: String,
  pub story_user_template: String,
  pub story: StoryBudget,

  pub title_system: String,
  pub title_user_template: String,
  pub title: Sampling,

  pub comprehension_system: String,
  pub comprehension_user_template: String,
  pub grammar_system: String,
  pub grammar_user_template: String,
  pub questions: Sampling,
}

impl LanguageProfile {
  pub fn question_prompts(&self, kind: QuestionType) -> (&str, &str) {
    match kind {
      QuestionType::Comprehension => (&self.comprehension_system, &self.comprehension_user_template),
      QuestionType::Grammar => (&self.grammar_system, &self.grammar_user_template),
    }
  }

  pub fn russian() -> Self {
    let extra = "ВАЖНО: используйте только печатные буквы кириллицы и обычный регистр, как в книге или газете. \
НЕ ПИШИТЕ ВЕСЬ ТЕКСТ ЗАГЛАВНЫМИ БУКВАМИ.";
    let numbered_format = "Формат для каждого вопроса:\n1. [Вопрос]\n   А) [Вариант ответа]\n   Б) [Вариант ответа]\n   В) [Вариант ответа]\n   Г) [Вариант ответа]";
    Self {
      quiz_format: QuizFormat::Numbered,
      extra_instructions: extra.into(),

      story_system: "Вы профессиональный преподаватель русского языка, создающий учебные материалы.\n\n{extra_instructions}".into(),
      story_user_template: "Напишите увлекательный рассказ на русском языке:\n\nУровень: {proficiency}\nТема: {theme}\nДлина: примерно {word_count} слов\n\n{extra_instructions}\n\nСоздайте интересную историю с диалогами и описаниями, подходящую для уровня {proficiency}.".into(),
      story: StoryBudget { tokens_per_word: 1.5, min_tokens: 800, max_tokens: 4000, temperature: 0.8, top_p: None },

      title_system: "Вы профессиональный преподаватель русского языка. Создайте КОРОТКИЙ заголовок (2-4 слова) для рассказа на русском языке. Пишите как обычный заголовок в русской книге.".into(),
      title_user_template: "Создайте короткий заголовок для этого рассказа (2-4 слова на русском языке):\n\n{story}\n\n{extra_instructions}".into(),
      title: Sampling { max_tokens: 20, temperature: 0.7, top_p: None },

      comprehension_system: "Вы преподаватель русского языка. Создайте 5 вопросов на понимание прочитанного текста на русском языке с вариантами ответов.\n\n{extra_instructions}".into(),
      comprehension_user_template: format!(
        "На основе этого рассказа создайте 5 вопросов на понимание содержания с множественным выбором. Каждый вопрос должен иметь 4 варианта ответа (А, Б, В, Г):\n\n{{story}}\n\n{{extra_instructions}}\n\n{}\n\nТолько один вариант должен быть правильным.",
        numbered_format
      ),
      grammar_system: "Вы преподаватель русской грамматики. Создайте 5 грамматических вопросов на основе текста на русском языке с вариантами ответов.\n\n{extra_instructions}".into(),
      grammar_user_template: format!(
        "На основе этого рассказа создайте 5 грамматических упражнений с множественным выбором. Каждый вопрос должен иметь 4 варианта ответа (А, Б, В, Г). Сосредоточьтесь на падежах, временах глаголов и согласовании:\n\n{{story}}\n\n{{extra_instructions}}\n\n{}\n\nТолько один вариант должен быть правильным.",
        numbered_format
      ),
      questions: Sampling { max_tokens: 1200, temperature: 0.7, top_p: None },
    }
  }
}

impl Default for LanguageProfile {
  fn default() -> Self {
    let json_shape = r#"Format as JSON with this structure: {"questions": [{"question": "...", "options": {"A": "...", "B": "...", "C": "...", "D": "..."}, "correct": "A"}]}"#;
    Self {
      quiz_format: QuizFormat::Structured,
      extra_instructions: String::new(),

      story_system: "You are a language learning assistant that creates engaging stories for language learners at different proficiency levels.".into(),
      story_user_template: "Generate a short story in {language} at {proficiency} proficiency level about the theme: {theme}. The story should be approximately {word_count} words long. Make it engaging and appropriate for language learners at this level. Include vocabulary and cultural context related to {theme}.{extra_instructions}".into(),
      story: StoryBudget::default(),

      title_system: "You are a creative title generator for language learning stories. Generate concise, engaging titles.".into(),
      title_user_template: "Generate a creative and descriptive title in {language} for a {language} story about {theme} at {proficiency} level. Keep it under 60 characters.{extra_instructions}".into(),
      title: Sampling { max_tokens: 50, temperature: 0.8, top_p: Some(0.9) },

      comprehension_system: "You are a language learning assistant that creates educational questions for language learners. Always respond with valid JSON only.".into(),
      comprehension_user_template: format!(
        "Based on this {{language}} story, create 5 multiple-choice comprehension questions in English. Each question should have 4 options (A, B, C, D) with one correct answer. Focus on understanding the plot, characters, and main ideas. {}\n\nStory: {{story}}",
        json_shape
      ),
      grammar_system: "You are a language learning assistant that creates educational questions for language learners. Always respond with valid JSON only.".into(),
      grammar_user_template: format!(
        "Based on this {{language}} story, create 5 multiple-choice grammar questions in English about the grammar structures used in the story. Each question should have 4 options (A, B, C, D) with one correct answer. Focus on verb tenses, sentence structure, and other grammatical elements present in the text. {}\n\nStory: {{story}}",
        json_shape
      ),
      questions: Sampling { max_tokens: 1500, temperature: 0.5, top_p: None },
    }
  }
}

/// Parse a TOML document. Language keys are lower-cased; profiles given in TOML
/// start from the generic defaults for any field they leave out.
pub fn parse_app_config(s: &str) -> Result<AppConfig, toml::de::Error> {
  let mut cfg: AppConfig = toml::from_str(s)?;
  cfg.languages = cfg.languages.into_iter().map(|(k, v)| (k.to_lowercase(), v)).collect();
  let defaults = AppConfig::default();
  for (name, profile) in defaults.languages {
    cfg.languages.entry(name).or_insert(profile);
  }
  Ok(cfg)
}

/// Load from APP_CONFIG_PATH. Missing variable, IO or parse errors fall back to defaults.
pub fn load_app_config_from_env() -> AppConfig {
  let Ok(path) = std::env::var("APP_CONFIG_PATH") else {
    return AppConfig::default();
  };
  match std::fs::read_to_string(&path) {
    Ok(s) => match parse_app_config(&s) {
      Ok(cfg) => {
        info!(target: "story_quiz_backend", %path, languages = cfg.languages.len(), "Loaded app config (TOML)");
        cfg
      }
      Err(e) => {
        error!(target: "story_quiz_backend", %path, error = %e, "Failed to parse TOML config; using defaults");
        AppConfig::default()
      }
    },
    Err(e) => {
      error!(target: "story_quiz_backend", %path, error = %e, "Failed to read TOML config file; using defaults");
      AppConfig::default()
    }
  }
}
