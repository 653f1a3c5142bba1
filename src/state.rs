//! Application state: configuration and the optional completion client.
//!
//! Nothing in here changes after startup; handlers share it through `Arc`.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::completion::{ChatCompletionsClient, TextCompletion};
use crate::config::{load_app_config_from_env, AppConfig};

#[derive(Clone)]
pub struct AppState {
  pub config: AppConfig,
  pub completion: Option<Arc<dyn TextCompletion>>,
}

impl AppState {
  /// Build state from env: load config and init the completion client.
  #[instrument(level = "info", skip_all)]
  pub fn from_env() -> Self {
    let config = load_app_config_from_env();

    let completion = ChatCompletionsClient::from_env().map(|c| Arc::new(c) as Arc<dyn TextCompletion>);
    match &completion {
      Some(c) => info!(target: "story_quiz_backend", provider = %c.describe(), "Completion client enabled."),
      None => warn!(target: "story_quiz_backend", "No completion provider configured; generation endpoints will fail."),
    }
    info!(
      target: "story_quiz_backend",
      default_language = %config.default_language,
      min_words = config.limits.min_word_count,
      max_words = config.limits.max_word_count,
      "Configuration ready"
    );

    Self { config, completion }
  }

  pub fn new(config: AppConfig, completion: Option<Arc<dyn TextCompletion>>) -> Self {
    Self { config, completion }
  }
}
