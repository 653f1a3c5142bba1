//! Chat-completion client for story, title and quiz generation.
//!
//! Two providers share one implementation:
//!   - Azure OpenAI (`AZURE_OPENAI_ENDPOINT` + `AZURE_OPENAI_API_KEY`), preferred when configured
//!   - any OpenAI-compatible endpoint (`OPENAI_API_KEY`, `OPENAI_BASE_URL`, `OPENAI_MODEL`)
//!
//! Calls log model names, latencies, token usage and response sizes, never keys or contents.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};

use crate::error::CompletionError;

const DEFAULT_AZURE_API_VERSION: &str = "2024-02-01";

/// One system/user exchange plus sampling parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct CompletionRequest {
  pub system: String,
  pub user: String,
  pub max_tokens: u32,
  pub temperature: f32,
  pub top_p: Option<f32>,
  /// Ask the provider for a JSON object response.
  pub json_object: bool,
}

/// Anything that can turn a prompt into generated text.
#[async_trait]
pub trait TextCompletion: Send + Sync {
  async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError>;

  /// Short, key-free description for logs and health output.
  fn describe(&self) -> String;
}

#[derive(Clone, Debug)]
pub enum Provider {
  Azure { endpoint: String, api_key: String, deployment: String, api_version: String },
  OpenAi { base_url: String, api_key: String, model: String },
}

#[derive(Clone)]
pub struct ChatCompletionsClient {
  client: reqwest::Client,
  provider: Provider,
}

impl ChatCompletionsClient {
  pub fn new(provider: Provider, timeout: Duration) -> Result<Self, CompletionError> {
    let client = reqwest::Client::builder().timeout(timeout).build()?;
    Ok(Self { client, provider })
  }

  /// Build from environment variables; None when no provider is configured.
  pub fn from_env() -> Option<Self> {
    let timeout = std::env::var("COMPLETION_TIMEOUT_SECS")
      .ok()
      .and_then(|s| s.parse::<u64>().ok())
      .map(Duration::from_secs)
      .unwrap_or_else(|| Duration::from_secs(60));

    let provider = provider_from_env()?;
    match Self::new(provider, timeout) {
      Ok(c) => Some(c),
      Err(e) => {
        error!(target: "story_quiz_backend", error = %e, "Failed to build HTTP client");
        None
      }
    }
  }

  fn url(&self) -> String {
    match &self.provider {
      Provider::Azure { endpoint, deployment, api_version, .. } => format!(
        "{}/openai/deployments/{}/chat/completions?api-version={}",
        endpoint.trim_end_matches('/'),
        deployment,
        api_version
      ),
      Provider::OpenAi { base_url, .. } => format!("{}/chat/completions", base_url.trim_end_matches('/')),
    }
  }
}

fn provider_from_env() -> Option<Provider> {
  if let Ok(endpoint) = std::env::var("AZURE_OPENAI_ENDPOINT") {
    let deployment = std::env::var("AZURE_OPENAI_DEPLOYMENT_NAME").unwrap_or_else(|_| "gpt-4".into());
    let api_version =
      std::env::var("AZURE_OPENAI_API_VERSION").unwrap_or_else(|_| DEFAULT_AZURE_API_VERSION.into());
    return match std::env::var("AZURE_OPENAI_API_KEY") {
      Ok(api_key) => Some(Provider::Azure { endpoint, api_key, deployment, api_version }),
      Err(_) => {
        error!(target: "story_quiz_backend", %endpoint, "AZURE_OPENAI_ENDPOINT set without AZURE_OPENAI_API_KEY; completion disabled");
        None
      }
    };
  }

  let api_key = std::env::var("OPENAI_API_KEY").ok()?;
  let base_url = std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
  let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());
  Some(Provider::OpenAi { base_url, api_key, model })
}

#[async_trait]
impl TextCompletion for ChatCompletionsClient {
  #[instrument(
    level = "info",
    skip(self, request),
    fields(provider = %self.describe(), max_tokens = request.max_tokens, json = request.json_object, user_len = request.user.len())
  )]
  async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError> {
    let model = match &self.provider {
      Provider::OpenAi { model, .. } => Some(model.clone()),
      Provider::Azure { .. } => None,
    };
    let body = ChatCompletionRequest {
      model,
      messages: vec![
        ChatMessageReq { role: "system".into(), content: request.system },
        ChatMessageReq { role: "user".into(), content: request.user },
      ],
      temperature: request.temperature,
      top_p: request.top_p,
      max_tokens: Some(request.max_tokens),
      response_format: request.json_object.then(|| ResponseFormat { r#type: "json_object".into() }),
    };

    let req = self
      .client
      .post(self.url())
      .header(USER_AGENT, "story-quiz-backend/0.1")
      .header(CONTENT_TYPE, "application/json");
    let req = match &self.provider {
      Provider::Azure { api_key, .. } => req.header("api-key", api_key),
      Provider::OpenAi { api_key, .. } => req.header(AUTHORIZATION, format!("Bearer {}", api_key)),
    };

    let start = Instant::now();
    let res = req.json(&body).send().await?;

    if !res.status().is_success() {
      let status = res.status().as_u16();
      let text = res.text().await.unwrap_or_default();
      let message = extract_api_error(&text).unwrap_or(text);
      error!(elapsed = ?start.elapsed(), status, "Completion request rejected");
      return Err(CompletionError::Api { status, message });
    }

    let body: ChatCompletionResponse = res.json().await?;
    if let Some(usage) = &body.usage {
      info!(prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "Completion usage");
    }
    let text = body
      .choices
      .into_iter()
      .next()
      .and_then(|c| c.message.content)
      .unwrap_or_default()
      .trim()
      .to_string();

    info!(elapsed = ?start.elapsed(), response_len = text.len(), "Completion received");
    if text.is_empty() {
      warn!("Completion had no text");
      return Err(CompletionError::Empty);
    }
    Ok(text)
  }

  fn describe(&self) -> String {
    match &self.provider {
      Provider::Azure { deployment, .. } => format!("azure:{}", deployment),
      Provider::OpenAi { model, .. } => format!("openai:{}", model),
    }
  }
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  #[serde(skip_serializing_if = "Option::is_none")]
  model: Option<String>,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  top_p: Option<f32>,
  #[serde(skip_serializing_if = "Option::is_none")]
  max_tokens: Option<u32>,
  #[serde(skip_serializing_if = "Option::is_none")]
  response_format: Option<ResponseFormat>,
}
#[derive(Serialize)]
struct ChatMessageReq { role: String, content: String }
#[derive(Serialize)]
struct ResponseFormat { #[serde(rename = "type")] r#type: String }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

/// Pull `error.message` out of an OpenAI/Azure error body.
fn extract_api_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}
