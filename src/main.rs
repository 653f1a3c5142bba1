//! Story Quiz · language-learning story and quiz backend
//!
//! - Axum HTTP API: story generation, quiz generation, answer checking, health
//! - Chat-completion provider (Azure OpenAI or OpenAI-compatible) via environment variables
//! - Static SPA fallback (./static/index.html)
//!
//! Important env variables (a `.env` file is read first if present):
//!   PORT                         : u16 (default 3000)
//!   AZURE_OPENAI_ENDPOINT        : enables the Azure provider (with AZURE_OPENAI_API_KEY)
//!   AZURE_OPENAI_DEPLOYMENT_NAME : default "gpt-4"
//!   AZURE_OPENAI_API_VERSION     : default "2024-02-01"
//!   OPENAI_API_KEY               : enables the OpenAI-compatible provider when Azure is unset
//!   OPENAI_BASE_URL              : default "https://api.openai.com/v1"
//!   OPENAI_MODEL                 : default "gpt-4o-mini"
//!   COMPLETION_TIMEOUT_SECS      : default 60
//!   APP_CONFIG_PATH              : TOML with limits, default language and prompt profiles
//!   LOG_LEVEL                    : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT                   : "pretty" (default) or "json"

mod completion;
mod config;
mod domain;
mod error;
mod logic;
mod parser;
mod protocol;
mod routes;
mod session;
mod state;
mod telemetry;
mod util;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::info;

use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  // Missing .env is fine; real deployments set the environment directly.
  let _ = dotenvy::dotenv();
  telemetry::init_tracing();

  let state = Arc::new(AppState::from_env());
  let app = build_router(state);

  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "story_quiz_backend", %addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  info!(target: "story_quiz_backend", "Server stopped");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(target: "story_quiz_backend", error = %e, "Failed to listen for shutdown signal");
    std::future::pending::<()>().await;
  }
  info!(target: "story_quiz_backend", "Shutdown signal received");
}
