//! QuizForge · Multiple-choice question generation backend
//!
//! - Axum HTTP API over a 3-call LLM pipeline (sentences, candidates, validation)
//! - OpenAI-compatible chat completions (via environment variables)
//! - Optional CSV vocabulary table and few-shot example banks
//!
//! Important env variables:
//!   PORT              : u16 (default 3000)
//!   OPENAI_API_KEY    : provider key; without it every batch fails at Stage 1
//!   OPENAI_BASE_URL   : default "https://api.openai.com/v1"
//!   OPENAI_MODEL      : default "gpt-4o"
//!   AGENT_CONFIG_PATH : path to TOML config (prompts, llm settings, data paths)
//!   VOCAB_LIST_PATH   : vocabulary table CSV
//!   GRAMMAR_BANK_PATH : grammar example bank CSV
//!   VOCAB_BANK_PATH   : vocabulary example bank CSV
//!   LOG_LEVEL         : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT        : "pretty" (default) or "json"

mod telemetry;
mod util;
mod domain;
mod error;
mod config;
mod catalog;
mod lexical;
mod normalize;
mod llm;
mod planner;
mod prompts;
mod bank;
mod openai;
mod pipeline;
mod state;
mod protocol;
mod logic;
mod routes;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, instrument};

use crate::routes::build_router;
use crate::state::AppState;

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Shared state: LLM client, prompts, data tables, batch history.
  let state = Arc::new(AppState::new()?);

  let app = build_router(state);

  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "quizforge_backend", %addr, "HTTP server listening");
  axum::serve(listener, app).await?;
  Ok(())
}
