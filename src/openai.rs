//! Minimal OpenAI-compatible chat-completions client.
//!
//! One system + one user message per call. Calls are instrumented and log
//! model name, latency, token usage and response size (never contents).
//!
//! NOTE: We never log the API key or prompt bodies.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::config::LlmSettings;
use crate::llm::{LlmCall, MISSING_KEY_MESSAGE};

#[derive(Clone)]
pub struct OpenAI {
  pub client: reqwest::Client,
  pub api_key: Option<String>,
  pub settings: LlmSettings,
}

impl OpenAI {
  /// Build the client. A missing OPENAI_API_KEY is not fatal: every call then
  /// answers with the missing-key sentinel.
  pub fn from_env(settings: LlmSettings) -> Result<Self, reqwest::Error> {
    let api_key = std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.trim().is_empty());
    Self::new(api_key, settings)
  }

  pub fn new(api_key: Option<String>, settings: LlmSettings) -> Result<Self, reqwest::Error> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(settings.timeout_secs))
      .build()?;
    Ok(Self { client, api_key, settings })
  }

  /// Chat completion returning the first choice's text.
  async fn chat(&self, api_key: &str, system: &str, user: &str) -> Result<String, String> {
    let url = format!("{}/chat/completions", self.settings.base_url.trim_end_matches('/'));
    let req = ChatCompletionRequest {
      model: self.settings.model.clone(),
      messages: vec![
        ChatMessageReq { role: "system".into(), content: system.into() },
        ChatMessageReq { role: "user".into(), content: user.into() },
      ],
      temperature: self.settings.temperature,
      response_format: self
        .settings
        .json_mode
        .then(|| ResponseFormat { r#type: "json_object".into() }),
      max_tokens: Some(self.settings.max_tokens),
    };

    let res = self.client.post(&url)
      .header(USER_AGENT, "quizforge-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", api_key))
      .json(&req).send().await.map_err(|e| e.to_string())?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let msg = extract_openai_error(&body).unwrap_or(body);
      return Err(format!("OpenAI HTTP {}: {}", status, msg));
    }

    let body: ChatCompletionResponse = res.json().await.map_err(|e| e.to_string())?;
    if let Some(usage) = &body.usage {
      info!(target: "llm", prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "OpenAI usage");
    }
    let text = body.choices.first()
      .and_then(|c| c.message.content.clone())
      .unwrap_or_default();

    Ok(text)
  }
}

#[async_trait]
impl LlmCall for OpenAI {
  #[instrument(level = "info", skip(self, system, user), fields(model = %self.settings.model, system_len = system.len(), user_len = user.len()))]
  async fn invoke(&self, system: &str, user: &str) -> String {
    let Some(api_key) = self.api_key.as_deref() else {
      error!(target: "llm", "OPENAI_API_KEY not set; returning sentinel");
      return MISSING_KEY_MESSAGE.to_string();
    };

    let started = Instant::now();
    match self.chat(api_key, system, user).await {
      Ok(text) => {
        info!(target: "llm", elapsed_ms = started.elapsed().as_millis() as u64, response_len = text.len(), "LLM call finished");
        text
      }
      Err(e) => {
        error!(target: "llm", elapsed_ms = started.elapsed().as_millis() as u64, error = %e, "LLM call failed");
        format!("Error: {}", e)
      }
    }
  }
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  response_format: Option<ResponseFormat>,
  #[serde(skip_serializing_if = "Option::is_none")]
  max_tokens: Option<u32>,
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

/// Try to extract a clean error message from OpenAI error body.
fn extract_openai_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}
