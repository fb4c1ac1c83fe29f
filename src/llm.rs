//! The single-turn LLM capability the pipeline depends on.
//!
//! Implementations never fail outward: every problem (missing key, transport,
//! provider error) comes back as text starting with `ERROR_SENTINEL`, which
//! the normalizer passes through as the stage error.

use async_trait::async_trait;

/// Prefix marking a failed call.
pub const ERROR_SENTINEL: &str = "Error:";

/// Sentinel text returned when no API key is configured.
pub const MISSING_KEY_MESSAGE: &str = "Error: API Key is missing. Please enter it in the sidebar.";

#[async_trait]
pub trait LlmCall: Send + Sync {
  /// One request/response turn: a system instruction plus a user instruction.
  async fn invoke(&self, system: &str, user: &str) -> String;
}
