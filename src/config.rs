//! Loading service configuration (prompts, LLM settings, data paths) from TOML.
//!
//! Every section is optional; missing keys fall back to `Default`. A few
//! environment variables override the file, see `AgentConfig::apply_env`.

use serde::Deserialize;
use tracing::{error, info};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AgentConfig {
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub llm: LlmSettings,
  #[serde(default)]
  pub data: DataPaths,
}

/// System instructions for every stage of every batch mode. `{count}` is
/// replaced with the number of jobs in the batch.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub sequential_stage1_system: String,
  pub sequential_stage2_grammar_system: String,
  pub sequential_stage2_vocabulary_system: String,
  pub sequential_stage3_grammar_system: String,
  pub sequential_stage3_vocabulary_system: String,
  pub vocabulary_list_stage1_system: String,
  pub vocabulary_list_stage2_system: String,
  pub vocabulary_list_stage3_system: String,
  pub grammar_list_stage1_system: String,
  pub grammar_list_stage2_system: String,
  pub grammar_list_stage3_system: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      sequential_stage1_system: "You are an expert ELT content creator. You will generate exactly {count} complete test questions in a single JSON response. \n\nCRITICAL: Your entire response must be a JSON object with a \"questions\" key containing an array of exactly {count} question objects. Do not generate fewer questions than requested.".into(),
      sequential_stage2_grammar_system: "You are an expert ELT test designer specializing in grammar assessment. You will generate candidate distractors for exactly {count} grammar questions in a single JSON response with a \"candidates\" key.".into(),
      sequential_stage2_vocabulary_system: "You are an expert ELT test designer specializing in vocabulary assessment. You will generate candidate distractors for exactly {count} vocabulary questions in a single JSON response with a \"candidates\" key.".into(),
      sequential_stage3_grammar_system: "You are an expert English grammar validator. You will evaluate candidate distractors for exactly {count} grammar questions and return your validated selections in a JSON object with a \"validated\" key.".into(),
      sequential_stage3_vocabulary_system: "You are an expert English vocabulary validator. You will evaluate candidate distractors for exactly {count} vocabulary questions and return your validated selections in a JSON object with a \"validated\" key.".into(),
      vocabulary_list_stage1_system: "You are an expert ELT content creator. You will generate exactly {count} complete test questions in a single JSON response targeting specific vocabulary items.\n\nCRITICAL: Your entire response must be a JSON object with a \"questions\" key containing an array of exactly {count} question objects.".into(),
      vocabulary_list_stage2_system: "You are an expert ELT test designer. You will create exactly 8 candidate distractors for exactly {count} questions in JSON format.\n\nCRITICAL: You must ADAPT the input words to match the grammatical context of the sentences.".into(),
      vocabulary_list_stage3_system: "You are an expert English vocabulary validator. You will filter candidate distractors using strict morphological rules. Output results in JSON format.".into(),
      grammar_list_stage1_system: "You are an expert ELT content creator. You will generate exactly {count} complete test questions in a single JSON response targeting specific grammar items.\n\nCRITICAL: Your entire response must be a JSON object with a \"questions\" key containing an array of exactly {count} question objects.".into(),
      grammar_list_stage2_system: "You are an expert ELT test designer. You will create exactly 4 candidate distractors for exactly {count} grammar questions in JSON format.".into(),
      grammar_list_stage3_system: "You are an expert English grammar validator. You will filter candidate distractors using strict grammatical rules. Output results in JSON format.".into(),
    }
  }
}

/// Chat-completions provider settings.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
  pub model: String,
  pub base_url: String,
  pub temperature: f32,
  pub max_tokens: u32,
  pub timeout_secs: u64,
  /// Ask the provider for `response_format = json_object`.
  pub json_mode: bool,
}

impl Default for LlmSettings {
  fn default() -> Self {
    Self {
      model: "gpt-4o".into(),
      base_url: "https://api.openai.com/v1".into(),
      temperature: 0.7,
      max_tokens: 4096,
      timeout_secs: 120,
      json_mode: true,
    }
  }
}

/// Optional CSV inputs loaded at startup.
#[derive(Clone, Debug, Deserialize, Default)]
#[serde(default)]
pub struct DataPaths {
  pub vocabulary_list: Option<String>,
  pub grammar_examples: Option<String>,
  pub vocabulary_examples: Option<String>,
}

impl AgentConfig {
  /// Environment wins over the file for model, endpoint and data paths.
  pub fn apply_env(mut self) -> Self {
    if let Ok(v) = std::env::var("OPENAI_MODEL") {
      self.llm.model = v;
    }
    if let Ok(v) = std::env::var("OPENAI_BASE_URL") {
      self.llm.base_url = v;
    }
    if let Ok(v) = std::env::var("VOCAB_LIST_PATH") {
      self.data.vocabulary_list = Some(v);
    }
    if let Ok(v) = std::env::var("GRAMMAR_BANK_PATH") {
      self.data.grammar_examples = Some(v);
    }
    if let Ok(v) = std::env::var("VOCAB_BANK_PATH") {
      self.data.vocabulary_examples = Some(v);
    }
    self
  }
}

/// Attempt to load `AgentConfig` from AGENT_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_agent_config_from_env() -> Option<AgentConfig> {
  let path = std::env::var("AGENT_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<AgentConfig>(&s) {
      Ok(cfg) => {
        info!(target: "quizforge_backend", %path, "Loaded agent config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "quizforge_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "quizforge_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn partial_toml_keeps_defaults() {
    let cfg: AgentConfig = toml::from_str(
      r#"
[llm]
model = "gpt-4o-mini"
temperature = 0.2

[prompts]
grammar_list_stage3_system = "Validate {count} items."
"#,
    )
    .unwrap();
    assert_eq!(cfg.llm.model, "gpt-4o-mini");
    assert_eq!(cfg.llm.max_tokens, 4096);
    assert!(cfg.llm.json_mode);
    assert_eq!(cfg.prompts.grammar_list_stage3_system, "Validate {count} items.");
    assert!(cfg.prompts.sequential_stage1_system.contains("{count}"));
    assert!(cfg.data.vocabulary_list.is_none());
  }
}
