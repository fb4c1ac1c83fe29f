//! Application state: LLM client, prompts, loaded tables and batch history.
//!
//! This module owns:
//!   - the LLM capability (OpenAI client, or any `LlmCall` in tests)
//!   - the prompts struct (from TOML or defaults)
//!   - the vocabulary table and the few-shot example banks
//!   - the most recent finished batches (by id, plus insertion order for
//!     listing and eviction)

use std::{collections::{HashMap, VecDeque}, sync::Arc};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::bank::{load_vocabulary, ExampleBanks};
use crate::config::{load_agent_config_from_env, AgentConfig, Prompts};
use crate::domain::VocabularyEntry;
use crate::llm::LlmCall;
use crate::openai::OpenAI;
use crate::protocol::{BatchRecord, BatchSummary};

/// Finished batches kept in memory; older ones are evicted first.
pub const HISTORY_LIMIT: usize = 100;

pub struct AppState {
    pub llm: Arc<dyn LlmCall>,
    pub prompts: Prompts,
    pub vocabulary: Vec<VocabularyEntry>,
    pub examples: ExampleBanks,
    pub by_id: Arc<RwLock<HashMap<String, BatchRecord>>>,
    pub order: Arc<RwLock<VecDeque<String>>>,
    pub history_limit: usize,
}

impl AppState {
    /// Build state from env: load config, data tables and the OpenAI client.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Result<Self, reqwest::Error> {
        let cfg = load_agent_config_from_env().unwrap_or_default().apply_env();
        let AgentConfig { prompts, llm, data } = cfg;

        let vocabulary = match data.vocabulary_list.as_deref().map(load_vocabulary) {
            Some(Ok(rows)) => rows,
            Some(Err(e)) => {
                warn!(target: "quizforge_backend", error = %e, "Vocabulary table unavailable; list batches need inline rows");
                Vec::new()
            }
            None => {
                info!(target: "quizforge_backend", "No vocabulary table configured");
                Vec::new()
            }
        };
        let examples = ExampleBanks::load(data.grammar_examples.as_deref(), data.vocabulary_examples.as_deref());

        let openai = OpenAI::from_env(llm)?;
        if openai.api_key.is_some() {
            info!(target: "quizforge_backend", base_url = %openai.settings.base_url, model = %openai.settings.model, "OpenAI enabled.");
        } else {
            warn!(target: "quizforge_backend", "OPENAI_API_KEY not set; every batch will fail at Stage 1.");
        }
        info!(
            target: "quizforge_backend",
            vocabulary_rows = vocabulary.len(),
            grammar_examples = examples.grammar.len(),
            vocabulary_examples = examples.vocabulary.len(),
            "Startup data inventory"
        );

        Ok(Self::with_llm(Arc::new(openai), prompts, vocabulary, examples))
    }

    pub fn with_llm(
        llm: Arc<dyn LlmCall>,
        prompts: Prompts,
        vocabulary: Vec<VocabularyEntry>,
        examples: ExampleBanks,
    ) -> Self {
        Self {
            llm,
            prompts,
            vocabulary,
            examples,
            by_id: Arc::new(RwLock::new(HashMap::new())),
            order: Arc::new(RwLock::new(VecDeque::new())),
            history_limit: HISTORY_LIMIT,
        }
    }

    /// Store a finished batch, evicting the oldest ones beyond `history_limit`.
    #[instrument(level = "debug", skip(self, record), fields(id = %record.id))]
    pub async fn insert_batch(&self, record: BatchRecord) {
        let mut by_id = self.by_id.write().await;
        let mut order = self.order.write().await;
        order.push_back(record.id.clone());
        by_id.insert(record.id.clone(), record);
        while order.len() > self.history_limit {
            if let Some(old) = order.pop_front() {
                by_id.remove(&old);
                debug!(target: "quizforge_backend", id = %old, "Evicted batch from history");
            }
        }
    }

    #[instrument(level = "debug", skip(self), fields(%id))]
    pub async fn get_batch(&self, id: &str) -> Option<BatchRecord> {
        self.by_id.read().await.get(id).cloned()
    }

    /// Summaries of every stored batch, oldest first.
    pub async fn list_batches(&self) -> Vec<BatchSummary> {
        let by_id = self.by_id.read().await;
        let order = self.order.read().await;
        order.iter().filter_map(|id| by_id.get(id)).map(BatchRecord::summary).collect()
    }
}
