//! Public request/response structs for the HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};

use crate::domain::{BatchMode, Cefr, FinalQuestion, GrammarEntry, QuestionType, Stage1Record, Stage2Record, Stage3Record, VocabularyEntry};
use crate::planner::VocabSelection;
use crate::prompts::QuestionForm;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthOut {
    pub ok: bool,
    pub vocabulary_rows: usize,
}

#[derive(Debug, Deserialize)]
pub struct FocusQuery {
    #[serde(rename = "type")]
    pub kind: QuestionType,
    pub cefr: Cefr,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FocusOut {
    pub focus: Vec<String>,
    pub topics: Vec<String>,
    pub semantic_domains: Vec<String>,
}

/// Planner-driven batch: `count` jobs cycling through `focus`.
#[derive(Debug, Deserialize)]
pub struct SequentialBatchIn {
    #[serde(rename = "type")]
    pub kind: QuestionType,
    pub cefr: Cefr,
    pub count: usize,
    #[serde(default)]
    pub focus: Vec<String>,
    #[serde(default)]
    pub topic: String,
}

fn default_true() -> bool {
    true
}

/// Vocabulary-list batch. Rows come from `vocabulary` when given, otherwise
/// from the table loaded at startup.
#[derive(Debug, Deserialize)]
pub struct VocabularyListBatchIn {
    pub cefr: Cefr,
    #[serde(default)]
    pub question_form: Option<QuestionForm>,
    #[serde(default = "default_true")]
    pub use_definitions: bool,
    pub selection: VocabSelection,
    #[serde(default)]
    pub vocabulary: Option<Vec<VocabularyEntry>>,
}

#[derive(Debug, Deserialize)]
pub struct GrammarListBatchIn {
    pub cefr: Cefr,
    #[serde(default)]
    pub question_form: Option<QuestionForm>,
    pub items: Vec<GrammarEntry>,
}

/// A finished batch as stored in history and returned to the client.
#[derive(Clone, Debug, Serialize)]
pub struct BatchRecord {
    pub id: String,
    pub mode: BatchMode,
    pub requested: usize,
    pub questions: Vec<FinalQuestion>,
    pub stage1: Vec<Stage1Record>,
    pub stage2: Vec<Stage2Record>,
    pub stage3: Vec<Stage3Record>,
    pub log: Vec<String>,
    pub warnings: Vec<String>,
}

impl BatchRecord {
    pub fn summary(&self) -> BatchSummary {
        BatchSummary {
            id: self.id.clone(),
            mode: self.mode,
            requested: self.requested,
            assembled: self.questions.len(),
            warnings: self.warnings.len(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BatchSummary {
    pub id: String,
    pub mode: BatchMode,
    pub requested: usize,
    pub assembled: usize,
    pub warnings: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchListOut {
    pub batches: Vec<BatchSummary>,
}
