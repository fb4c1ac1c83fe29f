//! Domain models: planned jobs, table rows, per-stage model records and the
//! assembled multiple-choice question.
//!
//! Stage records are keyed by the field names the prompts ask the model for
//! ("Item Number", "Complete Sentence", ...). Every field is optional with an
//! empty default, scalars are read leniently (a model that answers
//! `"Item Number": 1` is as good as one that answers `"1"`), and unknown keys
//! are kept in `extra` so the audit trail stays lossless.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Label of the only generation strategy in use.
pub const SEQUENTIAL_STRATEGY: &str = "Sequential Batch (3-Call)";

/// Answer slot that always holds the correct answer in assembled questions.
pub const CORRECT_SLOT: &str = "A";

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum QuestionType {
  Grammar,
  Vocabulary,
}

impl QuestionType {
  pub fn as_str(self) -> &'static str {
    match self {
      QuestionType::Grammar => "Grammar",
      QuestionType::Vocabulary => "Vocabulary",
    }
  }

  /// Leading letter used in planner job ids ("G" / "V").
  pub fn initial(self) -> char {
    match self {
      QuestionType::Grammar => 'G',
      QuestionType::Vocabulary => 'V',
    }
  }
}

impl fmt::Display for QuestionType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Cefr {
  A1,
  A2,
  B1,
  B2,
  C1,
}

impl Cefr {
  pub fn as_str(self) -> &'static str {
    match self {
      Cefr::A1 => "A1",
      Cefr::A2 => "A2",
      Cefr::B1 => "B1",
      Cefr::B2 => "B2",
      Cefr::C1 => "C1",
    }
  }
}

impl fmt::Display for Cefr {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Which 3-call pipeline a batch runs through.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BatchMode {
  SequentialGrammar,
  SequentialVocabulary,
  VocabularyList,
  GrammarList,
}

impl BatchMode {
  pub fn sequential(kind: QuestionType) -> Self {
    match kind {
      QuestionType::Grammar => BatchMode::SequentialGrammar,
      QuestionType::Vocabulary => BatchMode::SequentialVocabulary,
    }
  }

  /// Number of labelled candidates Stage 2 asks for.
  pub fn candidate_slots(self) -> usize {
    match self {
      BatchMode::SequentialGrammar | BatchMode::SequentialVocabulary => 5,
      BatchMode::VocabularyList => 8,
      BatchMode::GrammarList => 4,
    }
  }

  pub fn label(self) -> &'static str {
    match self {
      BatchMode::SequentialGrammar => "Sequential Grammar",
      BatchMode::SequentialVocabulary => "Sequential Vocabulary",
      BatchMode::VocabularyList => "Vocabulary List",
      BatchMode::GrammarList => "Grammar List",
    }
  }
}

/// One planned unit of question generation. Immutable once planned; `job_id`
/// is unique within a batch.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Job {
  pub job_id: String,
  #[serde(rename = "type")]
  pub kind: QuestionType,
  pub cefr: Cefr,
  #[serde(default)]
  pub focus: String,
  #[serde(default)]
  pub context: String,
  pub strategy: String,

  // Vocabulary-list jobs
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub target_vocabulary: String,
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub definition: String,
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub part_of_speech: String,

  // Grammar-list jobs
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub base_grammar: String,
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub subtype: String,
}

impl Job {
  pub fn new(job_id: impl Into<String>, kind: QuestionType, cefr: Cefr) -> Self {
    Self {
      job_id: job_id.into(),
      kind,
      cefr,
      focus: String::new(),
      context: String::new(),
      strategy: SEQUENTIAL_STRATEGY.to_string(),
      target_vocabulary: String::new(),
      definition: String::new(),
      part_of_speech: String::new(),
      base_grammar: String::new(),
      subtype: String::new(),
    }
  }
}

/// One row of the vocabulary table. `base_vocabulary_item` may carry
/// slash-separated variants and parenthetical qualifiers; see
/// `lexical::clean_vocab_item`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct VocabularyEntry {
  #[serde(rename = "ConceptID", alias = "concept_id", default)]
  pub concept_id: String,
  #[serde(rename = "Base Vocabulary Item", alias = "BaseVocabularyItem", alias = "base_vocabulary_item", default)]
  pub base_vocabulary_item: String,
  #[serde(rename = "Part of Speech", alias = "PartOfSpeech", alias = "part_of_speech", default)]
  pub part_of_speech: String,
  #[serde(rename = "Definition", alias = "definition", default)]
  pub definition: String,
}

/// One grammar target for grammar-list batches.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct GrammarEntry {
  #[serde(rename = "ID", alias = "id", default)]
  pub id: String,
  #[serde(rename = "Base Grammar Item", alias = "base_grammar", default)]
  pub base_grammar: String,
  #[serde(rename = "Subtype", alias = "subtype", default)]
  pub subtype: String,
}

/// A finished question from an example bank, used as few-shot style reference.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct ExampleItem {
  #[serde(rename = "CEFR rating", default)]
  pub cefr_rating: Option<String>,
  #[serde(rename = "Question Prompt", default)]
  pub question_prompt: Option<String>,
  #[serde(rename = "Answer A", default)]
  pub answer_a: Option<String>,
  #[serde(rename = "Answer B", default)]
  pub answer_b: Option<String>,
  #[serde(rename = "Answer C", default)]
  pub answer_c: Option<String>,
  #[serde(rename = "Answer D", default)]
  pub answer_d: Option<String>,
  #[serde(rename = "Correct Answer", default)]
  pub correct_answer: Option<String>,
}

/// Stage 1 output: the generated sentence and its (inflected) correct answer.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct Stage1Record {
  #[serde(rename = "Item Number", default, deserialize_with = "lenient::string", skip_serializing_if = "String::is_empty")]
  pub item_number: String,
  #[serde(rename = "Assessment Focus", default, deserialize_with = "lenient::string", skip_serializing_if = "String::is_empty")]
  pub assessment_focus: String,
  #[serde(rename = "Target Vocabulary", default, deserialize_with = "lenient::string", skip_serializing_if = "String::is_empty")]
  pub target_vocabulary: String,
  #[serde(rename = "Target Grammar", default, deserialize_with = "lenient::string", skip_serializing_if = "String::is_empty")]
  pub target_grammar: String,
  #[serde(rename = "Subtype", default, deserialize_with = "lenient::string", skip_serializing_if = "String::is_empty")]
  pub subtype: String,
  #[serde(rename = "Complete Sentence", default, deserialize_with = "lenient::string", skip_serializing_if = "String::is_empty")]
  pub complete_sentence: String,
  #[serde(rename = "Correct Answer", default, deserialize_with = "lenient::string", skip_serializing_if = "String::is_empty")]
  pub correct_answer: String,
  #[serde(rename = "Context Clue Location", default, deserialize_with = "lenient::string", skip_serializing_if = "String::is_empty")]
  pub context_clue_location: String,
  #[serde(
    rename = "Context Clue Explanation",
    alias = "Context Explaination",
    alias = "Context Explanation",
    default,
    deserialize_with = "lenient::string",
    skip_serializing_if = "String::is_empty"
  )]
  pub context_clue_explanation: String,
  #[serde(rename = "CEFR rating", default, deserialize_with = "lenient::string", skip_serializing_if = "String::is_empty")]
  pub cefr_rating: String,
  #[serde(rename = "Category", default, deserialize_with = "lenient::string", skip_serializing_if = "String::is_empty")]
  pub category: String,
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

/// Stage 2 output: up to eight labelled candidate distractors.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct Stage2Record {
  #[serde(rename = "Item Number", default, deserialize_with = "lenient::string", skip_serializing_if = "String::is_empty")]
  pub item_number: String,
  #[serde(rename = "Candidate A", default, deserialize_with = "lenient::string", skip_serializing_if = "String::is_empty")]
  pub candidate_a: String,
  #[serde(rename = "Candidate B", default, deserialize_with = "lenient::string", skip_serializing_if = "String::is_empty")]
  pub candidate_b: String,
  #[serde(rename = "Candidate C", default, deserialize_with = "lenient::string", skip_serializing_if = "String::is_empty")]
  pub candidate_c: String,
  #[serde(rename = "Candidate D", default, deserialize_with = "lenient::string", skip_serializing_if = "String::is_empty")]
  pub candidate_d: String,
  #[serde(rename = "Candidate E", default, deserialize_with = "lenient::string", skip_serializing_if = "String::is_empty")]
  pub candidate_e: String,
  #[serde(rename = "Candidate F", default, deserialize_with = "lenient::string", skip_serializing_if = "String::is_empty")]
  pub candidate_f: String,
  #[serde(rename = "Candidate G", default, deserialize_with = "lenient::string", skip_serializing_if = "String::is_empty")]
  pub candidate_g: String,
  #[serde(rename = "Candidate H", default, deserialize_with = "lenient::string", skip_serializing_if = "String::is_empty")]
  pub candidate_h: String,
  #[serde(rename = "Transformation Notes", default, deserialize_with = "lenient::string", skip_serializing_if = "String::is_empty")]
  pub transformation_notes: String,
  #[serde(rename = "Distractor Notes", default, deserialize_with = "lenient::string", skip_serializing_if = "String::is_empty")]
  pub distractor_notes: String,
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

impl Stage2Record {
  /// Candidate in slot `letter` ('A'..='H'); empty for unknown slots.
  pub fn candidate(&self, letter: char) -> &str {
    match letter {
      'A' => &self.candidate_a,
      'B' => &self.candidate_b,
      'C' => &self.candidate_c,
      'D' => &self.candidate_d,
      'E' => &self.candidate_e,
      'F' => &self.candidate_f,
      'G' => &self.candidate_g,
      'H' => &self.candidate_h,
      _ => "",
    }
  }

  /// Non-empty candidates from the first `slots` letter slots, in slot order.
  pub fn candidates(&self, slots: usize) -> Vec<String> {
    ('A'..='H')
      .take(slots)
      .map(|l| self.candidate(l).trim())
      .filter(|c| !c.is_empty())
      .map(str::to_string)
      .collect()
  }
}

/// Stage 3 output: the three distractors that survived validation.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct Stage3Record {
  #[serde(rename = "Item Number", default, deserialize_with = "lenient::string", skip_serializing_if = "String::is_empty")]
  pub item_number: String,
  #[serde(rename = "Selected Distractor A", default, deserialize_with = "lenient::string", skip_serializing_if = "String::is_empty")]
  pub selected_distractor_a: String,
  #[serde(rename = "Selected Distractor B", default, deserialize_with = "lenient::string", skip_serializing_if = "String::is_empty")]
  pub selected_distractor_b: String,
  #[serde(rename = "Selected Distractor C", default, deserialize_with = "lenient::string", skip_serializing_if = "String::is_empty")]
  pub selected_distractor_c: String,
  #[serde(rename = "Validation Notes", default, deserialize_with = "lenient::string", skip_serializing_if = "String::is_empty")]
  pub validation_notes: String,
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

/// The assembled deliverable. The correct answer always sits in slot A.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct FinalQuestion {
  #[serde(rename = "ConceptID", default, skip_serializing_if = "Option::is_none")]
  pub concept_id: Option<String>,
  #[serde(rename = "Base Vocabulary Item", default, skip_serializing_if = "Option::is_none")]
  pub base_vocabulary_item: Option<String>,
  #[serde(rename = "Item Number")]
  pub item_number: String,
  #[serde(rename = "Assessment Focus", default, skip_serializing_if = "String::is_empty")]
  pub assessment_focus: String,
  #[serde(rename = "Question Prompt")]
  pub question_prompt: String,
  #[serde(rename = "Answer A")]
  pub answer_a: String,
  #[serde(rename = "Answer B")]
  pub answer_b: String,
  #[serde(rename = "Answer C")]
  pub answer_c: String,
  #[serde(rename = "Answer D")]
  pub answer_d: String,
  #[serde(rename = "Correct Answer")]
  pub correct_answer: String,
  #[serde(rename = "CEFR rating", default, skip_serializing_if = "String::is_empty")]
  pub cefr_rating: String,
  #[serde(rename = "Category", default, skip_serializing_if = "String::is_empty")]
  pub category: String,
}

mod lenient {
  use serde::{Deserialize, Deserializer};
  use serde_json::Value;

  /// Strings pass through; numbers and booleans are rendered; null is empty.
  pub fn string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
      None | Some(Value::Null) => String::new(),
      Some(Value::String(s)) => s,
      Some(other) => other.to_string(),
    })
  }
}
