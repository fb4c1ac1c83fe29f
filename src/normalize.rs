//! Response normalization: raw model text -> JSON value -> list of records.
//!
//! Models wrap arrays in arbitrary container keys, fence them in markdown,
//! or collapse a one-item batch into a bare object. `parse_response` and
//! `extract_array` accept all of those shapes; `decode_records` then turns
//! the list into typed stage records exactly once.

use std::sync::OnceLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::{error::Category, Map, Value};
use tracing::{instrument, warn};

use crate::error::NormalizeError;
use crate::llm::ERROR_SENTINEL;
use crate::util::trunc_for_log;

/// Container keys a model may use around the record array, checked in order.
pub const WRAPPER_KEYS: [&str; 9] = [
  "questions",
  "candidates",
  "validated",
  "results",
  "items",
  "data",
  "output",
  "batch",
  "responses",
];

/// Pipeline stage a bare record belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
  Sentence,
  Candidates,
  Validation,
}

impl Stage {
  /// Detection priority for bare objects.
  pub const ALL: [Stage; 3] = [Stage::Sentence, Stage::Candidates, Stage::Validation];

  pub fn number(self) -> u8 {
    match self {
      Stage::Sentence => 1,
      Stage::Candidates => 2,
      Stage::Validation => 3,
    }
  }

  /// Field names that identify a record of this stage.
  pub fn fingerprint(self) -> &'static [&'static str] {
    match self {
      Stage::Sentence => &["Item Number", "Assessment Focus", "Complete Sentence", "Correct Answer"],
      Stage::Candidates => &["Item Number", "Candidate A", "Candidate B", "Candidate C"],
      Stage::Validation => &["Item Number", "Selected Distractor A", "Selected Distractor B", "Selected Distractor C"],
    }
  }
}

/// First stage (in priority order) whose fingerprint shares a key with `obj`.
pub fn detect_stage(obj: &Map<String, Value>) -> Option<Stage> {
  Stage::ALL
    .into_iter()
    .find(|stage| stage.fingerprint().iter().any(|k| obj.contains_key(*k)))
}

fn fence_regex() -> Option<&'static Regex> {
  static RE: OnceLock<Option<Regex>> = OnceLock::new();
  RE.get_or_init(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)```").ok()).as_ref()
}

/// Parse raw model text into a JSON value.
///
/// Sentinel-prefixed text from a failed call is passed through untouched as
/// `NormalizeError::Upstream`. The first fenced block is used when present;
/// otherwise the whole (trimmed) text is parsed.
#[instrument(level = "debug", skip(raw), fields(raw_len = raw.len()))]
pub fn parse_response(raw: &str) -> Result<Value, NormalizeError> {
  if raw.is_empty() {
    return Err(NormalizeError::Empty);
  }
  if raw.starts_with(ERROR_SENTINEL) {
    return Err(NormalizeError::Upstream(raw.to_string()));
  }

  let mut text = raw.trim();
  if text.contains("```") {
    if let Some(inner) = fence_regex().and_then(|re| re.captures(text)).and_then(|c| c.get(1)) {
      text = inner.as_str().trim();
    }
  }

  serde_json::from_str::<Value>(text).map_err(|e| {
    if matches!(e.classify(), Category::Io | Category::Data) {
      return NormalizeError::Unexpected(e.to_string());
    }
    warn!(target: "pipeline", error = %e, raw = %trunc_for_log(raw, 2000), "Model output is not valid JSON");
    NormalizeError::MalformedJson
  })
}

/// Pull the list of records out of a parsed response.
pub fn extract_array(value: Value) -> Result<Vec<Value>, NormalizeError> {
  match value {
    Value::Null => Err(NormalizeError::NoData),
    Value::Array(items) => Ok(items),
    Value::Object(mut obj) => {
      let list_key = WRAPPER_KEYS
        .iter()
        .find(|k| obj.get(**k).is_some_and(Value::is_array))
        .map(|k| k.to_string())
        .or_else(|| match obj.iter().next() {
          Some((k, v)) if obj.len() == 1 && v.is_array() => Some(k.clone()),
          _ => None,
        });
      if let Some(Value::Array(items)) = list_key.and_then(|k| obj.remove(&k)) {
        return Ok(items);
      }

      match detect_stage(&obj) {
        Some(_) => Ok(vec![Value::Object(obj)]),
        None => Err(NormalizeError::UnrecognizedObject(obj.keys().cloned().collect())),
      }
    }
    Value::Bool(_) => Err(NormalizeError::WrongType("bool")),
    Value::Number(_) => Err(NormalizeError::WrongType("number")),
    Value::String(_) => Err(NormalizeError::WrongType("string")),
  }
}

/// Decode each extracted record into the stage's typed shape.
pub fn decode_records<T: DeserializeOwned>(items: Vec<Value>) -> Result<Vec<T>, NormalizeError> {
  items
    .into_iter()
    .enumerate()
    .map(|(index, item)| {
      serde_json::from_value(item).map_err(|e| NormalizeError::RecordShape { index, message: e.to_string() })
    })
    .collect()
}

/// `parse_response` -> `extract_array` -> `decode_records` in one step.
pub fn normalize<T: DeserializeOwned>(raw: &str) -> Result<Vec<T>, NormalizeError> {
  decode_records(extract_array(parse_response(raw)?)?)
}
