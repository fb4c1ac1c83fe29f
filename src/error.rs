//! Typed errors for every boundary: response normalization, pipeline stages,
//! job planning, table loading and the HTTP surface.

use axum::{
  http::StatusCode,
  response::{IntoResponse, Json, Response},
};
use serde_json::json;

/// Failures while turning raw model text into a list of records.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NormalizeError {
  #[error("Empty response from LLM.")]
  Empty,

  /// The LLM call failed upstream; the sentinel text is carried verbatim.
  #[error("{0}")]
  Upstream(String),

  #[error("Failed to parse JSON. The AI response was malformed.")]
  MalformedJson,

  #[error("Unexpected error parsing output: {0}")]
  Unexpected(String),

  #[error("No data to extract from.")]
  NoData,

  #[error("Response is a dict but doesn't contain an array. Keys: {0:?}")]
  UnrecognizedObject(Vec<String>),

  #[error("Response is neither array nor dict. Type: {0}")]
  WrongType(&'static str),

  #[error("Record {index} has an unexpected shape: {message}")]
  RecordShape { index: usize, message: String },
}

/// A stage of a batch failed; the whole batch is abandoned.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Stage {stage} failed: {source}")]
pub struct PipelineError {
  pub stage: u8,
  #[source]
  pub source: NormalizeError,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlanError {
  #[error("Focus list is empty; pick at least one assessment focus")]
  EmptyFocus,

  #[error("No jobs to run: {0}")]
  NoJobs(String),

  #[error("ConceptID '{0}' is not in the vocabulary table")]
  UnknownConcept(String),

  #[error("Batch of {requested} questions exceeds the limit of {max}")]
  TooLarge { requested: usize, max: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum DataError {
  #[error("Failed to read table '{path}': {source}")]
  Read {
    path: String,
    #[source]
    source: csv::Error,
  },

  #[error("Bad row {row} in '{path}': {source}")]
  Row {
    path: String,
    row: usize,
    #[source]
    source: csv::Error,
  },
}

/// Errors returned by HTTP handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
  #[error("Bad request: {0}")]
  BadRequest(String),

  #[error("Not found: {0}")]
  NotFound(String),

  #[error(transparent)]
  Plan(#[from] PlanError),

  #[error(transparent)]
  Pipeline(#[from] PipelineError),
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = match &self {
      ApiError::BadRequest(_) | ApiError::Plan(_) => StatusCode::BAD_REQUEST,
      ApiError::NotFound(_) => StatusCode::NOT_FOUND,
      ApiError::Pipeline(_) => StatusCode::BAD_GATEWAY,
    };
    let body = Json(json!({ "error": self.to_string() }));
    (status, body).into_response()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn pipeline_error_names_stage_and_carries_upstream_text() {
    let err = PipelineError {
      stage: 2,
      source: NormalizeError::Upstream("Error: API Key is missing. Please enter it in the sidebar.".into()),
    };
    assert_eq!(
      err.to_string(),
      "Stage 2 failed: Error: API Key is missing. Please enter it in the sidebar."
    );
  }

  #[test]
  fn unrecognized_object_lists_keys() {
    let err = NormalizeError::UnrecognizedObject(vec!["foo".into(), "bar".into()]);
    assert_eq!(err.to_string(), r#"Response is a dict but doesn't contain an array. Keys: ["foo", "bar"]"#);
  }

  #[test]
  fn api_error_status_codes() {
    assert_eq!(ApiError::NotFound("x".into()).into_response().status(), StatusCode::NOT_FOUND);
    assert_eq!(ApiError::Plan(PlanError::EmptyFocus).into_response().status(), StatusCode::BAD_REQUEST);
    let pe = PipelineError { stage: 1, source: NormalizeError::Empty };
    assert_eq!(ApiError::Pipeline(pe).into_response().status(), StatusCode::BAD_GATEWAY);
  }
}
