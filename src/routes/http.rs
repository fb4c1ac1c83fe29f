//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs its parameters and basic result info.

use std::sync::Arc;
use axum::{extract::{Path, Query, State}, Json, response::IntoResponse};
use tracing::{info, instrument};

use crate::error::ApiError;
use crate::protocol::*;
use crate::state::AppState;
use crate::logic::*;

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(HealthOut { ok: true, vocabulary_rows: state.vocabulary.len() })
}

#[instrument(level = "info", fields(kind = %q.kind, cefr = %q.cefr))]
pub async fn http_get_focus(Query(q): Query<FocusQuery>) -> impl IntoResponse {
  Json(focus_menu(q.kind, q.cefr))
}

#[instrument(level = "info", skip(state, body), fields(kind = %body.kind, cefr = %body.cefr, count = body.count))]
pub async fn http_post_batch(
  State(state): State<Arc<AppState>>,
  Json(body): Json<SequentialBatchIn>,
) -> Result<Json<BatchRecord>, ApiError> {
  let record = sequential_batch(&state, body).await?;
  info!(target: "pipeline", id = %record.id, assembled = record.questions.len(), "HTTP sequential batch served");
  Ok(Json(record))
}

#[instrument(level = "info", skip(state, body), fields(cefr = %body.cefr))]
pub async fn http_post_vocabulary_list(
  State(state): State<Arc<AppState>>,
  Json(body): Json<VocabularyListBatchIn>,
) -> Result<Json<BatchRecord>, ApiError> {
  let record = vocabulary_list_batch(&state, body).await?;
  info!(target: "pipeline", id = %record.id, assembled = record.questions.len(), "HTTP vocabulary-list batch served");
  Ok(Json(record))
}

#[instrument(level = "info", skip(state, body), fields(cefr = %body.cefr, items = body.items.len()))]
pub async fn http_post_grammar_list(
  State(state): State<Arc<AppState>>,
  Json(body): Json<GrammarListBatchIn>,
) -> Result<Json<BatchRecord>, ApiError> {
  let record = grammar_list_batch(&state, body).await?;
  info!(target: "pipeline", id = %record.id, assembled = record.questions.len(), "HTTP grammar-list batch served");
  Ok(Json(record))
}

#[instrument(level = "info", skip(state))]
pub async fn http_list_batches(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(BatchListOut { batches: state.list_batches().await })
}

#[instrument(level = "info", skip(state), fields(%id))]
pub async fn http_get_batch(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<Json<BatchRecord>, ApiError> {
  state
    .get_batch(&id)
    .await
    .map(Json)
    .ok_or_else(|| ApiError::NotFound(format!("batch {}", id)))
}
