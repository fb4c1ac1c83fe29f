//! Core batch behaviours behind the HTTP handlers.
//!
//! Each entry point turns a request into jobs, runs the 3-call pipeline and
//! stores the finished batch. A failed batch is not stored.

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::bank::few_shot_examples;
use crate::catalog::{focus_options, topic_suggestions, SEMANTIC_DOMAINS};
use crate::domain::{Job, QuestionType, Cefr, SEQUENTIAL_STRATEGY};
use crate::error::ApiError;
use crate::pipeline::{run_batch, BatchInput, SessionLog};
use crate::planner::{create_job_list, grammar_jobs, select_rows, vocabulary_jobs};
use crate::prompts::QuestionForm;
use crate::protocol::{BatchRecord, FocusOut, GrammarListBatchIn, SequentialBatchIn, VocabularyListBatchIn};
use crate::state::AppState;

fn owned(items: &[&str]) -> Vec<String> {
  items.iter().map(|s| s.to_string()).collect()
}

/// Focus menu, topic suggestions and semantic domains for the request form.
pub fn focus_menu(kind: QuestionType, cefr: Cefr) -> FocusOut {
  FocusOut {
    focus: owned(focus_options(kind, cefr)),
    topics: owned(topic_suggestions(cefr)),
    semantic_domains: owned(&SEMANTIC_DOMAINS),
  }
}

async fn execute(
  state: &AppState,
  jobs: &[Job],
  input: &BatchInput<'_>,
  rng: &mut StdRng,
) -> Result<BatchRecord, ApiError> {
  let mode = input.mode();
  let mut log = SessionLog::new();
  let out = match run_batch(state.llm.as_ref(), &state.prompts, jobs, input, rng, &mut log).await {
    Ok(out) => out,
    Err(e) => {
      error!(target: "pipeline", mode = mode.label(), jobs = jobs.len(), error = %e, "Batch failed");
      return Err(e.into());
    }
  };

  let record = BatchRecord {
    id: Uuid::new_v4().to_string(),
    mode,
    requested: jobs.len(),
    questions: out.questions,
    stage1: out.stage1,
    stage2: out.stage2,
    stage3: out.stage3,
    log: log.into_lines(),
    warnings: out.warnings,
  };
  info!(target: "pipeline", id = %record.id, mode = mode.label(), requested = record.requested, assembled = record.questions.len(), "Batch stored");
  state.insert_batch(record.clone()).await;
  Ok(record)
}

#[instrument(level = "info", skip(state, body), fields(kind = %body.kind, cefr = %body.cefr, count = body.count))]
pub async fn sequential_batch(state: &AppState, body: SequentialBatchIn) -> Result<BatchRecord, ApiError> {
  if body.count == 0 {
    return Err(ApiError::BadRequest("count must be at least 1".into()));
  }
  let mut rng = StdRng::from_entropy();
  let jobs = create_job_list(body.count, body.kind, body.cefr, &body.focus, &body.topic, SEQUENTIAL_STRATEGY, &mut rng)?;

  let examples = few_shot_examples(state.examples.for_kind(body.kind), body.cefr, &mut rng);
  let input = BatchInput::Sequential { kind: body.kind, examples };
  execute(state, &jobs, &input, &mut rng).await
}

#[instrument(level = "info", skip(state, body), fields(cefr = %body.cefr, inline_rows = body.vocabulary.as_ref().map(Vec::len)))]
pub async fn vocabulary_list_batch(state: &AppState, body: VocabularyListBatchIn) -> Result<BatchRecord, ApiError> {
  let table = body.vocabulary.as_deref().unwrap_or(state.vocabulary.as_slice());
  if table.is_empty() {
    return Err(ApiError::BadRequest("no vocabulary table loaded and no rows supplied".into()));
  }
  let rows = select_rows(table, &body.selection)?;
  let jobs = vocabulary_jobs(&rows, body.cefr, body.use_definitions)?;

  let form = body.question_form.unwrap_or(QuestionForm::RandomMix);
  let input = BatchInput::VocabularyList { form, table };
  let mut rng = StdRng::from_entropy();
  execute(state, &jobs, &input, &mut rng).await
}

#[instrument(level = "info", skip(state, body), fields(cefr = %body.cefr, items = body.items.len()))]
pub async fn grammar_list_batch(state: &AppState, body: GrammarListBatchIn) -> Result<BatchRecord, ApiError> {
  let jobs = grammar_jobs(&body.items, body.cefr)?;
  let form = body.question_form.unwrap_or(QuestionForm::SimpleGapFill);
  let input = BatchInput::GrammarList { form };
  let mut rng = StdRng::from_entropy();
  execute(state, &jobs, &input, &mut rng).await
}
