//! Batch orchestration: Stage 1 -> Stage 2 -> Stage 3, then assembly.
//!
//! Each stage is one LLM call covering every job of the batch, and each
//! prompt depends on the full normalized output of the previous stage, so
//! the stages run strictly in sequence. The first stage error aborts the
//! batch; nothing partial is returned. Under-produced items are dropped at
//! assembly and only show up as a shorter result.

use std::sync::OnceLock;

use rand::Rng;
use regex::{Regex, RegexBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::config::Prompts;
use crate::domain::{
  BatchMode, FinalQuestion, Job, QuestionType, Stage1Record, Stage2Record, Stage3Record, VocabularyEntry, CORRECT_SLOT,
};
use crate::error::PipelineError;
use crate::llm::LlmCall;
use crate::normalize::{normalize, Stage};
use crate::prompts::{self, PromptPair, QuestionForm};

/// Marker substituted for the correct answer in question prompts.
pub const BLANK: &str = "____";

/// Human-readable audit trail for one batch, owned by the caller.
#[derive(Clone, Debug, Default, Serialize)]
pub struct SessionLog {
  lines: Vec<String>,
}

impl SessionLog {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn push(&mut self, line: impl Into<String>) {
    self.lines.push(line.into());
  }

  pub fn into_lines(self) -> Vec<String> {
    self.lines
  }
}

/// Mode-specific inputs a batch needs besides its jobs.
#[derive(Clone, Debug)]
pub enum BatchInput<'a> {
  /// Planner-driven batch; `examples` is the rendered style reference.
  Sequential { kind: QuestionType, examples: String },
  VocabularyList { form: QuestionForm, table: &'a [VocabularyEntry] },
  GrammarList { form: QuestionForm },
}

impl BatchInput<'_> {
  pub fn mode(&self) -> BatchMode {
    match self {
      BatchInput::Sequential { kind, .. } => BatchMode::sequential(*kind),
      BatchInput::VocabularyList { .. } => BatchMode::VocabularyList,
      BatchInput::GrammarList { .. } => BatchMode::GrammarList,
    }
  }
}

/// Final questions plus every intermediate stage, for auditing/export.
#[derive(Clone, Debug, Default, Serialize)]
pub struct BatchOutput {
  pub questions: Vec<FinalQuestion>,
  pub stage1: Vec<Stage1Record>,
  pub stage2: Vec<Stage2Record>,
  pub stage3: Vec<Stage3Record>,
  pub warnings: Vec<String>,
}

/// How the correct answer was turned into a blank.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Blanking {
  WholeWord,
  Literal,
  CaseInsensitive,
  ExistingBlank,
  Unchanged,
}

fn is_word_char(c: char) -> bool {
  c.is_alphanumeric()
}

fn at_word_boundary(s: &str, start: usize, end: usize) -> bool {
  let before = s[..start].chars().next_back().map_or(true, |c| !is_word_char(c));
  let after = s[end..].chars().next().map_or(true, |c| !is_word_char(c));
  before && after
}

/// Replace the given non-overlapping spans with `BLANK`; `None` when no span survives.
fn replace_spans(s: &str, spans: impl Iterator<Item = (usize, usize)>, whole_word: bool) -> Option<String> {
  let mut out = String::with_capacity(s.len());
  let mut last = 0;
  let mut hits = 0;
  for (start, end) in spans {
    if whole_word && !at_word_boundary(s, start, end) {
      continue;
    }
    out.push_str(&s[last..start]);
    out.push_str(BLANK);
    last = end;
    hits += 1;
  }
  if hits == 0 {
    return None;
  }
  out.push_str(&s[last..]);
  Some(out)
}

fn existing_blank_regex() -> Option<&'static Regex> {
  static RE: OnceLock<Option<Regex>> = OnceLock::new();
  RE.get_or_init(|| Regex::new(r"_{2,}").ok()).as_ref()
}

/// Blank the correct answer inside the generated sentence. Tries, in order:
/// whole-word exact matches, any literal match, whole-word case-insensitive
/// matches, then normalizing a blank the model already wrote. If all fail the
/// sentence is returned unchanged.
pub fn blank_answer(sentence: &str, answer: &str) -> (String, Blanking) {
  let answer = answer.trim();
  if !answer.is_empty() {
    let exact = || sentence.match_indices(answer).map(|(i, m)| (i, i + m.len()));
    if let Some(out) = replace_spans(sentence, exact(), true) {
      return (out, Blanking::WholeWord);
    }
    if let Some(out) = replace_spans(sentence, exact(), false) {
      return (out, Blanking::Literal);
    }
    let folded = RegexBuilder::new(&regex::escape(answer)).case_insensitive(true).build().ok();
    if let Some(re) = folded {
      let spans = re.find_iter(sentence).map(|m| (m.start(), m.end()));
      if let Some(out) = replace_spans(sentence, spans, true) {
        return (out, Blanking::CaseInsensitive);
      }
    }
  }

  if let Some(re) = existing_blank_regex().filter(|re| re.is_match(sentence)) {
    return (re.replace_all(sentence, BLANK).into_owned(), Blanking::ExistingBlank);
  }
  (sentence.to_string(), Blanking::Unchanged)
}

/// Build final questions by position. Item `i` needs a Stage-3 record (and,
/// for vocabulary lists, a job to copy ConceptID from); otherwise it is dropped.
pub fn assemble(
  mode: BatchMode,
  jobs: &[Job],
  stage1: &[Stage1Record],
  stage3: &[Stage3Record],
  log: &mut SessionLog,
  warnings: &mut Vec<String>,
) -> Vec<FinalQuestion> {
  log.push("--- FINAL ASSEMBLY ---");
  let mut out = Vec::with_capacity(stage1.len().min(stage3.len()));

  for (i, s1) in stage1.iter().enumerate() {
    let Some(s3) = stage3.get(i) else { break };
    let job = jobs.get(i);
    if mode == BatchMode::VocabularyList && job.is_none() {
      break;
    }

    if !s1.item_number.is_empty() && !s3.item_number.is_empty() && s1.item_number.trim() != s3.item_number.trim() {
      warn!(target: "pipeline", position = i, stage1 = %s1.item_number, stage3 = %s3.item_number, "Item Number mismatch; joining by position");
      warnings.push(format!(
        "Position {}: Stage 1 item '{}' joined with Stage 3 item '{}'",
        i + 1,
        s1.item_number,
        s3.item_number
      ));
    }

    let correct = s1.correct_answer.trim().to_string();
    let (prompt, how) = blank_answer(&s1.complete_sentence, &correct);
    match how {
      Blanking::WholeWord => {}
      Blanking::Unchanged => {
        warn!(target: "pipeline", position = i, item = %s1.item_number, "Correct answer not found in sentence; prompt left unblanked");
        warnings.push(format!(
          "Item {}: correct answer '{}' not found in sentence; no blank inserted",
          if s1.item_number.is_empty() { (i + 1).to_string() } else { s1.item_number.clone() },
          correct
        ));
      }
      other => debug!(target: "pipeline", position = i, method = ?other, "Blank placed by fallback rule"),
    }

    let (concept_id, base_item) = match (mode, job) {
      (BatchMode::VocabularyList, Some(j)) => (Some(j.job_id.clone()), Some(j.target_vocabulary.clone())),
      _ => (None, None),
    };

    out.push(FinalQuestion {
      concept_id,
      base_vocabulary_item: base_item,
      item_number: s1.item_number.clone(),
      assessment_focus: s1.assessment_focus.clone(),
      question_prompt: prompt,
      answer_a: correct,
      answer_b: s3.selected_distractor_a.trim().to_string(),
      answer_c: s3.selected_distractor_b.trim().to_string(),
      answer_d: s3.selected_distractor_c.trim().to_string(),
      correct_answer: CORRECT_SLOT.to_string(),
      cefr_rating: s1.cefr_rating.clone(),
      category: s1.category.clone(),
    });

    match job.filter(|_| mode == BatchMode::VocabularyList) {
      Some(j) => log.push(format!("Assembled question {} for '{}' ({})", i + 1, j.target_vocabulary, j.part_of_speech)),
      None => log.push(format!("Assembled question {}", i + 1)),
    }
  }

  log.push(format!("TOTAL ASSEMBLED: {}", out.len()));
  out
}

/// One LLM round-trip plus normalization into typed records.
async fn run_stage<T: DeserializeOwned>(llm: &dyn LlmCall, stage: Stage, pair: PromptPair) -> Result<Vec<T>, PipelineError> {
  let raw = llm.invoke(&pair.system, &pair.user).await;
  normalize::<T>(&raw).map_err(|source| {
    warn!(target: "pipeline", stage = stage.number(), error = %source, "Stage failed; aborting batch");
    PipelineError { stage: stage.number(), source }
  })
}

/// Run the three stages for `jobs` and assemble the result. Exactly three
/// LLM calls are made on success; a failing stage stops further calls.
#[instrument(level = "info", skip_all, fields(mode = input.mode().label(), jobs = jobs.len()))]
pub async fn run_batch<R: Rng + Send + ?Sized>(
  llm: &dyn LlmCall,
  prompts: &Prompts,
  jobs: &[Job],
  input: &BatchInput<'_>,
  rng: &mut R,
  log: &mut SessionLog,
) -> Result<BatchOutput, PipelineError> {
  let mode = input.mode();
  log.push("=".repeat(80));
  log.push(format!("{} GENERATION - STARTING", mode.label().to_uppercase()));
  log.push(format!("Jobs: {}", jobs.len()));
  match input {
    BatchInput::VocabularyList { form, .. } | BatchInput::GrammarList { form } => {
      log.push(format!("Question form: {:?}", form));
    }
    BatchInput::Sequential { kind, .. } => log.push(format!("Question type: {}", kind)),
  }
  log.push("=".repeat(80));

  if jobs.is_empty() {
    log.push("No jobs; nothing to generate");
    return Ok(BatchOutput::default());
  }

  // Stage 1: sentences and correct answers.
  log.push("--- STAGE 1: SENTENCE GENERATION ---");
  let pair = match input {
    BatchInput::Sequential { examples, .. } => prompts::sequential_stage1(prompts, jobs, examples),
    BatchInput::VocabularyList { form, .. } => prompts::vocabulary_list_stage1(prompts, jobs, *form),
    BatchInput::GrammarList { form } => prompts::grammar_list_stage1(prompts, jobs, *form),
  };
  let stage1: Vec<Stage1Record> = run_stage(llm, Stage::Sentence, pair).await?;
  log.push(format!("Stage 1: Generated {} sentences", stage1.len()));
  info!(target: "pipeline", records = stage1.len(), "Stage 1 done");

  // Stage 2: candidate distractors.
  log.push("--- STAGE 2: CANDIDATE GENERATION ---");
  let pair = match input {
    BatchInput::Sequential { kind, .. } => prompts::sequential_stage2(prompts, *kind, jobs, &stage1),
    BatchInput::VocabularyList { table, .. } => prompts::vocabulary_list_stage2(prompts, jobs, &stage1, table, rng),
    BatchInput::GrammarList { .. } => prompts::grammar_list_stage2(prompts, jobs, &stage1),
  };
  let stage2: Vec<Stage2Record> = run_stage(llm, Stage::Candidates, pair).await?;
  log.push(format!("Stage 2: Generated {} candidate sets", stage2.len()));
  info!(target: "pipeline", records = stage2.len(), "Stage 2 done");

  // Stage 3: validation and final three distractors.
  log.push("--- STAGE 3: VALIDATION & FILTERING ---");
  let pair = match input {
    BatchInput::Sequential { kind, .. } => prompts::sequential_stage3(prompts, *kind, jobs, &stage1, &stage2),
    BatchInput::VocabularyList { .. } => prompts::vocabulary_list_stage3(prompts, jobs, &stage1, &stage2),
    BatchInput::GrammarList { .. } => prompts::grammar_list_stage3(prompts, jobs, &stage1, &stage2),
  };
  let stage3: Vec<Stage3Record> = run_stage(llm, Stage::Validation, pair).await?;
  log.push(format!("Stage 3: Validated {} distractor sets", stage3.len()));
  info!(target: "pipeline", records = stage3.len(), "Stage 3 done");

  let mut warnings = Vec::new();
  let questions = assemble(mode, jobs, &stage1, &stage3, log, &mut warnings);
  if questions.len() < jobs.len() {
    warn!(target: "pipeline", requested = jobs.len(), assembled = questions.len(), "Batch came back short");
  }
  info!(target: "pipeline", assembled = questions.len(), "Batch assembled");

  Ok(BatchOutput { questions, stage1, stage2, stage3, warnings })
}
