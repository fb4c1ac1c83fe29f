//! Job planning: turns a batch request into an ordered list of `Job`s.
//!
//! - `create_job_list` drives the sequential grammar/vocabulary batches.
//!   Topic diversity comes from cycling the fixed semantic domains when the
//!   caller gives no topic.
//! - `vocabulary_jobs` and `grammar_jobs` build jobs straight from table rows.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

use crate::catalog::SEMANTIC_DOMAINS;
use crate::domain::{Cefr, GrammarEntry, Job, QuestionType, VocabularyEntry};
use crate::error::PlanError;

/// Largest planner batch a client may request.
pub const MAX_BATCH_SIZE: usize = 50;

/// Plan `total` jobs. Each job draws its focus independently (with
/// replacement) from `focus_list`.
#[instrument(level = "debug", skip(focus_list, rng), fields(%kind, %cefr, focus_count = focus_list.len()))]
pub fn create_job_list<R: Rng + ?Sized>(
  total: usize,
  kind: QuestionType,
  cefr: Cefr,
  focus_list: &[String],
  topic: &str,
  strategy: &str,
  rng: &mut R,
) -> Result<Vec<Job>, PlanError> {
  if total > MAX_BATCH_SIZE {
    return Err(PlanError::TooLarge { requested: total, max: MAX_BATCH_SIZE });
  }
  if total > 0 && focus_list.is_empty() {
    return Err(PlanError::EmptyFocus);
  }
  let topic = topic.trim();

  let mut jobs = Vec::with_capacity(total);
  for i in 0..total {
    let focus = focus_list.choose(rng).cloned().ok_or(PlanError::EmptyFocus)?;
    let context = if topic.is_empty() {
      SEMANTIC_DOMAINS[i % SEMANTIC_DOMAINS.len()].to_string()
    } else {
      topic.to_string()
    };

    let mut job = Job::new(format!("{}{}-{}", kind.initial(), cefr, i + 1), kind, cefr);
    job.focus = focus;
    job.context = context;
    job.strategy = strategy.to_string();
    jobs.push(job);
  }
  Ok(jobs)
}

/// Which rows of the vocabulary table make up a batch.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum VocabSelection {
  FirstN(usize),
  /// Inclusive, compared lexicographically.
  ConceptRange { start: String, end: String },
}

/// Rows picked by `selection`, in table order.
pub fn select_rows<'a>(
  table: &'a [VocabularyEntry],
  selection: &VocabSelection,
) -> Result<Vec<&'a VocabularyEntry>, PlanError> {
  let rows: Vec<&VocabularyEntry> = match selection {
    VocabSelection::FirstN(n) => table.iter().take(*n).collect(),
    VocabSelection::ConceptRange { start, end } => {
      if start.trim().is_empty() || end.trim().is_empty() {
        return Err(PlanError::NoJobs("both start and end ConceptID are required".into()));
      }
      table
        .iter()
        .filter(|r| r.concept_id.as_str() >= start.as_str() && r.concept_id.as_str() <= end.as_str())
        .collect()
    }
  };
  if rows.is_empty() {
    return match selection {
      VocabSelection::ConceptRange { start, .. } if !table.iter().any(|r| &r.concept_id == start) => {
        Err(PlanError::UnknownConcept(start.clone()))
      }
      _ => Err(PlanError::NoJobs("no vocabulary items in the selection".into())),
    };
  }
  Ok(rows)
}

/// One Vocabulary job per usable row. Rows missing the base item or the
/// part of speech are skipped with a warning.
#[instrument(level = "debug", skip(rows), fields(rows = rows.len(), %cefr, use_definitions))]
pub fn vocabulary_jobs(rows: &[&VocabularyEntry], cefr: Cefr, use_definitions: bool) -> Result<Vec<Job>, PlanError> {
  let mut jobs = Vec::with_capacity(rows.len());
  for (idx, row) in rows.iter().enumerate() {
    let base = row.base_vocabulary_item.trim();
    let pos = row.part_of_speech.trim();
    if base.is_empty() {
      warn!(target: "pipeline", row = idx, concept_id = %row.concept_id, "Skipping row: missing Base Vocabulary Item");
      continue;
    }
    if pos.is_empty() {
      warn!(target: "pipeline", row = idx, %base, "Skipping row: missing Part of Speech");
      continue;
    }

    let id = if row.concept_id.trim().is_empty() { format!("V-{}", idx) } else { row.concept_id.clone() };
    let mut job = Job::new(id, QuestionType::Vocabulary, cefr);
    job.target_vocabulary = base.to_string();
    job.part_of_speech = pos.to_string();
    if use_definitions {
      job.definition = row.definition.trim().to_string();
    }
    jobs.push(job);
  }

  if jobs.is_empty() {
    return Err(PlanError::NoJobs("no valid vocabulary items to process after validation".into()));
  }
  Ok(jobs)
}

/// One Grammar job per grammar target. Targets without an id get `GL-{n}`.
pub fn grammar_jobs(items: &[GrammarEntry], cefr: Cefr) -> Result<Vec<Job>, PlanError> {
  let jobs: Vec<Job> = items
    .iter()
    .filter(|it| !it.base_grammar.trim().is_empty())
    .enumerate()
    .map(|(i, it)| {
      let id = if it.id.trim().is_empty() { format!("GL-{}", i + 1) } else { it.id.trim().to_string() };
      let mut job = Job::new(id, QuestionType::Grammar, cefr);
      job.base_grammar = it.base_grammar.trim().to_string();
      job.subtype = it.subtype.trim().to_string();
      job
    })
    .collect();

  if jobs.is_empty() {
    return Err(PlanError::NoJobs("no grammar targets with a base grammar item".into()));
  }
  Ok(jobs)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::SEQUENTIAL_STRATEGY;
  use rand::rngs::StdRng;
  use rand::SeedableRng;
  use std::collections::HashSet;

  fn vocab(id: &str, base: &str, pos: &str) -> VocabularyEntry {
    VocabularyEntry {
      concept_id: id.into(),
      base_vocabulary_item: base.into(),
      part_of_speech: pos.into(),
      definition: format!("meaning of {}", base),
    }
  }

  #[test]
  fn untopiced_batch_cycles_domains_with_sequential_ids() {
    let mut rng = StdRng::seed_from_u64(7);
    let focus = vec!["Past Simple".to_string()];
    let jobs = create_job_list(5, QuestionType::Grammar, Cefr::B1, &focus, "", SEQUENTIAL_STRATEGY, &mut rng).unwrap();

    let ids: Vec<&str> = jobs.iter().map(|j| j.job_id.as_str()).collect();
    assert_eq!(ids, ["GB1-1", "GB1-2", "GB1-3", "GB1-4", "GB1-5"]);
    for (i, job) in jobs.iter().enumerate() {
      assert_eq!(job.focus, "Past Simple");
      assert_eq!(job.context, SEMANTIC_DOMAINS[i]);
      assert_eq!(job.strategy, SEQUENTIAL_STRATEGY);
      assert_eq!(job.cefr, Cefr::B1);
    }
  }

  #[test]
  fn domains_wrap_and_topic_overrides() {
    let mut rng = StdRng::seed_from_u64(1);
    let focus = vec!["Collocation (Verb+Noun)".to_string(), "Basic Synonym".to_string()];
    let jobs = create_job_list(14, QuestionType::Vocabulary, Cefr::A2, &focus, "", "s", &mut rng).unwrap();
    assert_eq!(jobs[12].context, SEMANTIC_DOMAINS[0]);
    assert_eq!(jobs[13].job_id, "VA2-14");
    assert_eq!(jobs.iter().map(|j| &j.job_id).collect::<HashSet<_>>().len(), 14);
    assert!(jobs.iter().all(|j| focus.contains(&j.focus)));

    let jobs = create_job_list(3, QuestionType::Vocabulary, Cefr::A2, &focus, "  Shopping ", "s", &mut rng).unwrap();
    assert!(jobs.iter().all(|j| j.context == "Shopping"));
  }

  #[test]
  fn empty_focus_list_is_rejected() {
    let mut rng = StdRng::seed_from_u64(0);
    assert_eq!(
      create_job_list(2, QuestionType::Grammar, Cefr::A1, &[], "", "s", &mut rng),
      Err(PlanError::EmptyFocus)
    );
    assert!(create_job_list(0, QuestionType::Grammar, Cefr::A1, &[], "", "s", &mut rng).unwrap().is_empty());
  }

  #[test]
  fn oversized_batch_is_rejected_before_planning() {
    let mut rng = StdRng::seed_from_u64(0);
    let focus = vec!["Past Simple".to_string()];
    assert_eq!(
      create_job_list(usize::MAX, QuestionType::Grammar, Cefr::B1, &focus, "", "s", &mut rng),
      Err(PlanError::TooLarge { requested: usize::MAX, max: MAX_BATCH_SIZE })
    );
    let jobs = create_job_list(MAX_BATCH_SIZE, QuestionType::Grammar, Cefr::B1, &focus, "", "s", &mut rng).unwrap();
    assert_eq!(jobs.len(), MAX_BATCH_SIZE);
  }

  #[test]
  fn concept_range_is_inclusive() {
    let table = vec![vocab("01", "apple", "noun"), vocab("02", "run", "verb"), vocab("03", "red", "adj"), vocab("04", "go", "verb")];
    let sel = VocabSelection::ConceptRange { start: "02".into(), end: "03".into() };
    let rows = select_rows(&table, &sel).unwrap();
    assert_eq!(rows.iter().map(|r| r.concept_id.as_str()).collect::<Vec<_>>(), ["02", "03"]);

    let rows = select_rows(&table, &VocabSelection::FirstN(3)).unwrap();
    assert_eq!(rows.len(), 3);

    let sel = VocabSelection::ConceptRange { start: "10".into(), end: "12".into() };
    assert_eq!(select_rows(&table, &sel), Err(PlanError::UnknownConcept("10".into())));
  }

  #[test]
  fn vocabulary_jobs_skip_incomplete_rows() {
    let table = vec![vocab("c1", "build/built/built", "verb"), vocab("c2", " ", "noun"), vocab("c3", "table", ""), vocab("c4", "happy", "adjective")];
    let rows: Vec<&VocabularyEntry> = table.iter().collect();

    let jobs = vocabulary_jobs(&rows, Cefr::B2, true).unwrap();
    assert_eq!(jobs.len(), 2);
    assert_eq!(jobs[0].job_id, "c1");
    assert_eq!(jobs[0].target_vocabulary, "build/built/built");
    assert_eq!(jobs[0].definition, "meaning of build/built/built");
    assert_eq!(jobs[1].kind, QuestionType::Vocabulary);

    let jobs = vocabulary_jobs(&rows, Cefr::B2, false).unwrap();
    assert!(jobs.iter().all(|j| j.definition.is_empty()));

    let bad = vec![vocab("x", "", "verb")];
    let rows: Vec<&VocabularyEntry> = bad.iter().collect();
    assert!(matches!(vocabulary_jobs(&rows, Cefr::B2, true), Err(PlanError::NoJobs(_))));
  }

  #[test]
  fn grammar_jobs_number_missing_ids() {
    let items = vec![
      GrammarEntry { id: String::new(), base_grammar: "Present Perfect".into(), subtype: "for/since".into() },
      GrammarEntry { id: "G-77".into(), base_grammar: "Passive".into(), subtype: String::new() },
    ];
    let jobs = grammar_jobs(&items, Cefr::B1).unwrap();
    assert_eq!(jobs[0].job_id, "GL-1");
    assert_eq!(jobs[0].subtype, "for/since");
    assert_eq!(jobs[1].job_id, "G-77");
    assert!(grammar_jobs(&[], Cefr::B1).is_err());
  }
}
