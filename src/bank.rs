//! CSV-backed tables: the vocabulary list and the few-shot example banks.

use std::io::Read;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::domain::{Cefr, ExampleItem, QuestionType, VocabularyEntry};
use crate::error::DataError;

/// Rows of a CSV table with a header line. Cells and headers are trimmed;
/// unknown columns are ignored.
pub fn read_table<T: DeserializeOwned, R: Read>(reader: R, path: &str) -> Result<Vec<T>, DataError> {
  let mut rdr = csv::ReaderBuilder::new()
    .trim(csv::Trim::All)
    .flexible(true)
    .from_reader(reader);

  let mut rows = Vec::new();
  for (row, record) in rdr.deserialize::<T>().enumerate() {
    let record = record.map_err(|source| DataError::Row { path: path.to_string(), row: row + 1, source })?;
    rows.push(record);
  }
  Ok(rows)
}

fn load<T: DeserializeOwned>(path: &str) -> Result<Vec<T>, DataError> {
  let file = std::fs::File::open(path).map_err(|e| DataError::Read { path: path.to_string(), source: e.into() })?;
  read_table(file, path)
}

#[instrument(level = "info")]
pub fn load_vocabulary(path: &str) -> Result<Vec<VocabularyEntry>, DataError> {
  let rows: Vec<VocabularyEntry> = load(path)?;
  info!(target: "quizforge_backend", %path, rows = rows.len(), "Loaded vocabulary table");
  Ok(rows)
}

#[instrument(level = "info")]
pub fn load_examples(path: &str) -> Result<Vec<ExampleItem>, DataError> {
  let rows: Vec<ExampleItem> = load(path)?;
  info!(target: "quizforge_backend", %path, rows = rows.len(), "Loaded example bank");
  Ok(rows)
}

/// Finished questions used as style references, one bank per type.
#[derive(Clone, Debug, Default)]
pub struct ExampleBanks {
  pub grammar: Vec<ExampleItem>,
  pub vocabulary: Vec<ExampleItem>,
}

impl ExampleBanks {
  /// Load whichever banks are configured. A bank that fails to load is
  /// logged and left empty.
  pub fn load(grammar: Option<&str>, vocabulary: Option<&str>) -> Self {
    let read = |path: Option<&str>| -> Vec<ExampleItem> {
      match path.map(load_examples) {
        Some(Ok(rows)) => rows,
        Some(Err(e)) => {
          warn!(target: "quizforge_backend", error = %e, "Example bank unavailable");
          Vec::new()
        }
        None => Vec::new(),
      }
    };
    Self { grammar: read(grammar), vocabulary: read(vocabulary) }
  }

  pub fn for_kind(&self, kind: QuestionType) -> &[ExampleItem] {
    match kind {
      QuestionType::Grammar => &self.grammar,
      QuestionType::Vocabulary => &self.vocabulary,
    }
  }
}

fn cell(v: &Option<String>) -> &str {
  v.as_deref().unwrap_or("N/A")
}

/// Two sampled examples rendered as `### EXAMPLE:` blocks. Prefers rows at
/// `cefr`, falls back to the whole bank, and yields nothing when the bank
/// has fewer than two rows.
pub fn few_shot_examples<R: Rng + ?Sized>(bank: &[ExampleItem], cefr: Cefr, rng: &mut R) -> String {
  let relevant: Vec<&ExampleItem> = bank
    .iter()
    .filter(|ex| ex.cefr_rating.as_deref().map(str::trim) == Some(cefr.as_str()))
    .collect();

  let samples: Vec<&ExampleItem> = if relevant.len() >= 2 {
    relevant.choose_multiple(rng, 2).copied().collect()
  } else if bank.len() >= 2 {
    bank.choose_multiple(rng, 2).collect()
  } else {
    return String::new();
  };

  let mut out = String::new();
  for ex in samples {
    let view = json!({
      "Question Prompt": cell(&ex.question_prompt),
      "Answer A": cell(&ex.answer_a),
      "Answer B": cell(&ex.answer_b),
      "Answer C": cell(&ex.answer_c),
      "Answer D": cell(&ex.answer_d),
      "Correct Answer": cell(&ex.correct_answer),
    });
    out.push_str("### EXAMPLE:\n");
    out.push_str(&view.to_string());
    out.push_str("\n\n");
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;
  use rand::rngs::StdRng;
  use rand::SeedableRng;

  const BANK: &str = "\
CEFR rating,Question Prompt,Answer A,Answer B,Answer C,Answer D,Correct Answer,GSE Score
B1,She ____ home early.,went,go,going,goes,A,43
B1,They ____ finished.,have,has,having,,A,45
A2,I ____ a student.,am,is,are,be,A,30
";

  #[test]
  fn vocabulary_csv_reads_spaced_headers_and_ignores_extra_columns() {
    let csv = " ConceptID , Base Vocabulary Item ,Part of Speech,Definition,Notes\n12-1-V-1-i, build/built/built ,verb,to make,x\n";
    let rows: Vec<VocabularyEntry> = read_table(csv.as_bytes(), "inline").unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].concept_id, "12-1-V-1-i");
    assert_eq!(rows[0].base_vocabulary_item, "build/built/built");
    assert_eq!(rows[0].part_of_speech, "verb");
  }

  #[test]
  fn examples_prefer_matching_level_and_fill_missing_cells() {
    let bank: Vec<ExampleItem> = read_table(BANK.as_bytes(), "bank").unwrap();
    let mut rng = StdRng::seed_from_u64(11);
    let out = few_shot_examples(&bank, Cefr::B1, &mut rng);

    assert_eq!(out.matches("### EXAMPLE:\n").count(), 2);
    assert!(out.contains("She ____ home early."));
    assert!(out.contains("They ____ finished."));
    assert!(out.contains(r#""Answer D":"N/A""#));
    assert!(!out.contains("I ____ a student."));
  }

  #[test]
  fn examples_fall_back_to_whole_bank_or_nothing() {
    let bank: Vec<ExampleItem> = read_table(BANK.as_bytes(), "bank").unwrap();
    let mut rng = StdRng::seed_from_u64(2);
    assert_eq!(few_shot_examples(&bank, Cefr::C1, &mut rng).matches("### EXAMPLE:").count(), 2);
    assert!(few_shot_examples(&bank[..1], Cefr::B1, &mut rng).is_empty());
    assert!(few_shot_examples(&[], Cefr::B1, &mut rng).is_empty());
  }

  #[test]
  fn missing_file_is_a_read_error() {
    let err = load_vocabulary("/definitely/not/here.csv").unwrap_err();
    assert!(matches!(err, DataError::Read { .. }));
  }
}
