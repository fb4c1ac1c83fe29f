//! Local distractor pre-selection over the vocabulary table.
//!
//! Two pickers feed the vocabulary-list Stage 2 prompt:
//!   - same part of speech (grammatical category match)
//!   - same initial letter, topped up with phonetically confusable initials
//!     (c/k/q, s/z, f/ph, j/g, i/y, b/p, d/t, v/f/w)
//!
//! Both return *cleaned* base forms (see `clean_vocab_item`). The model later
//! inflects them to match the correct answer. Sampling is random; callers pass
//! the RNG so tests can seed it.

use std::collections::HashSet;

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, instrument};

use crate::domain::VocabularyEntry;

/// Pre-selected candidates per picker and the size of the final pool.
pub const POS_PICKS: usize = 4;
pub const LETTER_PICKS: usize = 4;
pub const CANDIDATE_POOL: usize = 8;

/// Normalize a vocabulary string into its comparison/display key.
///
/// - `"build/built/built"` -> `"build"` (first slash variant wins)
/// - `"belong (to)"` -> `"belong"` (parentheticals dropped)
pub fn clean_vocab_item(text: &str) -> String {
  let head = text.split('/').next().unwrap_or(text);

  let mut out = String::with_capacity(head.len());
  let mut depth = 0usize;
  for ch in head.chars() {
    match ch {
      '(' => depth += 1,
      ')' if depth > 0 => depth -= 1,
      _ if depth == 0 => out.push(ch),
      _ => {}
    }
  }

  out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Lower-cased first whitespace token of the cleaned item.
pub fn first_word(text: &str) -> String {
  clean_vocab_item(text)
    .split_whitespace()
    .next()
    .unwrap_or_default()
    .to_lowercase()
}

/// Lower-cased first character of the first word, if any.
pub fn initial_letter(text: &str) -> Option<char> {
  first_word(text).chars().next()
}

/// Phonetically confusable initials for a letter.
pub fn phonetic_fallbacks(key: &str) -> &'static [&'static str] {
  match key {
    "c" => &["k", "q"],
    "k" => &["c", "q"],
    "q" => &["c", "k"],
    "s" => &["c", "z"],
    "z" => &["s"],
    "f" => &["ph"],
    "j" => &["g"],
    "g" => &["j"],
    "i" => &["y"],
    "y" => &["i"],
    "b" => &["p"],
    "p" => &["b"],
    "d" => &["t"],
    "t" => &["d"],
    "v" => &["f", "w"],
    _ => &[],
  }
}

/// Fallback prefixes for a (lower-cased) target first word: those of its
/// initial letter only, in fixed order. "photo" falls back to "b", not "f".
fn fallback_prefixes(word: &str) -> &'static [&'static str] {
  let mut buf = [0u8; 4];
  match word.chars().next() {
    Some(c) => phonetic_fallbacks(c.encode_utf8(&mut buf)),
    None => &[],
  }
}

/// A table row reduced to what the pickers compare on.
struct Item {
  display: String,
  key: String,
  first_word: String,
}

/// Clean, drop empties and de-duplicate rows by their cleaned key (first wins).
fn unique_items<'a>(rows: impl Iterator<Item = &'a VocabularyEntry>) -> Vec<Item> {
  let mut seen = HashSet::new();
  let mut out = Vec::new();
  for row in rows {
    let display = clean_vocab_item(&row.base_vocabulary_item);
    if display.is_empty() {
      continue;
    }
    let key = display.to_lowercase();
    if !seen.insert(key.clone()) {
      continue;
    }
    let first_word = key.split_whitespace().next().unwrap_or_default().to_string();
    out.push(Item { display, key, first_word });
  }
  out
}

/// All items when they fit, otherwise a random sample of `max_items`.
fn sample<R: Rng + ?Sized>(pool: Vec<&Item>, max_items: usize, rng: &mut R) -> Vec<String> {
  if pool.len() <= max_items {
    return pool.into_iter().map(|i| i.display.clone()).collect();
  }
  pool
    .choose_multiple(rng, max_items)
    .map(|i| i.display.clone())
    .collect()
}

/// Up to `max_items` cleaned items sharing the target's part of speech
/// (case-insensitive, trimmed), never the target itself.
#[instrument(level = "debug", skip(table, rng), fields(rows = table.len()))]
pub fn select_by_part_of_speech<R: Rng + ?Sized>(
  table: &[VocabularyEntry],
  target_word: &str,
  target_pos: &str,
  max_items: usize,
  rng: &mut R,
) -> Vec<String> {
  let target_key = clean_vocab_item(target_word).to_lowercase();
  let pos = target_pos.trim().to_lowercase();

  let items = unique_items(
    table
      .iter()
      .filter(|row| row.part_of_speech.trim().to_lowercase() == pos),
  );
  let pool: Vec<&Item> = items.iter().filter(|i| i.key != target_key).collect();
  let picked = sample(pool, max_items, rng);
  debug!(target: "pipeline", target = %target_word, %pos, picked = picked.len(), "POS selection");
  picked
}

/// Up to `max_items` cleaned items whose first word starts with the target's
/// initial letter, excluding the target and `exclude`. When too few exist the
/// set is topped up from phonetically confusable initials; the result may
/// still be shorter than `max_items`.
#[instrument(level = "debug", skip(table, exclude, rng), fields(rows = table.len(), excluded = exclude.len()))]
pub fn select_by_initial_letter<R: Rng + ?Sized>(
  table: &[VocabularyEntry],
  target_word: &str,
  max_items: usize,
  exclude: &[String],
  rng: &mut R,
) -> Vec<String> {
  let target_first = first_word(target_word);
  let Some(letter) = target_first.chars().next() else {
    return Vec::new();
  };

  let mut excluded: HashSet<String> = exclude
    .iter()
    .map(|x| clean_vocab_item(x).to_lowercase())
    .collect();
  excluded.insert(clean_vocab_item(target_word).to_lowercase());

  let items = unique_items(table.iter());
  let same_letter: Vec<&Item> = items
    .iter()
    .filter(|i| i.first_word.starts_with(letter) && !excluded.contains(&i.key))
    .collect();

  if same_letter.len() >= max_items {
    return sample(same_letter, max_items, rng);
  }

  let mut taken: HashSet<&str> = same_letter.iter().map(|i| i.key.as_str()).collect();
  let mut picked: Vec<String> = same_letter.iter().map(|i| i.display.clone()).collect();

  for prefix in fallback_prefixes(&target_first) {
    if picked.len() >= max_items {
      break;
    }
    let pool: Vec<&Item> = items
      .iter()
      .filter(|i| {
        i.first_word.starts_with(prefix)
          && !excluded.contains(&i.key)
          && !taken.contains(i.key.as_str())
      })
      .collect();
    let needed = max_items - picked.len();
    for item in pool.choose_multiple(rng, needed) {
      taken.insert(item.key.as_str());
      picked.push(item.display.clone());
    }
  }

  picked.truncate(max_items);
  debug!(target: "pipeline", target = %target_word, %letter, picked = picked.len(), "Initial-letter selection");
  picked
}

/// Candidates handed to the model for one vocabulary-list item.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PreSelection {
  pub by_part_of_speech: Vec<String>,
  pub by_initial_letter: Vec<String>,
  /// How many more candidates the model must invent to fill the pool.
  pub additional_needed: usize,
}

impl PreSelection {
  pub fn raw_candidates(&self) -> Vec<String> {
    self
      .by_part_of_speech
      .iter()
      .chain(self.by_initial_letter.iter())
      .cloned()
      .collect()
  }
}

/// Run both pickers for one target: POS first, then initial letter excluding
/// whatever the POS picker already chose.
pub fn preselect<R: Rng + ?Sized>(
  table: &[VocabularyEntry],
  target_word: &str,
  target_pos: &str,
  rng: &mut R,
) -> PreSelection {
  let by_part_of_speech = select_by_part_of_speech(table, target_word, target_pos, POS_PICKS, rng);
  let by_initial_letter =
    select_by_initial_letter(table, target_word, LETTER_PICKS, &by_part_of_speech, rng);
  let additional_needed =
    CANDIDATE_POOL.saturating_sub(by_part_of_speech.len() + by_initial_letter.len());
  PreSelection { by_part_of_speech, by_initial_letter, additional_needed }
}
