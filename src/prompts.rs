//! Prompt construction for the three stages of every batch mode.
//!
//! Builders are pure: they take jobs plus the typed records of earlier
//! stages and return a `PromptPair`. System instructions come from the
//! configurable `Prompts`; the user instructions below carry the output
//! contract (one wrapper key, exactly `{count}` objects) and stay fixed.

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::Prompts;
use crate::domain::{BatchMode, Job, QuestionType, Stage1Record, Stage2Record, VocabularyEntry};
use crate::lexical::{clean_vocab_item, preselect};
use crate::util::fill_template;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PromptPair {
  pub system: String,
  pub user: String,
}

/// Requested question format for list-driven batches.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum QuestionForm {
  #[serde(rename = "Random Mix")]
  RandomMix,
  #[serde(rename = "Simple gap fill")]
  SimpleGapFill,
  #[serde(rename = "Definition through function/description")]
  DefinitionThroughFunction,
  #[serde(rename = "Cause-Effect completion")]
  CauseEffect,
  #[serde(rename = "Dialogue completion")]
  DialogueCompletion,
  #[serde(rename = "Logical relationship completion")]
  LogicalRelationship,
  #[serde(rename = "Error identification")]
  ErrorIdentification,
  #[serde(rename = "Sentence transformation")]
  SentenceTransformation,
}

impl QuestionForm {
  /// Instruction line for vocabulary-list batches. Forms that only make
  /// sense for grammar fall back to Random Mix.
  pub fn vocabulary_instruction(self) -> &'static str {
    match self {
      QuestionForm::SimpleGapFill => {
        "ALL questions must use simple gap fill format. Example: \"Our new sidewalk is made of ___________.\" "
      }
      QuestionForm::DefinitionThroughFunction => {
        "ALL questions must use definition through function/description format."
      }
      QuestionForm::CauseEffect => "ALL questions must use cause-effect completion format.",
      QuestionForm::DialogueCompletion => "ALL questions must use dialogue completion format.",
      QuestionForm::LogicalRelationship => "ALL questions must use logical relationship completion format.",
      QuestionForm::RandomMix | QuestionForm::ErrorIdentification | QuestionForm::SentenceTransformation => {
        "Use diverse question forms."
      }
    }
  }

  /// Instruction line for grammar-list batches. Vocabulary-only forms fall
  /// back to simple gap fill.
  pub fn grammar_instruction(self) -> &'static str {
    match self {
      QuestionForm::RandomMix => "Use diverse question forms.",
      QuestionForm::DialogueCompletion => "ALL questions must use dialogue completion format.",
      QuestionForm::ErrorIdentification => {
        "Create a sentence with an error related to the grammar point (if applicable type)."
      }
      QuestionForm::SentenceTransformation => "Provide a sentence and a keyword to transform it.",
      QuestionForm::SimpleGapFill
      | QuestionForm::DefinitionThroughFunction
      | QuestionForm::CauseEffect
      | QuestionForm::LogicalRelationship => "ALL questions must use simple gap fill format via a blank line.",
    }
  }
}

pub const GRAMMATICAL_EXCLUSIVITY_RULE: &str = "GRAMMATICAL EXCLUSIVITY RULE: Include a grammatical signal.";
pub const SEMANTIC_EXCLUSIVITY_RULE: &str = "SEMANTIC EXCLUSIVITY RULE: Include semantic context clues.";

fn pretty<T: Serialize + ?Sized>(value: &T) -> String {
  serde_json::to_string_pretty(value).unwrap_or_else(|_| "[]".to_string())
}

fn system(template: &str, jobs: &[Job]) -> String {
  fill_template(template, &[("count", jobs.len().to_string().as_str())])
}

// ---------------------------------------------------------------------------
// Sequential batches (planner-driven grammar / vocabulary)
// ---------------------------------------------------------------------------

const SEQUENTIAL_STAGE1_USER: &str = r#"
TASK: Create exactly {count} complete, original test questions from scratch.

JOB SPECIFICATIONS:
{specs}

{constraints}

MANDATORY OUTPUT FORMAT:
{
  "questions": [
    {
      "Item Number": "...",
      "Assessment Focus": "...",
      "Complete Sentence": "...",
      "Correct Answer": "...",
      "Context Clue Location": "...",
      "Context Clue Explanation": "...",
      "CEFR rating": "...",
      "Category": "..."
    },
    ...
  ]
}

STYLE REFERENCE:
{examples}
"#;

const SEQUENTIAL_STAGE2_GRAMMAR_USER: &str = r#"
TASK: Generate 5 candidate distractors for ALL {count} GRAMMAR questions.

INPUT FROM STAGE 1:
{input}

GENERATION INSTRUCTIONS:
1. WORD COUNT LIMIT: Max 3 words.
2. GRAMMATICAL PARALLELISM: Match word count and construction type of correct answer.
3. NO LEXICAL OVERLAP: Do NOT repeat words from the question stem.
4. TARGET FORM COVERAGE: For "vs" topics, include both forms.

MANDATORY OUTPUT FORMAT:
{
  "candidates": [
    {
      "Item Number": "...",
      "Candidate A": "...",
      "Candidate B": "...",
      "Candidate C": "...",
      "Candidate D": "...",
      "Candidate E": "..."
    },
    ...
  ]
}
"#;

const SEQUENTIAL_STAGE2_VOCABULARY_USER: &str = r#"
TASK: Generate 5 candidate distractors for ALL {count} VOCABULARY questions.

INPUT FROM STAGE 1:
{input}

GENERATION INSTRUCTIONS:
1. WORD COUNT LIMIT: Max 3 words.
2. EXACT INFLECTIONAL FORM MATCHING: Candidates must match the grammatical form of the correct answer (e.g., if answer is "running", candidates must be gerunds).
3. SEMANTIC FIELD PROXIMITY: Candidates should be from the same semantic field.

MANDATORY OUTPUT FORMAT:
{
  "candidates": [
    {
      "Item Number": "...",
      "Candidate A": "...",
      "Candidate B": "...",
      "Candidate C": "...",
      "Candidate D": "...",
      "Candidate E": "..."
    },
    ...
  ]
}
"#;

const SEQUENTIAL_STAGE3_GRAMMAR_USER: &str = r#"
TASK: Validate candidate distractors for ALL {count} GRAMMAR questions and select the final three distractors.

INPUT:
{input}

VALIDATION PROCEDURE:
1. GRAMMATICAL CORRECTNESS TEST: Distractor must make the sentence grammatically INCORRECT.
2. PROFICIENCY CHECK: Errors must be appropriate for the CEFR level.

MANDATORY OUTPUT FORMAT:
{
  "validated": [
    {
      "Item Number": "...",
      "Selected Distractor A": "...",
      "Selected Distractor B": "...",
      "Selected Distractor C": "...",
      "Validation Notes": "..."
    },
    ...
  ]
}
"#;

const SEQUENTIAL_STAGE3_VOCABULARY_USER: &str = r#"
TASK: Validate candidate distractors for ALL {count} VOCABULARY questions and select the final three distractors.

INPUT:
{input}

VALIDATION PROCEDURE:
1. EXAMINER ACCEPTANCE TEST: Distractor must NOT be a valid correct answer.
2. UNIQUENESS CHECK: Distractor must be grammatically correct but semantically wrong.

MANDATORY OUTPUT FORMAT:
{
  "validated": [
    {
      "Item Number": "...",
      "Selected Distractor A": "...",
      "Selected Distractor B": "...",
      "Selected Distractor C": "...",
      "Validation Notes": "..."
    },
    ...
  ]
}
"#;

/// Exclusivity rules implied by the batch: a grammatical signal when any
/// grammar focus contrasts two forms ("vs"), semantic clues when any job is
/// vocabulary.
pub fn exclusivity_constraints(jobs: &[Job]) -> String {
  let contrast = jobs
    .iter()
    .any(|j| j.kind == QuestionType::Grammar && j.focus.to_lowercase().contains("vs"));
  let vocabulary = jobs.iter().any(|j| j.kind == QuestionType::Vocabulary);

  let mut out = String::new();
  if contrast {
    out.push_str(GRAMMATICAL_EXCLUSIVITY_RULE);
  }
  if vocabulary {
    out.push_str(SEMANTIC_EXCLUSIVITY_RULE);
  }
  out
}

/// Stage 1 for planner batches. `examples` is the pre-rendered style
/// reference block (may be empty).
pub fn sequential_stage1(prompts: &Prompts, jobs: &[Job], examples: &str) -> PromptPair {
  let specs: Vec<Value> = jobs
    .iter()
    .map(|j| {
      let topic = if j.context.is_empty() { "General" } else { j.context.as_str() };
      json!({
        "job_id": j.job_id,
        "cefr": j.cefr,
        "type": j.kind,
        "focus": j.focus,
        "topic": topic,
      })
    })
    .collect();

  let count = jobs.len().to_string();
  let user = fill_template(
    SEQUENTIAL_STAGE1_USER,
    &[
      ("count", count.as_str()),
      ("specs", pretty(&specs).as_str()),
      ("constraints", exclusivity_constraints(jobs).as_str()),
      ("examples", examples),
    ],
  );
  PromptPair { system: system(&prompts.sequential_stage1_system, jobs), user }
}

/// Stage 2 for planner batches: the Stage-1 records are passed through as-is.
pub fn sequential_stage2(prompts: &Prompts, kind: QuestionType, jobs: &[Job], stage1: &[Stage1Record]) -> PromptPair {
  let (sys, tpl) = match kind {
    QuestionType::Grammar => (&prompts.sequential_stage2_grammar_system, SEQUENTIAL_STAGE2_GRAMMAR_USER),
    QuestionType::Vocabulary => (&prompts.sequential_stage2_vocabulary_system, SEQUENTIAL_STAGE2_VOCABULARY_USER),
  };
  let count = jobs.len().to_string();
  let user = fill_template(tpl, &[("count", count.as_str()), ("input", pretty(stage1).as_str())]);
  PromptPair { system: system(sys, jobs), user }
}

/// Per-item validation input, aligned by position and truncated to the
/// shortest of the three lists.
fn validation_input(
  jobs: &[Job],
  stage1: &[Stage1Record],
  stage2: &[Stage2Record],
  slots: usize,
  with_word_class: bool,
) -> Vec<Value> {
  jobs
    .iter()
    .zip(stage1)
    .zip(stage2)
    .map(|((job, s1), s2)| {
      let mut item = json!({
        "Item Number": s1.item_number,
        "Complete Sentence": s1.complete_sentence,
        "Correct Answer": s1.correct_answer,
        "Candidates": s2.candidates(slots),
      });
      if with_word_class {
        let class = if job.part_of_speech.is_empty() { "Unknown" } else { job.part_of_speech.as_str() };
        item["Target Word Class"] = json!(class);
      }
      item
    })
    .collect()
}

pub fn sequential_stage3(
  prompts: &Prompts,
  kind: QuestionType,
  jobs: &[Job],
  stage1: &[Stage1Record],
  stage2: &[Stage2Record],
) -> PromptPair {
  let (sys, tpl) = match kind {
    QuestionType::Grammar => (&prompts.sequential_stage3_grammar_system, SEQUENTIAL_STAGE3_GRAMMAR_USER),
    QuestionType::Vocabulary => (&prompts.sequential_stage3_vocabulary_system, SEQUENTIAL_STAGE3_VOCABULARY_USER),
  };
  let input = validation_input(jobs, stage1, stage2, BatchMode::sequential(kind).candidate_slots(), false);
  let count = jobs.len().to_string();
  let user = fill_template(tpl, &[("count", count.as_str()), ("input", pretty(&input).as_str())]);
  PromptPair { system: system(sys, jobs), user }
}

// ---------------------------------------------------------------------------
// Vocabulary-list batches
// ---------------------------------------------------------------------------

const VOCABULARY_LIST_STAGE1_USER: &str = r#"
TASK: Create exactly {count} vocabulary test questions.

VOCABULARY TARGETS:
{specs}

{form_instruction}

GENERATION INSTRUCTIONS:
1. **CONTEXT:** Create a natural sentence where the target word fits perfectly.
2. **INFLECTION (CRITICAL):**
   - You MUST inflect the target word to match the sentence grammar.
   - If the sentence is past tense, "blow" MUST become "blew".
   - The "Correct Answer" field MUST contain the INFLECTED form.
3. **CLARITY:** Ensure the context makes the meaning clear without definitions.

MANDATORY OUTPUT FORMAT:
{
  "questions": [
    {
      "Item Number": "...",
      "Target Vocabulary": "...",
      "Complete Sentence": "...",
      "Correct Answer": "...[INFLECTED FORM]...",
      "Context Clue Location": "...",
      "Context Clue Explanation": "...",
      "CEFR rating": "...",
      "Category": "Vocabulary"
    },
    ...
  ]
}
"#;

const VOCABULARY_LIST_STAGE2_USER: &str = r#"
TASK: Create a final pool of exactly 8 candidates for each question.
OUTPUT FORMAT: JSON

INPUT DATA:
{input}

INSTRUCTIONS FOR CANDIDATE GENERATION:

1. **SOURCE MATERIAL:**
   - Start with the "Raw Candidates (from Database)".
   - Generate "Additional Candidates" to reach exactly 8 total.
   - Priority for additional candidates: Antonyms of target, then synonyms of the raw candidates.

2. **MORPHOLOGICAL ADAPTATION (CRITICAL):**
   - The "Raw Candidates" are in BASE DICTIONARY FORM (e.g., "burn", "slip").
   - You MUST CONJUGATE/MODIFY these words to match the "Correct Answer (In Sentence)".
   - **TENSE MATCHING:** If Correct Answer is "blew" (past), "burn" must become "burned".
   - **NUMBER MATCHING:** If Correct Answer is "apples", "fruit" must become "fruits".
   - **FORM MATCHING:** If Correct Answer is "running", "walk" must become "walking".

   **EXAMPLE:**
   - Sentence: "When the movie was over..."
   - Correct Answer: "was over" (Past)
   - Raw Candidate: "burn"
   - **YOUR OUTPUT:** "burned" (Past Tense) -- *Do NOT output "burn"*

3. **CLEANING:**
   - Ensure all output candidates are single words (unless the distractor is a phrasal verb).
   - NEVER output slashes (e.g., "build/built/built" -> output "built").

MANDATORY OUTPUT FORMAT:
{
  "candidates": [
    {
      "Item Number": "...",
      "Candidate A": "...[Adapted/Inflected Item]...",
      "Candidate B": "...[Adapted/Inflected Item]...",
      "Candidate C": "...[Adapted/Inflected Item]...",
      "Candidate D": "...[Adapted/Inflected Item]...",
      "Candidate E": "...[Adapted/Inflected Item]...",
      "Candidate F": "...[Adapted/Inflected Item]...",
      "Candidate G": "...[Adapted/Inflected Item]...",
      "Candidate H": "...[Adapted/Inflected Item]...",
      "Transformation Notes": "e.g., Adapted 'burn' to 'burned' to match past tense"
    },
    ...
  ]
}
"#;

const VOCABULARY_LIST_STAGE3_USER: &str = r#"
TASK: Validate candidates and select the final 3 distractors per question.
OUTPUT FORMAT: JSON

INPUT:
{input}

VALIDATION PROTOCOL (Apply in Order):

**STEP 1: MORPHOLOGICAL PARITY CHECK (The "Shape" Test)**
Look at the **Correct Answer** to determine the rule:

*   **CASE A: The Correct Answer is INFLECTED** (e.g., "walked", "tables", "going", "happiest", "mice").
    *   **RULE:** STRICT PARITY. Distractors MUST match the word class and inflection.
    *   **Action:** REJECT any candidate that is a different part of speech or lacks the matching inflection.
    *   *Example:* Target "blew" (Past V) -> REJECT "house" (Noun). REJECT "blow" (Base V). ACCEPT "cooked" (Past V).

*   **CASE B: The Correct Answer is BASE FORM** (e.g., "walk", "table", "big", "be").
    *   **RULE:** BASE PARITY. Distractors can be different word classes, BUT MUST BE BASE FORM.
    *   **Action:** REJECT any candidate that has an inflection suffix (-ed, -ing, -s).
    *   *Example:* Target "be" -> REJECT "burned" (Past). REJECT "building" (Gerund). ACCEPT "burn" (Base).

**STEP 2: SYNTACTIC & SEMANTIC FIT (The "Fit & Logic" Test)**
For candidates that pass Step 1, apply these two filters:

*   **A. SYNTACTIC FIT (Grammar Structure):**
    Does the word fit the **sentence structure** (prepositions, transitivity, collocations)?
    *   *Example:* "He ____ me the truth." (Target: told).
    *   *Test:* "said" -> "He said me..." -> **REJECT** (Syntax error: 'said' cannot take indirect object).
    *   *Test:* "spoke" -> "He spoke me..." -> **REJECT** (Syntax error: needs 'to').

*   **B. EXAMINER ACCEPTANCE (Semantic Logic):**
    If a student wrote this answer, would it be **logically acceptable** (even if not the target)?
    *   *Test:* "We spent the day at the ____." (Target: beach).
    *   *Candidate:* "college". -> "We spent the day at the college." -> **REJECT** (Logically valid = Bad Distractor).
    *   *Candidate:* "decision". -> "We spent the day at the decision." -> **ACCEPT** (Grammatically fits, but logically absurd).

**STEP 3: FINAL SELECTION**
*   Select the 3 candidates that survive Step 1 & 2.
*   Prioritize candidates that look "plausible" to a learner but are definitely wrong.

MANDATORY OUTPUT FORMAT:
{
  "validated": [
    {
      "Item Number": "...",
      "Selected Distractor A": "...",
      "Selected Distractor B": "...",
      "Selected Distractor C": "...",
      "Validation Notes": "Refers to parity rule applied (e.g., 'Target inflected, rejected noun distractor')."
    },
    ...
  ]
}
"#;

pub fn vocabulary_list_stage1(prompts: &Prompts, jobs: &[Job], form: QuestionForm) -> PromptPair {
  let specs: Vec<Value> = jobs
    .iter()
    .map(|j| {
      json!({
        "job_id": j.job_id,
        "cefr": j.cefr,
        "target_vocabulary": clean_vocab_item(&j.target_vocabulary),
        "definition": j.definition,
        "part_of_speech": j.part_of_speech,
      })
    })
    .collect();

  let count = jobs.len().to_string();
  let user = fill_template(
    VOCABULARY_LIST_STAGE1_USER,
    &[
      ("count", count.as_str()),
      ("specs", pretty(&specs).as_str()),
      ("form_instruction", form.vocabulary_instruction()),
    ],
  );
  PromptPair { system: system(&prompts.vocabulary_list_stage1_system, jobs), user }
}

/// Stage 2 for vocabulary lists. Runs the lexical pre-selection once per
/// job against `table` and hands the base-form picks to the model.
pub fn vocabulary_list_stage2<R: Rng + ?Sized>(
  prompts: &Prompts,
  jobs: &[Job],
  stage1: &[Stage1Record],
  table: &[VocabularyEntry],
  rng: &mut R,
) -> PromptPair {
  let input: Vec<Value> = jobs
    .iter()
    .zip(stage1)
    .map(|(job, s1)| {
      let target = clean_vocab_item(&job.target_vocabulary);
      let picks = preselect(table, &target, &job.part_of_speech, rng);
      json!({
        "Item Number": s1.item_number,
        "Target (Base)": target,
        "Complete Sentence": s1.complete_sentence,
        "Correct Answer (In Sentence)": s1.correct_answer,
        "Raw Candidates (from Database)": picks.raw_candidates(),
        "Additional Candidates Needed": picks.additional_needed,
      })
    })
    .collect();

  let user = fill_template(VOCABULARY_LIST_STAGE2_USER, &[("input", pretty(&input).as_str())]);
  PromptPair { system: system(&prompts.vocabulary_list_stage2_system, jobs), user }
}

pub fn vocabulary_list_stage3(
  prompts: &Prompts,
  jobs: &[Job],
  stage1: &[Stage1Record],
  stage2: &[Stage2Record],
) -> PromptPair {
  let input = validation_input(jobs, stage1, stage2, BatchMode::VocabularyList.candidate_slots(), true);
  let user = fill_template(VOCABULARY_LIST_STAGE3_USER, &[("input", pretty(&input).as_str())]);
  PromptPair { system: system(&prompts.vocabulary_list_stage3_system, jobs), user }
}

// ---------------------------------------------------------------------------
// Grammar-list batches
// ---------------------------------------------------------------------------

const GRAMMAR_LIST_STAGE1_USER: &str = r#"
TASK: Create exactly {count} grammar test questions.

GRAMMAR TARGETS:
{specs}

{form_instruction}

GENERATION INSTRUCTIONS:
1. **CONTEXT:** Create a natural sentence that REQUIRES the specific "Base Grammar Item" and "Subtype".
2. **TARGET FOCUS:** The "Correct Answer" must be the specific grammar structure requested.
   - Example Target: "Present Perfect" + "For"
   - Sentence: "I have lived here ____ ten years."
   - Correct Answer: "for"
3. **CLARITY:** Ensure the context makes the answer unambiguous.

MANDATORY OUTPUT FORMAT:
{
  "questions": [
    {
      "Item Number": "...",
      "Target Grammar": "...",
      "Subtype": "...",
      "Complete Sentence": "...",
      "Correct Answer": "...",
      "Context Explaination": "...",
      "CEFR rating": "...",
      "Category": "Grammar"
    },
    ...
  ]
}
"#;

const GRAMMAR_LIST_STAGE2_USER: &str = r#"
TASK: Create a pool of exactly 4 candidate distractors for each question.
OUTPUT FORMAT: JSON

INPUT DATA:
{input}

INSTRUCTIONS FOR DISTRACTOR GENERATION:
1. **COMMON ERRORS:** Focus on common learner mistakes for the specific CEFR level and grammar point.
2. **PLAUSIBILITY:** Distractors should look grammatically possible but be incorrect in the specific context.
3. **RANGE:**
   - Include wrong tenses.
   - Include wrong prepositions.
   - Include L1 interference errors if common.

MANDATORY OUTPUT FORMAT:
{
  "candidates": [
    {
      "Item Number": "...",
      "Candidate A": "...",
      "Candidate B": "...",
      "Candidate C": "...",
      "Candidate D": "...",
      "Distractor Notes": "e.g. Incorrect tense 'have went'"
    },
    ...
  ]
}
"#;

const GRAMMAR_LIST_STAGE3_USER: &str = r#"
TASK: Validate candidates and select the final 3 distractors per question.
OUTPUT FORMAT: JSON

INPUT:
{input}

VALIDATION PROTOCOL:
1. **DEFINITELY INCORRECT:** Ensure the distractor is not a valid alternative answer.
2. **CONTEXTUAL FIT:** The distractor might fit grammatically but be semantically weird (optional), or fit semantically but be grammatically wrong (preferred for grammar tests).

MANDATORY OUTPUT FORMAT:
{
  "validated": [
    {
      "Item Number": "...",
      "Selected Distractor A": "...",
      "Selected Distractor B": "...",
      "Selected Distractor C": "...",
      "Validation Notes": "..."
    },
    ...
  ]
}
"#;

pub fn grammar_list_stage1(prompts: &Prompts, jobs: &[Job], form: QuestionForm) -> PromptPair {
  let specs: Vec<Value> = jobs
    .iter()
    .map(|j| {
      json!({
        "job_id": j.job_id,
        "cefr": j.cefr,
        "base_grammar_item": j.base_grammar,
        "grammar_subtype": j.subtype,
      })
    })
    .collect();

  let count = jobs.len().to_string();
  let user = fill_template(
    GRAMMAR_LIST_STAGE1_USER,
    &[
      ("count", count.as_str()),
      ("specs", pretty(&specs).as_str()),
      ("form_instruction", form.grammar_instruction()),
    ],
  );
  PromptPair { system: system(&prompts.grammar_list_stage1_system, jobs), user }
}

pub fn grammar_list_stage2(prompts: &Prompts, jobs: &[Job], stage1: &[Stage1Record]) -> PromptPair {
  let input: Vec<Value> = jobs
    .iter()
    .zip(stage1)
    .map(|(job, s1)| {
      json!({
        "Item Number": s1.item_number,
        "Target Grammar": job.base_grammar,
        "Subtype": job.subtype,
        "Complete Sentence": s1.complete_sentence,
        "Correct Answer": s1.correct_answer,
      })
    })
    .collect();

  let user = fill_template(GRAMMAR_LIST_STAGE2_USER, &[("input", pretty(&input).as_str())]);
  PromptPair { system: system(&prompts.grammar_list_stage2_system, jobs), user }
}

pub fn grammar_list_stage3(
  prompts: &Prompts,
  jobs: &[Job],
  stage1: &[Stage1Record],
  stage2: &[Stage2Record],
) -> PromptPair {
  let input = validation_input(jobs, stage1, stage2, BatchMode::GrammarList.candidate_slots(), false);
  let user = fill_template(GRAMMAR_LIST_STAGE3_USER, &[("input", pretty(&input).as_str())]);
  PromptPair { system: system(&prompts.grammar_list_stage3_system, jobs), user }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::Cefr;
  use rand::rngs::StdRng;
  use rand::SeedableRng;

  fn grammar_job(id: &str, focus: &str) -> Job {
    let mut j = Job::new(id, QuestionType::Grammar, Cefr::B1);
    j.focus = focus.into();
    j.context = "Work & Jobs".into();
    j
  }

  fn vocab_job(id: &str, word: &str, pos: &str) -> Job {
    let mut j = Job::new(id, QuestionType::Vocabulary, Cefr::B1);
    j.target_vocabulary = word.into();
    j.part_of_speech = pos.into();
    j
  }

  fn s1(n: &str, sentence: &str, answer: &str) -> Stage1Record {
    Stage1Record {
      item_number: n.into(),
      complete_sentence: sentence.into(),
      correct_answer: answer.into(),
      ..Default::default()
    }
  }

  #[test]
  fn system_prompts_state_the_batch_size() {
    let prompts = Prompts::default();
    let jobs = vec![grammar_job("GB1-1", "Past Simple"), grammar_job("GB1-2", "Past Simple")];
    let pair = sequential_stage1(&prompts, &jobs, "");
    assert!(pair.system.contains("exactly 2 complete test questions"));
    assert!(pair.user.contains("Create exactly 2 complete"));
    assert!(pair.user.contains("\"job_id\": \"GB1-2\""));
    assert!(pair.user.contains("\"topic\": \"Work & Jobs\""));
    assert!(!pair.user.contains("{specs}"));
  }

  #[test]
  fn vocabulary_list_stage1_demands_the_inflected_answer() {
    let jobs = vec![vocab_job("12-1-V-1-i", "blow/blew/blown", "verb"), vocab_job("12-1-V-2-i", "burn", "verb")];
    let pair = vocabulary_list_stage1(&Prompts::default(), &jobs, QuestionForm::RandomMix);

    assert!(pair.user.contains("Create exactly 2 vocabulary test questions"));
    assert!(pair.user.contains("You MUST inflect the target word to match the sentence grammar."));
    assert!(pair.user.contains("The \"Correct Answer\" field MUST contain the INFLECTED form."));
    assert!(pair.user.contains("\"questions\": ["));
    assert!(pair.user.contains("\"target_vocabulary\": \"blow\""));
    assert!(pair.user.contains(QuestionForm::RandomMix.vocabulary_instruction()));
    assert!(!pair.user.contains("{count}") && !pair.system.contains("{count}"));
    assert!(pair.system.contains("exactly 2 complete test questions"));
  }

  #[test]
  fn vocabulary_list_stage2_asks_for_morphological_adaptation() {
    let table = vec![
      VocabularyEntry { concept_id: "1".into(), base_vocabulary_item: "blow".into(), part_of_speech: "verb".into(), definition: String::new() },
      VocabularyEntry { concept_id: "2".into(), base_vocabulary_item: "burn".into(), part_of_speech: "verb".into(), definition: String::new() },
    ];
    let jobs = vec![vocab_job("1", "blow", "verb")];
    let stage1 = vec![s1("1", "The wind blew hard.", "blew")];
    let mut rng = StdRng::seed_from_u64(5);
    let pair = vocabulary_list_stage2(&Prompts::default(), &jobs, &stage1, &table, &mut rng);

    assert!(pair.user.contains("MORPHOLOGICAL ADAPTATION (CRITICAL)"));
    assert!(pair.user.contains("You MUST CONJUGATE/MODIFY these words to match the \"Correct Answer (In Sentence)\"."));
    assert!(pair.user.contains("If Correct Answer is \"blew\" (past), \"burn\" must become \"burned\"."));
    assert!(pair.user.contains("\"candidates\": ["));
    assert!(pair.user.contains("\"Candidate H\""));
    assert!(pair.system.contains("exactly 8 candidate distractors for exactly 1 questions"));
  }

  #[test]
  fn placeholders_in_user_text_are_not_expanded() {
    let jobs = vec![grammar_job("GB1-1", "{constraints} {examples}")];
    let pair = sequential_stage1(&Prompts::default(), &jobs, "### EXAMPLE:\nkept\n\n");
    assert!(pair.user.contains("\"focus\": \"{constraints} {examples}\""));
    assert_eq!(pair.user.matches("### EXAMPLE:").count(), 1);
  }

  #[test]
  fn exclusivity_rules_follow_the_jobs() {
    let contrast = vec![grammar_job("GB1-1", "Past Simple vs. Present Perfect")];
    assert_eq!(exclusivity_constraints(&contrast), GRAMMATICAL_EXCLUSIVITY_RULE);

    let plain = vec![grammar_job("GB1-1", "Future Continuous")];
    assert!(exclusivity_constraints(&plain).is_empty());

    let vocab = vec![vocab_job("VB1-1", "decide", "verb")];
    let pair = sequential_stage1(&Prompts::default(), &vocab, "");
    assert!(pair.user.contains(SEMANTIC_EXCLUSIVITY_RULE));
  }

  #[test]
  fn style_reference_is_embedded() {
    let jobs = vec![grammar_job("GB1-1", "Past Simple")];
    let examples = "### EXAMPLE:\n{\"Question Prompt\":\"She ____ home.\"}\n\n";
    let pair = sequential_stage1(&Prompts::default(), &jobs, examples);
    assert!(pair.user.contains("STYLE REFERENCE:\n### EXAMPLE:"));
  }

  #[test]
  fn stage3_input_drops_empty_candidates_and_truncates() {
    let jobs = vec![grammar_job("GB1-1", "x"), grammar_job("GB1-2", "x")];
    let stage1 = vec![s1("1", "She ____ home.", "went"), s1("2", "We ____ it.", "saw")];
    let stage2 = vec![Stage2Record {
      item_number: "1".into(),
      candidate_a: "go".into(),
      candidate_c: "goes".into(),
      candidate_f: "gone".into(),
      ..Default::default()
    }];
    let input = validation_input(&jobs, &stage1, &stage2, 5, false);
    assert_eq!(input.len(), 1);
    assert_eq!(input[0]["Candidates"], json!(["go", "goes"]));
    assert!(input[0].get("Target Word Class").is_none());
  }

  #[test]
  fn vocabulary_list_stage2_hands_over_preselected_base_forms() {
    let table = vec![
      VocabularyEntry { concept_id: "1".into(), base_vocabulary_item: "blow".into(), part_of_speech: "verb".into(), definition: String::new() },
      VocabularyEntry { concept_id: "2".into(), base_vocabulary_item: "burn".into(), part_of_speech: "verb".into(), definition: String::new() },
      VocabularyEntry { concept_id: "3".into(), base_vocabulary_item: "build/built/built".into(), part_of_speech: "verb".into(), definition: String::new() },
    ];
    let jobs = vec![vocab_job("1", "blow", "verb")];
    let stage1 = vec![s1("1", "The wind blew hard.", "blew")];
    let mut rng = StdRng::seed_from_u64(3);
    let pair = vocabulary_list_stage2(&Prompts::default(), &jobs, &stage1, &table, &mut rng);

    let start = pair.user.find('[').unwrap();
    let end = pair.user.find("\n\nINSTRUCTIONS").unwrap();
    let input: Value = serde_json::from_str(&pair.user[start..end]).unwrap();
    let raw: Vec<String> = serde_json::from_value(input[0]["Raw Candidates (from Database)"].clone()).unwrap();
    assert_eq!(raw.len(), 2);
    assert!(raw.contains(&"burn".to_string()) && raw.contains(&"build".to_string()));
    assert_eq!(input[0]["Additional Candidates Needed"], json!(6));
    assert_eq!(input[0]["Target (Base)"], json!("blow"));
  }

  #[test]
  fn vocabulary_list_stage3_carries_word_class() {
    let jobs = vec![vocab_job("1", "table", "")];
    let stage1 = vec![s1("1", "Put it on the table.", "table")];
    let stage2 = vec![Stage2Record { candidate_h: "chair".into(), ..Default::default() }];
    let pair = vocabulary_list_stage3(&Prompts::default(), &jobs, &stage1, &stage2);
    assert!(pair.user.contains("\"Target Word Class\": \"Unknown\""));
    assert!(pair.user.contains("\"chair\""));
  }

  #[test]
  fn question_forms_fall_back_per_family() {
    assert_eq!(QuestionForm::ErrorIdentification.vocabulary_instruction(), "Use diverse question forms.");
    assert_eq!(
      QuestionForm::CauseEffect.grammar_instruction(),
      "ALL questions must use simple gap fill format via a blank line."
    );
    let form: QuestionForm = serde_json::from_value(json!("Definition through function/description")).unwrap();
    assert_eq!(form, QuestionForm::DefinitionThroughFunction);
  }

  #[test]
  fn grammar_list_prompts_name_targets() {
    let mut job = Job::new("GL-1", QuestionType::Grammar, Cefr::B1);
    job.base_grammar = "Present Perfect".into();
    job.subtype = "for".into();
    let jobs = vec![job];
    let pair = grammar_list_stage1(&Prompts::default(), &jobs, QuestionForm::SimpleGapFill);
    assert!(pair.user.contains("\"base_grammar_item\": \"Present Perfect\""));
    assert!(pair.user.contains("via a blank line"));

    let stage1 = vec![s1("1", "I have lived here for ten years.", "for")];
    let pair = grammar_list_stage2(&Prompts::default(), &jobs, &stage1);
    assert!(pair.user.contains("\"Target Grammar\": \"Present Perfect\""));
    assert!(pair.system.contains("exactly 4 candidate distractors for exactly 1 grammar"));
  }
}
