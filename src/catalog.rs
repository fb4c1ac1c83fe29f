//! Built-in content: assessment-focus menus, topic suggestions and the
//! semantic domains the planner cycles through when no topic is given.

use crate::domain::{Cefr, QuestionType};

/// Fixed, ordered semantic domains. Job `i` of an untopiced batch gets
/// `SEMANTIC_DOMAINS[i % len]`.
pub const SEMANTIC_DOMAINS: [&str; 12] = [
  "Health & Fitness",
  "Technology & Computers",
  "Cooking & Food",
  "Money & Shopping",
  "Daily Routine",
  "Art & Music",
  "Weather & Nature",
  "Work & Jobs",
  "Education & Learning",
  "Transport & Cities",
  "Family & Relationships",
  "Current Events",
];

/// Assessment-focus menu for a question type at a level.
pub fn focus_options(kind: QuestionType, cefr: Cefr) -> &'static [&'static str] {
  match (kind, cefr) {
    (QuestionType::Grammar, Cefr::A1) => &[
      "Present Simple ('be'/'have')",
      "Prepositions of Time ('on'/'in'/'at')",
      "Prepositions of Place ('on'/'in'/'at')",
      "Possessive Adjectives",
      "Articles (a/an/the)",
      "this/that/these/those",
      "Plurals (regular/irregular)",
      "Modals ('can'/'can't' for ability)",
    ],
    (QuestionType::Grammar, Cefr::A2) => &[
      "Past Simple (regular/irregular)",
      "Countable/Uncountable Nouns (some/any)",
      "Comparatives & Superlatives",
      "Present Continuous",
      "Future ('going to' vs. 'will')",
      "like vs. would like",
      "Adverbs of Frequency",
      "Modals ('should'/'have to' for advice/obligation)",
    ],
    (QuestionType::Grammar, Cefr::B1) => &[
      "Past Simple vs. Present Perfect",
      "Conditionals (Type 1 & 2)",
      "Modals of Obligation (must/have to/should)",
      "Reported Speech (basic statements/questions)",
      "Passive Voice (simple present/past)",
      "Gerunds & Infinitives (basic)",
      "Future Continuous",
      "Common Phrasal Verbs",
    ],
    (QuestionType::Grammar, Cefr::B2) => &[
      "Conditionals (Type 3 & Mixed)",
      "Passive (Causative - have/get something done)",
      "Passive (all tenses)",
      "Modals of Speculation (past/present)",
      "Relative Clauses (defining/non-defining)",
      "Reported Speech (advanced - suggest, advise)",
      "Future Perfect",
      "Gerunds & Infinitives (after specific verbs/prepositions)",
    ],
    (QuestionType::Grammar, Cefr::C1) => &[
      "Inversion (e.g., 'Not only...')",
      "Conditionals (Advanced Mixed, implied)",
      "Passive (Advanced Forms, impersonal)",
      "Modals (subtle meaning, nuance)",
      "Future (Future Perfect Continuous)",
      "Cleft Sentences (e.g., 'What I need is...')",
      "Ellipsis",
      "Participle Clauses (Perfect/Past)",
      "Subjunctive Mood",
    ],
    (QuestionType::Vocabulary, Cefr::A1) => &[
      "Category Membership",
      "Basic Antonym",
      "Meaning-in-Sentence (Context Clue)",
      "Basic Collocation (e.g., 'have breakfast')",
    ],
    (QuestionType::Vocabulary, Cefr::A2) => &[
      "Meaning-in-Sentence (Context Clue)",
      "Collocation (Verb+Noun)",
      "Word Form (noun/verb/adj)",
      "Functional Usage (e.g., 'What for?')",
      "Basic Synonym",
    ],
    (QuestionType::Vocabulary, Cefr::B1) => &[
      "Meaning-in-Sentence (Inference)",
      "Collocation (Adverb+Adj)",
      "Word Form (Affixes - un, re, able)",
      "Functional Usage (e.g., 'I'd rather...')",
      "Phrasal Verbs (common, separable/inseparable)",
    ],
    (QuestionType::Vocabulary, Cefr::B2) => &[
      "Synonym (subtle difference)",
      "Collocation (idiomatic, e.g., 'take into account')",
      "Functional Usage (formal/informal register)",
      "Phrasal Verbs (less common)",
      "Word Form (noun/adj suffixes -tion, -ive)",
    ],
    (QuestionType::Vocabulary, Cefr::C1) => &[
      "Synonym (high-level, low-frequency)",
      "Idiomatic Expressions",
      "Functional Usage (advanced nuance, persuasion)",
      "Collocation (academic, e.g., 'conduct research')",
      "Advanced Phrasal Verbs & Idioms",
      "Hedging Language",
      "Binomials",
      "Discourse Markers (Cohesion)",
    ],
  }
}

/// Suggested batch topics per level (offered to the caller, never forced).
pub fn topic_suggestions(cefr: Cefr) -> &'static [&'static str] {
  match cefr {
    Cefr::A1 => &["Personal Information", "Family", "Food & Drink", "My Home", "Days & Times"],
    Cefr::A2 => &["Daily Routines", "Past Holidays", "Shopping", "Friends & Hobbies", "My Town", "Jobs"],
    Cefr::B1 => &["Work & Jobs", "The Environment", "Travel & Tourism", "Technology", "Health & Fitness", "Education"],
    Cefr::B2 => &["Media & News", "Crime & Society", "The Future", "Education Systems", "Business & Finance", "Global Issues"],
    Cefr::C1 => &["Philosophy & Ethics", "Scientific Research", "Global Politics", "Art & Literature", "Psychology"],
  }
}
