// Tier 3: Selection
//
// Turns scored and (possibly) oracle-judged candidates into at most one
// entity. Runs after every escalation for the query has completed.
//
// Contract: disambiguate(query, context, evaluations) → Disambiguation

pub mod disambiguator;

pub use disambiguator::{Disambiguation, Disambiguator, Selection, SelectionMethod};
