// Tier 1: Name Normalizer
//
// Concept: Canonicalize a raw organization name into its comparison form
// Synchronization: &str in, NormalizedName out; pure, total, deterministic
//
// Steps (fixed order):
// 1. Lower-case; split '&' out as its own token
// 2. Expand abbreviations through the substitution table
// 3. Delete characters other than letters, digits, space and hyphen
// 4. Remove stopwords (legal suffixes); keep tokens if all would go
// 5. Collapse whitespace

use crate::config::EngineConfig;
use crate::resolution::types::NormalizedName;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::RwLock;

/// Name normalizer (Tier 1 concept)
#[derive(Debug, Clone)]
pub struct Normalizer {
    abbreviations: BTreeMap<String, String>,
    stopwords: BTreeSet<String>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl Normalizer {
    pub fn new(abbreviations: BTreeMap<String, String>, stopwords: BTreeSet<String>) -> Self {
        // Table keys and stopwords are matched against lower-cased tokens
        Self {
            abbreviations: abbreviations
                .into_iter()
                .map(|(k, v)| (k.to_lowercase(), v.to_lowercase()))
                .collect(),
            stopwords: stopwords.into_iter().map(|s| s.to_lowercase()).collect(),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.abbreviation_table.clone(), config.stopwords.clone())
    }

    /// Normalize a raw name. Never fails; garbage yields an empty name.
    pub fn normalize(&self, raw: &str) -> NormalizedName {
        let lowered = raw.to_lowercase().replace('&', " & ");

        let expanded: Vec<String> = lowered
            .split_whitespace()
            .map(|token| self.expand_token(token))
            .collect();

        let stripped: String = expanded
            .join(" ")
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == ' ' || *c == '-')
            .collect();

        let tokens: Vec<&str> = stripped.split_whitespace().collect();
        let kept: Vec<&str> = tokens
            .iter()
            .copied()
            .filter(|t| !self.stopwords.contains(*t))
            .collect();

        let result = if kept.is_empty() { tokens } else { kept };
        NormalizedName::assume_normalized(result.join(" "))
    }

    fn expand_token(&self, token: &str) -> String {
        if let Some(expansion) = self.abbreviations.get(token) {
            return expansion.clone();
        }
        let trimmed = token.trim_end_matches(['.', ',']);
        if trimmed != token {
            if let Some(expansion) = self.abbreviations.get(trimmed) {
                return expansion.clone();
            }
        }
        token.to_string()
    }
}

/// Per-run memo of normalized names
///
/// Scoped to a single `resolve`/`resolve_batch` call so repeated raw strings
/// (registry names across queries, duplicate queries) normalize once.
#[derive(Debug, Default)]
pub struct NameMemo {
    names: RwLock<HashMap<String, NormalizedName>>,
}

impl NameMemo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn normalize(&self, normalizer: &Normalizer, raw: &str) -> NormalizedName {
        if let Ok(names) = self.names.read() {
            if let Some(found) = names.get(raw) {
                return found.clone();
            }
        }
        let normalized = normalizer.normalize(raw);
        if let Ok(mut names) = self.names.write() {
            names.insert(raw.to_string(), normalized.clone());
        }
        normalized
    }

    pub fn len(&self) -> usize {
        self.names.read().map(|n| n.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(raw: &str) -> String {
        Normalizer::default().normalize(raw).into_string()
    }

    #[test]
    fn test_lowercase_and_legal_suffix_removal() {
        assert_eq!(norm("Apple Inc."), "apple");
        assert_eq!(norm("ACME, LLC"), "acme");
        assert_eq!(norm("Widgets Ltd"), "widgets");
    }

    #[test]
    fn test_abbreviation_expansion_before_stripping() {
        assert_eq!(norm("Acme Corp."), "acme corporation");
        assert_eq!(norm("Acme Corporation"), "acme corporation");
        assert_eq!(norm("Acme Intl"), "acme international");
    }

    #[test]
    fn test_ampersand_becomes_and() {
        assert_eq!(norm("Johnson & Johnson"), "johnson and johnson");
        assert_eq!(norm("Johnson and Johnson"), "johnson and johnson");
        assert_eq!(norm("J&J"), "j and j");
    }

    #[test]
    fn test_punctuation_stripped_hyphen_kept() {
        assert_eq!(norm("Coca-Cola"), "coca-cola");
        assert_eq!(norm("U.S. Steel"), "us steel");
        assert_eq!(norm("Yahoo!"), "yahoo");
    }

    #[test]
    fn test_whitespace_collapsed() {
        assert_eq!(norm("  Big    Blue\tMachines  "), "big blue machines");
    }

    #[test]
    fn test_total_on_garbage() {
        assert_eq!(norm(""), "");
        assert_eq!(norm("!!! ??? ..."), "");
    }

    #[test]
    fn test_all_stopwords_keeps_minimal_form() {
        assert_eq!(norm("The LLC"), "the llc");
    }

    #[test]
    fn test_unicode_letters_survive() {
        assert_eq!(norm("Société Générale S.A."), "société générale");
    }

    #[test]
    fn test_equivalent_spellings_share_key() {
        assert_eq!(norm("Acme Corp."), norm("ACME corporation"));
        assert_eq!(norm("Johnson & Johnson, Inc."), norm("johnson and johnson"));
    }

    #[test]
    fn test_custom_tables() {
        let mut abbreviations = BTreeMap::new();
        abbreviations.insert("Hldgs".to_string(), "Holdings".to_string());
        let stopwords: BTreeSet<String> = ["holdings".to_string()].into_iter().collect();
        let normalizer = Normalizer::new(abbreviations, stopwords);
        assert_eq!(normalizer.normalize("Acme Hldgs").as_str(), "acme");
    }

    #[test]
    fn test_memo_normalizes_once_per_raw_string() {
        let normalizer = Normalizer::default();
        let memo = NameMemo::new();
        let a = memo.normalize(&normalizer, "Acme Corp.");
        let b = memo.normalize(&normalizer, "Acme Corp.");
        assert_eq!(a, b);
        assert_eq!(memo.len(), 1);
    }
}
