// Tier 1: Query Expander
//
// Concept: Propose alternate query strings from structural signals in a raw
// name ("X, a subsidiary of Y", "X (formerly Y)", "X - EMEA") so a retry can
// surface candidates the literal query missed
// Synchronization: &str in, ordered Vec<QueryVariant> out; never decides a match
//
// Templates are evaluated in a fixed order (most useful first). Every match
// contributes its captures; the first template to produce a string owns its
// signal. Output is deduplicated case/whitespace-insensitively, excludes the
// original and is capped.

use crate::config::EngineConfig;
use crate::resolution::types::{ExpansionSignal, QueryVariant};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// Region names recognized by the regional templates
const REGIONS: &str = "north america|south america|latin america|latam|emea|apac|asia pacific|\
    asia|europe|middle east|africa|usa|us|u\\.s\\.|uk|u\\.k\\.|canada|mexico|brazil|germany|\
    france|spain|italy|netherlands|switzerland|ireland|japan|china|india|singapore|\
    hong kong|korea|australia|new zealand|nordics|benelux|dach|international|global";

/// Trailing legal suffixes for the toggle template
const LEGAL_SUFFIXES: &str = "inc|incorporated|llc|l\\.l\\.c|ltd|limited|plc|corp|corporation|\
    co|company|gmbh|ag|s\\.a|sa|l\\.p|lp|llp";

/// Suffix appended by the toggle when the name has none
const APPENDED_SUFFIX: &str = "Inc";

/// Ordered structural template
struct Template {
    signal: ExpansionSignal,
    regex: Regex,
    /// Capture groups to emit, in emission order
    emit: &'static [&'static str],
}

impl Template {
    fn new(signal: ExpansionSignal, pattern: &str, emit: &'static [&'static str]) -> Self {
        Self {
            signal,
            regex: Regex::new(pattern).expect("invalid expansion template"),
            emit,
        }
    }
}

static TEMPLATES: Lazy<Vec<Template>> = Lazy::new(|| {
    use ExpansionSignal::*;
    vec![
        // 1. "X (formerly Y)", "X formerly known as Y", "X f/k/a Y"
        Template::new(
            HistoricalMarkerRemoved,
            concat!(
                r"(?i)^(?P<x>.+?)\s*[(,]?\s*\b(?:formerly(?:\s+known\s+as)?|f/k/a|fka)\b",
                r"\s+(?P<y>[^)]+?)\s*\)?$",
            ),
            &["y", "x"],
        ),
        // 2. "X (now Y)"
        Template::new(
            HistoricalMarkerRemoved,
            r"(?i)^(?P<x>.+?)\s*[(,]\s*\bnow\s+(?P<y>[^)]+?)\s*\)?$",
            &["y", "x"],
        ),
        // 3. "X merged with Y", "X merged into Y"
        Template::new(
            HistoricalMarkerRemoved,
            r"(?i)^(?P<x>.+?)\s*,?\s+merged\s+(?:with|into)\s+(?P<y>.+)$",
            &["x", "y"],
        ),
        // 4. "X (spun off from Y)", "X, a spin-off of Y"
        Template::new(
            HistoricalMarkerRemoved,
            r"(?i)^(?P<x>.+?)\s*\(\s*spun\s+off\s+from\s+(?P<y>[^)]+?)\s*\)$",
            &["x", "y"],
        ),
        Template::new(
            HistoricalMarkerRemoved,
            r"(?i)^(?P<x>.+?)\s*,\s*(?:a\s+)?spin-?\s?off\s+(?:of|from)\s+(?P<y>.+)$",
            &["x", "y"],
        ),
        // 5. "X, acquired by Y", "X, a subsidiary of Y", "X (part of Y)"
        Template::new(
            SubsidiaryPattern,
            concat!(
                r"(?i)^(?P<x>.+?)\s*[,(]?\s*\b(?:acquired\s+by|owned\s+by|(?:a\s+)?subsidiary\s+of",
                r"|part\s+of|(?:a\s+)?division\s+of)\s+(?P<y>[^)]+?)\s*\)?$",
            ),
            &["y", "x"],
        ),
        // 6. "X by Y" (brand by parent)
        Template::new(
            SubsidiaryPattern,
            r"(?i)^(?P<x>.+?)\s+by\s+(?P<y>.+)$",
            &["y", "x"],
        ),
        // 7. "X Division", "X Subsidiary", "X Unit", "X Segment", "X Group"
        Template::new(
            SubsidiaryPattern,
            r"(?i)^(?P<x>.+?)\s+(?:division|subsidiary|unit|segment|group)$",
            &["x"],
        ),
        // 8. "X - EMEA", "X (Europe)", "X UK Branch"
        Template::new(
            RegionalSuffixRemoved,
            &format!(
                r"(?i)^(?P<x>.+?)\s*[-–,]\s*\b(?:{})(?:\s+(?:office|branch|region|operations))?$",
                REGIONS
            ),
            &["x"],
        ),
        Template::new(
            RegionalSuffixRemoved,
            &format!(r"(?i)^(?P<x>.+?)\s*\(\s*(?:{})\s*\)$", REGIONS),
            &["x"],
        ),
        Template::new(
            RegionalSuffixRemoved,
            &format!(
                r"(?i)^(?P<x>.+?)\s+(?:{})(?:\s+(?:office|branch|region|operations))?$",
                REGIONS
            ),
            &["x"],
        ),
        // 9. "X and Y", "X & Y"
        Template::new(
            ConjunctionSplit,
            r"(?i)^(?P<x>.+?)\s*(?:\s+and\s+|&)\s*(?P<y>.+)$",
            &["x", "y"],
        ),
    ]
});

static LEGAL_SUFFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)^(?P<x>.+?)[\s,]+(?:{})\.?$", LEGAL_SUFFIXES))
        .expect("invalid legal suffix template")
});

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("invalid WHITESPACE"));

/// Query expander (Tier 1 concept)
#[derive(Debug, Clone)]
pub struct QueryExpander {
    max_variants: usize,
}

impl Default for QueryExpander {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl QueryExpander {
    pub fn new(max_variants: usize) -> Self {
        Self { max_variants }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.max_expansion_variants)
    }

    /// Alternate query strings, most useful first
    pub fn expand(&self, raw: &str) -> Vec<QueryVariant> {
        let original = collapse(raw);
        let mut seen: HashSet<String> = HashSet::new();
        seen.insert(dedup_key(&original));

        let mut variants = Vec::new();
        let mut push = |text: &str, signal: ExpansionSignal, variants: &mut Vec<QueryVariant>| {
            let text = clean_capture(text);
            if text.is_empty() || !seen.insert(dedup_key(&text)) {
                return;
            }
            variants.push(QueryVariant { text, signal });
        };

        for template in TEMPLATES.iter() {
            if let Some(caps) = template.regex.captures(&original) {
                for group in template.emit {
                    if let Some(m) = caps.name(group) {
                        push(m.as_str(), template.signal, &mut variants);
                    }
                }
            }
        }

        let toggled = match LEGAL_SUFFIX.captures(&original).and_then(|c| c.name("x")) {
            Some(stem) => stem.as_str().to_string(),
            None => format!("{} {}", original, APPENDED_SUFFIX),
        };
        push(&toggled, ExpansionSignal::LegalSuffixToggled, &mut variants);

        variants.truncate(self.max_variants);

        tracing::debug!(
            query = %original,
            variants = variants.len(),
            "Expanded query"
        );

        variants
    }
}

fn collapse(raw: &str) -> String {
    WHITESPACE.replace_all(raw.trim(), " ").into_owned()
}

fn clean_capture(text: &str) -> String {
    collapse(
        text.trim_matches(|c: char| c.is_whitespace() || matches!(c, ',' | ';' | '-' | '(' | ')')),
    )
}

fn dedup_key(text: &str) -> String {
    collapse(text).to_lowercase()
}
