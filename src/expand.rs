//! Cross-source query expansion.
//!
//! Detects which source types (iom policy manuals, mcd coverage
//! determinations, billing codes) a query concerns and generates
//! variants targeting each source's vocabulary, improving recall for
//! questions that span source boundaries.

use std::collections::BTreeMap;

use regex::{Regex, RegexBuilder};

use crate::error::{Error, Result};

/// Vocabulary signals and the expansion phrase for one source type.
pub struct SourceSignals {
    pub name: String,
    patterns: Vec<Regex>,
    expansion: String,
}

/// A synonym rule: when `pattern` matches the query, `expansion` is
/// appended to the synonym variant.
pub struct SynonymRule {
    pattern: Regex,
    expansion: String,
}

fn compile(pattern: &str) -> Result<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|source| Error::Pattern {
            pattern: pattern.to_string(),
            source,
        })
}

fn compile_all(patterns: &[&str]) -> Result<Vec<Regex>> {
    patterns.iter().map(|p| compile(p)).collect()
}

const IOM_PATTERNS: &[&str] = &[
    r"\bpart\s+[a-d]\b",
    r"\biom\b",
    r"\binternet\s+only\s+manual\b",
    r"\bcms\s+manual\b",
    r"\bclaim(?:s)?\s*(?:processing|submission|filing)\b",
    r"\bbenefit(?:s)?\s*(?:policy|period)\b",
    r"\benrollment\b",
    r"\beligibility\b",
    r"\bmedicare\b.*\b(?:policy|guideline|manual|chapter|rule)\b",
    r"\bgeneral\s+billing\b",
    r"\bmsn\b",
    r"\bmedicare\s+summary\s+notice\b",
    r"\bappeal(?:s)?\b",
    r"\bredetermination\b",
];

const MCD_PATTERNS: &[&str] = &[
    r"\blcds?\b",
    r"\bncds?\b",
    r"\bcoverage\s+determination\b",
    r"\bmedical\s+necessity\b",
    r"\bcoverage\s+criteria\b",
    r"\bindication(?:s)?\b",
    r"\blimitation(?:s)?\b",
    r"\bcontractor\b",
    r"\bjurisdiction\b",
    r"\bmcd\b",
    r"\bnovitas\b",
    r"\bfirst\s+coast\b",
    r"\bpalmetto\b",
    r"\bnoridian\b",
    r"\bcovered?\b.{0,30}\bservice",
];

const CODES_PATTERNS: &[&str] = &[
    r"\bhcpcs\b",
    r"\bcpt\b",
    r"\bicd[- ]?10\b",
    r"\bprocedure\s+code\b",
    r"\bdiagnosis\s+code\b",
    r"\bbilling\s+code\b",
    r"\bcode(?:s)?\s+for\b",
    r"\bmodifier\b",
    r"\bdrg\b",
    r"\brevenue\s+code\b",
    r"\b[A-Z]\d{4}\b",
];

const SYNONYM_RULES: &[(&str, &str)] = &[
    (r"\bcoverage\b", "covered services benefits policy"),
    (r"\bbilling\b", "claims reimbursement payment"),
    (r"\brehabilitation\b", "rehab therapy treatment program"),
    (
        r"\bwound\s*care\b",
        "wound management debridement negative pressure therapy",
    ),
    (
        r"\bimaging\b",
        "diagnostic imaging MRI CT scan X-ray ultrasound",
    ),
    (
        r"\bdurable\s+medical\s+equipment\b",
        "DME prosthetic orthotic supplies",
    ),
    (r"\bhome\s+health\b", "home health agency HHA skilled nursing"),
    (r"\bhospice\b", "hospice palliative end-of-life terminal care"),
    (
        r"\bambulance\b",
        "ambulance transport emergency non-emergency",
    ),
    (r"\binfusion\b", "infusion injection drug administration"),
    (
        r"\bphysical\s+therapy\b",
        "physical therapy PT outpatient rehabilitation",
    ),
    (
        r"\boccupational\s+therapy\b",
        "occupational therapy OT rehabilitation",
    ),
    (
        r"\bspeech\s+therapy\b",
        "speech-language pathology SLP therapy",
    ),
    (
        r"\bmental\s+health\b",
        "behavioral health psychiatric psychological services",
    ),
    (r"\bdialysis\b", "dialysis ESRD end-stage renal disease"),
    (r"\bchemotherapy\b", "chemotherapy oncology cancer treatment"),
];

/// Relevance scores for queries that signal no source at all: retrieval
/// should still cast a wide net rather than search nowhere.
const DEFAULT_RELEVANCE: &[(&str, f64)] = &[("iom", 0.4), ("mcd", 0.3), ("codes", 0.3)];

/// Source-relevance detection and cross-source query reformulation,
/// driven by configurable signal and synonym rule tables.
pub struct SourceExpander {
    sources: Vec<SourceSignals>,
    synonyms: Vec<SynonymRule>,
}

impl SourceExpander {
    /// The built-in iom/mcd/codes signal tables.
    pub fn new() -> Self {
        Self::with_tables(
            vec![
                ("iom", IOM_PATTERNS, "Medicare policy guidelines manual chapter benefit rules"),
                ("mcd", MCD_PATTERNS, "coverage determination LCD NCD criteria medical necessity indications limitations"),
                ("codes", CODES_PATTERNS, "HCPCS CPT ICD-10 procedure diagnosis billing codes"),
            ],
            SYNONYM_RULES,
        )
        .expect("built-in source signal tables are valid")
    }

    /// Build an expander from raw rule tables. Fails on invalid
    /// patterns; this is a construction-time error, never a per-query
    /// one.
    pub fn with_tables(
        sources: Vec<(&str, &[&str], &str)>,
        synonyms: &[(&str, &str)],
    ) -> Result<Self> {
        let sources = sources
            .into_iter()
            .map(|(name, patterns, expansion)| {
                Ok(SourceSignals {
                    name: name.to_string(),
                    patterns: compile_all(patterns)?,
                    expansion: expansion.to_string(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let synonyms = synonyms
            .iter()
            .map(|(pattern, expansion)| {
                Ok(SynonymRule {
                    pattern: compile(pattern)?,
                    expansion: expansion.to_string(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { sources, synonyms })
    }

    /// Score each source type's relevance to the query on a 0.0-1.0
    /// scale: `min(1, matched / max(1, patterns/3))`.
    ///
    /// When no signal matches at all, a fixed moderate distribution is
    /// returned so ambiguous queries still search every source.
    pub fn detect_source_relevance(&self, query: &str) -> BTreeMap<String, f64> {
        let mut scores = BTreeMap::new();
        for source in &self.sources {
            let threshold = (source.patterns.len() / 3).max(1);
            let matches = source
                .patterns
                .iter()
                .filter(|p| p.is_match(query))
                .count();
            let score = (matches as f64 / threshold as f64).min(1.0);
            scores.insert(source.name.clone(), score);
        }

        if scores.values().all(|&v| v == 0.0) {
            return DEFAULT_RELEVANCE
                .iter()
                .map(|(name, score)| (name.to_string(), *score))
                .collect();
        }
        scores
    }

    /// Append every matching synonym expansion to the query; returns
    /// the query unchanged when no rule matches.
    pub fn apply_synonyms(&self, query: &str) -> String {
        let additions: Vec<&str> = self
            .synonyms
            .iter()
            .filter(|rule| rule.pattern.is_match(query))
            .map(|rule| rule.expansion.as_str())
            .collect();
        if additions.is_empty() {
            return query.to_string();
        }
        format!("{query} {}", additions.join(" "))
    }

    /// Expand a query into source-targeted variants.
    ///
    /// The original query always comes first, followed by one variant
    /// per source with relevance > 0 (in signal-table order), then a
    /// synonym-expanded variant when it differs from the original.
    pub fn expand_cross_source(&self, query: &str) -> Vec<String> {
        let mut variants = vec![query.to_string()];
        let relevance = self.detect_source_relevance(query);

        for source in &self.sources {
            if relevance.get(&source.name).copied().unwrap_or(0.0) > 0.0 {
                variants.push(format!("{query} {}", source.expansion));
            }
        }

        let synonym_expanded = self.apply_synonyms(query);
        if synonym_expanded != query {
            variants.push(synonym_expanded);
        }

        variants
    }
}

impl Default for SourceExpander {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iom_signals_detected() {
        let expander = SourceExpander::new();
        let scores = expander
            .detect_source_relevance("What does Medicare Part B policy say about enrollment?");
        assert!(scores["iom"] > 0.0);
    }

    #[test]
    fn mcd_signals_detected() {
        let expander = SourceExpander::new();
        let scores =
            expander.detect_source_relevance("LCD coverage determination for cardiac rehab");
        assert!(scores["mcd"] > 0.0);
    }

    #[test]
    fn codes_signals_detected() {
        let expander = SourceExpander::new();
        let scores =
            expander.detect_source_relevance("HCPCS procedure codes for infusion therapy");
        assert!(scores["codes"] > 0.0);
    }

    #[test]
    fn generic_query_gets_moderate_default() {
        let expander = SourceExpander::new();
        let scores = expander.detect_source_relevance("How are outpatient services handled?");
        assert!(scores.values().all(|&v| v > 0.0));
        assert_eq!(scores["iom"], 0.4);
    }

    #[test]
    fn multi_source_query_scores_everything() {
        let expander = SourceExpander::new();
        let scores = expander.detect_source_relevance(
            "What HCPCS codes are used under the LCD for cardiac rehabilitation Part B?",
        );
        assert!(scores["iom"] > 0.0);
        assert!(scores["mcd"] > 0.0);
        assert!(scores["codes"] > 0.0);
    }

    #[test]
    fn score_caps_at_one() {
        let expander = SourceExpander::new();
        let scores = expander.detect_source_relevance(
            "LCD NCD coverage determination medical necessity coverage criteria \
             indications limitations contractor jurisdiction MCD",
        );
        assert_eq!(scores["mcd"], 1.0);
    }

    #[test]
    fn expansion_starts_with_original() {
        let expander = SourceExpander::new();
        let variants = expander.expand_cross_source("test query");
        assert_eq!(variants[0], "test query");
    }

    #[test]
    fn generic_query_expands_for_all_sources() {
        let expander = SourceExpander::new();
        let variants = expander.expand_cross_source("How are outpatient services handled?");
        // original + one per source; no synonym rule matches.
        assert_eq!(variants.len(), 4);
    }

    #[test]
    fn mcd_expansion_present_for_lcd_query() {
        let expander = SourceExpander::new();
        let variants = expander.expand_cross_source("LCD coverage criteria for imaging");
        let combined = variants.join(" ").to_lowercase();
        assert!(combined.contains("coverage determination"));
    }

    #[test]
    fn synonyms_no_match_returns_original() {
        let expander = SourceExpander::new();
        assert_eq!(
            expander.apply_synonyms("some obscure text"),
            "some obscure text"
        );
    }

    #[test]
    fn synonyms_expand_coverage_and_billing() {
        let expander = SourceExpander::new();
        let result = expander.apply_synonyms("coverage and billing for imaging");
        assert!(result.contains("benefits"));
        assert!(result.contains("reimbursement"));
    }

    #[test]
    fn synonym_variant_added_when_different() {
        let expander = SourceExpander::new();
        let variants = expander.expand_cross_source("wound care coverage billing");
        let combined = variants.join(" ").to_lowercase();
        assert!(combined.contains("reimbursement"));
    }

    #[test]
    fn invalid_pattern_is_a_construction_error() {
        let result = SourceExpander::with_tables(
            vec![("bad", &["(unclosed"], "expansion")],
            &[],
        );
        assert!(result.is_err());
    }
}
