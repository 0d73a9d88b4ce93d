//! Coverage-determination (LCD/NCD) query handling.
//!
//! Queries about local/national coverage determinations name policy
//! artifacts (LCD ids, contractor names, jurisdictions) that embed far
//! from the clinical language the policies are written in. These
//! helpers detect such queries and reformulate them so MCD content gets
//! the retrieval weight it needs.

use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};

fn compile(pattern: &str) -> Regex {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .expect("LCD query patterns are valid")
}

static LCD_QUERY_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\blcds?\b",
        r"\blocal coverage determination\b",
        r"\bcoverage determination\b",
        r"\bncd\b",
        r"\bnational coverage determination\b",
        r"\bmcd\b",
        r"\bcontractor\b",
        r"\bjurisdiction\b",
        // MAC contractor names
        r"\bnovitas\b",
        r"\bfirst coast\b",
        r"\bcgs\b",
        r"\bngs\b",
        r"\bwps\b",
        r"\bpalmetto\b",
        r"\bnoridian\b",
        // Jurisdiction codes
        r"\bj[a-l]\b",
        // Coverage verb followed by a therapy term common in LCD queries
        r"\bcover(?:ed)?\b.{0,40}\b(?:wound|hyperbaric|oxygen therapy|infusion|imaging|MRI|CT scan|ultrasound|physical therapy|cardiac rehab|chiropractic|acupuncture)\b",
        r"\bcoverage\b.{0,30}\b(?:wound|hyperbaric|oxygen|infusion|imaging|MRI|CT|physical therapy|cardiac|chiropractic|acupuncture|prosthetic|orthotic)\b",
        // Reverse: therapy term then coverage verb
        r"\b(?:wound|hyperbaric|oxygen therapy|infusion|imaging|MRI|CT scan|physical therapy|cardiac rehab)\b.{0,40}\bcover(?:ed)?\b",
    ]
    .iter()
    .map(|p| compile(p))
    .collect()
});

/// Topic-specific expansion phrases for common LCD subjects.
static LCD_TOPIC_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (
            r"\bcardiac\s*rehab",
            "cardiac rehabilitation program coverage criteria",
        ),
        (
            r"\bhyperbaric\s*oxygen",
            "hyperbaric oxygen therapy wound healing coverage indications",
        ),
        (
            r"\bphysical therapy",
            "outpatient physical therapy rehabilitation coverage",
        ),
        (
            r"\b(?:wound\s*care|wound\s*vac)",
            "wound care negative pressure therapy coverage",
        ),
        (
            r"\b(?:imaging|MRI|CT\s*scan)",
            "advanced diagnostic imaging coverage medical necessity",
        ),
    ]
    .iter()
    .map(|(p, expansion)| (compile(p), *expansion))
    .collect()
});

static STRIP_LCD_NOISE: LazyLock<Regex> = LazyLock::new(|| {
    compile(
        r"\b(?:lcd|lcds|ncd|mcd|local coverage determination|national coverage determination|coverage determination|novitas|first coast|cgs|ngs|wps|palmetto|noridian|contractor|jurisdiction|j[a-l])\b",
    )
});

static STRIP_FILLER: LazyLock<Regex> =
    LazyLock::new(|| compile(r"\b(?:does|have|has|an|the|for|is|are|what|which|apply to)\b"));

static PARENS: LazyLock<Regex> = LazyLock::new(|| compile(r"[()]+"));
static MULTI_SPACE: LazyLock<Regex> = LazyLock::new(|| compile(r"\s{2,}"));

/// Whether the query appears to concern LCD/coverage determinations.
pub fn is_lcd_query(query: &str) -> bool {
    LCD_QUERY_PATTERNS.iter().any(|p| p.is_match(query))
}

/// Remove LCD jargon, contractor names, and filler words to isolate the
/// medical concept from a coverage-determination query.
///
/// The result may legitimately be empty ("what does the LCD say?" holds
/// no concept once the jargon is gone); callers skip it, it is not an
/// error.
pub fn strip_to_medical_concept(query: &str) -> String {
    let cleaned = STRIP_LCD_NOISE.replace_all(query, "");
    let cleaned = STRIP_FILLER.replace_all(&cleaned, "");
    let cleaned = PARENS.replace_all(&cleaned, " ");
    let cleaned = MULTI_SPACE.replace_all(&cleaned, " ");
    cleaned.trim_matches([' ', '?', '.', ',', ';', ':']).to_string()
}

/// Expanded/reformulated queries for LCD retrieval.
///
/// Up to three variants: the original query; the original plus
/// topic-specific expansion terms (or a generic LCD expansion when no
/// topic matches); and the stripped medical-concept query so the
/// embedding focuses on the clinical subject.
pub fn expand_lcd_query(query: &str) -> Vec<String> {
    let mut queries = vec![query.to_string()];

    let topic_expansions: Vec<&str> = LCD_TOPIC_PATTERNS
        .iter()
        .filter(|(pattern, _)| pattern.is_match(query))
        .map(|(_, expansion)| *expansion)
        .collect();

    if topic_expansions.is_empty() {
        queries.push(format!(
            "{query} Local Coverage Determination LCD policy coverage criteria"
        ));
    } else {
        queries.push(format!("{query} {}", topic_expansions.join(" ")));
    }

    let concept = strip_to_medical_concept(query);
    if !concept.is_empty() && concept.to_lowercase() != query.to_lowercase() {
        queries.push(concept);
    }

    queries
}
