//! Retrieval and summarization tunables.
//!
//! Defaults are production values; every field can be overridden from
//! the environment. Invalid values log a warning and keep the default
//! rather than failing startup.

use tracing::warn;

/// Parse an env var as usize, requiring a value >= 1.
fn env_positive_usize(key: &str, default: usize) -> usize {
    let Ok(raw) = std::env::var(key) else {
        return default;
    };
    match raw.parse::<usize>() {
        Ok(v) if v >= 1 => v,
        Ok(v) => {
            warn!(key, value = v, default, "must be >= 1, using default");
            default
        }
        Err(_) => {
            warn!(key, value = %raw, default, "not an integer, using default");
            default
        }
    }
}

/// Parse an env var as f64, requiring a finite value > 0.
fn env_positive_f64(key: &str, default: f64) -> f64 {
    let Ok(raw) = std::env::var(key) else {
        return default;
    };
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() && v > 0.0 => v,
        Ok(v) => {
            warn!(key, value = v, default, "must be finite and > 0, using default");
            default
        }
        Err(_) => {
            warn!(key, value = %raw, default, "not a number, using default");
            default
        }
    }
}

/// Tunables for the hybrid retrieval pipeline.
#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    /// Result count for coverage-determination queries (they fan out
    /// over more policy text than general questions).
    pub lcd_k: usize,
    /// RRF weight applied to each semantic result list.
    pub semantic_weight: f64,
    /// RRF weight applied to each keyword (BM25) result list.
    pub keyword_weight: f64,
    /// RRF smoothing constant; larger values dampen rank-1 dominance.
    pub rrf_k: usize,
    /// Minimum results per relevant source after diversification.
    pub min_per_source: usize,
    /// Cap on expanded query variants per retrieval.
    pub max_query_variants: usize,
    /// Page size when the lexical index walks the collection.
    pub get_meta_batch_size: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            lcd_k: 12,
            semantic_weight: 0.6,
            keyword_weight: 0.4,
            rrf_k: 60,
            min_per_source: 2,
            max_query_variants: 6,
            get_meta_batch_size: 500,
        }
    }
}

impl RetrievalConfig {
    /// Defaults overridden from the environment.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            lcd_k: env_positive_usize("LCD_RETRIEVAL_K", d.lcd_k),
            semantic_weight: env_positive_f64("HYBRID_SEMANTIC_WEIGHT", d.semantic_weight),
            keyword_weight: env_positive_f64("HYBRID_KEYWORD_WEIGHT", d.keyword_weight),
            rrf_k: env_positive_usize("RRF_K", d.rrf_k),
            min_per_source: env_positive_usize("CROSS_SOURCE_MIN_PER_SOURCE", d.min_per_source),
            max_query_variants: env_positive_usize("MAX_QUERY_VARIANTS", d.max_query_variants),
            get_meta_batch_size: env_positive_usize("GET_META_BATCH_SIZE", d.get_meta_batch_size),
        }
    }
}

/// Tunables for summary generation.
#[derive(Debug, Clone)]
pub struct SummaryConfig {
    pub max_doc_summary_sentences: usize,
    pub max_topic_summary_sentences: usize,
    /// Clusters smaller than this get no topic summary.
    pub min_topic_chunks: usize,
    /// Documents shorter than this (chars) get no document summary.
    pub min_doc_text_length: usize,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            max_doc_summary_sentences: 8,
            max_topic_summary_sentences: 10,
            min_topic_chunks: 2,
            min_doc_text_length: 200,
        }
    }
}

impl SummaryConfig {
    /// Defaults overridden from the environment.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            max_doc_summary_sentences: env_positive_usize(
                "MAX_DOC_SUMMARY_SENTENCES",
                d.max_doc_summary_sentences,
            ),
            max_topic_summary_sentences: env_positive_usize(
                "MAX_TOPIC_SUMMARY_SENTENCES",
                d.max_topic_summary_sentences,
            ),
            min_topic_chunks: env_positive_usize("MIN_TOPIC_CLUSTER_CHUNKS", d.min_topic_chunks),
            min_doc_text_length: env_positive_usize(
                "MIN_DOC_TEXT_LENGTH_FOR_SUMMARY",
                d.min_doc_text_length,
            ),
        }
    }
}
