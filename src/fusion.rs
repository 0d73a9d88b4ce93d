//! Reciprocal Rank Fusion over weighted ranked lists.
//!
//! RRF merges ranked lists from different retrieval methods without
//! normalizing their raw scores against each other:
//!
//! ```text
//! score(d) = sum_i( weight_i / (rrf_k + rank_i(d)) )
//! ```
//!
//! where `rank_i` is the 1-based rank of `d` in list `i`. A higher
//! `rrf_k` dampens the influence of top ranks, smoothing the blend.

use std::collections::HashMap;

use crate::document::{ChunkKey, Document};

/// Merge multiple ranked result lists into one.
///
/// `weights` pairs with `result_lists` by position; missing entries
/// default to 1.0 and extra entries are ignored. Scores accumulate per
/// [`ChunkKey`]; the first-seen instance of a chunk is kept as its
/// representative. Ties are broken by first-discovery order, so the
/// output is deterministic for a given list order regardless of how the
/// lists were produced.
pub fn reciprocal_rank_fusion(
    result_lists: &[Vec<Document>],
    weights: Option<&[f64]>,
    rrf_k: usize,
    max_results: usize,
) -> Vec<Document> {
    if result_lists.is_empty() {
        return Vec::new();
    }

    struct Entry {
        score: f64,
        first_seen: usize,
        doc: Document,
    }

    let mut entries: HashMap<ChunkKey, Entry> = HashMap::new();
    let mut discovered = 0usize;

    for (list_idx, doc_list) in result_lists.iter().enumerate() {
        let weight = weights
            .and_then(|w| w.get(list_idx).copied())
            .unwrap_or(1.0);
        for (rank, doc) in doc_list.iter().enumerate() {
            let rrf_score = weight / (rrf_k as f64 + rank as f64 + 1.0);
            entries
                .entry(doc.chunk_key())
                .and_modify(|e| e.score += rrf_score)
                .or_insert_with(|| {
                    let entry = Entry {
                        score: rrf_score,
                        first_seen: discovered,
                        doc: doc.clone(),
                    };
                    discovered += 1;
                    entry
                });
        }
    }

    let mut merged: Vec<Entry> = entries.into_values().collect();
    merged.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.first_seen.cmp(&b.first_seen))
    });
    merged.truncate(max_results);
    merged.into_iter().map(|e| e.doc).collect()
}
