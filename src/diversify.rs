//! Cross-source diversification of a ranked result list.
//!
//! When a query spans source types, the top-k should not be dominated
//! by whichever source happens to embed closest. Under-represented
//! relevant sources get documents promoted from below the cutoff,
//! displacing the lowest-ranked documents of over-represented sources.
//! Summary documents are anchors and are never displaced.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::document::Document;

/// Sources with relevance above this take part in diversification.
const TARGET_RELEVANCE: f64 = 0.2;

fn source_of(doc: &Document) -> String {
    doc.metadata.source.clone().unwrap_or_default()
}

/// Re-rank `docs` so every relevant source has at least
/// `min_per_source` representatives in the top-`k`, when available.
///
/// With zero or one relevant source there is nothing to balance and the
/// list is returned truncated. A deficit can remain unfilled when every
/// displaceable slot holds a summary document; summaries win over
/// quota.
pub fn ensure_source_diversity(
    docs: &[Document],
    relevant_sources: &BTreeMap<String, f64>,
    k: usize,
    min_per_source: usize,
) -> Vec<Document> {
    if docs.is_empty() || relevant_sources.is_empty() {
        return docs.iter().take(k).cloned().collect();
    }

    let target_sources: BTreeSet<&str> = relevant_sources
        .iter()
        .filter(|&(_, &score)| score > TARGET_RELEVANCE)
        .map(|(name, _)| name.as_str())
        .collect();
    if target_sources.len() <= 1 {
        return docs.iter().take(k).cloned().collect();
    }

    let mut top: Vec<Document> = docs.iter().take(k).cloned().collect();
    let mut remaining: Vec<Document> = docs.iter().skip(k).cloned().collect();

    let mut source_counts: HashMap<String, usize> = HashMap::new();
    for doc in &top {
        *source_counts.entry(source_of(doc)).or_default() += 1;
    }

    for src in target_sources {
        let current = source_counts.get(src).copied().unwrap_or(0);
        let deficit = min_per_source.saturating_sub(current);
        if deficit == 0 {
            continue;
        }

        let mut promotions: Vec<Document> = Vec::new();
        let mut kept: Vec<Document> = Vec::new();
        for doc in remaining.drain(..) {
            if source_of(&doc) == src && promotions.len() < deficit {
                promotions.push(doc);
            } else {
                kept.push(doc);
            }
        }
        remaining = kept;

        for promo in promotions {
            // Prefer displacing an over-represented non-summary doc,
            // scanning from the lowest rank up.
            let mut displaced = false;
            for i in (0..top.len()).rev() {
                let candidate_src = source_of(&top[i]);
                if source_counts.get(&candidate_src).copied().unwrap_or(0) > min_per_source
                    && !top[i].metadata.is_summary()
                {
                    *source_counts.entry(candidate_src).or_default() -= 1;
                    top.remove(i);
                    displaced = true;
                    break;
                }
            }
            // No over-represented candidate: displace the lowest-ranked
            // non-summary so the deficit still gets filled. Summaries
            // stay put even if that leaves the deficit unfilled.
            if !displaced && top.len() >= k {
                for i in (0..top.len()).rev() {
                    if !top[i].metadata.is_summary() {
                        let popped_src = source_of(&top[i]);
                        if let Some(count) = source_counts.get_mut(&popped_src) {
                            *count = count.saturating_sub(1);
                        }
                        top.remove(i);
                        displaced = true;
                        break;
                    }
                }
            }
            if displaced {
                *source_counts.entry(src.to_string()).or_default() += 1;
                top.push(promo);
            }
        }
    }

    top.truncate(k);
    top
}
