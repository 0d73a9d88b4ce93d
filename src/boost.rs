//! Topic anchor-summary boosting.
//!
//! Summary documents are stable anchors: they consolidate fragmented
//! content and match consistently regardless of how a question is
//! phrased. Base search can still rank a genuinely relevant anchor
//! below the cutoff (or never surface it) because its phrasing is more
//! abstract than the chunks it summarizes, so matching anchors are
//! first injected by their deterministic ids and then promoted to the
//! front of the candidate list.

use std::collections::BTreeSet;

use tracing::debug;

use crate::{
    document::Document,
    error::Result,
    store::Collection,
    topics::TopicTable,
};

/// Topic cluster names relevant to the query text.
pub fn detect_query_topics(topics: &TopicTable, query: &str) -> Vec<String> {
    topics.assign_topics(query)
}

fn is_relevant_summary(doc: &Document, topic_set: &BTreeSet<&str>) -> bool {
    if !doc.metadata.is_summary() {
        return false;
    }
    if let Some(cluster) = doc.metadata.topic_cluster.as_deref() {
        if topic_set.contains(cluster) {
            return true;
        }
    }
    if let Some(clusters) = doc.metadata.topic_clusters.as_deref() {
        if clusters.split(',').any(|c| topic_set.contains(c)) {
            return true;
        }
    }
    false
}

/// Re-rank `docs` so summaries matching the query topics appear first.
pub fn boost_summaries(
    docs: Vec<Document>,
    query_topics: &[String],
    max_k: usize,
) -> Vec<Document> {
    if query_topics.is_empty() || docs.is_empty() {
        return docs.into_iter().take(max_k).collect();
    }

    let topic_set: BTreeSet<&str> = query_topics.iter().map(String::as_str).collect();
    let (mut boosted, rest): (Vec<Document>, Vec<Document>) = docs
        .into_iter()
        .partition(|doc| is_relevant_summary(doc, &topic_set));

    boosted.extend(rest);
    boosted.truncate(max_k);
    boosted
}

/// Prepend topic summaries for the detected topics when they are not
/// already among the candidates.
///
/// Topic summaries have deterministic ids (`topic_<name>`), so they can
/// be fetched directly instead of hoping similarity search surfaces
/// them.
pub fn inject_topic_summaries(
    collection: &dyn Collection,
    docs: Vec<Document>,
    query_topics: &[String],
    max_k: usize,
) -> Result<Vec<Document>> {
    if query_topics.is_empty() {
        return Ok(docs.into_iter().take(max_k).collect());
    }

    let ids: Vec<String> = query_topics.iter().map(|t| format!("topic_{t}")).collect();
    let fetched = collection.get_by_ids(&ids)?.into_documents();

    let existing: BTreeSet<String> = docs
        .iter()
        .map(|d| d.metadata.doc_id.clone().unwrap_or_default())
        .collect();
    let injected: Vec<Document> = fetched
        .into_iter()
        .filter(|d| !existing.contains(&d.metadata.doc_id.clone().unwrap_or_default()))
        .collect();

    if !injected.is_empty() {
        debug!(
            count = injected.len(),
            topics = %query_topics.join(","),
            "injected topic summaries"
        );
    }

    let mut combined = injected;
    combined.extend(docs);
    combined.truncate(max_k);
    Ok(combined)
}

/// Detect query topics, inject their anchor summaries, and promote all
/// relevant summaries; returns up to `max_k` documents.
///
/// Without a collection (fallback retriever), injection is skipped and
/// only summaries already among the candidates are promoted.
pub fn apply_topic_summary_boost(
    topics: &TopicTable,
    collection: Option<&dyn Collection>,
    docs: Vec<Document>,
    query: &str,
    max_k: usize,
) -> Result<Vec<Document>> {
    let query_topics = detect_query_topics(topics, query);
    if query_topics.is_empty() {
        return Ok(docs.into_iter().take(max_k).collect());
    }

    let docs = match collection {
        Some(collection) => inject_topic_summaries(collection, docs, &query_topics, max_k)?,
        None => docs,
    };
    Ok(boost_summaries(docs, &query_topics, max_k))
}
