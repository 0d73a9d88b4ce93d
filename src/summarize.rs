//! Extractive summarization for document-level and topic-cluster
//! summaries.
//!
//! Summary documents consolidate key content from fragmented sources,
//! improving retrieval stability across query rephrasings. Sentence
//! scoring is TF-IDF-like, so ingest needs no model or external API.

use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;

use regex::Regex;
use tracing::info;

use crate::{
    config::SummaryConfig,
    document::{DocMetadata, DocType, Document, MetaValue},
    topics::TopicTable,
};

static BLANK_LINES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{2,}").unwrap());
static WORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\w+").unwrap());

const MIN_SENTENCE_CHARS: usize = 20;

const STOPWORDS: &[&str] = &[
    "a", "an", "the", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
    "from", "is", "are", "was", "were", "be", "been", "being", "have", "has", "had", "do",
    "does", "did", "will", "would", "could", "should", "may", "might", "shall", "can", "this",
    "that", "these", "those", "it", "its", "not", "no", "nor", "as", "if", "then", "than",
    "so", "such", "each", "every", "all", "any", "both", "few", "more", "most", "other",
    "some", "only", "own", "same", "very",
];

fn is_stopword(word: &str) -> bool {
    STOPWORDS.contains(&word)
}

fn content_tokens(text: &str) -> Vec<String> {
    WORD_RE
        .find_iter(&text.to_lowercase())
        .map(|m| m.as_str().to_string())
        .filter(|w| !is_stopword(w))
        .collect()
}

fn word_count(text: &str) -> usize {
    WORD_RE.find_iter(text).count()
}

/// Split text into sentences on punctuation-then-capital boundaries or
/// blank lines, dropping short fragments.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences: Vec<String> = Vec::new();
    for block in BLANK_LINES.split(text) {
        let chars: Vec<(usize, char)> = block.char_indices().collect();
        let mut start = 0usize;
        let mut i = 0usize;
        while i < chars.len() {
            let (offset, c) = chars[i];
            if matches!(c, '.' | '!' | '?') {
                let mut j = i + 1;
                while j < chars.len() && chars[j].1.is_whitespace() {
                    j += 1;
                }
                if j > i + 1 && j < chars.len() && chars[j].1.is_ascii_uppercase() {
                    sentences.push(block[start..offset + c.len_utf8()].to_string());
                    start = chars[j].0;
                    i = j;
                    continue;
                }
            }
            i += 1;
        }
        sentences.push(block[start..].to_string());
    }

    sentences
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| s.chars().count() > MIN_SENTENCE_CHARS)
        .collect()
}

/// Score sentences by TF-IDF-like importance and return the top
/// `max_sentences` in their original order.
///
/// Per sentence: `sum(tf * ln(1 + N/df))` normalized by word count,
/// with a small positional bonus for earlier sentences. The output is
/// always an order-preserving subsequence of the input.
pub fn score_sentences(sentences: &[String], max_sentences: usize) -> Vec<String> {
    if sentences.is_empty() {
        return Vec::new();
    }

    let n_sentences = sentences.len();
    let mut doc_freq: HashMap<String, usize> = HashMap::new();
    let mut sent_tfs: Vec<HashMap<String, usize>> = Vec::with_capacity(n_sentences);

    for sentence in sentences {
        let mut tf: HashMap<String, usize> = HashMap::new();
        for token in content_tokens(sentence) {
            *tf.entry(token).or_default() += 1;
        }
        for term in tf.keys() {
            *doc_freq.entry(term.clone()).or_default() += 1;
        }
        sent_tfs.push(tf);
    }

    let mut scored: Vec<(f64, usize)> = Vec::with_capacity(n_sentences);
    for (i, (sentence, tf)) in sentences.iter().zip(&sent_tfs).enumerate() {
        let mut score = 0.0;
        for (term, &count) in tf {
            let df = doc_freq.get(term).copied().unwrap_or(1) as f64;
            let idf = (1.0 + n_sentences as f64 / df).ln();
            score += count as f64 * idf;
        }
        score /= word_count(sentence).max(1) as f64;
        let position_bonus = 1.0 + 0.1 * (1.0 - i as f64 / n_sentences as f64).max(0.0);
        score *= position_bonus;
        scored.push((score, i));
    }

    // Stable sort: tied scores keep the earlier sentence first.
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    let mut top_indices: Vec<usize> = scored
        .into_iter()
        .take(max_sentences)
        .map(|(_, i)| i)
        .collect();
    top_indices.sort_unstable();
    top_indices.into_iter().map(|i| sentences[i].clone()).collect()
}

/// Build an extractive summary document for a single source document.
///
/// Returns `None` when the text is too short, or has too few sentences,
/// to warrant a separate summary.
pub fn generate_document_summary(
    doc_id: &str,
    full_text: &str,
    metadata: &DocMetadata,
    config: &SummaryConfig,
) -> Option<Document> {
    if full_text.trim().chars().count() < config.min_doc_text_length {
        return None;
    }

    let sentences = split_sentences(full_text);
    if sentences.len() <= config.max_doc_summary_sentences {
        return None;
    }

    let top = score_sentences(&sentences, config.max_doc_summary_sentences);
    if top.is_empty() {
        return None;
    }

    let title = metadata
        .extra
        .get("title")
        .and_then(MetaValue::as_str)
        .unwrap_or(doc_id);
    let source = metadata.source.as_deref().unwrap_or("unknown");
    let prefix = format!("Document summary ({source}): {title}. ");

    let mut summary_meta = metadata.clone();
    summary_meta.doc_type = Some(DocType::DocumentSummary);
    summary_meta.doc_id = Some(format!("summary_{doc_id}"));
    summary_meta
        .extra
        .insert("summary_of".to_string(), MetaValue::from(doc_id));

    Some(Document::new(prefix + &top.join(" "), summary_meta))
}

/// Build a consolidated summary for one topic cluster, merging the most
/// important sentences across all chunks in the cluster.
///
/// Returns `None` when the cluster has fewer than `min_topic_chunks`
/// chunks or no scoreable sentences.
pub fn generate_topic_summary(
    topics: &TopicTable,
    topic_name: &str,
    chunks: &[&Document],
    config: &SummaryConfig,
) -> Option<Document> {
    if chunks.len() < config.min_topic_chunks {
        return None;
    }

    let def = topics.get(topic_name);
    let label = def.map_or(topic_name, |d| d.label.as_str());
    let prefix = def.map_or("", |d| d.summary_prefix.as_str());

    let all_text = chunks
        .iter()
        .map(|c| c.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    let sentences = split_sentences(&all_text);
    if sentences.is_empty() {
        return None;
    }
    let top = score_sentences(&sentences, config.max_topic_summary_sentences);
    if top.is_empty() {
        return None;
    }

    let sources: BTreeSet<&str> = chunks
        .iter()
        .map(|c| c.metadata.source.as_deref().unwrap_or("unknown"))
        .collect();
    let doc_ids: BTreeSet<&str> = chunks
        .iter()
        .map(|c| c.metadata.doc_id.as_deref().unwrap_or_default())
        .collect();
    let sources_joined = sources.iter().copied().collect::<Vec<_>>().join(", ");

    // When the summary_prefix already names the topic, don't repeat the
    // label in the header.
    let header = if prefix.is_empty() {
        format!(
            "{label} — consolidated summary across {} chunks from {sources_joined}. ",
            chunks.len()
        )
    } else {
        format!(
            "{prefix}Consolidated summary across {} chunks from {sources_joined}. ",
            chunks.len()
        )
    };

    let mut meta = DocMetadata {
        doc_id: Some(format!("topic_{topic_name}")),
        doc_type: Some(DocType::TopicSummary),
        topic_cluster: Some(topic_name.to_string()),
        ..Default::default()
    };
    meta.extra
        .insert("topic_label".to_string(), MetaValue::from(label));
    meta.extra.insert(
        "sources_in_cluster".to_string(),
        MetaValue::Str(sources.iter().copied().collect::<Vec<_>>().join(",")),
    );
    meta.extra
        .insert("cluster_size".to_string(), MetaValue::Int(chunks.len() as i64));
    meta.extra.insert(
        "cluster_total_doc_ids".to_string(),
        MetaValue::Int(doc_ids.len() as i64),
    );
    meta.extra.insert(
        "cluster_doc_ids".to_string(),
        MetaValue::Str(
            doc_ids
                .iter()
                .take(20)
                .copied()
                .collect::<Vec<_>>()
                .join(","),
        ),
    );

    Some(Document::new(header + &top.join(" "), meta))
}

/// Generate topic tags and all summary documents for a chunked corpus.
///
/// Every chunk is tagged with `topic_clusters`. When `doc_texts` is
/// given (one `(full_text, metadata)` entry per extracted source
/// document), a document-level summary is generated per distinct
/// doc_id, and each document summary is itself re-classified so its
/// `topic_clusters` reflect the summarized text. One topic summary is
/// generated per cluster that meets the size threshold.
///
/// Returns `(tagged_chunks, summaries)`.
pub fn generate_all_summaries(
    topics: &TopicTable,
    documents: &[Document],
    doc_texts: Option<&[(String, DocMetadata)]>,
    config: &SummaryConfig,
) -> (Vec<Document>, Vec<Document>) {
    let tagged = topics.tag_documents(documents);

    let mut summaries: Vec<Document> = Vec::new();

    if let Some(doc_texts) = doc_texts {
        let mut seen_ids: BTreeSet<&str> = BTreeSet::new();
        for (full_text, meta) in doc_texts {
            let Some(doc_id) = meta.doc_id.as_deref() else {
                continue;
            };
            if doc_id.is_empty() || !seen_ids.insert(doc_id) {
                continue;
            }
            if let Some(summary) = generate_document_summary(doc_id, full_text, meta, config) {
                summaries.push(summary);
            }
        }
        // Document summaries are classified by their own summary text.
        summaries = topics.tag_documents(&summaries);
    }

    let doc_level = summaries.len();
    let clusters = topics.cluster_documents(&tagged);
    for (topic_name, cluster_docs) in &clusters {
        if let Some(summary) =
            generate_topic_summary(topics, topic_name, cluster_docs, config)
        {
            summaries.push(summary);
        }
    }

    info!(
        total = summaries.len(),
        doc_level,
        topic_level = summaries.len() - doc_level,
        "generated summaries"
    );

    (tagged, summaries)
}
