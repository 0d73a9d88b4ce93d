//! In-memory BM25 index over a collection snapshot.
//!
//! The index is built lazily on first use and cached process-wide in a
//! [`Bm25Cache`]. Staleness is detected by document count only: new or
//! removed chunks trigger a rebuild, in-place content edits with an
//! unchanged count do not. Use [`Bm25Cache::force_rebuild`] after
//! re-ingesting changed content.
//!
//! Tokenization is lower-cased word splitting with no stemming and no
//! stopwords: billing and procedure codes must match exactly, and a
//! stemmer would fold them together.

use std::{collections::HashMap, sync::Arc, sync::LazyLock};

use parking_lot::RwLock;
use regex::Regex;
use tracing::debug;

use crate::{
    document::Document,
    error::Result,
    store::{Collection, MetadataFilter},
};

const K1: f64 = 1.5;
const B: f64 = 0.75;
/// Floor factor for negative IDF values (very common terms), as a
/// fraction of the mean IDF.
const EPSILON: f64 = 0.25;

static WORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\w+").unwrap());

/// Lower-cased word tokenizer shared by indexing and query parsing.
pub fn tokenize(text: &str) -> Vec<String> {
    WORD_RE
        .find_iter(&text.to_lowercase())
        .map(|m| m.as_str().to_string())
        .collect()
}

/// An immutable BM25 index over one corpus snapshot.
///
/// Searches never mutate; a snapshot stays valid for concurrent readers
/// even while the cache builds its replacement.
pub struct Bm25Snapshot {
    documents: Vec<Document>,
    /// term -> (doc index, term frequency) postings.
    postings: HashMap<String, Vec<(u32, u32)>>,
    idf: HashMap<String, f64>,
    doc_len: Vec<f64>,
    avg_doc_len: f64,
}

impl Bm25Snapshot {
    fn build(documents: Vec<Document>) -> Self {
        let n = documents.len();
        let mut postings: HashMap<String, Vec<(u32, u32)>> = HashMap::new();
        let mut doc_len = Vec::with_capacity(n);

        for (i, doc) in documents.iter().enumerate() {
            let tokens = tokenize(&doc.content);
            doc_len.push(tokens.len() as f64);

            let mut freqs: HashMap<&str, u32> = HashMap::new();
            for token in &tokens {
                *freqs.entry(token).or_default() += 1;
            }
            for (term, tf) in freqs {
                postings
                    .entry(term.to_string())
                    .or_default()
                    .push((i as u32, tf));
            }
        }

        let avg_doc_len = if n > 0 {
            doc_len.iter().sum::<f64>() / n as f64
        } else {
            0.0
        };

        // Okapi IDF with the standard negative-IDF correction: terms in
        // more than half the corpus get a small positive floor instead
        // of a negative weight.
        let mut idf: HashMap<String, f64> = HashMap::with_capacity(postings.len());
        let mut idf_sum = 0.0;
        let mut negative: Vec<String> = Vec::new();
        for (term, posting) in &postings {
            let df = posting.len() as f64;
            let value = ((n as f64 - df + 0.5) / (df + 0.5)).ln();
            idf_sum += value;
            if value < 0.0 {
                negative.push(term.clone());
            }
            idf.insert(term.clone(), value);
        }
        if !idf.is_empty() {
            let floor = EPSILON * (idf_sum / idf.len() as f64);
            for term in negative {
                idf.insert(term, floor);
            }
        }

        Self {
            documents,
            postings,
            idf,
            doc_len,
            avg_doc_len,
        }
    }

    pub fn doc_count(&self) -> usize {
        self.documents.len()
    }

    fn scores(&self, query_tokens: &[String]) -> Vec<f64> {
        let mut scores = vec![0.0; self.documents.len()];
        if self.avg_doc_len == 0.0 {
            return scores;
        }
        for token in query_tokens {
            let Some(posting) = self.postings.get(token) else {
                continue;
            };
            let idf = self.idf[token];
            for &(doc, tf) in posting {
                let tf = tf as f64;
                let norm = K1 * (1.0 - B + B * self.doc_len[doc as usize] / self.avg_doc_len);
                scores[doc as usize] += idf * tf * (K1 + 1.0) / (tf + norm);
            }
        }
        scores
    }

    /// Top-`k` BM25-scored documents, optionally post-filtered by exact
    /// metadata equality. An empty token list yields no results.
    pub fn search(
        &self,
        query: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Vec<Document> {
        let tokens = tokenize(query);
        if tokens.is_empty() || self.documents.is_empty() {
            return Vec::new();
        }

        let scores = self.scores(&tokens);
        let mut scored: Vec<(f64, &Document)> = self
            .documents
            .iter()
            .enumerate()
            .filter(|(_, doc)| filter.is_none_or(|f| doc.metadata.matches(f)))
            .map(|(i, doc)| (scores[i], doc))
            .collect();

        // Stable sort keeps corpus order on tied scores.
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        scored.into_iter().map(|(_, doc)| doc.clone()).collect()
    }
}

#[derive(Default)]
struct CacheState {
    snapshot: Option<Arc<Bm25Snapshot>>,
    doc_count: Option<usize>,
}

impl CacheState {
    fn needs_rebuild(&self, current_count: usize) -> bool {
        self.snapshot.is_none() || self.doc_count != Some(current_count)
    }
}

/// Process-wide, lazily built BM25 index cache.
///
/// One instance is shared by every retriever over the same collection;
/// pass it into the constructor rather than creating one per query.
/// `ensure_built` uses check-lock-recheck so concurrent first users
/// trigger exactly one build, and readers keep the previous snapshot
/// until the new one is swapped in.
pub struct Bm25Cache {
    state: RwLock<CacheState>,
    batch_size: usize,
}

impl Default for Bm25Cache {
    fn default() -> Self {
        Self::with_batch_size(crate::config::RetrievalConfig::default().get_meta_batch_size)
    }
}

impl Bm25Cache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache that pages through the collection in `batch_size` steps.
    pub fn with_batch_size(batch_size: usize) -> Self {
        Self {
            state: RwLock::new(CacheState::default()),
            batch_size: batch_size.max(1),
        }
    }

    /// Build or rebuild the index if the collection size has changed.
    pub fn ensure_built(&self, collection: &dyn Collection) -> Result<()> {
        let count = collection.count()?;
        if !self.state.read().needs_rebuild(count) {
            return Ok(());
        }
        let mut state = self.state.write();
        if !state.needs_rebuild(count) {
            return Ok(());
        }
        self.build(&mut state, collection)
    }

    /// Unconditional rebuild, for content edits that leave the document
    /// count unchanged.
    pub fn force_rebuild(&self, collection: &dyn Collection) -> Result<()> {
        let mut state = self.state.write();
        self.build(&mut state, collection)
    }

    /// Drop the cached index; the next retrieval rebuilds. For tests.
    pub fn reset(&self) {
        *self.state.write() = CacheState::default();
    }

    fn build(&self, state: &mut CacheState, collection: &dyn Collection) -> Result<()> {
        let mut all_docs: Vec<Document> = Vec::new();
        let mut offset = 0;
        loop {
            let page = collection.get_page(self.batch_size, offset)?;
            let page_len = page.len();
            all_docs.extend(page.into_documents());
            if page_len < self.batch_size {
                break;
            }
            offset += page_len;
        }

        let snapshot = Bm25Snapshot::build(all_docs);
        debug!(doc_count = snapshot.doc_count(), "BM25 index built");
        state.doc_count = Some(snapshot.doc_count());
        state.snapshot = Some(Arc::new(snapshot));
        Ok(())
    }

    /// Search the current snapshot. Returns nothing when the index has
    /// not been built or the corpus is empty.
    pub fn search(
        &self,
        query: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Vec<Document> {
        let snapshot = self.state.read().snapshot.clone();
        match snapshot {
            Some(snapshot) => snapshot.search(query, k, filter),
            None => Vec::new(),
        }
    }

    #[cfg(test)]
    fn cached_count(&self) -> Option<usize> {
        self.state.read().doc_count
    }
}
