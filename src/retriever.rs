//! Retrieval orchestration.
//!
//! [`HybridRetriever`] runs the full pipeline for every query:
//!
//! 1. Expand the query into source-targeted variants.
//! 2. Run semantic search for each variant.
//! 3. Run BM25 keyword search for each variant.
//! 4. Fuse all result lists via Reciprocal Rank Fusion.
//! 5. Inject and promote topic anchor summaries.
//! 6. Ensure source diversity in the final top-k.
//!
//! Coverage-determination queries additionally get LCD query expansion
//! and a pair of mcd-pinned searches so policy content gets the
//! retrieval weight it needs.
//!
//! [`LcdAwareRetriever`] is the fallback for stores that expose no raw
//! collection: semantic search plus LCD expansion only, without
//! BM25/RRF/diversification. The choice between the two is made once,
//! at construction, never per query.

use std::collections::HashSet;
use std::sync::Arc;

use rayon::prelude::*;

use crate::{
    bm25::Bm25Cache,
    boost::apply_topic_summary_boost,
    config::RetrievalConfig,
    diversify::ensure_source_diversity,
    document::{ChunkKey, Document, MetaValue},
    error::{Error, Result},
    expand::SourceExpander,
    fusion::reciprocal_rank_fusion,
    lcd,
    store::{Collection, MetadataFilter, VectorStore},
    topics::TopicTable,
};

/// The capability this crate exposes: ranked document retrieval.
///
/// Used identically by interactive callers and by downstream answer
/// synthesis.
pub trait Retriever: Send + Sync {
    fn retrieve(
        &self,
        query: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<Document>>;
}

/// Whether an explicit filter allows pinning searches to the mcd
/// source. A filter without a `source` key is compatible; a filter
/// pinning any other source wins over the LCD heuristics.
fn mcd_compatible(filter: Option<&MetadataFilter>) -> bool {
    match filter.and_then(|f| f.get("source")) {
        None => true,
        Some(value) => value.as_str() == Some("mcd"),
    }
}

fn with_mcd_source(filter: Option<&MetadataFilter>) -> MetadataFilter {
    let mut pinned = filter.cloned().unwrap_or_default();
    pinned.insert("source".to_string(), MetaValue::from("mcd"));
    pinned
}

/// Retriever fusing semantic and BM25 keyword search, with
/// cross-source diversification and LCD-aware query expansion.
pub struct HybridRetriever {
    store: Arc<dyn VectorStore>,
    collection: Arc<dyn Collection>,
    index: Arc<Bm25Cache>,
    expander: SourceExpander,
    topics: Arc<TopicTable>,
    config: RetrievalConfig,
}

impl HybridRetriever {
    /// Build a hybrid retriever over `store`, sharing `index` with any
    /// other retriever on the same collection.
    ///
    /// Fails when the store exposes no raw collection; callers that
    /// cannot guarantee the capability should go through
    /// [`get_retriever`] instead.
    pub fn new(
        store: Arc<dyn VectorStore>,
        index: Arc<Bm25Cache>,
        topics: Arc<TopicTable>,
        config: RetrievalConfig,
    ) -> Result<Self> {
        let collection = store.collection().ok_or_else(|| {
            Error::Config("store exposes no raw collection; hybrid retrieval unavailable".into())
        })?;
        Ok(Self::with_collection(store, collection, index, topics, config))
    }

    fn with_collection(
        store: Arc<dyn VectorStore>,
        collection: Arc<dyn Collection>,
        index: Arc<Bm25Cache>,
        topics: Arc<TopicTable>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            store,
            collection,
            index,
            expander: SourceExpander::new(),
            topics,
            config,
        }
    }

    fn query_variants(&self, query: &str, is_lcd: bool) -> Vec<String> {
        let mut variants = self.expander.expand_cross_source(query);
        if is_lcd {
            for variant in lcd::expand_lcd_query(query).into_iter().skip(1) {
                if !variants.contains(&variant) {
                    variants.push(variant);
                }
            }
        }
        variants.truncate(self.config.max_query_variants);
        variants
    }
}

impl Retriever for HybridRetriever {
    fn retrieve(
        &self,
        query: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<Document>> {
        self.index.ensure_built(&*self.collection)?;

        let is_lcd = lcd::is_lcd_query(query);
        let effective_k = if is_lcd { k.max(self.config.lcd_k) } else { k };
        let fetch_k = (2 * effective_k).max(20);

        let variants = self.query_variants(query, is_lcd);

        // Variant searches may run in parallel; collecting preserves
        // variant order, so fusion input order is independent of call
        // completion order.
        let per_variant: Vec<(Vec<Document>, Vec<Document>)> = variants
            .par_iter()
            .map(|variant| {
                let semantic = self.store.similarity_search(variant, fetch_k, filter)?;
                let keyword = self.index.search(variant, fetch_k, filter);
                Ok((semantic, keyword))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut semantic_lists: Vec<Vec<Document>> = Vec::with_capacity(per_variant.len() + 1);
        let mut keyword_lists: Vec<Vec<Document>> = Vec::with_capacity(per_variant.len() + 1);
        for (semantic, keyword) in per_variant {
            semantic_lists.push(semantic);
            keyword_lists.push(keyword);
        }

        if is_lcd && mcd_compatible(filter) {
            let mcd_filter = with_mcd_source(filter);
            semantic_lists.push(self.store.similarity_search(
                query,
                fetch_k,
                Some(&mcd_filter),
            )?);
            keyword_lists.push(self.index.search(query, fetch_k, Some(&mcd_filter)));
        }

        let n_semantic = semantic_lists.len();
        let mut all_lists = semantic_lists;
        all_lists.append(&mut keyword_lists);
        let weights: Vec<f64> = (0..all_lists.len())
            .map(|i| {
                if i < n_semantic {
                    self.config.semantic_weight
                } else {
                    self.config.keyword_weight
                }
            })
            .collect();

        let fused =
            reciprocal_rank_fusion(&all_lists, Some(&weights), self.config.rrf_k, fetch_k);

        let boosted = apply_topic_summary_boost(
            &self.topics,
            Some(&*self.collection),
            fused,
            query,
            fetch_k,
        )?;

        let relevance = self.expander.detect_source_relevance(query);
        Ok(ensure_source_diversity(
            &boosted,
            &relevance,
            effective_k,
            self.config.min_per_source,
        ))
    }
}

/// Round-robin interleave of ranked lists, deduplicated by chunk key
/// and capped at `max_k`. Each list contributes documents near the top
/// of the merged result rather than one list dominating all slots.
fn interleave_dedup(doc_lists: Vec<Vec<Document>>, max_k: usize) -> Vec<Document> {
    let mut seen: HashSet<ChunkKey> = HashSet::new();
    let mut merged: Vec<Document> = Vec::new();
    let longest = doc_lists.iter().map(Vec::len).max().unwrap_or(0);
    for position in 0..longest {
        for list in &doc_lists {
            let Some(doc) = list.get(position) else {
                continue;
            };
            if seen.insert(doc.chunk_key()) {
                merged.push(doc.clone());
                if merged.len() >= max_k {
                    return merged;
                }
            }
        }
    }
    merged
}

/// Fallback retriever for stores without a raw collection: plain
/// semantic search with LCD-aware expansion and summary promotion, no
/// lexical index, no fusion, no diversification.
pub struct LcdAwareRetriever {
    store: Arc<dyn VectorStore>,
    topics: Arc<TopicTable>,
    config: RetrievalConfig,
}

impl LcdAwareRetriever {
    pub fn new(
        store: Arc<dyn VectorStore>,
        topics: Arc<TopicTable>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            store,
            topics,
            config,
        }
    }

    fn lcd_retrieve(
        &self,
        query: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<Document>> {
        // An explicit non-mcd source filter wins over LCD heuristics.
        if !mcd_compatible(filter) {
            return self.store.similarity_search(query, k, filter);
        }

        let lcd_k = k.max(self.config.lcd_k);
        let per_variant = (lcd_k / 3).max(4);
        let mcd_filter = with_mcd_source(filter);

        let mut lists = vec![self.store.similarity_search(
            query,
            per_variant,
            Some(&mcd_filter),
        )?];
        for variant in lcd::expand_lcd_query(query).into_iter().skip(1) {
            lists.push(
                self.store
                    .similarity_search(&variant, per_variant, Some(&mcd_filter))?,
            );
        }
        lists.push(self.store.similarity_search(query, per_variant, filter)?);

        let merged = interleave_dedup(lists, lcd_k);
        apply_topic_summary_boost(&self.topics, None, merged, query, lcd_k)
    }
}

impl Retriever for LcdAwareRetriever {
    fn retrieve(
        &self,
        query: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<Document>> {
        if lcd::is_lcd_query(query) {
            return self.lcd_retrieve(query, k, filter);
        }
        let docs = self.store.similarity_search(query, k, filter)?;
        apply_topic_summary_boost(&self.topics, None, docs, query, k)
    }
}

/// Select a retriever for `store` by capability: hybrid when the store
/// exposes its raw collection, the semantic-only fallback otherwise.
pub fn get_retriever(
    store: Arc<dyn VectorStore>,
    index: Arc<Bm25Cache>,
    config: RetrievalConfig,
) -> Box<dyn Retriever> {
    let topics = TopicTable::builtin();
    match store.collection() {
        Some(collection) => Box::new(HybridRetriever::with_collection(
            store, collection, index, topics, config,
        )),
        None => Box::new(LcdAwareRetriever::new(store, topics, config)),
    }
}
