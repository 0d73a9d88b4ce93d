//! Deterministic in-memory store for tests and examples.
//!
//! Implements both [`VectorStore`] and [`Collection`] over a plain
//! document list. "Similarity" is token overlap with the query, which
//! is deterministic and good enough to exercise the retrieval pipeline
//! without an embedding model. Calls are recorded so tests can assert
//! which searches a retriever issued.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

use crate::{
    bm25::tokenize,
    document::Document,
    error::Result,
    store::{Collection, CollectionPage, MetadataFilter, VectorStore},
};

struct MemInner {
    docs: Vec<Document>,
    page_reads: AtomicUsize,
    search_log: Mutex<Vec<(String, Option<MetadataFilter>)>>,
}

/// Store ids follow the backing store's convention: `doc_id` alone when
/// the chunk index is absent, `doc_id_<chunk_index>` otherwise. Topic
/// summaries therefore land at their deterministic `topic_<name>` id.
fn store_id(doc: &Document) -> String {
    let doc_id = doc.metadata.doc_id.clone().unwrap_or_else(|| "unknown".to_string());
    match doc.metadata.chunk_index {
        Some(chunk) => format!("{doc_id}_{chunk}"),
        None => doc_id,
    }
}

impl Collection for MemInner {
    fn count(&self) -> Result<usize> {
        Ok(self.docs.len())
    }

    fn get_page(&self, limit: usize, offset: usize) -> Result<CollectionPage> {
        self.page_reads.fetch_add(1, Ordering::SeqCst);
        let mut page = CollectionPage::default();
        for doc in self.docs.iter().skip(offset).take(limit) {
            page.ids.push(store_id(doc));
            page.documents.push(doc.content.clone());
            page.metadatas.push(doc.metadata.clone());
        }
        Ok(page)
    }

    fn get_by_ids(&self, ids: &[String]) -> Result<CollectionPage> {
        let mut page = CollectionPage::default();
        for doc in &self.docs {
            let id = store_id(doc);
            if ids.contains(&id) {
                page.ids.push(id);
                page.documents.push(doc.content.clone());
                page.metadatas.push(doc.metadata.clone());
            }
        }
        Ok(page)
    }
}

/// In-memory [`VectorStore`] + [`Collection`].
#[derive(Clone)]
pub struct MemStore {
    inner: Arc<MemInner>,
    expose_collection: bool,
}

impl MemStore {
    pub fn new(docs: Vec<Document>) -> Self {
        Self {
            inner: Arc::new(MemInner {
                docs,
                page_reads: AtomicUsize::new(0),
                search_log: Mutex::new(Vec::new()),
            }),
            expose_collection: true,
        }
    }

    /// A store that hides its raw collection, forcing the fallback
    /// retriever.
    pub fn without_collection(docs: Vec<Document>) -> Self {
        Self {
            expose_collection: false,
            ..Self::new(docs)
        }
    }

    /// How many collection pages have been read (build tracking).
    pub fn page_reads(&self) -> usize {
        self.inner.page_reads.load(Ordering::SeqCst)
    }

    /// Every similarity search issued so far, in call order.
    pub fn search_calls(&self) -> Vec<(String, Option<MetadataFilter>)> {
        self.inner.search_log.lock().expect("search log lock").clone()
    }
}

impl Collection for MemStore {
    fn count(&self) -> Result<usize> {
        self.inner.count()
    }

    fn get_page(&self, limit: usize, offset: usize) -> Result<CollectionPage> {
        self.inner.get_page(limit, offset)
    }

    fn get_by_ids(&self, ids: &[String]) -> Result<CollectionPage> {
        self.inner.get_by_ids(ids)
    }
}

impl VectorStore for MemStore {
    fn similarity_search(
        &self,
        query: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<Document>> {
        self.inner
            .search_log
            .lock()
            .expect("search log lock")
            .push((query.to_string(), filter.cloned()));

        let query_tokens = tokenize(query);
        let mut scored: Vec<(usize, &Document)> = self
            .inner
            .docs
            .iter()
            .filter(|doc| filter.is_none_or(|f| doc.metadata.matches(f)))
            .map(|doc| {
                let doc_tokens = tokenize(&doc.content);
                let overlap = query_tokens
                    .iter()
                    .filter(|t| doc_tokens.contains(t))
                    .count();
                (overlap, doc)
            })
            .collect();

        // Stable sort: ties keep insertion order, so results are
        // deterministic across runs.
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(scored.into_iter().take(k).map(|(_, d)| d.clone()).collect())
    }

    fn collection(&self) -> Option<Arc<dyn Collection>> {
        if self.expose_collection {
            Some(self.inner.clone())
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocMetadata;
    use crate::store::filter_eq;

    fn doc(content: &str, source: &str, doc_id: &str, chunk: Option<i64>) -> Document {
        Document::new(
            content,
            DocMetadata {
                doc_id: Some(doc_id.to_string()),
                chunk_index: chunk,
                source: Some(source.to_string()),
                ..Default::default()
            },
        )
    }

    #[test]
    fn store_ids_follow_chunk_convention() {
        assert_eq!(store_id(&doc("x", "iom", "d1", Some(2))), "d1_2");
        assert_eq!(store_id(&doc("x", "iom", "topic_dme", None)), "topic_dme");
    }

    #[test]
    fn paging_walks_all_documents() {
        let store = MemStore::new(
            (0..5)
                .map(|i| doc("text", "iom", &format!("d{i}"), Some(0)))
                .collect(),
        );
        let first = store.get_page(2, 0).unwrap();
        assert_eq!(first.len(), 2);
        let last = store.get_page(2, 4).unwrap();
        assert_eq!(last.len(), 1);
        assert_eq!(store.page_reads(), 2);
    }

    #[test]
    fn get_by_ids_skips_unknown() {
        let store = MemStore::new(vec![doc("x", "iom", "d1", Some(0))]);
        let page = store
            .get_by_ids(&["d1_0".to_string(), "missing".to_string()])
            .unwrap();
        assert_eq!(page.ids, vec!["d1_0"]);
    }

    #[test]
    fn similarity_prefers_overlap() {
        let store = MemStore::new(vec![
            doc("enrollment forms and deadlines", "iom", "d1", Some(0)),
            doc("cardiac rehab coverage criteria", "mcd", "d2", Some(0)),
        ]);
        let results = store
            .similarity_search("cardiac rehab criteria", 2, None)
            .unwrap();
        assert_eq!(results[0].metadata.doc_id.as_deref(), Some("d2"));
    }

    #[test]
    fn similarity_applies_filter() {
        let store = MemStore::new(vec![
            doc("cardiac rehab", "iom", "d1", Some(0)),
            doc("cardiac rehab", "mcd", "d2", Some(0)),
        ]);
        let filter = filter_eq("source", "mcd");
        let results = store.similarity_search("cardiac", 5, Some(&filter)).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].metadata.source.as_deref(), Some("mcd"));
    }

    #[test]
    fn search_calls_are_recorded() {
        let store = MemStore::new(vec![]);
        store.similarity_search("first", 5, None).unwrap();
        store
            .similarity_search("second", 5, Some(&filter_eq("source", "mcd")))
            .unwrap();
        let calls = store.search_calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].0, "first");
        assert!(calls[1].1.is_some());
    }

    #[test]
    fn collection_capability_is_optional() {
        let with = MemStore::new(vec![]);
        assert!(with.collection().is_some());
        let without = MemStore::without_collection(vec![]);
        assert!(without.collection().is_none());
    }
}
