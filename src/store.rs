//! Capability traits for the external vector store and its raw
//! metadata collection.
//!
//! The engine never talks to an embedding model or a persistence layer
//! directly: semantic search and corpus paging are consumed through
//! these traits, and failures from either side propagate to the caller
//! unchanged. Whether a store exposes its raw [`Collection`] decides at
//! construction time which retriever is built (see
//! [`crate::retriever::get_retriever`]).

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::{
    document::{DocMetadata, Document, MetaValue},
    error::Result,
};

/// Exact-match metadata filter; multiple keys are a conjunction.
pub type MetadataFilter = BTreeMap<String, MetaValue>;

/// Build a single-key filter.
pub fn filter_eq(key: &str, value: impl Into<MetaValue>) -> MetadataFilter {
    let mut filter = MetadataFilter::new();
    filter.insert(key.to_string(), value.into());
    filter
}

/// One page of raw collection data. The three vectors are parallel.
#[derive(Debug, Clone, Default)]
pub struct CollectionPage {
    pub ids: Vec<String>,
    pub documents: Vec<String>,
    pub metadatas: Vec<DocMetadata>,
}

impl CollectionPage {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Pair up texts and metadata into documents, tolerating short
    /// `documents`/`metadatas` vectors from sloppy backends.
    pub fn into_documents(self) -> Vec<Document> {
        let CollectionPage {
            ids,
            mut documents,
            mut metadatas,
        } = self;
        documents.resize(ids.len(), String::new());
        metadatas.resize(ids.len(), DocMetadata::default());
        documents
            .into_iter()
            .zip(metadatas)
            .map(|(text, meta)| Document::new(text, meta))
            .collect()
    }
}

/// Raw access to the corpus snapshot backing the vector store: document
/// counting, offset-paging, and direct id lookup.
pub trait Collection: Send + Sync {
    fn count(&self) -> Result<usize>;

    /// Fetch up to `limit` entries starting at `offset`, with texts and
    /// metadata included.
    fn get_page(&self, limit: usize, offset: usize) -> Result<CollectionPage>;

    /// Fetch entries by their store ids. Unknown ids are silently absent
    /// from the result.
    fn get_by_ids(&self, ids: &[String]) -> Result<CollectionPage>;
}

/// Embedding-based nearest-neighbor search over the corpus.
pub trait VectorStore: Send + Sync {
    /// Best-match-first by embedding distance. `filter` keys are
    /// exact-match conjunctions evaluated by the store.
    fn similarity_search(
        &self,
        query: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<Document>>;

    /// The raw collection behind this store, when the backend exposes
    /// one. Stores without this capability get the fallback retriever.
    fn collection(&self) -> Option<Arc<dyn Collection>>;
}
