//! medisearch - hybrid retrieval over Medicare coverage-policy corpora.
//!
//! medisearch answers domain questions over a heterogeneous corpus
//! (policy manuals, coverage-determination records, billing-code
//! definitions) by fusing semantic and keyword search: an in-memory
//! BM25 index, source-aware query expansion, Reciprocal Rank Fusion,
//! topic anchor-summary boosting, and cross-source diversification.
//!
//! Embedding and nearest-neighbor search are consumed through the
//! [`store::VectorStore`] trait; this crate never loads a model itself.
//!
//! # Quick start
//!
//! ```
//! use std::sync::Arc;
//! use medisearch::{
//!     Bm25Cache, DocMetadata, Document, MemStore, RetrievalConfig, get_retriever,
//! };
//!
//! let docs = vec![
//!     Document::new(
//!         "LCD cardiac rehab coverage criteria",
//!         DocMetadata {
//!             doc_id: Some("lcd_1".to_string()),
//!             chunk_index: Some(0),
//!             source: Some("mcd".to_string()),
//!             ..Default::default()
//!         },
//!     ),
//!     Document::new(
//!         "Medicare Part B outpatient benefit rules",
//!         DocMetadata {
//!             doc_id: Some("iom_1".to_string()),
//!             chunk_index: Some(0),
//!             source: Some("iom".to_string()),
//!             ..Default::default()
//!         },
//!     ),
//! ];
//!
//! let store = Arc::new(MemStore::new(docs));
//! let index = Arc::new(Bm25Cache::new());
//! let retriever = get_retriever(store, index, RetrievalConfig::default());
//!
//! let results = retriever.retrieve("LCD for cardiac rehab", 5, None).unwrap();
//! assert_eq!(results[0].metadata.source.as_deref(), Some("mcd"));
//! ```

pub mod bm25;
pub mod boost;
pub mod config;
pub mod diversify;
pub mod document;
pub mod error;
pub mod expand;
pub mod fusion;
pub mod lcd;
pub mod memstore;
pub mod retriever;
pub mod store;
pub mod summarize;
pub mod topics;

pub use bm25::Bm25Cache;
pub use config::{RetrievalConfig, SummaryConfig};
pub use document::{ChunkKey, DocMetadata, DocType, Document, MetaValue};
pub use error::{Error, Result};
pub use memstore::MemStore;
pub use retriever::{HybridRetriever, LcdAwareRetriever, Retriever, get_retriever};
pub use store::{Collection, CollectionPage, MetadataFilter, VectorStore};
pub use topics::TopicTable;
