use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A scalar metadata value.
///
/// The backing store only accepts scalars; anything else is stringified
/// before it reaches this layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl From<&str> for MetaValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<i64> for MetaValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for MetaValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for MetaValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl MetaValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }
}

/// Marks synthetic summary documents; regular chunks carry no doc_type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocType {
    TopicSummary,
    DocumentSummary,
}

impl DocType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TopicSummary => "topic_summary",
            Self::DocumentSummary => "document_summary",
        }
    }
}

/// Document metadata: the fields the retrieval pipeline interprets, plus
/// an open extension map for source-specific fields (title, jurisdiction,
/// manual number, summary bookkeeping, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_index: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_type: Option<DocType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic_cluster: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic_clusters: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, MetaValue>,
}

impl DocMetadata {
    /// Look up a metadata value by key, named fields included.
    pub fn get(&self, key: &str) -> Option<MetaValue> {
        match key {
            "doc_id" => self.doc_id.clone().map(MetaValue::Str),
            "chunk_index" => self.chunk_index.map(MetaValue::Int),
            "source" => self.source.clone().map(MetaValue::Str),
            "doc_type" => self.doc_type.map(|t| MetaValue::Str(t.as_str().to_string())),
            "topic_cluster" => self.topic_cluster.clone().map(MetaValue::Str),
            "topic_clusters" => self.topic_clusters.clone().map(MetaValue::Str),
            _ => self.extra.get(key).cloned(),
        }
    }

    /// Exact-equality match against every key of `filter`.
    pub fn matches(&self, filter: &BTreeMap<String, MetaValue>) -> bool {
        filter.iter().all(|(k, v)| self.get(k).as_ref() == Some(v))
    }

    pub fn is_summary(&self) -> bool {
        self.doc_type.is_some()
    }
}

/// Identity of a logical chunk within a corpus snapshot.
///
/// Unique per chunk; used to deduplicate across ranked lists.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChunkKey {
    pub doc_id: String,
    pub chunk_index: i64,
}

/// A text chunk with its metadata, as stored and retrieved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub content: String,
    #[serde(default)]
    pub metadata: DocMetadata,
}

impl Document {
    pub fn new(content: impl Into<String>, metadata: DocMetadata) -> Self {
        Self {
            content: content.into(),
            metadata,
        }
    }

    /// Dedup identity: `(doc_id, chunk_index)`, with missing fields
    /// defaulting to the empty id and chunk 0.
    pub fn chunk_key(&self) -> ChunkKey {
        ChunkKey {
            doc_id: self.metadata.doc_id.clone().unwrap_or_default(),
            chunk_index: self.metadata.chunk_index.unwrap_or(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(doc_id: &str, chunk: i64, source: &str) -> DocMetadata {
        DocMetadata {
            doc_id: Some(doc_id.to_string()),
            chunk_index: Some(chunk),
            source: Some(source.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn chunk_key_defaults() {
        let doc = Document::new("text", DocMetadata::default());
        let key = doc.chunk_key();
        assert_eq!(key.doc_id, "");
        assert_eq!(key.chunk_index, 0);
    }

    #[test]
    fn chunk_key_distinguishes_chunks() {
        let a = Document::new("a", meta("d1", 0, "iom"));
        let b = Document::new("b", meta("d1", 1, "iom"));
        assert_ne!(a.chunk_key(), b.chunk_key());
    }

    #[test]
    fn filter_matches_named_and_extra_fields() {
        let mut m = meta("d1", 0, "mcd");
        m.extra
            .insert("jurisdiction".to_string(), MetaValue::from("JL"));

        let mut filter = BTreeMap::new();
        filter.insert("source".to_string(), MetaValue::from("mcd"));
        filter.insert("jurisdiction".to_string(), MetaValue::from("JL"));
        assert!(m.matches(&filter));

        filter.insert("source".to_string(), MetaValue::from("iom"));
        assert!(!m.matches(&filter));
    }

    #[test]
    fn filter_on_absent_key_never_matches() {
        let m = meta("d1", 0, "iom");
        let mut filter = BTreeMap::new();
        filter.insert("manual".to_string(), MetaValue::from("100-02"));
        assert!(!m.matches(&filter));
    }

    #[test]
    fn doc_type_round_trips_as_snake_case() {
        let json = serde_json::to_string(&DocType::TopicSummary).unwrap();
        assert_eq!(json, "\"topic_summary\"");
        let back: DocType = serde_json::from_str(&json).unwrap();
        assert_eq!(back, DocType::TopicSummary);
    }

    #[test]
    fn filter_matches_doc_type_as_string() {
        let m = DocMetadata {
            doc_id: Some("topic_dme".to_string()),
            doc_type: Some(DocType::TopicSummary),
            ..Default::default()
        };
        let mut filter = BTreeMap::new();
        filter.insert("doc_type".to_string(), MetaValue::from("topic_summary"));
        assert!(m.matches(&filter));
    }
}
