//! Pattern-based topic clustering.
//!
//! Groups chunks by clinical/policy topic so that related content
//! scattered across policy manuals, coverage determinations, and code
//! documents can be consolidated into topic-level summaries. A chunk
//! may belong to multiple topics ("cardiac rehab billing codes" touches
//! both cardiac_rehab and codes-adjacent topics).
//!
//! Topic definitions are a JSON rule table; the built-in default ships
//! in `src/data/topic_definitions.json` and deployments may load their
//! own with [`TopicTable::from_json`].

use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock};

use regex::{Regex, RegexBuilder};
use serde::Deserialize;

use crate::{
    document::Document,
    error::{Error, Result},
};

const DEFAULT_DEFINITIONS: &str = include_str!("data/topic_definitions.json");

/// Immutable definition of one topic cluster.
pub struct TopicDef {
    pub name: String,
    pub label: String,
    patterns: Vec<Regex>,
    pub summary_prefix: String,
    pub min_pattern_matches: usize,
}

impl TopicDef {
    fn matches(&self, text: &str) -> bool {
        let hits = self.patterns.iter().filter(|p| p.is_match(text)).count();
        hits >= self.min_pattern_matches
    }
}

#[derive(Deserialize)]
struct RawTopicDef {
    name: String,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    patterns: Vec<String>,
    #[serde(default)]
    summary_prefix: String,
    #[serde(default)]
    min_pattern_matches: Option<usize>,
}

/// The loaded topic rule table.
pub struct TopicTable {
    defs: Vec<TopicDef>,
}

static BUILTIN: LazyLock<Arc<TopicTable>> = LazyLock::new(|| {
    Arc::new(TopicTable::from_json(DEFAULT_DEFINITIONS).expect("built-in topic definitions are valid"))
});

impl TopicTable {
    /// The built-in topic table, compiled once per process.
    pub fn builtin() -> Arc<Self> {
        Arc::clone(&BUILTIN)
    }

    /// Parse a topic rule table from JSON. Pattern or JSON errors are
    /// construction-time failures.
    pub fn from_json(raw: &str) -> Result<Self> {
        let raw_defs: Vec<RawTopicDef> = serde_json::from_str(raw)?;
        let defs = raw_defs
            .into_iter()
            .map(|raw| {
                let patterns = raw
                    .patterns
                    .iter()
                    .map(|p| {
                        RegexBuilder::new(p)
                            .case_insensitive(true)
                            .build()
                            .map_err(|source| Error::Pattern {
                                pattern: p.clone(),
                                source,
                            })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(TopicDef {
                    label: raw.label.unwrap_or_else(|| raw.name.clone()),
                    name: raw.name,
                    patterns,
                    summary_prefix: raw.summary_prefix,
                    min_pattern_matches: raw.min_pattern_matches.unwrap_or(1).max(1),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { defs })
    }

    /// Look up a topic definition by name.
    pub fn get(&self, name: &str) -> Option<&TopicDef> {
        self.defs.iter().find(|d| d.name == name)
    }

    /// The topic names matching `text`, in table order. Multi-label:
    /// a text can belong to several topics at once.
    pub fn assign_topics(&self, text: &str) -> Vec<String> {
        self.defs
            .iter()
            .filter(|def| def.matches(text))
            .map(|def| def.name.clone())
            .collect()
    }

    /// Group documents by topic cluster. Documents may appear in
    /// multiple clusters.
    pub fn cluster_documents<'a>(
        &self,
        documents: &'a [Document],
    ) -> BTreeMap<String, Vec<&'a Document>> {
        let mut clusters: BTreeMap<String, Vec<&Document>> = BTreeMap::new();
        for doc in documents {
            for topic in self.assign_topics(&doc.content) {
                clusters.entry(topic).or_default().push(doc);
            }
        }
        clusters
    }

    /// Return copies of `documents` with `topic_clusters` metadata set
    /// on every document that matches at least one topic; the rest pass
    /// through unchanged.
    pub fn tag_documents(&self, documents: &[Document]) -> Vec<Document> {
        documents
            .iter()
            .map(|doc| {
                let topics = self.assign_topics(&doc.content);
                if topics.is_empty() {
                    doc.clone()
                } else {
                    let mut tagged = doc.clone();
                    tagged.metadata.topic_clusters = Some(topics.join(","));
                    tagged
                }
            })
            .collect()
    }
}
