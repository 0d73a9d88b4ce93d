pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("store error: {0}")]
    Store(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("topic definitions are not valid JSON: {0}")]
    TopicTable(#[from] serde_json::Error),

    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },
}

impl Error {
    /// Wrap an external store/collection failure, preserving its message.
    pub fn store(err: impl std::fmt::Display) -> Self {
        Self::Store(err.to_string())
    }
}
