use crate::ItemId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RecommendError>;

#[derive(Error, Debug)]
pub enum RecommendError {
    #[error("corpus contains no items")]
    EmptyCorpus,

    #[error("no vocabulary terms found in any item description")]
    DegenerateVocabulary,

    #[error("item not found: {0}")]
    ItemNotFound(ItemId),

    #[error("query shares no terms with the vocabulary")]
    EmptyQuery,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("duplicate item id: {0}")]
    DuplicateItem(ItemId),

    #[error("no artifact bundle for dataset {0}")]
    BundleNotFound(String),

    #[error("artifact bundle for dataset {dataset_id} is stale: expected version {expected}, found {found}")]
    StaleBundle { dataset_id: String, expected: String, found: String },

    #[error("corrupt artifact bundle: {0}")]
    CorruptBundle(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("encoding error: {0}")]
    Encoding(#[from] bincode::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RecommendError {
    /// Query-time conditions the caller should report as "no recommendation"
    /// rather than treat as a failure of the engine.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, RecommendError::ItemNotFound(_) | RecommendError::EmptyQuery)
    }
}
