//! Content-based item recommendation over TF-IDF feature vectors.
//!
//! The offline [`builder::IndexBuilder`] turns a [`Corpus`] into an artifact
//! [`builder::Bundle`]; the online [`engine::QueryEngine`] answers
//! item-to-item and free-text queries against a loaded bundle without
//! mutating it.

pub mod builder;
pub mod config;
pub mod corpus;
pub mod engine;
pub mod error;
pub mod persist;
pub mod similarity;
pub mod tokenizer;
pub mod vectorizer;

pub use builder::{Bundle, IndexBuilder};
pub use config::{BuildConfig, TextFields};
pub use corpus::{Corpus, Item};
pub use engine::{QueryEngine, QueryResult, Recommendation};
pub use error::{RecommendError, Result};
pub use persist::{ArtifactState, BundleStore};

pub type ItemId = u64;
pub type TermId = u32;
