//! Read-only query side.
//!
//! A [`QueryEngine`] owns one loaded bundle and is the explicit context for
//! every query against that dataset. All methods take `&self`, so one engine
//! can be shared across threads behind an `Arc` without locking.

use crate::builder::Bundle;
use crate::config::BuildConfig;
use crate::corpus::{Corpus, Item};
use crate::persist::{BundleStore, MetaFile};
use crate::similarity::SimilarityMatrix;
use crate::vectorizer::{FeatureMatrix, Vocabulary};
use crate::{ItemId, RecommendError, Result, TermId};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub item_id: ItemId,
    pub score: f32,
    /// Shared terms ranked by their contribution to the score.
    pub matched_terms: Vec<String>,
}

/// Ranked by score descending, ties by ascending item id.
pub type QueryResult = Vec<Recommendation>;

#[derive(Debug)]
pub struct QueryEngine {
    meta: MetaFile,
    vocabulary: Vocabulary,
    features: FeatureMatrix,
    similarity: SimilarityMatrix,
    corpus: Corpus,
}

impl QueryEngine {
    pub fn new(bundle: Bundle) -> Result<Self> {
        let Bundle { meta, vocabulary, features, similarity, items } = bundle;
        let corpus = Corpus::new(items)?;
        Ok(Self { meta, vocabulary, features, similarity, corpus })
    }

    /// Load the persisted bundle for `dataset_id`. When `expected_version` is
    /// given, a bundle built from different content is rejected as stale.
    pub fn open(store: &BundleStore, dataset_id: &str, expected_version: Option<&str>) -> Result<Self> {
        if let Some(expected) = expected_version {
            let meta = store.load_meta(dataset_id)?;
            if meta.version != expected {
                return Err(RecommendError::StaleBundle {
                    dataset_id: dataset_id.to_string(),
                    expected: expected.to_string(),
                    found: meta.version,
                });
            }
        }
        let engine = Self::new(store.load(dataset_id)?)?;
        tracing::info!(dataset_id, version = engine.version(), items = engine.len(), "query engine ready");
        Ok(engine)
    }

    pub fn dataset_id(&self) -> &str { &self.meta.dataset_id }

    pub fn version(&self) -> &str { &self.meta.version }

    pub fn meta(&self) -> &MetaFile { &self.meta }

    pub fn config(&self) -> &BuildConfig { &self.meta.config }

    pub fn vocabulary(&self) -> &Vocabulary { &self.vocabulary }

    pub fn len(&self) -> usize { self.corpus.len() }

    pub fn is_empty(&self) -> bool { self.corpus.is_empty() }

    pub fn item(&self, item_id: ItemId) -> Option<&Item> { self.corpus.get(item_id) }

    pub fn items(&self) -> &[Item] { self.corpus.items() }

    pub fn recommend_by_item(&self, item_id: ItemId, k: usize) -> Result<QueryResult> {
        check_k(k)?;
        let row = self.corpus.row_of(item_id).ok_or(RecommendError::ItemNotFound(item_id))?;
        if self.features.is_zero_row(row) {
            tracing::debug!(item_id, "query item has no vocabulary terms, all scores are zero");
        }
        let scores = self.similarity.row(row);
        let candidates = (0..self.corpus.len())
            .filter(|&j| j != row)
            .map(|j| (j, scores[j]))
            .collect();
        let query = self.features.row(row);
        Ok(self.rank(candidates, k, query))
    }

    pub fn recommend_by_text(&self, query_text: &str, k: usize) -> Result<QueryResult> {
        check_k(k)?;
        let cfg = self.config();
        let query = self.vocabulary.transform(query_text, cfg.tokenizer(), cfg.sublinear_tf);
        if query.iter().all(|&w| w == 0.0) {
            return Err(RecommendError::EmptyQuery);
        }
        let candidates = (0..self.corpus.len())
            .map(|j| (j, self.features.dot_row(j, &query).clamp(0.0, 1.0)))
            .collect();
        Ok(self.rank(candidates, k, &query))
    }

    fn rank(&self, mut candidates: Vec<(usize, f32)>, k: usize, query: &[f32]) -> QueryResult {
        let items = self.corpus.items();
        let order = |a: &(usize, f32), b: &(usize, f32)| -> Ordering {
            b.1.total_cmp(&a.1).then_with(|| items[a.0].id.cmp(&items[b.0].id))
        };
        if k < candidates.len() {
            candidates.select_nth_unstable_by(k - 1, order);
            candidates.truncate(k);
        }
        candidates.sort_by(order);
        tracing::debug!(dataset_id = self.dataset_id(), k, returned = candidates.len(), "ranked candidates");

        candidates
            .into_iter()
            .map(|(row, score)| Recommendation {
                item_id: items[row].id,
                score,
                matched_terms: self.matched_terms(query, self.features.row(row)),
            })
            .collect()
    }

    fn matched_terms(&self, a: &[f32], b: &[f32]) -> Vec<String> {
        let mut shared: Vec<(TermId, f32)> = a
            .iter()
            .zip(b)
            .enumerate()
            .filter(|(_, (x, y))| **x > 0.0 && **y > 0.0)
            .map(|(tid, (x, y))| (tid as TermId, x * y))
            .collect();
        // term ids follow lexicographic order, so ties resolve alphabetically
        shared.sort_by(|l, r| r.1.total_cmp(&l.1).then_with(|| l.0.cmp(&r.0)));
        shared
            .into_iter()
            .take(self.config().matched_terms)
            .map(|(tid, _)| self.vocabulary.term(tid).to_string())
            .collect()
    }
}

fn check_k(k: usize) -> Result<()> {
    if k == 0 {
        return Err(RecommendError::InvalidArgument("k must be at least 1".into()));
    }
    Ok(())
}
