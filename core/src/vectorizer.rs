//! TF-IDF vectorizer: vocabulary extraction, idf weighting and L2-normalized
//! dense feature rows.
//!
//! Vocabulary terms are kept in ascending lexicographic order and a term's
//! position is its [`TermId`], so two builds over the same corpus produce the
//! same columns. Idf uses the smoothed form `ln((1 + N) / (1 + df)) + 1`.

use crate::config::BuildConfig;
use crate::tokenizer::{tokenize_with, TokenizerOptions};
use crate::{RecommendError, Result, TermId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Term {
    pub term: String,
    pub idf: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Term>", into = "Vec<Term>")]
pub struct Vocabulary {
    terms: Vec<Term>,
    dictionary: HashMap<String, TermId>,
}

impl From<Vec<Term>> for Vocabulary {
    fn from(terms: Vec<Term>) -> Self {
        let dictionary = terms
            .iter()
            .enumerate()
            .map(|(i, t)| (t.term.clone(), i as TermId))
            .collect();
        Self { terms, dictionary }
    }
}

impl From<Vocabulary> for Vec<Term> {
    fn from(vocab: Vocabulary) -> Self { vocab.terms }
}

impl Vocabulary {
    pub fn len(&self) -> usize { self.terms.len() }

    pub fn is_empty(&self) -> bool { self.terms.is_empty() }

    pub fn term_id(&self, term: &str) -> Option<TermId> { self.dictionary.get(term).copied() }

    pub fn term(&self, id: TermId) -> &str { &self.terms[id as usize].term }

    pub fn idf(&self, id: TermId) -> f32 { self.terms[id as usize].idf }

    pub fn terms(&self) -> &[Term] { &self.terms }

    /// Project text into this vocabulary's space. Unknown terms are dropped,
    /// so the result is all zeros when nothing overlaps.
    pub fn transform(&self, text: &str, opts: TokenizerOptions, sublinear_tf: bool) -> Vec<f32> {
        let mut counts: HashMap<TermId, u32> = HashMap::new();
        for token in tokenize_with(text, opts) {
            if let Some(tid) = self.term_id(&token) {
                *counts.entry(tid).or_insert(0) += 1;
            }
        }
        let mut row = vec![0.0f32; self.len()];
        for (tid, count) in counts {
            row[tid as usize] = tf(count, sublinear_tf) * self.idf(tid);
        }
        l2_normalize(&mut row);
        row
    }
}

/// Dense row-major matrix with one unit-norm (or all-zero) row per item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureMatrix {
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

impl FeatureMatrix {
    pub fn rows(&self) -> usize { self.rows }

    pub fn cols(&self) -> usize { self.cols }

    pub fn row(&self, i: usize) -> &[f32] { &self.data[i * self.cols..(i + 1) * self.cols] }

    /// Whether the backing storage holds exactly `rows * cols` weights.
    pub fn is_well_formed(&self) -> bool {
        self.rows.checked_mul(self.cols) == Some(self.data.len())
    }

    pub fn is_zero_row(&self, i: usize) -> bool { self.row(i).iter().all(|&w| w == 0.0) }

    /// Dot product of row `i` with an arbitrary vector of the same width.
    pub fn dot_row(&self, i: usize, v: &[f32]) -> f32 { dot(self.row(i), v) }
}

#[inline]
fn tf(count: u32, sublinear: bool) -> f32 {
    if count == 0 {
        0.0
    } else if sublinear {
        1.0 + (count as f32).ln()
    } else {
        count as f32
    }
}

#[inline]
pub fn smoothed_idf(num_docs: usize, df: u32) -> f32 {
    ((1.0 + num_docs as f32) / (1.0 + df as f32)).ln() + 1.0
}

#[inline]
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

pub fn l2_normalize(v: &mut [f32]) {
    let norm = dot(v, v).sqrt();
    if norm == 0.0 { return; }
    for w in v.iter_mut() { *w /= norm; }
}

/// Learn vocabulary and idf weights from `texts` and weight every text
/// against them. Row `i` of the matrix corresponds to `texts[i]`.
pub fn fit_transform(texts: &[String], config: &BuildConfig) -> Result<(Vocabulary, FeatureMatrix)> {
    if texts.is_empty() {
        return Err(RecommendError::EmptyCorpus);
    }
    let opts = config.tokenizer();

    let mut doc_counts: Vec<HashMap<String, u32>> = Vec::with_capacity(texts.len());
    let mut df: HashMap<String, u32> = HashMap::new();
    let mut totals: HashMap<String, u64> = HashMap::new();
    for text in texts {
        let mut counts: HashMap<String, u32> = HashMap::new();
        for token in tokenize_with(text, opts) {
            *counts.entry(token).or_insert(0) += 1;
        }
        for (term, count) in &counts {
            *df.entry(term.clone()).or_insert(0) += 1;
            *totals.entry(term.clone()).or_insert(0) += *count as u64;
        }
        doc_counts.push(counts);
    }

    let mut kept: Vec<String> = df.keys().cloned().collect();
    if let Some(cap) = config.max_features {
        if kept.len() > cap {
            kept.sort_by(|a, b| totals[b].cmp(&totals[a]).then_with(|| a.cmp(b)));
            let dropped = kept.len() - cap;
            kept.truncate(cap);
            tracing::debug!(cap, dropped, "vocabulary capped");
        }
    }
    kept.sort();
    if kept.is_empty() {
        return Err(RecommendError::DegenerateVocabulary);
    }

    let n = texts.len();
    let vocab: Vocabulary = kept
        .into_iter()
        .map(|term| {
            let idf = smoothed_idf(n, df[&term]);
            Term { term, idf }
        })
        .collect::<Vec<_>>()
        .into();

    let cols = vocab.len();
    let mut data = vec![0.0f32; n * cols];
    for (i, counts) in doc_counts.iter().enumerate() {
        let row = &mut data[i * cols..(i + 1) * cols];
        for (term, &count) in counts {
            if let Some(tid) = vocab.term_id(term) {
                row[tid as usize] = tf(count, config.sublinear_tf) * vocab.idf(tid);
            }
        }
        l2_normalize(row);
    }

    Ok((vocab, FeatureMatrix { rows: n, cols, data }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(v: &[&str]) -> Vec<String> { v.iter().map(|s| s.to_string()).collect() }

    #[test]
    fn idf_is_smoothed() {
        // present everywhere still carries weight 1
        assert!((smoothed_idf(3, 3) - 1.0).abs() < 1e-6);
        assert!(smoothed_idf(3, 1) > smoothed_idf(3, 2));
    }

    #[test]
    fn rows_are_unit_or_zero() {
        let (vocab, m) = fit_transform(&texts(&["red apple", "", "green apple pie"]), &BuildConfig::default()).unwrap();
        assert_eq!(vocab.len(), 4);
        for i in 0..m.rows() {
            let norm = dot(m.row(i), m.row(i)).sqrt();
            if m.is_zero_row(i) {
                assert_eq!(i, 1);
            } else {
                assert!((norm - 1.0).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn vocabulary_is_sorted() {
        let (vocab, _) = fit_transform(&texts(&["zebra apple mango"]), &BuildConfig::default()).unwrap();
        let terms: Vec<&str> = vocab.terms().iter().map(|t| t.term.as_str()).collect();
        assert_eq!(terms, vec!["apple", "mango", "zebra"]);
    }

    #[test]
    fn cap_keeps_most_frequent_terms() {
        let cfg = BuildConfig { max_features: Some(2), ..Default::default() };
        let (vocab, m) = fit_transform(&texts(&["apple apple pear", "apple kiwi kiwi", "plum"]), &cfg).unwrap();
        assert!(vocab.term_id("apple").is_some());
        assert!(vocab.term_id("kiwi").is_some());
        assert!(vocab.term_id("plum").is_none());
        assert!(m.is_zero_row(2));
    }

    #[test]
    fn sublinear_tf_dampens_repeats() {
        let docs = texts(&["apple apple pear", "pear kiwi"]);
        let cfg = BuildConfig { sublinear_tf: true, ..Default::default() };
        let (vocab, m) = fit_transform(&docs, &cfg).unwrap();
        let apple = vocab.term_id("apple").unwrap() as usize;

        // apple: df 1 of 2 docs, count 2; pear: df 2, count 1
        let a = (1.0 + 2f32.ln()) * smoothed_idf(2, 1);
        let p = smoothed_idf(2, 2);
        let expected = a / (a * a + p * p).sqrt();
        assert!((m.row(0)[apple] - expected).abs() < 1e-6);
        assert!((m.row(0)[apple] - 0.921_907).abs() < 1e-4);

        let q = vocab.transform("apple apple pear", TokenizerOptions::default(), true);
        assert!((q[apple] - expected).abs() < 1e-6);

        let (_, raw) = fit_transform(&docs, &BuildConfig::default()).unwrap();
        assert!(raw.row(0)[apple] > m.row(0)[apple]);
    }

    #[test]
    fn only_stopwords_is_degenerate() {
        let err = fit_transform(&texts(&["the and of", ""]), &BuildConfig::default()).unwrap_err();
        assert!(matches!(err, RecommendError::DegenerateVocabulary));
    }

    #[test]
    fn transform_drops_unknown_terms() {
        let (vocab, _) = fit_transform(&texts(&["wooden desk", "metal chair"]), &BuildConfig::default()).unwrap();
        let v = vocab.transform("quantum desk", TokenizerOptions::default(), false);
        let desk = vocab.term_id("desk").unwrap() as usize;
        assert!((v[desk] - 1.0).abs() < 1e-6);
        assert_eq!(v.iter().filter(|&&w| w != 0.0).count(), 1);
    }

    #[test]
    fn vocabulary_round_trips_through_bincode() {
        let (vocab, _) = fit_transform(&texts(&["alpha beta"]), &BuildConfig::default()).unwrap();
        let bytes = bincode::serialize(&vocab).unwrap();
        let back: Vocabulary = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back.term_id("beta"), Some(1));
    }
}
