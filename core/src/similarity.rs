use crate::vectorizer::{dot, FeatureMatrix};
use serde::{Deserialize, Serialize};

/// Dense N x N cosine similarity between feature rows.
///
/// Storage and build time are quadratic in the number of items (and build
/// also scales with vocabulary width), so this suits small to medium corpora
/// only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityMatrix {
    n: usize,
    data: Vec<f32>,
}

impl SimilarityMatrix {
    /// Each unordered pair is computed once and mirrored, so the matrix is
    /// exactly symmetric. Scores are clamped to [0, 1] to absorb rounding.
    pub fn from_features(features: &FeatureMatrix) -> Self {
        let n = features.rows();
        let mut data = vec![0.0f32; n * n];
        for i in 0..n {
            let ri = features.row(i);
            for j in i..n {
                let s = dot(ri, features.row(j)).clamp(0.0, 1.0);
                data[i * n + j] = s;
                data[j * n + i] = s;
            }
        }
        Self { n, data }
    }

    pub fn len(&self) -> usize { self.n }

    pub fn is_empty(&self) -> bool { self.n == 0 }

    pub fn is_well_formed(&self) -> bool {
        self.n.checked_mul(self.n) == Some(self.data.len())
    }

    pub fn get(&self, i: usize, j: usize) -> f32 { self.data[i * self.n + j] }

    pub fn row(&self, i: usize) -> &[f32] { &self.data[i * self.n..(i + 1) * self.n] }
}
