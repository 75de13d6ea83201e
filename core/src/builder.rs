use crate::config::BuildConfig;
use crate::corpus::{Corpus, Item};
use crate::persist::{validate_dataset_id, MetaFile, FORMAT_VERSION};
use crate::similarity::SimilarityMatrix;
use crate::vectorizer::{fit_transform, FeatureMatrix, Vocabulary};
use crate::{RecommendError, Result};
use sha1::{Digest, Sha1};
use time::format_description::well_known::Rfc3339;

/// Everything the query side needs, row-aligned with `items`.
#[derive(Debug, Clone)]
pub struct Bundle {
    pub meta: MetaFile,
    pub vocabulary: Vocabulary,
    pub features: FeatureMatrix,
    pub similarity: SimilarityMatrix,
    pub items: Vec<Item>,
}

impl Bundle {
    pub fn dataset_id(&self) -> &str { &self.meta.dataset_id }

    pub fn version(&self) -> &str { &self.meta.version }

    pub fn config(&self) -> &BuildConfig { &self.meta.config }
}

pub struct IndexBuilder {
    config: BuildConfig,
}

impl IndexBuilder {
    pub fn new(config: BuildConfig) -> Self { Self { config } }

    pub fn config(&self) -> &BuildConfig { &self.config }

    pub fn build(&self, dataset_id: &str, corpus: &Corpus) -> Result<Bundle> {
        validate_dataset_id(dataset_id)?;
        self.config.validate()?;
        if corpus.is_empty() {
            return Err(RecommendError::EmptyCorpus);
        }

        let texts: Vec<String> = corpus.items().iter().map(|item| self.config.text_fields.text_of(item)).collect();
        let (vocabulary, features) = fit_transform(&texts, &self.config)?;
        let similarity = SimilarityMatrix::from_features(&features);

        let zero_rows: Vec<_> = (0..features.rows())
            .filter(|&i| features.is_zero_row(i))
            .map(|i| corpus.items()[i].id)
            .collect();
        if !zero_rows.is_empty() {
            tracing::warn!(count = zero_rows.len(), items = ?zero_rows, "items without vocabulary terms cannot be recommended");
        }

        let meta = MetaFile {
            dataset_id: dataset_id.to_string(),
            version: fingerprint(&self.config, corpus),
            created_at: time::OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default(),
            num_items: corpus.len(),
            vocab_size: vocabulary.len(),
            format_version: FORMAT_VERSION,
            config: self.config.clone(),
        };
        tracing::info!(dataset_id, version = %meta.version, num_items = meta.num_items, vocab_size = meta.vocab_size, "built artifact bundle");

        Ok(Bundle { meta, vocabulary, features, similarity, items: corpus.items().to_vec() })
    }
}

/// Content version of a dataset under a given configuration. Any change to
/// an item or to the configuration yields a different value.
pub fn fingerprint(config: &BuildConfig, corpus: &Corpus) -> String {
    let mut hasher = Sha1::new();
    hasher.update(serde_json::to_vec(config).unwrap_or_default());
    for item in corpus.items() {
        hasher.update(item.id.to_le_bytes());
        hasher.update(item.title.as_bytes());
        hasher.update([0u8]);
        hasher.update(item.description.as_bytes());
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())
}
