use crate::builder::Bundle;
use crate::config::BuildConfig;
use crate::corpus::Item;
use crate::similarity::SimilarityMatrix;
use crate::vectorizer::{FeatureMatrix, Vocabulary};
use crate::{RecommendError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{create_dir_all, remove_file, File};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

pub const FORMAT_VERSION: u32 = 1;
const MAX_DATASET_ID_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaFile {
    pub dataset_id: String,
    /// Content fingerprint of the corpus and build configuration.
    pub version: String,
    pub created_at: String,
    pub num_items: usize,
    pub vocab_size: usize,
    pub format_version: u32,
    pub config: BuildConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactState {
    Unbuilt,
    Ready { version: String },
}

/// Dataset ids become directory names, so only `[A-Za-z0-9_-]` is accepted.
pub fn validate_dataset_id(id: &str) -> Result<()> {
    let ok = !id.is_empty()
        && id.len() <= MAX_DATASET_ID_LEN
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if ok {
        Ok(())
    } else {
        Err(RecommendError::InvalidArgument(format!("invalid dataset id {id:?}")))
    }
}

struct BundlePaths {
    root: PathBuf,
}

impl BundlePaths {
    fn meta(&self) -> PathBuf { self.root.join("meta.json") }
    fn vocabulary(&self) -> PathBuf { self.root.join("vocabulary.bin") }
    fn features(&self) -> PathBuf { self.root.join("features.bin") }
    fn similarity(&self) -> PathBuf { self.root.join("similarity.bin") }
    fn items(&self) -> PathBuf { self.root.join("items.bin") }
}

/// Artifact bundles on disk, one directory per dataset id.
///
/// `meta.json` is written last and removed first on rebuild, so its presence
/// marks a complete bundle.
#[derive(Debug, Clone)]
pub struct BundleStore {
    root: PathBuf,
}

impl BundleStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }

    pub fn root(&self) -> &Path { &self.root }

    fn paths(&self, dataset_id: &str) -> Result<BundlePaths> {
        validate_dataset_id(dataset_id)?;
        Ok(BundlePaths { root: self.root.join(dataset_id) })
    }

    pub fn save(&self, bundle: &Bundle) -> Result<()> {
        let paths = self.paths(bundle.dataset_id())?;
        create_dir_all(&paths.root)?;
        match remove_file(paths.meta()) {
            Err(e) if e.kind() != ErrorKind::NotFound => return Err(e.into()),
            _ => {}
        }
        write_bin(&paths.vocabulary(), &bundle.vocabulary)?;
        write_bin(&paths.features(), &bundle.features)?;
        write_bin(&paths.similarity(), &bundle.similarity)?;
        write_bin(&paths.items(), &bundle.items)?;
        let mut f = File::create(paths.meta())?;
        f.write_all(serde_json::to_string_pretty(&bundle.meta)?.as_bytes())?;
        tracing::info!(dataset_id = bundle.dataset_id(), root = %paths.root.display(), "saved artifact bundle");
        Ok(())
    }

    pub fn load_meta(&self, dataset_id: &str) -> Result<MetaFile> {
        let paths = self.paths(dataset_id)?;
        let mut f = match File::open(paths.meta()) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(RecommendError::BundleNotFound(dataset_id.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        let mut buf = String::new();
        f.read_to_string(&mut buf)?;
        let meta: MetaFile = serde_json::from_str(&buf)?;
        Ok(meta)
    }

    pub fn load(&self, dataset_id: &str) -> Result<Bundle> {
        let paths = self.paths(dataset_id)?;
        let meta = self.load_meta(dataset_id)?;
        if meta.format_version != FORMAT_VERSION {
            return Err(RecommendError::CorruptBundle(format!(
                "unsupported format version {}",
                meta.format_version
            )));
        }
        let vocabulary: Vocabulary = read_bin(&paths.vocabulary())?;
        let features: FeatureMatrix = read_bin(&paths.features())?;
        let similarity: SimilarityMatrix = read_bin(&paths.similarity())?;
        let items: Vec<Item> = read_bin(&paths.items())?;

        let n = items.len();
        if n != meta.num_items
            || features.rows() != n
            || similarity.len() != n
            || features.cols() != vocabulary.len()
        {
            return Err(RecommendError::CorruptBundle(format!("row counts disagree for dataset {dataset_id}")));
        }
        if !features.is_well_formed() || !similarity.is_well_formed() {
            return Err(RecommendError::CorruptBundle(format!("matrix storage is truncated for dataset {dataset_id}")));
        }
        Ok(Bundle { meta, vocabulary, features, similarity, items })
    }

    pub fn status(&self, dataset_id: &str) -> Result<ArtifactState> {
        match self.load_meta(dataset_id) {
            Ok(meta) => Ok(ArtifactState::Ready { version: meta.version }),
            Err(RecommendError::BundleNotFound(_)) => Ok(ArtifactState::Unbuilt),
            Err(e) => Err(e),
        }
    }

    /// Dataset ids with a complete bundle, sorted.
    pub fn list(&self) -> Result<Vec<String>> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry?;
            let Some(name) = entry.file_name().to_str().map(str::to_string) else { continue };
            if validate_dataset_id(&name).is_ok() && entry.path().join("meta.json").is_file() {
                ids.push(name);
            }
        }
        ids.sort();
        Ok(ids)
    }
}

fn write_bin<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut f = File::create(path)?;
    let bytes = bincode::serialize(value)?;
    f.write_all(&bytes)?;
    Ok(())
}

fn read_bin<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let mut f = File::open(path)?;
    let mut buf = Vec::new();
    f.read_to_end(&mut buf)?;
    Ok(bincode::deserialize(&buf)?)
}
