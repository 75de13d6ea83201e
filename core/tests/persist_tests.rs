use recommender_core::{ArtifactState, BuildConfig, BundleStore, Corpus, IndexBuilder, Item, QueryEngine, RecommendError};
use tempfile::tempdir;

fn corpus(extra: &str) -> Corpus {
    Corpus::new(vec![
        Item::new(10, "Intro to Rust", "ownership borrowing lifetimes"),
        Item::new(11, "Async Rust", "futures tokio ownership"),
        Item::new(12, "Cooking", format!("pasta sauce {extra}")),
    ])
    .unwrap()
}

#[test]
fn saved_bundle_loads_identically() {
    let dir = tempdir().unwrap();
    let store = BundleStore::new(dir.path());
    let bundle = IndexBuilder::new(BuildConfig::default()).build("courses", &corpus("")).unwrap();
    store.save(&bundle).unwrap();

    let loaded = store.load("courses").unwrap();
    assert_eq!(loaded.meta, bundle.meta);
    assert_eq!(loaded.vocabulary, bundle.vocabulary);
    assert_eq!(loaded.features, bundle.features);
    assert_eq!(loaded.similarity, bundle.similarity);
    assert_eq!(loaded.items, bundle.items);

    let engine = QueryEngine::open(&store, "courses", Some(bundle.version())).unwrap();
    assert_eq!(engine.recommend_by_item(10, 1).unwrap()[0].item_id, 11);
}

#[test]
fn lifecycle_unbuilt_then_ready() {
    let dir = tempdir().unwrap();
    let store = BundleStore::new(dir.path());
    assert_eq!(store.status("courses").unwrap(), ArtifactState::Unbuilt);
    assert!(matches!(QueryEngine::open(&store, "courses", None), Err(RecommendError::BundleNotFound(_))));

    let bundle = IndexBuilder::new(BuildConfig::default()).build("courses", &corpus("")).unwrap();
    store.save(&bundle).unwrap();
    assert_eq!(store.status("courses").unwrap(), ArtifactState::Ready { version: bundle.version().to_string() });
    assert_eq!(store.list().unwrap(), vec!["courses".to_string()]);
}

#[test]
fn stale_bundle_is_not_reused() {
    let dir = tempdir().unwrap();
    let store = BundleStore::new(dir.path());
    let builder = IndexBuilder::new(BuildConfig::default());
    let old = builder.build("courses", &corpus("")).unwrap();
    store.save(&old).unwrap();

    let new = builder.build("courses", &corpus("basil")).unwrap();
    assert_ne!(old.version(), new.version());
    let err = QueryEngine::open(&store, "courses", Some(new.version())).unwrap_err();
    assert!(matches!(err, RecommendError::StaleBundle { .. }));

    store.save(&new).unwrap();
    let engine = QueryEngine::open(&store, "courses", Some(new.version())).unwrap();
    assert_eq!(engine.recommend_by_text("basil", 1).unwrap()[0].item_id, 12);
}

#[test]
fn datasets_coexist() {
    let dir = tempdir().unwrap();
    let store = BundleStore::new(dir.path());
    let builder = IndexBuilder::new(BuildConfig::default());
    store.save(&builder.build("b-set", &corpus("")).unwrap()).unwrap();
    let other = Corpus::new(vec![Item::new(1, "Chair", "oak chair"), Item::new(2, "Table", "oak table")]).unwrap();
    store.save(&builder.build("a-set", &other).unwrap()).unwrap();

    assert_eq!(store.list().unwrap(), vec!["a-set".to_string(), "b-set".to_string()]);
    let a = QueryEngine::open(&store, "a-set", None).unwrap();
    let b = QueryEngine::open(&store, "b-set", None).unwrap();
    assert_eq!(a.recommend_by_text("oak", 1).unwrap()[0].item_id, 1);
    assert!(matches!(b.recommend_by_text("oak", 1), Err(RecommendError::EmptyQuery)));
}

#[test]
fn truncated_matrix_is_an_error() {
    let dir = tempdir().unwrap();
    let store = BundleStore::new(dir.path());
    let bundle = IndexBuilder::new(BuildConfig::default()).build("courses", &corpus("")).unwrap();
    store.save(&bundle).unwrap();
    std::fs::write(dir.path().join("courses").join("similarity.bin"), [1u8, 2, 3]).unwrap();
    assert!(store.load("courses").is_err());
}

fn saved_store() -> (tempfile::TempDir, BundleStore, usize) {
    let dir = tempdir().unwrap();
    let store = BundleStore::new(dir.path());
    let bundle = IndexBuilder::new(BuildConfig::default()).build("courses", &corpus("")).unwrap();
    store.save(&bundle).unwrap();
    let cols = bundle.vocabulary.len();
    (dir, store, cols)
}

fn edit_meta(dir: &std::path::Path, key: &str, value: serde_json::Value) {
    let path = dir.join("courses").join("meta.json");
    let mut meta: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    meta[key] = value;
    std::fs::write(&path, serde_json::to_string_pretty(&meta).unwrap()).unwrap();
}

#[test]
fn short_feature_storage_is_corrupt() {
    let (dir, store, cols) = saved_store();
    let bytes = bincode::serialize(&(3usize, cols, vec![0.5f32; 2])).unwrap();
    std::fs::write(dir.path().join("courses").join("features.bin"), bytes).unwrap();
    assert!(matches!(store.load("courses"), Err(RecommendError::CorruptBundle(_))));
    assert!(matches!(QueryEngine::open(&store, "courses", None), Err(RecommendError::CorruptBundle(_))));
}

#[test]
fn short_similarity_storage_is_corrupt() {
    let (dir, store, _) = saved_store();
    let bytes = bincode::serialize(&(3usize, vec![1.0f32; 4])).unwrap();
    std::fs::write(dir.path().join("courses").join("similarity.bin"), bytes).unwrap();
    assert!(matches!(store.load("courses"), Err(RecommendError::CorruptBundle(_))));
}

#[test]
fn item_count_mismatch_is_corrupt() {
    let (dir, store, _) = saved_store();
    edit_meta(dir.path(), "num_items", serde_json::json!(7));
    assert!(matches!(store.load("courses"), Err(RecommendError::CorruptBundle(_))));
}

#[test]
fn unknown_format_version_is_corrupt() {
    let (dir, store, _) = saved_store();
    edit_meta(dir.path(), "format_version", serde_json::json!(2));
    assert!(matches!(store.load("courses"), Err(RecommendError::CorruptBundle(_))));
}
