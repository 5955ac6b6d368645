//! Remote model loader integration tests

mod common;

use common::{model_bytes, write_model, MockObjectStore, BUCKET};
use goodboy_classifiers::store::artifact_key;
use goodboy_classifiers::{
    FsObjectStore, ModelLoader, ModelStatus, RemoteModelLoader, RemoteStoreConfig,
};
use goodboy_core::{Error, ModelId, ModelVersion};
use std::sync::Arc;

fn config() -> RemoteStoreConfig {
    RemoteStoreConfig {
        bucket: BUCKET.to_string(),
        ..Default::default()
    }
}

fn published() -> MockObjectStore {
    MockObjectStore::new()
        .with_model("dog-classifier", "v1", model_bytes(&[1.0]))
        .with_model("dog-classifier", "v2", model_bytes(&[2.0]))
        .with_model("dog-classifier", "v10", model_bytes(&[3.0]))
}

#[tokio::test]
async fn test_load_specific_version() {
    let store = Arc::new(published());
    let loader = RemoteModelLoader::with_store(config(), store.clone());

    let model = loader
        .load(&ModelId::new("dog-classifier"), &ModelVersion::tagged("v1"))
        .await
        .unwrap();

    assert_eq!(model.version(), "v1");
    assert_eq!(model.num_classes(), 1);
    assert_eq!(store.get_calls(), 1);
    assert!(loader.is_available());
}

#[tokio::test]
async fn test_latest_resolves_highest_version() {
    let loader = RemoteModelLoader::with_store(config(), Arc::new(published()));

    let model = loader
        .load(&ModelId::new("dog-classifier"), &ModelVersion::Latest)
        .await
        .unwrap();

    // v10 outranks v2 numerically
    assert_eq!(model.version(), "v10");
}

#[tokio::test]
async fn test_unknown_model_is_not_found() {
    let loader = RemoteModelLoader::with_store(config(), Arc::new(published()));

    let err = loader
        .load(&ModelId::new("cat-classifier"), &ModelVersion::Latest)
        .await
        .unwrap_err();

    assert!(matches!(&err, Error::NotFound(_)));
    assert!(err
        .to_string()
        .contains("Model 'cat-classifier' not found in remote storage"));
    assert!(matches!(
        loader.status(&ModelId::new("cat-classifier")),
        ModelStatus::Failed(_)
    ));
}

#[tokio::test]
async fn test_unknown_version_is_not_found() {
    let loader = RemoteModelLoader::with_store(config(), Arc::new(published()));

    let err = loader
        .load(&ModelId::new("dog-classifier"), &ModelVersion::tagged("v7"))
        .await
        .unwrap_err();

    assert!(matches!(&err, Error::NotFound(_)));
    assert!(err.to_string().contains("version 'v7'"));
}

#[tokio::test]
async fn test_fetched_artifact_is_persisted_to_disk_cache() {
    let cache_dir = tempfile::tempdir().unwrap();
    let loader = RemoteModelLoader::with_store(
        config().with_cache_dir(cache_dir.path()),
        Arc::new(published()),
    );

    loader
        .load(&ModelId::new("dog-classifier"), &ModelVersion::tagged("v1"))
        .await
        .unwrap();

    let expected = cache_dir
        .path()
        .join("dog-classifier")
        .join("v1")
        .join("model.safetensors");
    assert!(expected.is_file());
    assert_eq!(
        loader.cache_path(&ModelId::new("dog-classifier"), "v1"),
        Some(expected)
    );
}

#[tokio::test]
async fn test_disk_cache_hit_skips_download() {
    let cache_dir = tempfile::tempdir().unwrap();
    let cached = cache_dir.path().join("dog-classifier/v1");
    std::fs::create_dir_all(&cached).unwrap();
    write_model(cached.join("model.safetensors"), &[0.5, 0.5, 0.5]);

    let store = Arc::new(published());
    let loader = RemoteModelLoader::with_store(
        config().with_cache_dir(cache_dir.path()),
        store.clone(),
    );

    let model = loader
        .load(&ModelId::new("dog-classifier"), &ModelVersion::tagged("v1"))
        .await
        .unwrap();

    // the cached artifact wins over the published one
    assert_eq!(model.num_classes(), 3);
    assert_eq!(store.get_calls(), 0);
}

#[tokio::test]
async fn test_unwritable_disk_cache_still_loads() {
    let tmp = tempfile::tempdir().unwrap();
    // a regular file where the cache directory should be
    let cache_dir = tmp.path().join("not-a-dir");
    std::fs::write(&cache_dir, b"").unwrap();

    let store = Arc::new(published());
    let loader = RemoteModelLoader::with_store(config().with_cache_dir(&cache_dir), store.clone());

    let model = loader
        .load(&ModelId::new("dog-classifier"), &ModelVersion::tagged("v2"))
        .await
        .unwrap();

    assert_eq!(model.version(), "v2");
    assert_eq!(store.get_calls(), 1);
    assert!(loader.is_available());
    assert!(cache_dir.is_file());
}

#[tokio::test]
async fn test_corrupt_disk_cache_entry_is_refetched() {
    let cache_dir = tempfile::tempdir().unwrap();
    let cached = cache_dir.path().join("dog-classifier/v1/model.safetensors");
    std::fs::create_dir_all(cached.parent().unwrap()).unwrap();
    std::fs::write(&cached, b"trunc").unwrap();

    let store = Arc::new(published());
    let loader = RemoteModelLoader::with_store(
        config().with_cache_dir(cache_dir.path()),
        store.clone(),
    );

    let model = loader
        .load(&ModelId::new("dog-classifier"), &ModelVersion::tagged("v1"))
        .await
        .unwrap();

    assert_eq!(model.num_classes(), 1);
    assert_eq!(store.get_calls(), 1);

    // the entry was replaced with the downloaded artifact
    let leftovers: Vec<_> = std::fs::read_dir(cached.parent().unwrap())
        .unwrap()
        .map(|entry| entry.unwrap().file_name())
        .collect();
    assert_eq!(leftovers, vec!["model.safetensors"]);

    let store = Arc::new(published());
    let loader = RemoteModelLoader::with_store(
        config().with_cache_dir(cache_dir.path()),
        store.clone(),
    );
    loader
        .load(&ModelId::new("dog-classifier"), &ModelVersion::tagged("v1"))
        .await
        .unwrap();
    assert_eq!(store.get_calls(), 0);
}

#[tokio::test]
async fn test_memory_cache_serves_repeat_loads() {
    let store = Arc::new(published());
    let loader = RemoteModelLoader::with_store(config(), store.clone());
    let name = ModelId::new("dog-classifier");

    let first = loader.load(&name, &ModelVersion::Latest).await.unwrap();
    let second = loader.load(&name, &ModelVersion::Latest).await.unwrap();
    let pinned = loader.load(&name, &ModelVersion::tagged("v10")).await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert!(Arc::ptr_eq(&first, &pinned));
    assert_eq!(store.list_calls(), 1);
    assert_eq!(store.get_calls(), 1);
}

#[tokio::test]
async fn test_pinning_another_version_reloads() {
    let store = Arc::new(published());
    let loader = RemoteModelLoader::with_store(config(), store.clone());
    let name = ModelId::new("dog-classifier");

    let v1 = loader.load(&name, &ModelVersion::tagged("v1")).await.unwrap();
    let v2 = loader.load(&name, &ModelVersion::tagged("v2")).await.unwrap();

    assert_eq!(v1.version(), "v1");
    assert_eq!(v2.version(), "v2");
    assert_eq!(store.get_calls(), 2);

    // the cache keeps one slot per name
    assert_eq!(loader.cache().len(), 1);
    assert_eq!(loader.cache().get("dog-classifier").unwrap().version(), "v2");
}

#[tokio::test]
async fn test_invalid_artifact_is_invalid_model() {
    let store = MockObjectStore::new().with_model("broken", "v1", b"not a model".to_vec());
    let loader = RemoteModelLoader::with_store(config(), Arc::new(store));

    let err = loader
        .load(&ModelId::new("broken"), &ModelVersion::Latest)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::InvalidModel(_)));
    assert!(!loader.is_available());
}

#[test]
fn test_client_is_created_lazily() {
    let loader = RemoteModelLoader::new(config());

    assert!(!loader.is_connected());
    assert!(loader.cache().is_empty());
    assert!(!loader.is_available());
}

#[tokio::test]
async fn test_load_from_directory_store() {
    let root = tempfile::tempdir().unwrap();
    let artifact = root.path().join(BUCKET).join(artifact_key("apolo-classifier", "v3"));
    std::fs::create_dir_all(artifact.parent().unwrap()).unwrap();
    write_model(&artifact, &[-1.0, 1.0]);

    let store = FsObjectStore::new(root.path(), BUCKET);
    let loader = RemoteModelLoader::with_store(config(), Arc::new(store));

    let model = loader
        .load(&ModelId::new("apolo-classifier"), &ModelVersion::Latest)
        .await
        .unwrap();

    assert_eq!(model.version(), "v3");
    assert_eq!(model.num_classes(), 2);
}

#[tokio::test]
async fn test_file_endpoint_reads_bucket_mirror() {
    let root = tempfile::tempdir().unwrap();
    let artifact = root.path().join(BUCKET).join(artifact_key("dog-classifier", "v4"));
    std::fs::create_dir_all(artifact.parent().unwrap()).unwrap();
    write_model(&artifact, &[2.0]);

    let config = RemoteStoreConfig {
        endpoint: Some(url::Url::from_directory_path(root.path()).unwrap().to_string()),
        ..config()
    };
    let loader = RemoteModelLoader::new(config);

    let model = loader
        .load(&ModelId::new("dog-classifier"), &ModelVersion::Latest)
        .await
        .unwrap();

    assert!(loader.is_connected());
    assert_eq!(model.version(), "v4");
    assert_eq!(model.num_classes(), 1);
}
