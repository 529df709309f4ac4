use application::BootstrapProvisioner;
use domain::bootstrap::{BootstrapRecord, PARAMETER_KEY, REPOSITORY_NAME};
use domain::error::SynthError;
use infrastructure::{MemoryAssetStorage, MemoryParameterStore, RetryPolicy};
use std::sync::Arc;
use std::time::Duration;

const SCOPE: &str = "us-east-1";

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        initial_backoff: Duration::from_millis(1),
        ..RetryPolicy::default()
    }
}

fn provisioner(parameters: &Arc<MemoryParameterStore>, storage: &Arc<MemoryAssetStorage>) -> BootstrapProvisioner {
    BootstrapProvisioner::new(parameters.clone(), storage.clone()).with_retry(fast_retry())
}

#[tokio::test]
async fn test_concurrent_callers_share_one_creation() {
    let parameters = Arc::new(MemoryParameterStore::new());
    let storage = Arc::new(MemoryAssetStorage::new().with_latency(Duration::from_millis(20)));
    let bootstrap = provisioner(&parameters, &storage);

    let (first, second) = tokio::join!(bootstrap.for_scope(SCOPE), bootstrap.for_scope(SCOPE));
    let first = first.unwrap();
    assert_eq!(first, second.unwrap());
    assert_eq!(storage.bucket_creations(), 1);
    assert_eq!(storage.repository_creations(), 1);
    assert_eq!(parameters.get_count(), 1);
    assert!(storage.is_versioned(SCOPE, &first.bucket));
    assert!(first.bucket.starts_with("stratus-asset-"));
    assert!(first.registry.unwrap().url.ends_with(REPOSITORY_NAME));
}

#[tokio::test]
async fn test_completed_bootstrap_is_discovered() {
    let parameters = Arc::new(MemoryParameterStore::new());
    let storage = Arc::new(MemoryAssetStorage::new());
    let first = provisioner(&parameters, &storage).for_scope(SCOPE).await.unwrap();

    // A fresh process only has the persisted parameter to go on.
    let second = provisioner(&parameters, &storage).for_scope(SCOPE).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(storage.bucket_creations(), 1);
    assert_eq!(storage.repository_creations(), 1);
    assert_eq!(parameters.put_count(), 1);

    let stored = parameters.raw(SCOPE, PARAMETER_KEY).unwrap();
    assert_eq!(BootstrapRecord::parse(&stored), Some(first));
}

#[tokio::test]
async fn test_malformed_parameter_falls_back_to_creation() {
    let parameters = Arc::new(MemoryParameterStore::new());
    parameters.insert_raw(SCOPE, PARAMETER_KEY, "{not json");
    let storage = Arc::new(MemoryAssetStorage::new());

    let record = provisioner(&parameters, &storage).for_scope(SCOPE).await.unwrap();
    assert_eq!(storage.bucket_creations(), 1);
    let stored = parameters.raw(SCOPE, PARAMETER_KEY).unwrap();
    assert_eq!(BootstrapRecord::parse(&stored), Some(record));
}

#[tokio::test]
async fn test_partial_record_is_resumed() {
    let parameters = Arc::new(MemoryParameterStore::new());
    parameters.insert_raw(SCOPE, PARAMETER_KEY, r#"{"bucket":"stratus-asset-existing"}"#);
    let storage = Arc::new(MemoryAssetStorage::new());
    storage.seed_repository(SCOPE, REPOSITORY_NAME);

    let record = provisioner(&parameters, &storage).for_scope(SCOPE).await.unwrap();
    assert_eq!(record.bucket, "stratus-asset-existing");
    assert_eq!(storage.bucket_creations(), 0);
    // The repository already existed, so it was described rather than created.
    assert_eq!(storage.repository_creations(), 0);
    assert!(record.registry.is_some());
}

#[tokio::test]
async fn test_failed_attempt_is_evicted() {
    let parameters = Arc::new(MemoryParameterStore::new());
    let storage = Arc::new(MemoryAssetStorage::new());
    storage.fail_next_bucket(SynthError::backend("AccessDenied", "not allowed"));
    let bootstrap = provisioner(&parameters, &storage);

    let err = bootstrap.for_scope(SCOPE).await.unwrap_err();
    assert_eq!(err.backend_code(), Some("AccessDenied"));
    assert!(parameters.raw(SCOPE, PARAMETER_KEY).is_none());

    let record = bootstrap.for_scope(SCOPE).await.unwrap();
    assert_eq!(storage.bucket_creations(), 2);
    assert_eq!(storage.buckets(SCOPE), vec![record.bucket]);
}

#[tokio::test]
async fn test_throttling_is_retried() {
    let parameters = Arc::new(MemoryParameterStore::new());
    let storage = Arc::new(MemoryAssetStorage::new());
    storage.fail_next_bucket(SynthError::backend("Throttling", "rate exceeded"));

    provisioner(&parameters, &storage).for_scope(SCOPE).await.unwrap();
    assert_eq!(storage.bucket_creations(), 2);
}

#[tokio::test]
async fn test_scopes_are_independent_and_reset_forgets() {
    let parameters = Arc::new(MemoryParameterStore::new());
    let storage = Arc::new(MemoryAssetStorage::new());
    let bootstrap = provisioner(&parameters, &storage);

    let east = bootstrap.for_scope("us-east-1").await.unwrap();
    let west = bootstrap.for_scope("us-west-2").await.unwrap();
    assert_ne!(east.bucket, west.bucket);
    assert_eq!(storage.bucket_creations(), 2);

    bootstrap.for_scope("us-east-1").await.unwrap();
    assert_eq!(parameters.get_count(), 2);

    bootstrap.reset();
    assert_eq!(bootstrap.for_scope("us-east-1").await.unwrap(), east);
    assert_eq!(parameters.get_count(), 3);
    assert_eq!(storage.bucket_creations(), 2);
}
