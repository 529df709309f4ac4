use crate::lock;
use async_trait::async_trait;
use domain::bootstrap::RegistryRecord;
use domain::error::{Result, SynthError};
use domain::ports::AssetStorage;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

const ACCOUNT_ID: &str = "000000000000";

/// In-process object storage and container registry.
///
/// Failures can be queued per operation to exercise retry and eviction paths,
/// and `latency` keeps calls in flight long enough for concurrent callers to
/// overlap.
#[derive(Default)]
pub struct MemoryAssetStorage {
    buckets: Mutex<BTreeSet<(String, String)>>,
    versioned: Mutex<BTreeSet<(String, String)>>,
    repositories: Mutex<HashMap<(String, String), RegistryRecord>>,
    bucket_failures: Mutex<VecDeque<SynthError>>,
    bucket_creations: AtomicUsize,
    repository_creations: AtomicUsize,
    latency: Option<Duration>,
}

impl MemoryAssetStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// The next `create_bucket` call fails with `err`.
    pub fn fail_next_bucket(&self, err: SynthError) {
        lock(&self.bucket_failures).push_back(err);
    }

    /// Bucket creation attempts, failed ones included.
    pub fn bucket_creations(&self) -> usize {
        self.bucket_creations.load(Ordering::SeqCst)
    }

    pub fn repository_creations(&self) -> usize {
        self.repository_creations.load(Ordering::SeqCst)
    }

    pub fn buckets(&self, scope: &str) -> Vec<String> {
        lock(&self.buckets)
            .iter()
            .filter(|(s, _)| s == scope)
            .map(|(_, b)| b.clone())
            .collect()
    }

    pub fn is_versioned(&self, scope: &str, bucket: &str) -> bool {
        lock(&self.versioned).contains(&(scope.to_string(), bucket.to_string()))
    }

    /// Pre-creates a repository as if an earlier run had made it.
    pub fn seed_repository(&self, scope: &str, name: &str) {
        lock(&self.repositories).insert((scope.to_string(), name.to_string()), record(scope, name));
    }

    async fn pause(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

fn record(scope: &str, name: &str) -> RegistryRecord {
    RegistryRecord {
        registry_id: ACCOUNT_ID.to_string(),
        url: format!("{}.dkr.ecr.{}.amazonaws.com/{}", ACCOUNT_ID, scope, name),
    }
}

#[async_trait]
impl AssetStorage for MemoryAssetStorage {
    async fn create_bucket(&self, scope: &str, bucket: &str) -> Result<()> {
        self.bucket_creations.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        if let Some(err) = lock(&self.bucket_failures).pop_front() {
            return Err(err);
        }
        let inserted = lock(&self.buckets).insert((scope.to_string(), bucket.to_string()));
        if !inserted {
            return Err(SynthError::backend(
                "BucketAlreadyOwnedByYou",
                format!("bucket {} already exists", bucket),
            ));
        }
        Ok(())
    }

    async fn enable_versioning(&self, scope: &str, bucket: &str) -> Result<()> {
        let key = (scope.to_string(), bucket.to_string());
        if !lock(&self.buckets).contains(&key) {
            return Err(SynthError::backend("NoSuchBucket", bucket));
        }
        lock(&self.versioned).insert(key);
        Ok(())
    }

    async fn create_repository(&self, scope: &str, name: &str) -> Result<RegistryRecord> {
        self.pause().await;
        let mut repositories = lock(&self.repositories);
        let key = (scope.to_string(), name.to_string());
        if repositories.contains_key(&key) {
            return Err(SynthError::backend(
                "RepositoryAlreadyExistsException",
                format!("repository {} already exists", name),
            ));
        }
        self.repository_creations.fetch_add(1, Ordering::SeqCst);
        let created = record(scope, name);
        repositories.insert(key, created.clone());
        Ok(created)
    }

    async fn describe_repository(&self, scope: &str, name: &str) -> Result<RegistryRecord> {
        lock(&self.repositories)
            .get(&(scope.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| SynthError::not_found("repository", name))
    }
}
