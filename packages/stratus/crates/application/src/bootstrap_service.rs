use domain::bootstrap::{
    generate_bucket_name, BootstrapDraft, BootstrapRecord, RegistryRecord, PARAMETER_KEY,
    REPOSITORY_NAME, VERSION,
};
use domain::error::{Result, SynthError};
use domain::ports::{AssetStorage, ParameterStore};
use futures::future::{BoxFuture, FutureExt, Shared};
use infrastructure::RetryPolicy;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

type Flight = Shared<BoxFuture<'static, Result<BootstrapRecord>>>;

#[derive(Clone)]
struct Steps {
    parameters: Arc<dyn ParameterStore>,
    storage: Arc<dyn AssetStorage>,
    retry: RetryPolicy,
}

/// Provisions the shared asset bucket and container repository once per
/// scope.
///
/// Concurrent callers for one scope share a single in-flight attempt. A
/// failed attempt is evicted so the next caller starts over; discovery runs
/// first, so a retry resumes whatever the failed attempt persisted.
#[derive(Clone)]
pub struct BootstrapProvisioner {
    steps: Steps,
    flights: Arc<Mutex<HashMap<String, Flight>>>,
}

impl BootstrapProvisioner {
    pub fn new(parameters: Arc<dyn ParameterStore>, storage: Arc<dyn AssetStorage>) -> Self {
        Self {
            steps: Steps {
                parameters,
                storage,
                retry: RetryPolicy::default(),
            },
            flights: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.steps.retry = retry;
        self
    }

    pub async fn for_scope(&self, scope: &str) -> Result<BootstrapRecord> {
        let flight = {
            let mut flights = self.flights();
            flights
                .entry(scope.to_string())
                .or_insert_with(|| {
                    let steps = self.steps.clone();
                    let scope = scope.to_string();
                    async move { steps.run(&scope).await }.boxed().shared()
                })
                .clone()
        };

        let outcome = flight.clone().await;
        if outcome.is_err() {
            let mut flights = self.flights();
            if flights.get(scope).is_some_and(|cached| cached.ptr_eq(&flight)) {
                flights.remove(scope);
            }
        }
        outcome
    }

    /// Forgets every cached attempt.
    pub fn reset(&self) {
        self.flights().clear();
    }

    fn flights(&self) -> MutexGuard<'_, HashMap<String, Flight>> {
        self.flights.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Steps {
    async fn run(&self, scope: &str) -> Result<BootstrapRecord> {
        let raw = self
            .retry
            .execute("GetParameter", || self.parameters.get(scope, PARAMETER_KEY))
            .await?;
        let draft = raw.as_deref().map(BootstrapDraft::parse).unwrap_or_default();
        if let Some(record) = draft.clone().complete() {
            info!("Found bootstrap bucket {} in {}", record.bucket, scope);
            return Ok(record);
        }
        if raw.is_some() {
            warn!("Bootstrap record in {} is incomplete, resuming", scope);
        }

        let bucket = match draft.bucket {
            Some(bucket) if !bucket.is_empty() => bucket,
            _ => self.create_bucket(scope).await?,
        };
        let registry = match draft.registry {
            Some(registry) => registry,
            None => self.ensure_repository(scope).await?,
        };

        let record = BootstrapRecord {
            version: VERSION,
            bucket,
            registry: Some(registry),
        };
        let value = record.to_json()?;
        self.retry
            .execute("PutParameter", || self.parameters.put(scope, PARAMETER_KEY, &value))
            .await?;
        info!("Bootstrapped {} with bucket {}", scope, record.bucket);
        Ok(record)
    }

    async fn create_bucket(&self, scope: &str) -> Result<String> {
        let bucket = generate_bucket_name(&mut rand::thread_rng());
        debug!("Creating bootstrap bucket {} in {}", bucket, scope);
        self.retry
            .execute("CreateBucket", || self.storage.create_bucket(scope, &bucket))
            .await?;
        self.retry
            .execute("PutBucketVersioning", || self.storage.enable_versioning(scope, &bucket))
            .await?;
        Ok(bucket)
    }

    async fn ensure_repository(&self, scope: &str) -> Result<RegistryRecord> {
        let created = self
            .retry
            .execute("CreateRepository", || self.storage.create_repository(scope, REPOSITORY_NAME))
            .await;
        match created {
            Err(SynthError::Backend { code, .. }) if code == "RepositoryAlreadyExistsException" => {
                self.retry
                    .execute("DescribeRepositories", || {
                        self.storage.describe_repository(scope, REPOSITORY_NAME)
                    })
                    .await
            }
            other => other,
        }
    }
}
