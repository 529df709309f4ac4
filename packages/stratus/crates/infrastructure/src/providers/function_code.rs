use super::required_str;
use crate::client::retry::RetryPolicy;
use async_trait::async_trait;
use domain::dynamic::{CreateResult, DynamicProvider, ResolvedInputs, UpdateResult};
use domain::error::Result;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::info;

#[async_trait]
pub trait FunctionApi: Send + Sync {
    /// Points the function at a new code bundle and returns the published version.
    async fn update_code(&self, function_name: &str, bucket: &str, key: &str) -> Result<String>;
}

/// Uploads function code separately from the function definition, so a code
/// change never forces the function itself to be replaced.
pub struct FunctionCodeUpdater {
    api: Arc<dyn FunctionApi>,
    retry: RetryPolicy,
}

impl FunctionCodeUpdater {
    pub const NAME: &'static str = "FunctionCodeUpdater";

    pub fn new(api: Arc<dyn FunctionApi>) -> Self {
        Self {
            api,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn push(&self, inputs: &ResolvedInputs) -> Result<(String, Map<String, Value>)> {
        let function_name = required_str(inputs, "functionName")?;
        let bucket = required_str(inputs, "s3Bucket")?;
        let key = required_str(inputs, "s3Key")?;

        let version = self
            .retry
            .execute("UpdateFunctionCode", || self.api.update_code(function_name, bucket, key))
            .await?;
        info!("Updated code of {} to version {}", function_name, version);

        let mut outputs = Map::new();
        outputs.insert("functionName".into(), Value::String(function_name.to_string()));
        outputs.insert("version".into(), Value::String(version));
        Ok((function_name.to_string(), outputs))
    }
}

#[async_trait]
impl DynamicProvider for FunctionCodeUpdater {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn create(&self, inputs: &ResolvedInputs) -> Result<CreateResult> {
        let (id, outputs) = self.push(inputs).await?;
        Ok(CreateResult { id, outputs })
    }

    async fn update(&self, _id: &str, _old: &ResolvedInputs, new: &ResolvedInputs) -> Result<UpdateResult> {
        let (_, outputs) = self.push(new).await?;
        Ok(UpdateResult { outputs })
    }
}
