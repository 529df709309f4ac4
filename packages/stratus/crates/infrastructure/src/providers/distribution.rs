use super::required_str;
use crate::client::retry::RetryPolicy;
use async_trait::async_trait;
use domain::dynamic::{CreateResult, DynamicProvider, ResolvedInputs, UpdateResult};
use domain::error::{Result, SynthError};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub const DEPLOYED: &str = "Deployed";

#[async_trait]
pub trait CdnApi: Send + Sync {
    /// Current status of a distribution, e.g. `InProgress` or `Deployed`.
    async fn distribution_status(&self, distribution_id: &str) -> Result<String>;
}

/// Holds the deploy until a CDN distribution has finished propagating.
pub struct DistributionDeployWaiter {
    api: Arc<dyn CdnApi>,
    retry: RetryPolicy,
    max_polls: u32,
    poll_interval: Duration,
}

impl DistributionDeployWaiter {
    pub const NAME: &'static str = "DistributionDeployWaiter";

    pub fn new(api: Arc<dyn CdnApi>) -> Self {
        Self {
            api,
            retry: RetryPolicy::default(),
            max_polls: 60,
            poll_interval: Duration::from_secs(5),
        }
    }

    pub fn with_polling(mut self, max_polls: u32, poll_interval: Duration) -> Self {
        self.max_polls = max_polls;
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub async fn wait(&self, distribution_id: &str) -> Result<()> {
        for poll in 0..self.max_polls {
            let status = self
                .retry
                .execute("GetDistribution", || self.api.distribution_status(distribution_id))
                .await?;
            if status == DEPLOYED {
                return Ok(());
            }
            debug!(
                "Distribution {} is {} (poll {}/{})",
                distribution_id,
                status,
                poll + 1,
                self.max_polls
            );
            tokio::time::sleep(self.poll_interval).await;
        }
        Err(SynthError::backend(
            "DistributionNotDeployed",
            format!(
                "distribution {} did not reach {} after {} polls",
                distribution_id, DEPLOYED, self.max_polls
            ),
        ))
    }

    async fn outputs(&self, inputs: &ResolvedInputs) -> Result<(String, Map<String, Value>)> {
        let distribution_id = required_str(inputs, "distributionId")?.to_string();
        self.wait(&distribution_id).await?;

        let mut outputs = Map::new();
        outputs.insert("distributionId".into(), Value::String(distribution_id.clone()));
        outputs.insert("status".into(), Value::String(DEPLOYED.into()));
        Ok((distribution_id, outputs))
    }
}

#[async_trait]
impl DynamicProvider for DistributionDeployWaiter {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn create(&self, inputs: &ResolvedInputs) -> Result<CreateResult> {
        let (id, outputs) = self.outputs(inputs).await?;
        Ok(CreateResult { id, outputs })
    }

    async fn update(&self, _id: &str, _old: &ResolvedInputs, new: &ResolvedInputs) -> Result<UpdateResult> {
        let (_, outputs) = self.outputs(new).await?;
        Ok(UpdateResult { outputs })
    }
}
