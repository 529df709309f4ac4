use crate::error::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};

/// Resource type under which every dynamic resource is registered.
pub const DYNAMIC_RESOURCE_TYPE: &str = "stratus:dynamic:Resource";

/// Fully resolved inputs handed to a provider.
pub type ResolvedInputs = Map<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub struct CreateResult {
    pub id: String,
    pub outputs: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateResult {
    pub outputs: Map<String, Value>,
}

/// Lifecycle callbacks for a resource the backend has no native type for.
///
/// `update` must produce its outputs from `new` alone (plus `old` for
/// comparison); implementations keep no state between calls.
#[async_trait]
pub trait DynamicProvider: Send + Sync {
    /// Identifies the provider in state and logs.
    fn name(&self) -> &str;

    async fn create(&self, inputs: &ResolvedInputs) -> Result<CreateResult>;

    async fn update(&self, id: &str, old: &ResolvedInputs, new: &ResolvedInputs) -> Result<UpdateResult>;

    async fn delete(&self, _id: &str, _inputs: &ResolvedInputs) -> Result<()> {
        Ok(())
    }
}
