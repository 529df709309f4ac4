use crate::error::Result;
use async_trait::async_trait;

/// Key/value side-channel used to discover shared infrastructure.
///
/// Every call is scoped (e.g. by region); the same key in two scopes refers to
/// two independent values.
#[async_trait]
pub trait ParameterStore: Send + Sync {
    /// `Ok(None)` when the key does not exist.
    async fn get(&self, scope: &str, key: &str) -> Result<Option<String>>;
    /// Creates or overwrites the value.
    async fn put(&self, scope: &str, key: &str, value: &str) -> Result<()>;
}
