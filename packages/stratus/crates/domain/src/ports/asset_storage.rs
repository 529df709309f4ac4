use crate::bootstrap::RegistryRecord;
use crate::error::Result;
use async_trait::async_trait;

/// Backing storage the bootstrap provisioner creates once per scope.
#[async_trait]
pub trait AssetStorage: Send + Sync {
    async fn create_bucket(&self, scope: &str, bucket: &str) -> Result<()>;
    async fn enable_versioning(&self, scope: &str, bucket: &str) -> Result<()>;
    /// Fails with backend code `RepositoryAlreadyExistsException` when the
    /// repository already exists.
    async fn create_repository(&self, scope: &str, name: &str) -> Result<RegistryRecord>;
    async fn describe_repository(&self, scope: &str, name: &str) -> Result<RegistryRecord>;
}
