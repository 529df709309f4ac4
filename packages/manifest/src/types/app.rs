use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// App identity and deployment settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Prefix of every physical resource name.
    /// Letters, digits and `-`, starting with a letter.
    pub name: String,

    /// Deployment stage (e.g., `dev`, `production`).
    #[serde(default = "default_stage")]
    pub stage: String,

    /// What happens to resources once they are no longer declared.
    #[serde(default)]
    pub removal: RemovalSetting,

    #[serde(default)]
    pub providers: ProvidersConfig,
}

impl AppConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stage: default_stage(),
            removal: RemovalSetting::default(),
            providers: ProvidersConfig::default(),
        }
    }

    pub fn region(&self) -> Option<&str> {
        self.providers.aws.as_ref().and_then(|aws| aws.region.as_deref())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RemovalSetting {
    /// Remove everything.
    Remove,
    /// Keep buckets and tables.
    #[default]
    Retain,
    /// Keep everything.
    RetainAll,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema, Default)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub aws: Option<AwsProvider>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema, Default)]
pub struct AwsProvider {
    #[serde(default)]
    pub region: Option<String>,
}

/// Extra resource types that skip physical naming.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema, Default)]
pub struct NamingConfig {
    /// Provider type tokens, e.g. `aws:custom/thing:Thing`.
    #[serde(default)]
    pub exempt: Vec<String>,
}

fn default_stage() -> String {
    "dev".to_string()
}
