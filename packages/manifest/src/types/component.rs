use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;

pub const RUNTIMES: &[&str] = &[
    "nodejs18.x",
    "nodejs20.x",
    "nodejs22.x",
    "python3.11",
    "python3.12",
    "provided.al2023",
];

/// One `[[component]]` entry, selected by `type`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ComponentConfig {
    Bucket(BucketConfig),
    Queue(QueueConfig),
    Function(FunctionConfig),
    Linkable(LinkableConfig),
}

impl ComponentConfig {
    pub fn name(&self) -> &str {
        match self {
            ComponentConfig::Bucket(c) => &c.name,
            ComponentConfig::Queue(c) => &c.name,
            ComponentConfig::Function(c) => &c.name,
            ComponentConfig::Linkable(c) => &c.name,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ComponentConfig::Bucket(_) => "bucket",
            ComponentConfig::Queue(_) => "queue",
            ComponentConfig::Function(_) => "function",
            ComponentConfig::Linkable(_) => "linkable",
        }
    }

    /// Names this component links to.
    pub fn links(&self) -> &[String] {
        match self {
            ComponentConfig::Function(c) => &c.link,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct BucketConfig {
    pub name: String,
    #[serde(default)]
    pub versioning: bool,
    /// Allow public access.
    #[serde(default)]
    pub public: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct QueueConfig {
    pub name: String,
    #[serde(default)]
    pub fifo: bool,
    /// How long a received message stays hidden (e.g., "30s", "5m").
    #[serde(default = "default_visibility_timeout", with = "humantime_serde")]
    #[schemars(with = "String")]
    pub visibility_timeout: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct FunctionConfig {
    pub name: String,

    /// `{path}.{export}`, e.g. `src/api.handler`.
    pub handler: String,

    #[serde(default = "default_runtime")]
    pub runtime: String,

    /// e.g. "1024 MB".
    #[serde(default = "default_memory")]
    pub memory: String,

    #[serde(default = "default_timeout", with = "humantime_serde")]
    #[schemars(with = "String")]
    pub timeout: Duration,

    /// Components whose properties and permissions the function receives.
    #[serde(default)]
    pub link: Vec<String>,

    #[serde(default)]
    pub environment: BTreeMap<String, String>,
}

impl FunctionConfig {
    /// `"1024 MB"` as 1024. `None` when the value is not `{n} MB`.
    pub fn memory_mb(&self) -> Option<u32> {
        let (amount, unit) = self.memory.trim().split_once(' ')?;
        if unit.trim() != "MB" {
            return None;
        }
        amount.parse().ok()
    }
}

/// Arbitrary values made available to functions that link to it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct LinkableConfig {
    pub name: String,
    #[serde(default)]
    pub properties: Map<String, Value>,
    /// Permissions granted to whatever links to this.
    #[serde(default)]
    pub include: Vec<PermissionConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct PermissionConfig {
    pub actions: Vec<String>,
    pub resources: Vec<String>,
}

fn default_visibility_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_runtime() -> String {
    "nodejs20.x".to_string()
}

fn default_memory() -> String {
    "1024 MB".to_string()
}

fn default_timeout() -> Duration {
    Duration::from_secs(20)
}
