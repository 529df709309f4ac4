pub mod parser;
pub mod types;

pub use parser::{ConfigFormat, ConfigParser};
pub use types::*;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// App configuration with multi-format support (JSON, YAML, TOML).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct StratusConfig {
    /// App name, stage, removal policy and provider settings.
    pub app: AppConfig,

    /// Naming overrides.
    #[serde(default)]
    pub naming: NamingConfig,

    /// Declared components, in declaration order.
    #[serde(default, rename = "component")]
    pub components: Vec<ComponentConfig>,
}

impl StratusConfig {
    pub fn new(app: impl Into<String>) -> Self {
        Self {
            app: AppConfig::new(app),
            naming: NamingConfig::default(),
            components: Vec::new(),
        }
    }

    pub fn component(&self, name: &str) -> Option<&ComponentConfig> {
        self.components.iter().find(|c| c.name() == name)
    }
}
