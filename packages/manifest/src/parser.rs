use crate::StratusConfig;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Multi-format config parser (JSON, YAML, TOML)
pub struct ConfigParser;

/// Supported config formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Yaml,
    Toml,
}

impl ConfigParser {
    /// Auto-detect format from file extension and parse
    pub fn parse_file(path: &Path) -> Result<StratusConfig> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let format = Self::detect_format(path)?;
        Self::parse(&content, format)
    }

    /// Parse config from string with explicit format
    pub fn parse(content: &str, format: ConfigFormat) -> Result<StratusConfig> {
        match format {
            ConfigFormat::Json => serde_json::from_str(content).context("Failed to parse JSON config"),
            ConfigFormat::Yaml => serde_yaml::from_str(content).context("Failed to parse YAML config"),
            ConfigFormat::Toml => toml::from_str(content).context("Failed to parse TOML config"),
        }
    }

    pub fn detect_format(path: &Path) -> Result<ConfigFormat> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| anyhow::anyhow!("File has no extension: {}", path.display()))?;

        match extension.to_lowercase().as_str() {
            "json" => Ok(ConfigFormat::Json),
            "yaml" | "yml" => Ok(ConfigFormat::Yaml),
            "toml" => Ok(ConfigFormat::Toml),
            _ => anyhow::bail!("Unsupported config format: .{}", extension),
        }
    }

    /// Find the config file in `dir`, preferring TOML, then JSON, then YAML.
    pub fn find_config(dir: &Path) -> Result<(PathBuf, ConfigFormat)> {
        let candidates = [
            ("stratus.toml", ConfigFormat::Toml),
            ("stratus.json", ConfigFormat::Json),
            ("stratus.yaml", ConfigFormat::Yaml),
            ("stratus.yml", ConfigFormat::Yaml),
        ];

        for (filename, format) in candidates {
            let path = dir.join(filename);
            if path.exists() {
                return Ok((path, format));
            }
        }

        anyhow::bail!("No stratus config found in directory: {}", dir.display())
    }

    pub fn serialize(config: &StratusConfig, format: ConfigFormat) -> Result<String> {
        match format {
            ConfigFormat::Json => {
                serde_json::to_string_pretty(config).context("Failed to serialize to JSON")
            }
            ConfigFormat::Yaml => serde_yaml::to_string(config).context("Failed to serialize to YAML"),
            ConfigFormat::Toml => toml::to_string_pretty(config).context("Failed to serialize to TOML"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ComponentConfig, RemovalSetting};
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    #[test]
    fn test_parse_toml_complete() {
        let toml_str = r#"
[app]
name = "my-app"
stage = "prod"
removal = "retain-all"

[app.providers.aws]
region = "us-east-1"

[naming]
exempt = ["aws:custom/thing:Thing"]

[[component]]
type = "bucket"
name = "Uploads"
versioning = true

[[component]]
type = "function"
name = "Api"
handler = "src/api.handler"
timeout = "30s"
link = ["Uploads"]
        "#;

        let config = ConfigParser::parse(toml_str, ConfigFormat::Toml).unwrap();

        assert_eq!(config.app.name, "my-app");
        assert_eq!(config.app.removal, RemovalSetting::RetainAll);
        assert_eq!(config.app.region(), Some("us-east-1"));
        assert_eq!(config.naming.exempt, vec!["aws:custom/thing:Thing"]);
        assert_eq!(config.components.len(), 2);
        match &config.components[1] {
            ComponentConfig::Function(function) => {
                assert_eq!(function.timeout, Duration::from_secs(30));
                assert_eq!(function.memory_mb(), Some(1024));
                assert_eq!(function.runtime, "nodejs20.x");
                assert_eq!(function.link, vec!["Uploads"]);
            }
            other => panic!("expected a function, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_defaults() {
        let config = ConfigParser::parse(r#"{ "app": { "name": "my-app" } }"#, ConfigFormat::Json).unwrap();
        assert_eq!(config.app.stage, "dev");
        assert_eq!(config.app.removal, RemovalSetting::Retain);
        assert!(config.components.is_empty());
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
app:
  name: my-app
component:
  - type: queue
    name: Jobs
    fifo: true
    visibility_timeout: 5m
  - type: linkable
    name: Stripe
    properties:
      key: sk_test
        "#;

        let config = ConfigParser::parse(yaml, ConfigFormat::Yaml).unwrap();
        match &config.components[0] {
            ComponentConfig::Queue(queue) => {
                assert!(queue.fifo);
                assert_eq!(queue.visibility_timeout, Duration::from_secs(300));
            }
            other => panic!("expected a queue, got {:?}", other),
        }
        assert_eq!(config.components[1].kind(), "linkable");
    }

    #[test]
    fn test_unknown_component_type_rejected() {
        let toml_str = r#"
[app]
name = "my-app"

[[component]]
type = "cluster"
name = "Db"
        "#;
        assert!(ConfigParser::parse(toml_str, ConfigFormat::Toml).is_err());
    }

    #[test]
    fn test_detect_format() {
        assert_eq!(ConfigParser::detect_format(Path::new("stratus.yml")).unwrap(), ConfigFormat::Yaml);
        assert!(ConfigParser::detect_format(Path::new("stratus.ini")).is_err());
        assert!(ConfigParser::detect_format(Path::new("stratus")).is_err());
    }

    #[test]
    fn test_roundtrip_json() {
        let mut config = StratusConfig::new("my-app");
        config.naming.exempt.push("aws:custom/thing:Thing".into());

        let json = ConfigParser::serialize(&config, ConfigFormat::Json).unwrap();
        let parsed = ConfigParser::parse(&json, ConfigFormat::Json).unwrap();
        assert_eq!(config, parsed);
    }
}
