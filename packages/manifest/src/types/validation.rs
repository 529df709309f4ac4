use crate::{ComponentConfig, RemovalSetting, StratusConfig, RUNTIMES};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, JsonSchema, Serialize, Deserialize)]
pub enum ValidationLevel {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, JsonSchema, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub level: ValidationLevel,
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone, JsonSchema, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            valid: true,
            issues: Vec::new(),
        }
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.valid = false;
        self.issues.push(ValidationIssue {
            level: ValidationLevel::Error,
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.issues.push(ValidationIssue {
            level: ValidationLevel::Warning,
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn has_errors(&self) -> bool {
        self.issues
            .iter()
            .any(|i| i.level == ValidationLevel::Error)
    }

    pub fn has_warnings(&self) -> bool {
        self.issues
            .iter()
            .any(|i| i.level == ValidationLevel::Warning)
    }

    pub fn errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues
            .iter()
            .filter(|i| i.level == ValidationLevel::Error)
    }
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::new()
    }
}

pub struct ConfigValidator;

impl ConfigValidator {
    pub fn validate(config: &StratusConfig) -> ValidationResult {
        let mut result = ValidationResult::new();

        Self::validate_app(config, &mut result);
        Self::validate_naming(config, &mut result);
        Self::validate_components(config, &mut result);
        Self::validate_links(config, &mut result);

        result
    }

    fn validate_app(config: &StratusConfig, result: &mut ValidationResult) {
        if !is_identifier(&config.app.name) {
            result.add_error(
                "app.name",
                format!(
                    "Invalid app name '{}': use letters, digits and '-', starting with a letter",
                    config.app.name
                ),
            );
        }
        if !is_identifier(&config.app.stage) {
            result.add_error(
                "app.stage",
                format!(
                    "Invalid stage '{}': use letters, digits and '-', starting with a letter",
                    config.app.stage
                ),
            );
        }
        if config.app.removal == RemovalSetting::Remove && config.app.stage == "production" {
            result.add_warning(
                "app.removal",
                "Removal policy 'remove' deletes buckets and tables of the production stage",
            );
        }
    }

    fn validate_naming(config: &StratusConfig, result: &mut ValidationResult) {
        for (i, resource_type) in config.naming.exempt.iter().enumerate() {
            if resource_type.split(':').count() < 3 {
                result.add_warning(
                    format!("naming.exempt[{}]", i),
                    format!(
                        "'{}' does not look like a resource type (expected 'package:module:Type')",
                        resource_type
                    ),
                );
            }
        }
    }

    fn validate_components(config: &StratusConfig, result: &mut ValidationResult) {
        let mut seen = HashSet::new();
        for (i, component) in config.components.iter().enumerate() {
            let field = format!("component[{}]", i);
            if !seen.insert(component.name()) {
                result.add_error(
                    format!("{}.name", field),
                    format!("Component name '{}' is declared more than once", component.name()),
                );
            }
            if !is_identifier(component.name()) {
                result.add_error(
                    format!("{}.name", field),
                    format!(
                        "Invalid component name '{}': use letters, digits and '-', starting with a letter",
                        component.name()
                    ),
                );
            }

            match component {
                ComponentConfig::Function(function) => {
                    if !is_handler(&function.handler) {
                        result.add_error(
                            format!("{}.handler", field),
                            format!(
                                "Invalid handler '{}': expected '{{path}}.{{export}}', e.g. 'src/api.handler'",
                                function.handler
                            ),
                        );
                    }
                    if !RUNTIMES.contains(&function.runtime.as_str()) {
                        result.add_error(
                            format!("{}.runtime", field),
                            format!(
                                "Unsupported runtime '{}': expected one of {}",
                                function.runtime,
                                RUNTIMES.join(", ")
                            ),
                        );
                    }
                    match function.memory_mb() {
                        Some(mb) if (128..=10240).contains(&mb) => {}
                        _ => result.add_error(
                            format!("{}.memory", field),
                            format!(
                                "Invalid memory '{}': must be between 128 MB and 10240 MB",
                                function.memory
                            ),
                        ),
                    }
                    if function.timeout < Duration::from_secs(1)
                        || function.timeout > Duration::from_secs(900)
                    {
                        result.add_error(
                            format!("{}.timeout", field),
                            format!(
                                "Invalid timeout '{}s': must be between 1 and 900 seconds",
                                function.timeout.as_secs()
                            ),
                        );
                    }
                }
                ComponentConfig::Queue(queue) => {
                    if queue.visibility_timeout > Duration::from_secs(12 * 60 * 60) {
                        result.add_error(
                            format!("{}.visibility_timeout", field),
                            "Visibility timeout must be at most 12 hours",
                        );
                    }
                }
                ComponentConfig::Linkable(linkable) => {
                    for (j, statement) in linkable.include.iter().enumerate() {
                        if statement.actions.is_empty() {
                            result.add_warning(
                                format!("{}.include[{}].actions", field, j),
                                "Permission grants no actions",
                            );
                        }
                    }
                }
                ComponentConfig::Bucket(_) => {}
            }
        }
    }

    fn validate_links(config: &StratusConfig, result: &mut ValidationResult) {
        let positions: HashMap<&str, usize> = config
            .components
            .iter()
            .enumerate()
            .map(|(i, c)| (c.name(), i))
            .collect();

        for (i, component) in config.components.iter().enumerate() {
            for target in component.links() {
                match positions.get(target.as_str()) {
                    None => result.add_error(
                        format!("component[{}].link", i),
                        format!(
                            "Component '{}' links to unknown component '{}'",
                            component.name(),
                            target
                        ),
                    ),
                    Some(_) if target == component.name() => result.add_error(
                        format!("component[{}].link", i),
                        format!("Component '{}' cannot link to itself", component.name()),
                    ),
                    Some(&j) if matches!(config.components[j], ComponentConfig::Function(_)) && j > i => {
                        result.add_error(
                            format!("component[{}].link", i),
                            format!(
                                "Component '{}' links to function '{}' declared after it",
                                component.name(),
                                target
                            ),
                        )
                    }
                    Some(_) => {}
                }
            }
        }
    }
}

fn is_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '-')
}

fn is_handler(handler: &str) -> bool {
    match handler.rsplit_once('.') {
        Some((path, export)) => !path.is_empty() && !export.is_empty() && !export.contains('/'),
        None => false,
    }
}
