use crate::components::{Bucket, BucketArgs, Function, FunctionArgs, Queue, QueueArgs};
use anyhow::{Context, Result};
use domain::component::{RemovalPolicy, Synthesis, SynthesisConfig, SynthesisOutput};
use domain::deferred::{Input, Inputs};
use domain::link::{permission, LinkRef, LinkableComponent};
use domain::naming::NamingTable;
use domain::ports::backend::ProvisioningBackend;
use domain::state::{summarize, StateSnapshot};
use infrastructure::{DeployMode, DeployOutcome, LocalEngine};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use stratus_manifest::{ComponentConfig, ConfigValidator, RemovalSetting, StratusConfig, ValidationLevel};
use tracing::{info, warn};

/// A component built from config, kept so later components can link to it.
pub enum Declared {
    Bucket(Bucket),
    Queue(Queue),
    Function(Function),
    Linkable(LinkableComponent),
}

impl Declared {
    pub fn as_link(&self) -> &dyn LinkRef {
        match self {
            Declared::Bucket(c) => c,
            Declared::Queue(c) => c,
            Declared::Function(c) => c,
            Declared::Linkable(c) => c,
        }
    }
}

/// Every component of one config, by name.
#[derive(Default)]
pub struct DeclaredApp {
    components: BTreeMap<String, Declared>,
}

impl DeclaredApp {
    pub fn get(&self, name: &str) -> Option<&Declared> {
        self.components.get(name)
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

pub fn synthesis_config(config: &StratusConfig, previous_versions: BTreeMap<String, u32>) -> SynthesisConfig {
    let mut settings = SynthesisConfig::new(&config.app.name, &config.app.stage);
    settings.region = config.app.region().map(str::to_string);
    settings.removal = match config.app.removal {
        RemovalSetting::Remove => RemovalPolicy::Remove,
        RemovalSetting::Retain => RemovalPolicy::Retain,
        RemovalSetting::RetainAll => RemovalPolicy::RetainAll,
    };
    settings.naming = config
        .naming
        .exempt
        .iter()
        .fold(NamingTable::aws_defaults(), |table, resource_type| {
            table.exempt(resource_type.clone())
        });
    settings.previous_versions = previous_versions;
    settings
}

/// Declares every component of `config`. Functions go last so that they can
/// link to anything declared before them.
pub fn declare(synthesis: &Synthesis, config: &StratusConfig) -> Result<DeclaredApp> {
    let mut app = DeclaredApp::default();
    let (functions, others): (Vec<_>, Vec<_>) = config
        .components
        .iter()
        .partition(|c| matches!(c, ComponentConfig::Function(_)));

    for component in others.into_iter().chain(functions) {
        let declared = declare_one(synthesis, &app, component).with_context(|| {
            format!("Failed to declare {} '{}'", component.kind(), component.name())
        })?;
        app.components.insert(component.name().to_string(), declared);
    }
    Ok(app)
}

fn declare_one(synthesis: &Synthesis, app: &DeclaredApp, component: &ComponentConfig) -> Result<Declared> {
    let declared = match component {
        ComponentConfig::Bucket(bucket) => Declared::Bucket(Bucket::new(
            synthesis,
            &bucket.name,
            BucketArgs {
                versioning: bucket.versioning,
                public: bucket.public,
            },
        )?),
        ComponentConfig::Queue(queue) => Declared::Queue(Queue::new(
            synthesis,
            &queue.name,
            QueueArgs {
                fifo: queue.fifo,
                visibility_timeout: u32::try_from(queue.visibility_timeout.as_secs()).unwrap_or(u32::MAX),
            },
        )?),
        ComponentConfig::Linkable(linkable) => {
            let properties: Inputs = linkable
                .properties
                .iter()
                .map(|(key, value)| (key.clone(), Input::Known(value.clone())))
                .collect();
            let include = linkable
                .include
                .iter()
                .map(|p| permission(p.actions.clone(), p.resources.iter().cloned().map(Input::Known)))
                .collect();
            Declared::Linkable(LinkableComponent::new(synthesis, &linkable.name, properties, include)?)
        }
        ComponentConfig::Function(function) => {
            let mut links: Vec<&dyn LinkRef> = Vec::with_capacity(function.link.len());
            for target in &function.link {
                let declared = app
                    .get(target)
                    .with_context(|| format!("Unknown link target '{}'", target))?;
                links.push(declared.as_link());
            }
            let args = FunctionArgs {
                handler: function.handler.clone(),
                runtime: function.runtime.clone(),
                memory: function
                    .memory_mb()
                    .with_context(|| format!("Invalid memory '{}'", function.memory))?,
                timeout: u32::try_from(function.timeout.as_secs()).unwrap_or(u32::MAX),
                environment: function.environment.clone(),
            };
            Declared::Function(Function::new(synthesis, &function.name, args, &links)?)
        }
    };
    Ok(declared)
}

/// Validates `config` and declares its graph against `backend`.
pub fn synthesize(
    config: &StratusConfig,
    backend: Arc<dyn ProvisioningBackend>,
    previous_versions: BTreeMap<String, u32>,
) -> Result<SynthesisOutput> {
    let validation = ConfigValidator::validate(config);
    for issue in validation.issues.iter().filter(|i| i.level == ValidationLevel::Warning) {
        warn!("{}: {}", issue.field, issue.message);
    }
    if validation.has_errors() {
        let messages: Vec<String> = validation
            .errors()
            .map(|i| format!("{}: {}", i.field, i.message))
            .collect();
        anyhow::bail!("Invalid config:\n  {}", messages.join("\n  "));
    }

    let synthesis = Synthesis::new(synthesis_config(config, previous_versions), backend);
    let declared = declare(&synthesis, config)?;
    let output = synthesis.finish().context("Synthesis failed")?;
    info!(
        "Synthesized {} components ({} declared) and {} resources",
        output.components.len(),
        declared.len(),
        output.resources.len()
    );
    Ok(output)
}

/// `.stratus/state/{stage}.json` under `root`.
pub fn state_path(root: &Path, stage: &str) -> PathBuf {
    root.join("state").join(format!("{}.json", stage))
}

async fn run(config: &StratusConfig, root: &Path, mode: DeployMode, declare_graph: bool) -> Result<DeployOutcome> {
    let path = state_path(root, &config.app.stage);
    let previous = StateSnapshot::load(&path)?;

    let engine = Arc::new(LocalEngine::new());
    let versions = if declare_graph {
        synthesize(config, engine.clone(), previous.versions.clone())?.versions
    } else {
        BTreeMap::new()
    };

    let mut outcome = engine
        .deploy(&config.app.name, &config.app.stage, &previous, mode)
        .await
        .with_context(|| format!("Failed to deploy stage '{}'", config.app.stage))?;
    outcome.state.versions = versions;

    for (kind, count) in summarize(&outcome.changes) {
        info!("{} {}", count, kind);
    }
    if mode == DeployMode::Apply {
        outcome.state.save(&path)?;
    }
    Ok(outcome)
}

/// Changes a deploy would make, without making them.
pub async fn diff(config: &StratusConfig, root: &Path) -> Result<DeployOutcome> {
    run(config, root, DeployMode::Preview, true).await
}

pub async fn deploy(config: &StratusConfig, root: &Path) -> Result<DeployOutcome> {
    run(config, root, DeployMode::Apply, true).await
}

/// Deletes everything the stage deployed, except retained resources.
pub async fn remove(config: &StratusConfig, root: &Path) -> Result<DeployOutcome> {
    run(config, root, DeployMode::Apply, false).await
}
