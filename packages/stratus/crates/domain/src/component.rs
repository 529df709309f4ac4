use crate::deferred::{Deferred, Input, Inputs};
use crate::dynamic::{DynamicProvider, DYNAMIC_RESOURCE_TYPE};
use crate::error::{Result, SynthError};
use crate::link::{LinkBundle, LinkDefinition, LinkRef, LinkRegistry, Receiver, ReceiverRegistry};
use crate::naming::{NameSuffix, NameTarget, NamingAuthority, NamingLookup, NamingRule, NamingTable};
use crate::ports::backend::{
    ProvisioningBackend, ResourceArgs, ResourceOptions, ResourceRef, ResourceRegistration,
};
use crate::transform::{apply_component_hooks, Transform, TransformRegistry, Transformation};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

const CLOUDFRONT_FUNCTION: &str = "aws:cloudfront/function:Function";

/// Resource types the `retain` removal policy keeps.
const RETAINED_TYPES: &[&str] = &[
    "aws:s3/bucket:Bucket",
    "aws:s3/bucketV2:BucketV2",
    "aws:dynamodb/table:Table",
];

/// What happens to resources when the app is removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RemovalPolicy {
    Remove,
    /// Keep buckets and tables, remove everything else.
    #[default]
    Retain,
    RetainAll,
}

impl FromStr for RemovalPolicy {
    type Err = SynthError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "remove" => Ok(Self::Remove),
            "retain" => Ok(Self::Retain),
            "retain-all" => Ok(Self::RetainAll),
            other => Err(SynthError::invalid_input(
                "removal policy",
                other,
                "expected one of remove, retain, retain-all",
            )),
        }
    }
}

impl fmt::Display for RemovalPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remove => write!(f, "remove"),
            Self::Retain => write!(f, "retain"),
            Self::RetainAll => write!(f, "retain-all"),
        }
    }
}

impl RemovalPolicy {
    /// Global transformation defaulting `retain_on_delete` according to the policy.
    pub fn transformation(self) -> Transformation {
        Arc::new(move |mut args: ResourceArgs| {
            let retain = match self {
                RemovalPolicy::Remove => false,
                RemovalPolicy::Retain => RETAINED_TYPES.contains(&args.resource_type.as_str()),
                RemovalPolicy::RetainAll => true,
            };
            args.options.retain_on_delete.get_or_insert(retain);
            Ok(args)
        })
    }
}

/// Everything needed to start a synthesis pass.
#[derive(Debug, Clone)]
pub struct SynthesisConfig {
    pub app: String,
    pub stage: String,
    pub region: Option<String>,
    pub removal: RemovalPolicy,
    pub naming: NamingTable,
    /// Component versions recorded by the previous deployment.
    pub previous_versions: BTreeMap<String, u32>,
}

impl SynthesisConfig {
    pub fn new(app: impl Into<String>, stage: impl Into<String>) -> Self {
        Self {
            app: app.into(),
            stage: stage.into(),
            region: None,
            removal: RemovalPolicy::default(),
            naming: NamingTable::aws_defaults(),
            previous_versions: BTreeMap::new(),
        }
    }
}

/// Version gate of a component implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentVersion {
    pub version: u32,
    /// Shown when a deployed older version would be silently upgraded.
    pub upgrade_message: String,
    /// `v{version}` to accept the upgrade.
    pub force_upgrade: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentHandle(usize);

pub struct ComponentSpec {
    pub kind: String,
    pub name: String,
    pub parent: Option<ComponentHandle>,
    pub retain_on_delete: Option<bool>,
    pub linkable: bool,
    pub version: Option<ComponentVersion>,
    /// Applied to every resource created beneath the component.
    pub transformations: Vec<Transformation>,
}

impl ComponentSpec {
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
            parent: None,
            retain_on_delete: None,
            linkable: false,
            version: None,
            transformations: Vec::new(),
        }
    }

    pub fn parent(mut self, parent: ComponentHandle) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn retain_on_delete(mut self, retain: Option<bool>) -> Self {
        self.retain_on_delete = retain;
        self
    }

    pub fn linkable(mut self) -> Self {
        self.linkable = true;
        self
    }

    pub fn version(mut self, version: ComponentVersion) -> Self {
        self.version = Some(version);
        self
    }

    pub fn transformation(mut self, transformation: Transformation) -> Self {
        self.transformations.push(transformation);
        self
    }
}

struct ComponentNode {
    kind: String,
    name: String,
    urn: String,
    parent: Option<ComponentHandle>,
    children: Vec<ComponentHandle>,
    retain_on_delete: Option<bool>,
    transformations: Vec<Transformation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentSummary {
    pub kind: String,
    pub name: String,
    pub urn: String,
    pub parent: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSummary {
    pub urn: String,
    pub resource_type: String,
    pub name: String,
    pub parent: Option<String>,
}

/// The declared graph once every component has been constructed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesisOutput {
    pub components: Vec<ComponentSummary>,
    pub resources: Vec<ResourceSummary>,
    /// Component versions above 1, keyed by component name.
    pub versions: BTreeMap<String, u32>,
}

/// One synthesis pass: the session every component registers with.
///
/// Registries sit behind `RefCell`s and are only borrowed inside
/// synchronous methods, so register-then-check never straddles an await.
pub struct Synthesis {
    naming: NamingAuthority,
    table: NamingTable,
    backend: Arc<dyn ProvisioningBackend>,
    removal: RemovalPolicy,
    previous_versions: BTreeMap<String, u32>,
    transforms: RefCell<TransformRegistry>,
    links: RefCell<LinkRegistry>,
    receivers: RefCell<ReceiverRegistry>,
    components: RefCell<Vec<ComponentNode>>,
    resources: RefCell<Vec<ResourceSummary>>,
    versions: RefCell<BTreeMap<String, u32>>,
    deferred_errors: RefCell<Vec<SynthError>>,
}

struct Ancestor {
    name: String,
    retain_on_delete: Option<bool>,
    transformations: Vec<Transformation>,
}

impl Synthesis {
    pub fn new(config: SynthesisConfig, backend: Arc<dyn ProvisioningBackend>) -> Self {
        let mut naming = NamingAuthority::new(&config.app, &config.stage);
        if let Some(region) = &config.region {
            naming = naming.with_region(region.clone());
        }

        let synthesis = Self {
            naming,
            table: config.naming,
            backend,
            removal: config.removal,
            previous_versions: config.previous_versions,
            transforms: RefCell::new(TransformRegistry::new()),
            links: RefCell::new(LinkRegistry::new()),
            receivers: RefCell::new(ReceiverRegistry::new()),
            components: RefCell::new(Vec::new()),
            resources: RefCell::new(Vec::new()),
            versions: RefCell::new(BTreeMap::new()),
            deferred_errors: RefCell::new(Vec::new()),
        };
        synthesis
            .transforms
            .borrow_mut()
            .register_global(synthesis.removal.transformation());
        synthesis
    }

    pub fn naming(&self) -> &NamingAuthority {
        &self.naming
    }

    pub fn app(&self) -> &str {
        self.naming.app()
    }

    pub fn stage(&self) -> &str {
        self.naming.stage()
    }

    /// Clears every registry for a fresh pass in the same process.
    pub fn reset(&self) {
        let mut transforms = self.transforms.borrow_mut();
        transforms.reset();
        transforms.register_global(self.removal.transformation());
        drop(transforms);

        self.links.borrow_mut().reset();
        self.receivers.borrow_mut().reset();
        self.components.borrow_mut().clear();
        self.resources.borrow_mut().clear();
        self.versions.borrow_mut().clear();
        self.deferred_errors.borrow_mut().clear();
    }

    pub fn register_component(&self, spec: ComponentSpec) -> Result<ComponentHandle> {
        let ComponentSpec {
            kind,
            name,
            parent,
            retain_on_delete,
            linkable,
            version,
            transformations,
        } = spec;

        let (parent_name, parent_urn) = match parent {
            Some(handle) => {
                let components = self.components.borrow();
                let node = Self::node(&components, handle)?;
                if !name.starts_with(&node.name) {
                    return Err(SynthError::UnprefixedLogicalName {
                        component: node.name.clone(),
                        name,
                        resource_type: kind,
                        parent: node.name.clone(),
                    });
                }
                (node.name.clone(), Some(node.urn.clone()))
            }
            None => (self.naming.app().to_string(), None),
        };

        // Children share one name space per parent whatever their kind. Roots
        // only clash on (kind, name); linkable roots are checked across kinds
        // by the link registry once the whole tree is known.
        {
            let components = self.components.borrow();
            let mut siblings = components.iter().filter(|c| c.parent == parent);
            if siblings.any(|c| c.name == name && (parent.is_some() || c.kind == kind)) {
                return Err(SynthError::DuplicateComponentName {
                    parent: parent_name,
                    name,
                    kind,
                });
            }
        }

        if let Some(version) = &version {
            self.check_version(&kind, &name, version)?;
        }

        self.transforms.borrow_mut().mark_created(&kind);

        if linkable && parent.is_none() {
            if let Err(err) = self.links.borrow_mut().register(&name, &kind) {
                self.deferred_errors.borrow_mut().push(err);
            }
        }

        let mut args = ResourceArgs::new(kind.clone(), name.clone());
        args.options.parent = parent_urn.clone();
        args.options.retain_on_delete = retain_on_delete;
        let urn = self.naming.urn(&kind, &name);
        self.backend.register_resource(ResourceRegistration {
            urn: urn.clone(),
            args,
        })?;
        debug!("Registered component {} ({})", name, kind);

        if let Some(version) = version.filter(|v| v.version > 1) {
            self.versions.borrow_mut().insert(name.clone(), version.version);
        }

        let mut components = self.components.borrow_mut();
        let handle = ComponentHandle(components.len());
        components.push(ComponentNode {
            kind,
            name,
            urn,
            parent,
            children: Vec::new(),
            retain_on_delete,
            transformations,
        });
        if let Some(parent) = parent {
            components[parent.0].children.push(handle);
        }
        Ok(handle)
    }

    fn check_version(&self, kind: &str, name: &str, version: &ComponentVersion) -> Result<()> {
        let Some(&deployed) = self.previous_versions.get(name) else {
            return Ok(());
        };
        let class_name = kind.replace(':', ".");
        let mismatch = |message: String| SynthError::VersionMismatch {
            name: name.to_string(),
            message,
        };

        let expected = format!("v{}", version.version);
        if let Some(force) = &version.force_upgrade {
            if *force != expected {
                return Err(mismatch(format!(
                    "The value of \"forceUpgrade\" does not match the version of \"{}\" component. Set \"forceUpgrade\" to \"{}\" to upgrade to the new version.",
                    class_name, expected
                )));
            }
        }
        if deployed < version.version && version.force_upgrade.is_none() {
            return Err(mismatch(version.upgrade_message.clone()));
        }
        if deployed > version.version {
            return Err(mismatch(format!(
                "It seems you are trying to use an older version of \"{}\". You need to recreate this component to roll back.",
                class_name
            )));
        }
        Ok(())
    }

    fn node(components: &[ComponentNode], handle: ComponentHandle) -> Result<&ComponentNode> {
        components
            .get(handle.0)
            .ok_or_else(|| SynthError::not_found("component", format!("#{}", handle.0)))
    }

    pub fn component_name(&self, handle: ComponentHandle) -> Result<String> {
        Ok(Self::node(&self.components.borrow(), handle)?.name.clone())
    }

    pub fn component_urn(&self, handle: ComponentHandle) -> Result<String> {
        Ok(Self::node(&self.components.borrow(), handle)?.urn.clone())
    }

    pub fn children(&self, handle: ComponentHandle) -> Result<Vec<ComponentHandle>> {
        Ok(Self::node(&self.components.borrow(), handle)?.children.clone())
    }

    /// Nearest first.
    fn ancestry(&self, handle: ComponentHandle) -> Result<Vec<Ancestor>> {
        let components = self.components.borrow();
        let mut chain = Vec::new();
        let mut current = Some(handle);
        while let Some(h) = current {
            let node = Self::node(&components, h)?;
            chain.push(Ancestor {
                name: node.name.clone(),
                retain_on_delete: node.retain_on_delete,
                transformations: node.transformations.clone(),
            });
            current = node.parent;
        }
        Ok(chain)
    }

    /// Registers a provider resource beneath `parent`, running it through the
    /// naming checks and every applicable transformation first.
    pub fn create_resource(&self, parent: ComponentHandle, args: ResourceArgs) -> Result<ResourceRef> {
        let ancestry = self.ancestry(parent)?;
        let parent_name = ancestry
            .first()
            .map(|a| a.name.clone())
            .unwrap_or_default();

        if !args.name.starts_with(&parent_name) {
            return Err(SynthError::UnprefixedLogicalName {
                component: parent_name.clone(),
                name: args.name,
                resource_type: args.resource_type,
                parent: parent_name,
            });
        }

        let mut args = self.apply_physical_name(&parent_name, args)?;
        args.options.parent = Some(self.component_urn(parent)?);

        for ancestor in &ancestry {
            if args.resource_type == CLOUDFRONT_FUNCTION {
                args.options.delete_before_replace = Some(false);
            }
            if args.options.retain_on_delete.is_none() {
                args.options.retain_on_delete = ancestor.retain_on_delete;
            }
            for transformation in &ancestor.transformations {
                args = transformation(args)?;
            }
        }

        let hooks = self.transforms.borrow().hooks_for(&args.resource_type);
        for hook in hooks {
            args = hook(args)?;
        }
        self.transforms.borrow_mut().mark_created(&args.resource_type);

        let urn = self.naming.urn(&args.resource_type, &args.name);
        let summary = ResourceSummary {
            urn: urn.clone(),
            resource_type: args.resource_type.clone(),
            name: args.name.clone(),
            parent: args.options.parent.clone(),
        };
        let reference = self.backend.register_resource(ResourceRegistration { urn, args })?;
        debug!("Registered {} ({})", summary.name, summary.resource_type);
        self.resources.borrow_mut().push(summary);
        Ok(reference)
    }

    /// Registers a resource whose lifecycle is run by `provider`, after every
    /// resource in `depends_on`.
    pub fn create_dynamic(
        &self,
        parent: ComponentHandle,
        name: &str,
        provider: Arc<dyn DynamicProvider>,
        inputs: Inputs,
        depends_on: &[String],
    ) -> Result<ResourceRef> {
        let mut args = ResourceArgs::new(DYNAMIC_RESOURCE_TYPE, name);
        args.inputs = inputs;
        args.options.depends_on = depends_on.to_vec();
        args.options.provider = Some(provider);
        self.create_resource(parent, args)
    }

    fn apply_physical_name(&self, component: &str, mut args: ResourceArgs) -> Result<ResourceArgs> {
        let rule = match self.table.lookup(&args.resource_type) {
            NamingLookup::Exempt => return Ok(args),
            NamingLookup::Rule(rule) => rule,
            NamingLookup::Unknown => {
                return Err(SynthError::UnprefixedPhysicalName {
                    component: component.to_string(),
                    name: args.name,
                    resource_type: args.resource_type,
                })
            }
        };

        match &rule.target {
            NameTarget::Field(field) => {
                if is_set(args.inputs.get(field)) {
                    return Ok(args);
                }
                let name = self.physical_name(rule, &args.name, &args.inputs)?;
                args.inputs.insert(field.clone(), name);
            }
            NameTarget::TagName => {
                let name = self.physical_name(rule, &args.name, &args.inputs)?;
                let tags = match args.inputs.remove("tags") {
                    None => Input::Known(Value::Object(Map::new())),
                    Some(tags) => tags,
                };
                if tags.known().and_then(|t| t.get("Name")).is_some() {
                    args.inputs.insert("tags".into(), tags);
                    return Ok(args);
                }
                let merged = tags.to_deferred().combine(&name.to_deferred(), |tags, name| {
                    let mut tags = match tags {
                        Value::Object(map) => map,
                        _ => Map::new(),
                    };
                    tags.entry("Name").or_insert(name);
                    Value::Object(tags)
                });
                args.inputs.insert("tags".into(), Input::Deferred(merged));
            }
        }
        Ok(args)
    }

    fn physical_name(&self, rule: &NamingRule, logical: &str, inputs: &Inputs) -> Result<Input<Value>> {
        let suffix = match &rule.suffix {
            NameSuffix::None => Input::Known(String::new()),
            NameSuffix::Region => Input::Known(self.naming.region_suffix()),
            NameSuffix::FifoWhen(flag) => match inputs.get(flag) {
                None => Input::Known(String::new()),
                Some(value) => value.map(|v| fifo_suffix(&v)),
            },
        };

        match suffix {
            Input::Known(suffix) => {
                let name = rule.finish(self.naming.prefix_name(rule.max_length, logical, &suffix)?);
                Ok(Input::Known(Value::String(name)))
            }
            Input::Deferred(suffix) => {
                let naming = self.naming.clone();
                let rule = rule.clone();
                let logical = logical.to_string();
                Ok(Input::Deferred(suffix.and_then(move |suffix| {
                    let name = naming.prefix_name(rule.max_length, &logical, &suffix)?;
                    Ok(Value::String(rule.finish(name)))
                })))
            }
        }
    }

    /// Runs the hooks registered for component `kind` over its arguments.
    pub fn component_args<T>(&self, kind: &str, args: T) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
    {
        let hooks = self.transforms.borrow().component_hooks(kind);
        apply_component_hooks(&hooks, args)
    }

    pub fn transform(&self, resource_type: &str, hook: Transformation) -> Result<()> {
        self.transforms.borrow_mut().register(resource_type, hook)
    }

    pub fn on<F>(&self, resource_type: &str, f: F) -> Result<()>
    where
        F: Fn(&mut Inputs, &mut ResourceOptions) + Send + Sync + 'static,
    {
        self.transforms.borrow_mut().on(resource_type, f)
    }

    pub fn transform_global(&self, hook: Transformation) {
        self.transforms.borrow_mut().register_global(hook);
    }

    pub fn transform_component(&self, kind: &str, hook: Transform<Value>) -> Result<()> {
        self.transforms.borrow_mut().register_component(kind, hook)
    }

    pub fn build_links(&self, targets: &[&dyn LinkRef]) -> Result<LinkBundle> {
        self.links.borrow_mut().build(targets)
    }

    pub fn wrap<F>(&self, resource_type: &str, cb: F)
    where
        F: Fn(&ResourceRef) -> LinkDefinition + Send + Sync + 'static,
    {
        self.links.borrow_mut().wrap(resource_type, cb);
    }

    pub fn register_receiver(
        &self,
        key: &str,
        links: Vec<String>,
        environment: Deferred<BTreeMap<String, String>>,
    ) {
        self.receivers.borrow_mut().register(key, links, environment);
    }

    pub fn receiver(&self, key: &str) -> Option<Receiver> {
        self.receivers.borrow().get(key)
    }

    /// The declared graph, or the first declaration error deferred to the end
    /// of the pass.
    pub fn finish(&self) -> Result<SynthesisOutput> {
        if let Some(err) = self.deferred_errors.borrow().first() {
            return Err(err.clone());
        }

        let components = self.components.borrow();
        let summaries = components
            .iter()
            .map(|node| ComponentSummary {
                kind: node.kind.clone(),
                name: node.name.clone(),
                urn: node.urn.clone(),
                parent: node.parent.and_then(|p| components.get(p.0)).map(|p| p.urn.clone()),
            })
            .collect();

        Ok(SynthesisOutput {
            components: summaries,
            resources: self.resources.borrow().clone(),
            versions: self.versions.borrow().clone(),
        })
    }
}

fn is_set(input: Option<&Input<Value>>) -> bool {
    match input {
        None => false,
        Some(Input::Known(Value::Null)) => false,
        Some(Input::Known(Value::String(s))) => !s.is_empty(),
        Some(_) => true,
    }
}

fn fifo_suffix(flag: &Value) -> String {
    match flag {
        Value::Bool(true) => ".fifo".to_string(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        registrations: Mutex<Vec<ResourceRegistration>>,
    }

    impl Recorder {
        fn find(&self, name: &str) -> Option<ResourceRegistration> {
            self.registrations
                .lock()
                .unwrap()
                .iter()
                .find(|r| r.args.name == name)
                .cloned()
        }

        fn count(&self) -> usize {
            self.registrations.lock().unwrap().len()
        }
    }

    impl ProvisioningBackend for Recorder {
        fn register_resource(&self, registration: ResourceRegistration) -> Result<ResourceRef> {
            let reference = ResourceRef {
                urn: registration.urn.clone(),
                resource_type: registration.args.resource_type.clone(),
                name: registration.args.name.clone(),
                id: Deferred::of(registration.args.name.clone()),
                outputs: Deferred::of(Map::new()),
            };
            self.registrations.lock().unwrap().push(registration);
            Ok(reference)
        }
    }

    fn synthesis() -> (Arc<Recorder>, Synthesis) {
        let recorder = Arc::new(Recorder::default());
        let mut config = SynthesisConfig::new("app", "dev");
        config.region = Some("us-east-1".into());
        let synthesis = Synthesis::new(config, recorder.clone());
        (recorder, synthesis)
    }

    fn known_string(registration: &ResourceRegistration, key: &str) -> String {
        match registration.args.inputs.get(key) {
            Some(Input::Known(Value::String(s))) => s.clone(),
            other => panic!("{} is not a known string: {:?}", key, other),
        }
    }

    #[test]
    fn test_resource_names_must_be_prefixed() {
        let (recorder, synthesis) = synthesis();
        let api = synthesis.register_component(ComponentSpec::new("stratus:aws:Function", "Api")).unwrap();
        let before = recorder.count();

        let err = synthesis
            .create_resource(api, ResourceArgs::new("aws:lambda/function:Function", "Handler"))
            .unwrap_err();
        assert!(matches!(err, SynthError::UnprefixedLogicalName { .. }));
        assert_eq!(recorder.count(), before);
    }

    #[test]
    fn test_physical_name_applied() {
        let (recorder, synthesis) = synthesis();
        let api = synthesis.register_component(ComponentSpec::new("stratus:aws:Function", "Api")).unwrap();
        synthesis
            .create_resource(api, ResourceArgs::new("aws:lambda/function:Function", "ApiFunction"))
            .unwrap();

        let registration = recorder.find("ApiFunction").unwrap();
        assert_eq!(known_string(&registration, "name"), "app-dev-ApiFunction");
        assert_eq!(registration.args.options.parent.as_deref(), Some("urn:stratus:dev:app::stratus:aws:Function::Api"));
    }

    #[test]
    fn test_explicit_physical_name_is_kept() {
        let (recorder, synthesis) = synthesis();
        let api = synthesis.register_component(ComponentSpec::new("stratus:aws:Function", "Api")).unwrap();
        synthesis
            .create_resource(
                api,
                ResourceArgs::new("aws:lambda/function:Function", "ApiFunction")
                    .input("name", Value::from("hand-picked")),
            )
            .unwrap();
        assert_eq!(known_string(&recorder.find("ApiFunction").unwrap(), "name"), "hand-picked");
    }

    #[test]
    fn test_role_gets_region_suffix() {
        let (recorder, synthesis) = synthesis();
        let api = synthesis.register_component(ComponentSpec::new("stratus:aws:Function", "Api")).unwrap();
        synthesis
            .create_resource(api, ResourceArgs::new("aws:iam/role:Role", "ApiRole"))
            .unwrap();
        assert_eq!(
            known_string(&recorder.find("ApiRole").unwrap(), "name"),
            "app-dev-ApiRole-useast1"
        );
    }

    #[tokio::test]
    async fn test_fifo_suffix_follows_deferred_flag() {
        let (recorder, synthesis) = synthesis();
        let jobs = synthesis.register_component(ComponentSpec::new("stratus:aws:Queue", "Jobs")).unwrap();
        let (resolver, fifo) = Deferred::<Value>::pending("fifo");
        synthesis
            .create_resource(
                jobs,
                ResourceArgs::new("aws:sqs/queue:Queue", "JobsQueue").input("fifoQueue", fifo),
            )
            .unwrap();
        resolver.resolve(Value::Bool(true));

        let registration = recorder.find("JobsQueue").unwrap();
        let name = registration.args.inputs["name"].to_deferred().get().await.unwrap();
        assert_eq!(name, "app-dev-JobsQueue.fifo");
    }

    #[tokio::test]
    async fn test_tag_name_merges_existing_tags() {
        let (recorder, synthesis) = synthesis();
        let vpc = synthesis.register_component(ComponentSpec::new("stratus:aws:Vpc", "Net")).unwrap();
        synthesis
            .create_resource(
                vpc,
                ResourceArgs::new("aws:ec2/vpc:Vpc", "NetVpc")
                    .input("tags", serde_json::json!({ "team": "core" })),
            )
            .unwrap();

        let tags = recorder.find("NetVpc").unwrap().args.inputs["tags"]
            .to_deferred()
            .get()
            .await
            .unwrap();
        assert_eq!(tags, serde_json::json!({ "team": "core", "Name": "app-dev-NetVpc" }));
    }

    #[test]
    fn test_unknown_type_fails_closed() {
        let (_, synthesis) = synthesis();
        let api = synthesis.register_component(ComponentSpec::new("stratus:aws:Function", "Api")).unwrap();
        let err = synthesis
            .create_resource(api, ResourceArgs::new("aws:made/up:Thing", "ApiThing"))
            .unwrap_err();
        assert!(matches!(err, SynthError::UnprefixedPhysicalName { .. }));
    }

    #[test]
    fn test_duplicate_siblings_rejected() {
        let (recorder, synthesis) = synthesis();
        let site = synthesis.register_component(ComponentSpec::new("stratus:aws:Site", "Site")).unwrap();
        synthesis
            .register_component(ComponentSpec::new("stratus:aws:Cdn", "SiteCdn").parent(site))
            .unwrap();
        let err = synthesis
            .register_component(ComponentSpec::new("stratus:aws:Cdn", "SiteCdn").parent(site))
            .unwrap_err();
        assert!(matches!(err, SynthError::DuplicateComponentName { .. }));

        synthesis
            .register_component(ComponentSpec::new("stratus:aws:Cdn", "SiteWeb").parent(site))
            .unwrap();
        let err = synthesis
            .register_component(ComponentSpec::new("stratus:aws:Router", "SiteWeb").parent(site))
            .unwrap_err();
        assert!(matches!(err, SynthError::DuplicateComponentName { .. }));
        assert_eq!(recorder.count(), 0);
    }

    #[test]
    fn test_retention_inherited_and_policy_defaults() {
        let (recorder, synthesis) = synthesis();
        let kept = synthesis
            .register_component(ComponentSpec::new("stratus:aws:Queue", "Kept").retain_on_delete(Some(true)))
            .unwrap();
        let plain = synthesis.register_component(ComponentSpec::new("stratus:aws:Bucket", "Plain")).unwrap();

        synthesis
            .create_resource(kept, ResourceArgs::new("aws:sqs/queue:Queue", "KeptQueue"))
            .unwrap();
        synthesis
            .create_resource(plain, ResourceArgs::new("aws:s3/bucketV2:BucketV2", "PlainBucket"))
            .unwrap();
        synthesis
            .create_resource(plain, ResourceArgs::new("aws:iam/policy:Policy", "PlainPolicy"))
            .unwrap();

        let retain = |name: &str| recorder.find(name).unwrap().args.options.retain_on_delete;
        assert_eq!(retain("KeptQueue"), Some(true));
        assert_eq!(retain("PlainBucket"), Some(true));
        assert_eq!(retain("PlainPolicy"), Some(false));
    }

    #[test]
    fn test_cloudfront_function_never_deleted_first() {
        let (recorder, synthesis) = synthesis();
        let cdn = synthesis.register_component(ComponentSpec::new("stratus:aws:Cdn", "Cdn")).unwrap();
        synthesis
            .create_resource(cdn, ResourceArgs::new(CLOUDFRONT_FUNCTION, "CdnRewrite"))
            .unwrap();
        assert_eq!(
            recorder.find("CdnRewrite").unwrap().args.options.delete_before_replace,
            Some(false)
        );
    }

    struct Noop;

    #[async_trait::async_trait]
    impl DynamicProvider for Noop {
        fn name(&self) -> &str {
            "noop"
        }

        async fn create(&self, _inputs: &crate::dynamic::ResolvedInputs) -> Result<crate::dynamic::CreateResult> {
            Ok(crate::dynamic::CreateResult {
                id: "noop".into(),
                outputs: Map::new(),
            })
        }

        async fn update(
            &self,
            _id: &str,
            _old: &crate::dynamic::ResolvedInputs,
            _new: &crate::dynamic::ResolvedInputs,
        ) -> Result<crate::dynamic::UpdateResult> {
            Ok(crate::dynamic::UpdateResult { outputs: Map::new() })
        }
    }

    #[test]
    fn test_dynamic_resources_skip_naming_and_keep_dependencies() {
        let (recorder, synthesis) = synthesis();
        let api = synthesis.register_component(ComponentSpec::new("stratus:aws:Function", "Api")).unwrap();
        let function = synthesis
            .create_resource(api, ResourceArgs::new("aws:lambda/function:Function", "ApiFunction"))
            .unwrap();

        let mut inputs = Inputs::new();
        inputs.insert("functionName".into(), Input::Known(Value::from("app-dev-ApiFunction")));
        synthesis
            .create_dynamic(api, "ApiCode", Arc::new(Noop), inputs, &[function.urn.clone()])
            .unwrap();

        let code = recorder.find("ApiCode").unwrap();
        assert_eq!(code.args.resource_type, DYNAMIC_RESOURCE_TYPE);
        assert_eq!(code.args.options.depends_on, vec![function.urn]);
        assert_eq!(code.args.options.provider.as_ref().map(|p| p.name().to_string()), Some("noop".into()));
        assert!(!code.args.inputs.contains_key("name"));

        let err = synthesis
            .create_dynamic(api, "Code", Arc::new(Noop), Inputs::new(), &[])
            .unwrap_err();
        assert!(matches!(err, SynthError::UnprefixedLogicalName { .. }));
    }

    #[test]
    fn test_component_transformations_run_nearest_first() {
        let (recorder, synthesis) = synthesis();
        let tag = |label: &'static str| -> Transformation {
            Arc::new(move |args: ResourceArgs| {
                let trail = match args.inputs.get("trail").and_then(|i| i.known()) {
                    Some(Value::String(s)) => format!("{},{}", s, label),
                    _ => label.to_string(),
                };
                Ok(args.input("trail", Value::String(trail)))
            })
        };
        let outer = synthesis
            .register_component(ComponentSpec::new("stratus:aws:Site", "Web").transformation(tag("outer")))
            .unwrap();
        let inner = synthesis
            .register_component(
                ComponentSpec::new("stratus:aws:Cdn", "WebCdn")
                    .parent(outer)
                    .transformation(tag("inner")),
            )
            .unwrap();
        synthesis
            .create_resource(inner, ResourceArgs::new("aws:cloudfront/distribution:Distribution", "WebCdnDistribution"))
            .unwrap();
        assert_eq!(
            known_string(&recorder.find("WebCdnDistribution").unwrap(), "trail"),
            "inner,outer"
        );
    }

    #[test]
    fn test_type_hook_after_creation_is_rejected() {
        let (_, synthesis) = synthesis();
        let jobs = synthesis.register_component(ComponentSpec::new("stratus:aws:Queue", "Jobs")).unwrap();
        synthesis
            .create_resource(jobs, ResourceArgs::new("aws:sqs/queue:Queue", "JobsQueue"))
            .unwrap();
        let err = synthesis.on("aws:sqs/queue:Queue", |_, _| {}).unwrap_err();
        assert_eq!(err, SynthError::LateTransform("aws:sqs/queue:Queue".into()));
    }

    #[test]
    fn test_version_gate() {
        let recorder = Arc::new(Recorder::default());
        let mut config = SynthesisConfig::new("app", "dev");
        config.previous_versions.insert("Db".into(), 1);
        config.previous_versions.insert("Old".into(), 3);
        let synthesis = Synthesis::new(config, recorder);

        let v2 = |force: Option<&str>| ComponentVersion {
            version: 2,
            upgrade_message: "Db v2 changes storage. Set forceUpgrade to \"v2\".".into(),
            force_upgrade: force.map(String::from),
        };

        let err = synthesis
            .register_component(ComponentSpec::new("stratus:aws:Postgres", "Db").version(v2(None)))
            .unwrap_err();
        assert_eq!(
            err,
            SynthError::VersionMismatch {
                name: "Db".into(),
                message: "Db v2 changes storage. Set forceUpgrade to \"v2\".".into()
            }
        );
        assert!(synthesis
            .register_component(ComponentSpec::new("stratus:aws:Postgres", "Db").version(v2(Some("v3"))))
            .is_err());
        assert!(synthesis
            .register_component(ComponentSpec::new("stratus:aws:Postgres", "Old").version(v2(Some("v2"))))
            .is_err());

        synthesis
            .register_component(ComponentSpec::new("stratus:aws:Postgres", "Db").version(v2(Some("v2"))))
            .unwrap();
        assert_eq!(synthesis.finish().unwrap().versions.get("Db"), Some(&2));
    }

    #[test]
    fn test_duplicate_linkables_surface_at_finish() {
        let (_, synthesis) = synthesis();
        synthesis
            .register_component(ComponentSpec::new("stratus:aws:Bucket", "Shared").linkable())
            .unwrap();
        synthesis
            .register_component(ComponentSpec::new("stratus:aws:Queue", "Shared").linkable())
            .unwrap();
        assert_eq!(
            synthesis.finish().unwrap_err(),
            SynthError::DuplicateLinkName("Shared".into())
        );

        synthesis.reset();
        synthesis
            .register_component(ComponentSpec::new("stratus:aws:Bucket", "Shared").linkable())
            .unwrap();
        assert!(synthesis.finish().is_ok());
    }

    #[test]
    fn test_same_root_kind_and_name_rejected() {
        let (_, synthesis) = synthesis();
        synthesis.register_component(ComponentSpec::new("stratus:aws:Cdn", "Web")).unwrap();
        let err = synthesis
            .register_component(ComponentSpec::new("stratus:aws:Cdn", "Web"))
            .unwrap_err();
        assert!(matches!(err, SynthError::DuplicateComponentName { .. }));
    }
}
