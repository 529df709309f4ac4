use crate::component::{ComponentHandle, ComponentSpec, Synthesis};
use crate::deferred::{resolve_inputs, Deferred, Input, Inputs};
use crate::error::{Result, SynthError};
use crate::ports::backend::ResourceRef;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Prefix of the environment variable each link is exposed under.
pub const ENVIRONMENT_PREFIX: &str = "STRATUS_RESOURCE_";

/// An IAM-style grant a consumer receives by linking to something.
#[derive(Clone, Debug)]
pub struct PermissionStatement {
    pub actions: Vec<String>,
    pub resources: Deferred<Vec<String>>,
}

impl PermissionStatement {
    /// `{ "Effect": "Allow", "Action": [...], "Resource": [...] }`
    pub fn to_policy_statement(&self) -> Deferred<Value> {
        let actions = self.actions.clone();
        self.resources.map(move |resources| {
            json!({
                "Effect": "Allow",
                "Action": actions,
                "Resource": resources,
            })
        })
    }
}

pub fn permission<A, R>(actions: A, resources: R) -> PermissionStatement
where
    A: IntoIterator,
    A::Item: Into<String>,
    R: IntoIterator<Item = Input<String>>,
{
    PermissionStatement {
        actions: actions.into_iter().map(Into::into).collect(),
        resources: Deferred::all(resources.into_iter().map(|r| r.to_deferred())),
    }
}

/// What a linkable thing hands to whatever links to it.
#[derive(Clone, Debug)]
pub struct LinkDefinition {
    pub properties: Deferred<Map<String, Value>>,
    pub include: Vec<PermissionStatement>,
}

pub trait Linkable {
    /// Runtime-visible name; unique across the app for top-level linkables.
    fn link_name(&self) -> &str;
    fn link_type(&self) -> &str;
    fn get_link(&self) -> LinkDefinition;
}

pub trait PermissionSource {
    fn get_permissions(&self) -> Vec<PermissionStatement>;
}

/// Anything that can appear in a `link` list. Capabilities are optional; a
/// reference exposing none of them is rejected by [`LinkRegistry::build`].
pub trait LinkRef {
    fn reference_name(&self) -> String;

    fn as_linkable(&self) -> Option<&dyn Linkable> {
        None
    }

    fn as_permission_source(&self) -> Option<&dyn PermissionSource> {
        None
    }

    /// Raw resources become linkable through [`LinkRegistry::wrap`].
    fn as_resource(&self) -> Option<&ResourceRef> {
        None
    }
}

impl LinkRef for ResourceRef {
    fn reference_name(&self) -> String {
        format!("{} ({})", self.name, self.resource_type)
    }

    fn as_resource(&self) -> Option<&ResourceRef> {
        Some(self)
    }
}

pub type LinkWrapper = Arc<dyn Fn(&ResourceRef) -> LinkDefinition + Send + Sync>;

#[derive(Clone, Debug)]
pub struct Link {
    pub name: String,
    /// Declared properties plus the `type` tag.
    pub properties: Deferred<Map<String, Value>>,
}

impl Link {
    fn new(name: &str, link_type: &str, definition: &LinkDefinition) -> Self {
        let link_type = link_type.to_string();
        Self {
            name: name.to_string(),
            properties: definition.properties.map(move |mut properties| {
                properties.insert("type".into(), Value::String(link_type));
                properties
            }),
        }
    }

    pub fn environment_key(&self) -> String {
        format!("{}{}", ENVIRONMENT_PREFIX, self.name)
    }
}

/// Result of resolving a consumer's `link` list, in declaration order.
#[derive(Clone, Debug, Default)]
pub struct LinkBundle {
    links: Vec<Link>,
    permissions: Vec<PermissionStatement>,
}

impl LinkBundle {
    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn names(&self) -> Vec<String> {
        self.links.iter().map(|l| l.name.clone()).collect()
    }

    pub fn permissions(&self) -> &[PermissionStatement] {
        &self.permissions
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty() && self.permissions.is_empty()
    }

    /// One `STRATUS_RESOURCE_{name}` variable per link, valued with the JSON
    /// encoded properties.
    pub fn environment(&self) -> Deferred<BTreeMap<String, String>> {
        let entries = self.links.iter().map(|link| {
            let key = link.environment_key();
            link.properties
                .and_then(move |properties| Ok((key, serde_json::to_string(&properties)?)))
        });
        Deferred::all(entries).map(|pairs| pairs.into_iter().collect())
    }

    /// IAM policy document granting every collected permission.
    pub fn policy_document(&self) -> Deferred<Value> {
        let statements = self.permissions.iter().map(PermissionStatement::to_policy_statement);
        Deferred::all(statements).map(|statements| {
            json!({
                "Version": "2012-10-17",
                "Statement": statements,
            })
        })
    }
}

/// Top-level linkable names and per-pass link cache.
#[derive(Default)]
pub struct LinkRegistry {
    names: HashMap<String, String>,
    cache: HashMap<String, LinkDefinition>,
    wrapped: HashMap<String, LinkWrapper>,
}

impl LinkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.names.clear();
        self.cache.clear();
        self.wrapped.clear();
    }

    /// Claims `name` for a top-level linkable of `kind`.
    pub fn register(&mut self, name: &str, kind: &str) -> Result<()> {
        if self.names.contains_key(name) {
            return Err(SynthError::DuplicateLinkName(name.to_string()));
        }
        self.names.insert(name.to_string(), kind.to_string());
        Ok(())
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    /// Makes every resource of `resource_type` linkable.
    pub fn wrap<F>(&mut self, resource_type: impl Into<String>, cb: F)
    where
        F: Fn(&ResourceRef) -> LinkDefinition + Send + Sync + 'static,
    {
        self.wrapped.insert(resource_type.into(), Arc::new(cb));
    }

    fn definition(&mut self, name: &str, compute: impl FnOnce() -> LinkDefinition) -> LinkDefinition {
        self.cache
            .entry(name.to_string())
            .or_insert_with(compute)
            .clone()
    }

    pub fn build(&mut self, targets: &[&dyn LinkRef]) -> Result<LinkBundle> {
        let mut bundle = LinkBundle::default();
        for target in targets {
            let mut matched = false;

            if let Some(linkable) = target.as_linkable() {
                let definition = self.definition(linkable.link_name(), || linkable.get_link());
                bundle
                    .links
                    .push(Link::new(linkable.link_name(), linkable.link_type(), &definition));
                bundle.permissions.extend(definition.include);
                matched = true;
            } else if let Some(resource) = target.as_resource() {
                if let Some(wrapper) = self.wrapped.get(&resource.resource_type).cloned() {
                    let definition = self.definition(&resource.name, || wrapper(resource));
                    bundle
                        .links
                        .push(Link::new(&resource.name, &resource.resource_type, &definition));
                    bundle.permissions.extend(definition.include);
                    matched = true;
                }
            }

            if let Some(source) = target.as_permission_source() {
                bundle.permissions.extend(source.get_permissions());
                matched = true;
            }

            if !matched {
                return Err(SynthError::NotLinkable(target.reference_name()));
            }
        }
        Ok(bundle)
    }
}

/// Link names and environment a build step must inject into one artifact.
#[derive(Clone, Debug)]
pub struct Receiver {
    pub links: Vec<String>,
    pub environment: Deferred<BTreeMap<String, String>>,
}

/// Build artifact identity (e.g. a handler path) to its [`Receiver`].
#[derive(Default)]
pub struct ReceiverRegistry {
    receivers: HashMap<String, Receiver>,
}

impl ReceiverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last registration for a key wins.
    pub fn register(
        &mut self,
        key: impl Into<String>,
        links: Vec<String>,
        environment: Deferred<BTreeMap<String, String>>,
    ) {
        self.receivers.insert(key.into(), Receiver { links, environment });
    }

    pub fn get(&self, key: &str) -> Option<Receiver> {
        self.receivers.get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.receivers.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn reset(&mut self) {
        self.receivers.clear();
    }
}

/// Links arbitrary values, optionally bundling permissions.
pub struct LinkableComponent {
    handle: ComponentHandle,
    name: String,
    properties: Deferred<Map<String, Value>>,
    include: Vec<PermissionStatement>,
}

impl LinkableComponent {
    pub const KIND: &'static str = "stratus:stratus:Linkable";
    const LINK_TYPE: &'static str = "stratus.stratus.Linkable";

    pub fn new(
        synthesis: &Synthesis,
        name: &str,
        properties: Inputs,
        include: Vec<PermissionStatement>,
    ) -> Result<Self> {
        let handle = synthesis.register_component(ComponentSpec::new(Self::KIND, name).linkable())?;
        Ok(Self {
            handle,
            name: name.to_string(),
            properties: resolve_inputs(&properties),
            include,
        })
    }

    pub fn handle(&self) -> ComponentHandle {
        self.handle
    }
}

impl Linkable for LinkableComponent {
    fn link_name(&self) -> &str {
        &self.name
    }

    fn link_type(&self) -> &str {
        Self::LINK_TYPE
    }

    fn get_link(&self) -> LinkDefinition {
        LinkDefinition {
            properties: self.properties.clone(),
            include: self.include.clone(),
        }
    }
}

impl LinkRef for LinkableComponent {
    fn reference_name(&self) -> String {
        format!("{} ({})", self.name, Self::KIND)
    }

    fn as_linkable(&self) -> Option<&dyn Linkable> {
        Some(self)
    }
}
