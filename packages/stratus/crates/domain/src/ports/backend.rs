use crate::deferred::{Deferred, Input, Inputs};
use crate::dynamic::DynamicProvider;
use crate::error::{Result, SynthError};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Options the engine attaches to every resource registration.
#[derive(Clone, Default)]
pub struct ResourceOptions {
    /// URN of the owning component.
    pub parent: Option<String>,
    /// URNs this resource must wait for.
    pub depends_on: Vec<String>,
    pub retain_on_delete: Option<bool>,
    pub delete_before_replace: Option<bool>,
    /// Set for dynamic resources only.
    pub provider: Option<Arc<dyn DynamicProvider>>,
}

impl fmt::Debug for ResourceOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceOptions")
            .field("parent", &self.parent)
            .field("depends_on", &self.depends_on)
            .field("retain_on_delete", &self.retain_on_delete)
            .field("delete_before_replace", &self.delete_before_replace)
            .field("provider", &self.provider.as_ref().map(|p| p.name().to_string()))
            .finish()
    }
}

/// Arguments of an about-to-be-created resource, as seen by transformations.
#[derive(Clone, Debug)]
pub struct ResourceArgs {
    pub resource_type: String,
    pub name: String,
    pub inputs: Inputs,
    pub options: ResourceOptions,
}

impl ResourceArgs {
    pub fn new(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            name: name.into(),
            inputs: Inputs::new(),
            options: ResourceOptions::default(),
        }
    }

    pub fn input(mut self, key: impl Into<String>, value: impl Into<Input<Value>>) -> Self {
        self.inputs.insert(key.into(), value.into());
        self
    }

    pub fn depends_on(mut self, urn: impl Into<String>) -> Self {
        self.options.depends_on.push(urn.into());
        self
    }
}

#[derive(Clone, Debug)]
pub struct ResourceRegistration {
    pub urn: String,
    pub args: ResourceArgs,
}

/// Handle to a registered resource; identity and outputs settle after deploy.
#[derive(Clone, Debug)]
pub struct ResourceRef {
    pub urn: String,
    pub resource_type: String,
    pub name: String,
    pub id: Deferred<String>,
    pub outputs: Deferred<Map<String, Value>>,
}

impl ResourceRef {
    pub fn output(&self, key: &str) -> Deferred<Value> {
        let key = key.to_string();
        let urn = self.urn.clone();
        self.outputs.and_then(move |outputs| {
            outputs
                .get(&key)
                .cloned()
                .ok_or_else(|| SynthError::not_found(format!("output \"{}\"", key), urn))
        })
    }

    pub fn output_string(&self, key: &str) -> Deferred<String> {
        let key_name = key.to_string();
        self.output(key).and_then(move |value| match value {
            Value::String(s) => Ok(s),
            other => Err(SynthError::invalid_input(key_name, other.to_string(), "expected a string")),
        })
    }

    pub fn arn(&self) -> Deferred<String> {
        self.output_string("arn")
    }
}

/// The provisioning backend the engine registers resources with.
///
/// Registration is synchronous; the returned [`ResourceRef`] settles once the
/// backend has actually created (or found) the resource.
pub trait ProvisioningBackend: Send + Sync {
    fn register_resource(&self, registration: ResourceRegistration) -> Result<ResourceRef>;
}
