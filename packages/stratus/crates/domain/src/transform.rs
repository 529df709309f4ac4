use crate::deferred::Inputs;
use crate::error::{Result, SynthError};
use crate::ports::backend::{ResourceArgs, ResourceOptions};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

/// Types whose keys can be shallow-overridden by another value of the same type.
pub trait ShallowMerge {
    fn shallow_merge(&mut self, overrides: Self);
}

impl ShallowMerge for Map<String, Value> {
    fn shallow_merge(&mut self, overrides: Self) {
        self.extend(overrides);
    }
}

impl<K: Ord, V> ShallowMerge for BTreeMap<K, V> {
    fn shallow_merge(&mut self, overrides: Self) {
        self.extend(overrides);
    }
}

impl ShallowMerge for Value {
    fn shallow_merge(&mut self, overrides: Self) {
        match (self, overrides) {
            (Value::Object(base), Value::Object(patch)) => base.extend(patch),
            (slot, patch) => *slot = patch,
        }
    }
}

type MutatorFn<T> = Arc<dyn Fn(&mut T) -> Option<T> + Send + Sync>;

/// A user customization hook over the arguments of something about to be created.
pub enum Transform<T> {
    /// Keys shallow-override the defaults.
    Override(T),
    /// Mutates the defaults in place, or returns a full replacement.
    Mutator(MutatorFn<T>),
}

impl<T: Clone> Clone for Transform<T> {
    fn clone(&self) -> Self {
        match self {
            Transform::Override(value) => Transform::Override(value.clone()),
            Transform::Mutator(f) => Transform::Mutator(Arc::clone(f)),
        }
    }
}

impl<T> Transform<T> {
    pub fn mutator<F>(f: F) -> Self
    where
        F: Fn(&mut T) -> Option<T> + Send + Sync + 'static,
    {
        Transform::Mutator(Arc::new(f))
    }

    /// A mutator that only edits in place.
    pub fn edit<F>(f: F) -> Self
    where
        F: Fn(&mut T) + Send + Sync + 'static,
    {
        Transform::Mutator(Arc::new(move |args: &mut T| {
            f(args);
            None
        }))
    }
}

/// Produces the final arguments from the defaults and an optional hook.
pub fn transform<T: ShallowMerge + Clone>(hook: Option<&Transform<T>>, mut defaults: T) -> T {
    match hook {
        None => defaults,
        Some(Transform::Override(overrides)) => {
            defaults.shallow_merge(overrides.clone());
            defaults
        }
        Some(Transform::Mutator(f)) => match f(&mut defaults) {
            Some(replacement) => replacement,
            None => defaults,
        },
    }
}

/// A step of the resource registration pipeline.
pub type Transformation = Arc<dyn Fn(ResourceArgs) -> Result<ResourceArgs> + Send + Sync>;

/// Hooks registered for a whole synthesis pass.
///
/// Per-type hooks run before global ones; both run after the component
/// pipeline of the resource's ancestors.
#[derive(Default)]
pub struct TransformRegistry {
    by_type: HashMap<String, Vec<Transformation>>,
    global: Vec<Transformation>,
    components: HashMap<String, Vec<Transform<Value>>>,
    created: HashSet<String>,
}

impl TransformRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, resource_type: impl Into<String>, hook: Transformation) -> Result<()> {
        let resource_type = resource_type.into();
        if self.created.contains(&resource_type) {
            return Err(SynthError::LateTransform(resource_type));
        }
        self.by_type.entry(resource_type).or_default().push(hook);
        Ok(())
    }

    /// Registers an in-place edit of every resource of `resource_type`.
    pub fn on<F>(&mut self, resource_type: impl Into<String>, f: F) -> Result<()>
    where
        F: Fn(&mut Inputs, &mut ResourceOptions) + Send + Sync + 'static,
    {
        self.register(
            resource_type,
            Arc::new(move |mut args: ResourceArgs| {
                f(&mut args.inputs, &mut args.options);
                Ok(args)
            }),
        )
    }

    pub fn register_global(&mut self, hook: Transformation) {
        self.global.push(hook);
    }

    /// Registers a hook over the arguments of every component of `kind`.
    pub fn register_component(&mut self, kind: impl Into<String>, hook: Transform<Value>) -> Result<()> {
        let kind = kind.into();
        if self.created.contains(&kind) {
            return Err(SynthError::LateTransform(kind));
        }
        self.components.entry(kind).or_default().push(hook);
        Ok(())
    }

    /// Hooks for a resource type, per-type first. Cloned out so callers can run
    /// them without holding a borrow of the registry.
    pub fn hooks_for(&self, resource_type: &str) -> Vec<Transformation> {
        self.by_type
            .get(resource_type)
            .into_iter()
            .flatten()
            .chain(self.global.iter())
            .cloned()
            .collect()
    }

    pub fn component_hooks(&self, kind: &str) -> Vec<Transform<Value>> {
        self.components.get(kind).cloned().unwrap_or_default()
    }

    /// Records that a resource (or component) of this type exists; later
    /// registrations for it are rejected.
    pub fn mark_created(&mut self, resource_type: &str) {
        self.created.insert(resource_type.to_string());
    }

    pub fn reset(&mut self) {
        self.by_type.clear();
        self.global.clear();
        self.components.clear();
        self.created.clear();
    }
}

/// Runs component hooks over typed arguments through their JSON form.
pub fn apply_component_hooks<T>(hooks: &[Transform<Value>], args: T) -> Result<T>
where
    T: Serialize + DeserializeOwned,
{
    if hooks.is_empty() {
        return Ok(args);
    }
    let mut value = serde_json::to_value(args)?;
    for hook in hooks {
        value = transform(Some(hook), value);
    }
    Ok(serde_json::from_value(value)?)
}
