use crate::lock;
use domain::deferred::{resolve_inputs, Deferred, Resolver};
use domain::dynamic::{DynamicProvider, ResolvedInputs};
use domain::error::{Result, SynthError};
use domain::graph::ExecutionDag;
use domain::ports::backend::{ProvisioningBackend, ResourceRef, ResourceRegistration};
use domain::state::{diff, Change, ChangeKind, ResourceState, StateSnapshot};
use futures::future::join_all;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployMode {
    /// Run dynamic providers and delete removed resources.
    Apply,
    /// Compute the resulting state without side effects.
    Preview,
}

#[derive(Debug, Clone)]
pub struct DeployOutcome {
    pub state: StateSnapshot,
    pub changes: Vec<Change>,
}

impl DeployOutcome {
    pub fn has_changes(&self) -> bool {
        self.changes.iter().any(|c| c.kind != ChangeKind::Same)
    }
}

struct Registered {
    registration: ResourceRegistration,
    id: Deferred<String>,
    id_resolver: Resolver<String>,
    outputs_resolver: Resolver<Map<String, Value>>,
}

/// In-process provisioning backend.
///
/// Registration only records the resource; [`LocalEngine::deploy`] settles
/// every registered resource at once, so resources can consume each other's
/// outputs in any declaration order.
#[derive(Default)]
pub struct LocalEngine {
    registered: Mutex<Vec<Registered>>,
    urns: Mutex<HashSet<String>>,
    providers: Mutex<HashMap<String, Arc<dyn DynamicProvider>>>,
}

impl LocalEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes a provider available for deleting resources that are no longer
    /// declared.
    pub fn register_provider(&self, provider: Arc<dyn DynamicProvider>) {
        lock(&self.providers).insert(provider.name().to_string(), provider);
    }

    pub fn len(&self) -> usize {
        lock(&self.registered).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn urns(&self) -> Vec<String> {
        lock(&self.registered)
            .iter()
            .map(|r| r.registration.urn.clone())
            .collect()
    }

    /// Settles every registered resource against `previous` and removes what
    /// is no longer declared.
    pub async fn deploy(
        &self,
        app: &str,
        stage: &str,
        previous: &StateSnapshot,
        mode: DeployMode,
    ) -> Result<DeployOutcome> {
        let entries: Vec<Registered> = std::mem::take(&mut *lock(&self.registered));
        lock(&self.urns).clear();

        let mut dag = ExecutionDag::new();
        for entry in &entries {
            dag.add_node(entry.registration.urn.clone());
        }
        for entry in &entries {
            let urn = &entry.registration.urn;
            let options = &entry.registration.args.options;
            for dependency in options.depends_on.iter().chain(options.parent.iter()) {
                if !dag.contains(dependency) {
                    return Err(SynthError::not_found("dependency", format!("{} of {}", dependency, urn)));
                }
                dag.add_dependency(urn, dependency);
            }
        }
        dag.check_acyclic()?;

        let ids: HashMap<String, Deferred<String>> = entries
            .iter()
            .map(|e| (e.registration.urn.clone(), e.id.clone()))
            .collect();

        let provisions = entries.into_iter().map(|entry| {
            let waits: Vec<Deferred<String>> = entry
                .registration
                .args
                .options
                .depends_on
                .iter()
                .filter_map(|urn| ids.get(urn).cloned())
                .collect();
            let old = previous.get(&entry.registration.urn);
            self.provision(entry, old, waits, mode)
        });

        let mut state = StateSnapshot::new(app, stage);
        state.versions = previous.versions.clone();
        for result in join_all(provisions).await {
            let resource = result?;
            state.resources.insert(resource.urn.clone(), resource);
        }

        if mode == DeployMode::Apply {
            self.remove_stale(previous, &state).await?;
        }

        let changes = diff(previous, &state);
        for change in changes.iter().filter(|c| c.kind != ChangeKind::Same) {
            info!("{} {}", change.kind, change.urn);
        }
        Ok(DeployOutcome { state, changes })
    }

    async fn provision(
        &self,
        entry: Registered,
        previous: Option<&ResourceState>,
        waits: Vec<Deferred<String>>,
        mode: DeployMode,
    ) -> Result<ResourceState> {
        let Registered {
            registration,
            id_resolver,
            outputs_resolver,
            ..
        } = entry;

        match self.apply(&registration, previous, waits, mode).await {
            Ok(resource) => {
                id_resolver.resolve(resource.id.clone());
                outputs_resolver.resolve(resource.outputs.clone());
                Ok(resource)
            }
            Err(err) => {
                id_resolver.reject(err.clone());
                outputs_resolver.reject(err.clone());
                Err(err)
            }
        }
    }

    async fn apply(
        &self,
        registration: &ResourceRegistration,
        previous: Option<&ResourceState>,
        waits: Vec<Deferred<String>>,
        mode: DeployMode,
    ) -> Result<ResourceState> {
        for wait in waits {
            wait.get().await?;
        }

        let args = &registration.args;
        let inputs = resolve_inputs(&args.inputs).get().await?;
        let unchanged = previous
            .filter(|old| old.inputs == inputs && old.resource_type == args.resource_type);

        let (id, outputs) = match (unchanged, &args.options.provider) {
            (Some(old), _) => (old.id.clone(), old.outputs.clone()),
            (None, Some(provider)) if mode == DeployMode::Apply => match previous {
                Some(old) if old.resource_type == args.resource_type => {
                    let updated = provider.update(&old.id, &old.inputs, &inputs).await?;
                    (old.id.clone(), updated.outputs)
                }
                _ => {
                    let created = provider.create(&inputs).await?;
                    (created.id, created.outputs)
                }
            },
            (None, _) => {
                let id = previous
                    .map(|old| old.id.clone())
                    .unwrap_or_else(|| physical_id(&args.name, &inputs));
                let outputs = simulated_outputs(&args.resource_type, &id, &inputs);
                (id, outputs)
            }
        };

        if let Some(provider) = &args.options.provider {
            lock(&self.providers)
                .entry(provider.name().to_string())
                .or_insert_with(|| Arc::clone(provider));
        }
        debug!("Settled {} as {}", registration.urn, id);

        Ok(ResourceState {
            urn: registration.urn.clone(),
            resource_type: args.resource_type.clone(),
            name: args.name.clone(),
            id,
            inputs,
            outputs,
            parent: args.options.parent.clone(),
            depends_on: args.options.depends_on.clone(),
            retain_on_delete: args.options.retain_on_delete.unwrap_or(false),
            provider: args.options.provider.as_ref().map(|p| p.name().to_string()),
        })
    }

    /// Deletes previous resources that are gone from `desired`, dependents
    /// first. Retained resources are left alone.
    async fn remove_stale(&self, previous: &StateSnapshot, desired: &StateSnapshot) -> Result<()> {
        let stale: BTreeMap<&String, &ResourceState> = previous
            .resources
            .iter()
            .filter(|(urn, _)| !desired.resources.contains_key(*urn))
            .collect();

        let mut dag = ExecutionDag::new();
        for (urn, resource) in &stale {
            dag.add_node(urn.as_str());
            for dependency in resource.depends_on.iter().chain(resource.parent.iter()) {
                if stale.contains_key(dependency) {
                    dag.add_dependency(urn, dependency);
                }
            }
        }

        for urn in dag.resolve_reversed()? {
            let Some(resource) = stale.get(&urn) else {
                continue;
            };
            if resource.retain_on_delete {
                info!("Retaining {}", urn);
                continue;
            }
            if let Some(name) = &resource.provider {
                let provider = lock(&self.providers).get(name).cloned();
                match provider {
                    Some(provider) => provider.delete(&resource.id, &resource.inputs).await?,
                    None => warn!("No provider \"{}\" registered to delete {}", name, urn),
                }
            }
            debug!("Deleted {}", urn);
        }
        Ok(())
    }
}

impl ProvisioningBackend for LocalEngine {
    fn register_resource(&self, registration: ResourceRegistration) -> Result<ResourceRef> {
        if !lock(&self.urns).insert(registration.urn.clone()) {
            return Err(SynthError::DuplicateResource(registration.urn));
        }

        let (id_resolver, id) = Deferred::pending(format!("{} id", registration.urn));
        let (outputs_resolver, outputs) = Deferred::pending(format!("{} outputs", registration.urn));
        let reference = ResourceRef {
            urn: registration.urn.clone(),
            resource_type: registration.args.resource_type.clone(),
            name: registration.args.name.clone(),
            id: id.clone(),
            outputs,
        };

        lock(&self.registered).push(Registered {
            registration,
            id,
            id_resolver,
            outputs_resolver,
        });
        Ok(reference)
    }
}

/// Physical name if one was assigned, else the lowercased logical name.
fn physical_id(logical: &str, inputs: &ResolvedInputs) -> String {
    ["name", "bucket", "clusterIdentifier", "identifier", "keyName", "title"]
        .iter()
        .find_map(|key| inputs.get(*key).and_then(Value::as_str))
        .map(str::to_string)
        .unwrap_or_else(|| logical.to_lowercase())
}

/// Inputs echoed back plus `id` and an `arn` in the provider's format.
fn simulated_outputs(resource_type: &str, id: &str, inputs: &ResolvedInputs) -> Map<String, Value> {
    let service = resource_type
        .split(':')
        .nth(1)
        .and_then(|module| module.split('/').next())
        .unwrap_or("index");

    let mut outputs = inputs.clone();
    outputs.insert("id".into(), Value::String(id.to_string()));
    outputs
        .entry("arn")
        .or_insert_with(|| Value::String(format!("arn:aws:{}:::{}", service, id)));
    outputs
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::ports::backend::ResourceArgs;

    fn register(engine: &LocalEngine, args: ResourceArgs) -> ResourceRef {
        let urn = format!("urn:{}", args.name);
        engine
            .register_resource(ResourceRegistration { urn, args })
            .unwrap()
    }

    #[test]
    fn test_simulated_arn() {
        let outputs = simulated_outputs("aws:s3/bucketV2:BucketV2", "uploads", &Map::new());
        assert_eq!(outputs["arn"], "arn:aws:s3:::uploads");
        assert_eq!(outputs["id"], "uploads");
    }

    #[tokio::test]
    async fn test_outputs_flow_between_resources() {
        let engine = LocalEngine::new();
        let bucket = register(
            &engine,
            ResourceArgs::new("aws:s3/bucketV2:BucketV2", "Uploads").input("bucket", Value::from("uploads")),
        );
        // Declared after its consumer would be fine too; order does not matter.
        let policy = register(
            &engine,
            ResourceArgs::new("aws:iam/policy:Policy", "UploadsPolicy").input("resource", bucket.arn()),
        );

        let outcome = engine
            .deploy("app", "dev", &StateSnapshot::default(), DeployMode::Apply)
            .await
            .unwrap();
        assert_eq!(outcome.changes.len(), 2);
        assert!(outcome.changes.iter().all(|c| c.kind == ChangeKind::Create));
        assert_eq!(
            policy.output_string("resource").get().await.unwrap(),
            "arn:aws:s3:::uploads"
        );
    }

    #[test]
    fn test_duplicate_urn_rejected() {
        let engine = LocalEngine::new();
        register(&engine, ResourceArgs::new("aws:sqs/queue:Queue", "Jobs"));
        let err = engine
            .register_resource(ResourceRegistration {
                urn: "urn:Jobs".into(),
                args: ResourceArgs::new("aws:sqs/queue:Queue", "Jobs"),
            })
            .unwrap_err();
        assert_eq!(err, SynthError::DuplicateResource("urn:Jobs".into()));
    }

    #[tokio::test]
    async fn test_dependency_cycle_detected() {
        let engine = LocalEngine::new();
        register(&engine, ResourceArgs::new("aws:sqs/queue:Queue", "A").depends_on("urn:B"));
        register(&engine, ResourceArgs::new("aws:sqs/queue:Queue", "B").depends_on("urn:A"));

        let err = engine
            .deploy("app", "dev", &StateSnapshot::default(), DeployMode::Apply)
            .await
            .unwrap_err();
        assert!(matches!(err, SynthError::Cycle(_)));
    }

    #[tokio::test]
    async fn test_unknown_dependency() {
        let engine = LocalEngine::new();
        register(&engine, ResourceArgs::new("aws:sqs/queue:Queue", "A").depends_on("urn:Missing"));
        let err = engine
            .deploy("app", "dev", &StateSnapshot::default(), DeployMode::Apply)
            .await
            .unwrap_err();
        assert!(matches!(err, SynthError::NotFound { .. }));
    }
}
