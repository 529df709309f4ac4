use async_trait::async_trait;
use domain::dynamic::{CreateResult, DynamicProvider, ResolvedInputs, UpdateResult, DYNAMIC_RESOURCE_TYPE};
use domain::error::Result;
use domain::ports::backend::{ProvisioningBackend, ResourceArgs, ResourceRef, ResourceRegistration};
use domain::state::{ChangeKind, StateSnapshot};
use infrastructure::{DeployMode, LocalEngine};
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct Journal(Mutex<Vec<String>>);

impl Journal {
    fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

#[async_trait]
impl DynamicProvider for Journal {
    fn name(&self) -> &str {
        "Journal"
    }

    async fn create(&self, inputs: &ResolvedInputs) -> Result<CreateResult> {
        let key = inputs["key"].as_str().unwrap_or_default().to_string();
        self.0.lock().unwrap().push(format!("create {}", key));
        let mut outputs = Map::new();
        outputs.insert("seen".into(), Value::String(key.clone()));
        Ok(CreateResult { id: key, outputs })
    }

    async fn update(&self, id: &str, _old: &ResolvedInputs, new: &ResolvedInputs) -> Result<UpdateResult> {
        let key = new["key"].as_str().unwrap_or_default().to_string();
        self.0.lock().unwrap().push(format!("update {} -> {}", id, key));
        let mut outputs = Map::new();
        outputs.insert("seen".into(), Value::String(key));
        Ok(UpdateResult { outputs })
    }

    async fn delete(&self, id: &str, _inputs: &ResolvedInputs) -> Result<()> {
        self.0.lock().unwrap().push(format!("delete {}", id));
        Ok(())
    }
}

fn register(engine: &LocalEngine, args: ResourceArgs) -> ResourceRef {
    let urn = format!("urn:{}", args.name);
    engine.register_resource(ResourceRegistration { urn, args }).unwrap()
}

fn dynamic(provider: &Arc<Journal>, name: &str, key: &str) -> ResourceArgs {
    let mut args = ResourceArgs::new(DYNAMIC_RESOURCE_TYPE, name).input("key", Value::from(key));
    args.options.provider = Some(provider.clone());
    args
}

async fn apply(engine: &LocalEngine, previous: &StateSnapshot) -> (StateSnapshot, Vec<(String, ChangeKind)>) {
    let outcome = engine.deploy("app", "dev", previous, DeployMode::Apply).await.unwrap();
    let changes = outcome.changes.into_iter().map(|c| (c.urn, c.kind)).collect();
    (outcome.state, changes)
}

#[tokio::test]
async fn test_redeploy_without_changes_is_stable() {
    let engine = LocalEngine::new();
    register(&engine, ResourceArgs::new("aws:sqs/queue:Queue", "Jobs").input("name", Value::from("app-dev-Jobs")));
    let (first, _) = apply(&engine, &StateSnapshot::default()).await;

    register(&engine, ResourceArgs::new("aws:sqs/queue:Queue", "Jobs").input("name", Value::from("app-dev-Jobs")));
    let (second, changes) = apply(&engine, &first).await;

    assert_eq!(changes, vec![("urn:Jobs".to_string(), ChangeKind::Same)]);
    assert_eq!(first.resources, second.resources);
}

#[tokio::test]
async fn test_changed_inputs_update_in_place() {
    let engine = LocalEngine::new();
    register(&engine, ResourceArgs::new("aws:sqs/queue:Queue", "Jobs").input("delaySeconds", Value::from(0)));
    let (first, _) = apply(&engine, &StateSnapshot::default()).await;

    register(&engine, ResourceArgs::new("aws:sqs/queue:Queue", "Jobs").input("delaySeconds", Value::from(30)));
    let (second, changes) = apply(&engine, &first).await;

    assert_eq!(changes, vec![("urn:Jobs".to_string(), ChangeKind::Update)]);
    assert_eq!(first.resources["urn:Jobs"].id, second.resources["urn:Jobs"].id);
    assert_eq!(second.resources["urn:Jobs"].outputs["delaySeconds"], 30);
}

#[tokio::test]
async fn test_removed_resources_are_deleted_or_retained() {
    let engine = LocalEngine::new();
    let mut kept = ResourceArgs::new("aws:s3/bucketV2:BucketV2", "Assets");
    kept.options.retain_on_delete = Some(true);
    register(&engine, kept);
    register(&engine, ResourceArgs::new("aws:sqs/queue:Queue", "Jobs"));
    let (first, _) = apply(&engine, &StateSnapshot::default()).await;

    let (second, changes) = apply(&engine, &first).await;
    assert!(second.resources.is_empty());
    assert_eq!(
        changes,
        vec![
            ("urn:Assets".to_string(), ChangeKind::Retain),
            ("urn:Jobs".to_string(), ChangeKind::Delete),
        ]
    );
}

#[tokio::test]
async fn test_dynamic_provider_lifecycle() {
    let journal = Arc::new(Journal::default());
    let engine = LocalEngine::new();

    let base = register(&engine, dynamic(&journal, "Base", "v1"));
    register(&engine, dynamic(&journal, "Top", "t1").depends_on("urn:Base"));
    let (first, _) = apply(&engine, &StateSnapshot::default()).await;
    assert_eq!(base.output_string("seen").get().await.unwrap(), "v1");
    assert_eq!(journal.entries(), vec!["create v1", "create t1"]);

    register(&engine, dynamic(&journal, "Base", "v2"));
    register(&engine, dynamic(&journal, "Top", "t1").depends_on("urn:Base"));
    let (second, changes) = apply(&engine, &first).await;
    assert_eq!(
        changes,
        vec![
            ("urn:Base".to_string(), ChangeKind::Update),
            ("urn:Top".to_string(), ChangeKind::Same),
        ]
    );
    assert_eq!(second.resources["urn:Base"].id, "v1");
    assert_eq!(second.resources["urn:Base"].provider.as_deref(), Some("Journal"));

    apply(&engine, &second).await;
    assert_eq!(
        journal.entries(),
        vec!["create v1", "create t1", "update v1 -> v2", "delete t1", "delete v1"]
    );
}

#[tokio::test]
async fn test_preview_has_no_side_effects() {
    let journal = Arc::new(Journal::default());
    let engine = LocalEngine::new();
    register(&engine, dynamic(&journal, "Code", "k"));

    let outcome = engine
        .deploy("app", "dev", &StateSnapshot::default(), DeployMode::Preview)
        .await
        .unwrap();
    assert!(outcome.has_changes());
    assert!(outcome.state.resources.contains_key("urn:Code"));
    assert!(journal.entries().is_empty());
}

#[tokio::test]
async fn test_failed_provider_rejects_dependents() {
    struct Broken;

    #[async_trait]
    impl DynamicProvider for Broken {
        fn name(&self) -> &str {
            "Broken"
        }

        async fn create(&self, _inputs: &ResolvedInputs) -> Result<CreateResult> {
            Err(domain::error::SynthError::backend("AccessDenied", "no"))
        }

        async fn update(&self, _id: &str, _old: &ResolvedInputs, _new: &ResolvedInputs) -> Result<UpdateResult> {
            Err(domain::error::SynthError::backend("AccessDenied", "no"))
        }
    }

    let engine = LocalEngine::new();
    let mut args = ResourceArgs::new(DYNAMIC_RESOURCE_TYPE, "Broken");
    args.options.provider = Some(Arc::new(Broken));
    let broken = register(&engine, args);

    let err = engine
        .deploy("app", "dev", &StateSnapshot::default(), DeployMode::Apply)
        .await
        .unwrap_err();
    assert_eq!(err.backend_code(), Some("AccessDenied"));
    assert!(broken.id.get().await.is_err());
}
