use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// A deployed resource as recorded after the last successful deploy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    pub urn: String,
    pub resource_type: String,
    pub name: String,
    pub id: String,
    #[serde(default)]
    pub inputs: Map<String, Value>,
    #[serde(default)]
    pub outputs: Map<String, Value>,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub retain_on_delete: bool,
    /// Name of the dynamic provider that owns the resource.
    #[serde(default)]
    pub provider: Option<String>,
}

/// Everything deployed for one app and stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub app: String,
    pub stage: String,
    pub resources: BTreeMap<String, ResourceState>,
    /// Component versions above 1.
    #[serde(default)]
    pub versions: BTreeMap<String, u32>,
}

impl StateSnapshot {
    pub fn new(app: impl Into<String>, stage: impl Into<String>) -> Self {
        Self {
            app: app.into(),
            stage: stage.into(),
            ..Self::default()
        }
    }

    /// Missing file is an empty state.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
    }

    pub fn get(&self, urn: &str) -> Option<&ResourceState> {
        self.resources.get(urn)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Create,
    Update,
    Same,
    Delete,
    /// Removed from the program but kept in the cloud.
    Retain,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ChangeKind::Create => "create",
            ChangeKind::Update => "update",
            ChangeKind::Same => "same",
            ChangeKind::Delete => "delete",
            ChangeKind::Retain => "retain",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub urn: String,
    pub kind: ChangeKind,
}

impl Change {
    pub fn new(urn: impl Into<String>, kind: ChangeKind) -> Self {
        Self {
            urn: urn.into(),
            kind,
        }
    }
}

/// Per-URN changes turning `previous` into `desired`, sorted by URN.
pub fn diff(previous: &StateSnapshot, desired: &StateSnapshot) -> Vec<Change> {
    let mut changes: Vec<Change> = desired
        .resources
        .values()
        .map(|resource| {
            let kind = match previous.resources.get(&resource.urn) {
                None => ChangeKind::Create,
                Some(old) if old.inputs == resource.inputs => ChangeKind::Same,
                Some(_) => ChangeKind::Update,
            };
            Change::new(resource.urn.clone(), kind)
        })
        .collect();

    changes.extend(
        previous
            .resources
            .values()
            .filter(|old| !desired.resources.contains_key(&old.urn))
            .map(|old| {
                let kind = if old.retain_on_delete {
                    ChangeKind::Retain
                } else {
                    ChangeKind::Delete
                };
                Change::new(old.urn.clone(), kind)
            }),
    );

    changes.sort_by(|a, b| a.urn.cmp(&b.urn));
    changes
}

/// Number of changes of each kind, omitting kinds with none.
pub fn summarize(changes: &[Change]) -> BTreeMap<ChangeKind, usize> {
    let mut summary = BTreeMap::new();
    for change in changes {
        *summary.entry(change.kind).or_insert(0) += 1;
    }
    summary
}
