use crate::lock;
use async_trait::async_trait;
use domain::error::{Result, SynthError};
use domain::ports::ParameterStore;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::Mutex as AsyncMutex;

/// In-process parameter store; counts calls so tests can assert on them.
#[derive(Default)]
pub struct MemoryParameterStore {
    values: Mutex<HashMap<(String, String), String>>,
    gets: AtomicUsize,
    puts: AtomicUsize,
}

impl MemoryParameterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a raw value, bypassing the call counters.
    pub fn insert_raw(&self, scope: &str, key: &str, value: &str) {
        lock(&self.values).insert((scope.to_string(), key.to_string()), value.to_string());
    }

    pub fn raw(&self, scope: &str, key: &str) -> Option<String> {
        lock(&self.values)
            .get(&(scope.to_string(), key.to_string()))
            .cloned()
    }

    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ParameterStore for MemoryParameterStore {
    async fn get(&self, scope: &str, key: &str) -> Result<Option<String>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        Ok(self.raw(scope, key))
    }

    async fn put(&self, scope: &str, key: &str, value: &str) -> Result<()> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.insert_raw(scope, key, value);
        Ok(())
    }
}

type Parameters = BTreeMap<String, BTreeMap<String, String>>;

/// Parameter store persisted as one JSON document (`scope -> key -> value`).
pub struct FileParameterStore {
    path: PathBuf,
    write: AsyncMutex<()>,
}

impl FileParameterStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write: AsyncMutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<Parameters> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Parameters::new()),
            Err(err) => Err(io_error(&self.path, err)),
        }
    }
}

fn io_error(path: &Path, err: std::io::Error) -> SynthError {
    SynthError::backend("IoError", format!("{}: {}", path.display(), err))
}

#[async_trait]
impl ParameterStore for FileParameterStore {
    async fn get(&self, scope: &str, key: &str) -> Result<Option<String>> {
        let parameters = self.read_all().await?;
        Ok(parameters.get(scope).and_then(|s| s.get(key)).cloned())
    }

    async fn put(&self, scope: &str, key: &str, value: &str) -> Result<()> {
        let _guard = self.write.lock().await;
        let mut parameters = self.read_all().await?;
        parameters
            .entry(scope.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());

        if let Some(dir) = self.path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| io_error(dir, e))?;
        }
        let content = serde_json::to_string_pretty(&parameters)?;
        tokio::fs::write(&self.path, content)
            .await
            .map_err(|e| io_error(&self.path, e))
    }
}
