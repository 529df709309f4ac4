pub mod adapters;
pub mod client;
pub mod engine;
pub mod providers;

pub use adapters::asset_storage::MemoryAssetStorage;
pub use adapters::parameter_store::{FileParameterStore, MemoryParameterStore};
pub use client::retry::RetryPolicy;
pub use engine::local::{DeployMode, DeployOutcome, LocalEngine};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Locks a mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
