//! Task persistence boundary.
//!
//! The scheduler talks to its store through this trait only; the backing
//! engine lives outside the subsystem. `MemoryTaskStore` is the reference
//! implementation used by the binary and tests.

pub mod memory;

pub use memory::MemoryTaskStore;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::task::Task;

/// Persistence operations over task records keyed by unique name.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Persist a new task. Fails with `AlreadyExists` when the name is taken.
    async fn create(&self, task: &Task) -> Result<(), StoreError>;

    /// Replace an existing record. Fails with `NotFound` when absent.
    async fn update(&self, task: &Task) -> Result<(), StoreError>;

    /// Delete by name. Deleting an absent task is a no-op.
    async fn delete(&self, name: &str) -> Result<(), StoreError>;

    /// Fetch one task by name.
    async fn get(&self, name: &str) -> Result<Option<Task>, StoreError>;

    /// All tasks, sorted by name.
    async fn list_all(&self) -> Result<Vec<Task>, StoreError>;

    /// Enabled tasks only, sorted by name.
    async fn list_enabled(&self) -> Result<Vec<Task>, StoreError>;
}
