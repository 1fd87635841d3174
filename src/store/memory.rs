//! In-memory task store.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::store::TaskStore;
use crate::task::Task;

/// A `HashMap`-backed store for local runs and tests.
#[derive(Default)]
pub struct MemoryTaskStore {
    tasks: RwLock<HashMap<String, Task>>,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn create(&self, task: &Task) -> Result<(), StoreError> {
        let mut tasks = self.tasks.write().await;
        if tasks.contains_key(&task.name) {
            return Err(StoreError::AlreadyExists {
                name: task.name.clone(),
            });
        }
        tasks.insert(task.name.clone(), task.clone());
        Ok(())
    }

    async fn update(&self, task: &Task) -> Result<(), StoreError> {
        let mut tasks = self.tasks.write().await;
        match tasks.get_mut(&task.name) {
            Some(existing) => {
                *existing = task.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound {
                name: task.name.clone(),
            }),
        }
    }

    async fn delete(&self, name: &str) -> Result<(), StoreError> {
        self.tasks.write().await.remove(name);
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<Option<Task>, StoreError> {
        Ok(self.tasks.read().await.get(name).cloned())
    }

    async fn list_all(&self) -> Result<Vec<Task>, StoreError> {
        let mut tasks: Vec<Task> = self.tasks.read().await.values().cloned().collect();
        tasks.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tasks)
    }

    async fn list_enabled(&self) -> Result<Vec<Task>, StoreError> {
        let mut tasks: Vec<Task> = self
            .tasks
            .read()
            .await
            .values()
            .filter(|t| t.enabled)
            .cloned()
            .collect();
        tasks.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tasks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(name: &str) -> Task {
        Task::new(name, "* * * * *", "msg", "cli", "operator")
    }

    #[tokio::test]
    async fn create_then_get() {
        let store = MemoryTaskStore::new();
        store.create(&task("a")).await.unwrap();
        let fetched = store.get("a").await.unwrap().unwrap();
        assert_eq!(fetched.name, "a");
    }

    #[tokio::test]
    async fn duplicate_create_rejected() {
        let store = MemoryTaskStore::new();
        store.create(&task("a")).await.unwrap();
        let err = store.create(&task("a")).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { name } if name == "a"));
    }

    #[tokio::test]
    async fn update_missing_is_not_found() {
        let store = MemoryTaskStore::new();
        let err = store.update(&task("ghost")).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = MemoryTaskStore::new();
        store.create(&task("a")).await.unwrap();
        store.delete("a").await.unwrap();
        store.delete("a").await.unwrap();
        assert!(store.get("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_enabled_filters_and_sorts() {
        let store = MemoryTaskStore::new();
        let mut off = task("b-disabled");
        off.enabled = false;
        store.create(&task("c")).await.unwrap();
        store.create(&off).await.unwrap();
        store.create(&task("a")).await.unwrap();

        let all = store.list_all().await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].name, "a");

        let enabled = store.list_enabled().await.unwrap();
        let names: Vec<&str> = enabled.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["a", "c"]);
    }
}
