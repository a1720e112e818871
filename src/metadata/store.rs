//! Definition store
//!
//! Holds the process-wide list of preset metadata definitions. One instance
//! is built at startup and shared through the application state.

use super::definition::MetadataDefinition;
use crate::error::AppError;
use crate::storage::SharedStorage;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

const STORAGE_KEY: &str = "definitions";

pub struct DefinitionStore {
    definitions: Arc<RwLock<Vec<MetadataDefinition>>>,
    /// Held across a replace and its save so submits persist in order
    submit: Mutex<()>,
    storage: SharedStorage,
}

impl DefinitionStore {
    pub fn new(storage: SharedStorage) -> Self {
        Self {
            definitions: Arc::new(RwLock::new(Vec::new())),
            submit: Mutex::new(()),
            storage,
        }
    }

    /// Restore the saved definitions; nothing saved yet means an empty list.
    pub async fn load(storage: SharedStorage) -> Result<Self, AppError> {
        let store = Self::new(storage);
        if let Some(value) = store.storage.read(&[STORAGE_KEY]).await? {
            store.set_definitions(serde_json::from_value(value)?).await;
        }
        tracing::info!("Loaded {} metadata definitions", store.count().await);

        Ok(store)
    }

    /// Current definitions, in the order they were configured
    pub async fn get_definitions(&self) -> Vec<MetadataDefinition> {
        self.definitions.read().await.clone()
    }

    /// Replace the whole list
    pub async fn set_definitions(&self, definitions: Vec<MetadataDefinition>) {
        let mut current = self.definitions.write().await;
        *current = definitions;
    }

    /// Persist the current list
    pub async fn save(&self) -> Result<(), AppError> {
        let definitions = self.definitions.read().await;
        self.persist(&definitions).await
    }

    /// Replace the list and persist it. Two submits never interleave their
    /// replace and save steps.
    pub async fn replace_and_save(&self, definitions: Vec<MetadataDefinition>) -> Result<(), AppError> {
        let _submit = self.submit.lock().await;
        let count = definitions.len();
        self.set_definitions(definitions).await;
        self.save().await?;

        tracing::info!("Saved {} metadata definitions", count);
        Ok(())
    }

    pub async fn count(&self) -> usize {
        self.definitions.read().await.len()
    }

    async fn persist(&self, definitions: &[MetadataDefinition]) -> Result<(), AppError> {
        let value = serde_json::to_value(definitions)?;
        self.storage.write(&[STORAGE_KEY], &value).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::decode_definitions;
    use crate::storage::{FileStorage, MemoryStorage};
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn sample() -> Vec<MetadataDefinition> {
        let form = serde_json::json!({
            "definitions": [
                { "kind": "tree", "name": "os", "children": [{ "kind": "string", "name": "family" }] },
                { "kind": "number", "name": "cores", "defaultValue": 4 },
                { "kind": "string", "name": "owner" }
            ]
        });
        decode_definitions(&form, "definitions").unwrap()
    }

    #[tokio::test]
    async fn test_set_then_get_preserves_order() {
        let store = DefinitionStore::new(Arc::new(MemoryStorage::new()));
        assert_eq!(store.count().await, 0);

        store.set_definitions(sample()).await;
        assert_eq!(store.get_definitions().await, sample());
    }

    #[tokio::test]
    async fn test_set_replaces_wholesale() {
        let store = DefinitionStore::new(Arc::new(MemoryStorage::new()));
        store.set_definitions(sample()).await;

        let replacement = vec![sample().remove(2)];
        store.set_definitions(replacement.clone()).await;
        assert_eq!(store.get_definitions().await, replacement);
    }

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let dir = tempdir().expect("tempdir");
        let storage: SharedStorage = Arc::new(FileStorage::new(dir.path()));

        let store = DefinitionStore::new(storage.clone());
        store.set_definitions(sample()).await;
        store.save().await.unwrap();

        let reloaded = DefinitionStore::load(storage).await.unwrap();
        assert_eq!(reloaded.get_definitions().await, sample());
    }

    #[tokio::test]
    async fn test_load_without_saved_state_is_empty() {
        let store = DefinitionStore::load(Arc::new(MemoryStorage::new())).await.unwrap();
        assert!(store.get_definitions().await.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_submits_persist_the_final_list() {
        let dir = tempdir().expect("tempdir");
        let storage: SharedStorage = Arc::new(FileStorage::new(dir.path()));
        let store = Arc::new(DefinitionStore::new(storage.clone()));

        let lists: Vec<_> = (0..3).map(|i| vec![sample().remove(i)]).collect();
        let handles: Vec<_> = lists
            .into_iter()
            .map(|list| {
                let store = store.clone();
                tokio::spawn(async move { store.replace_and_save(list).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let reloaded = DefinitionStore::load(storage).await.unwrap();
        assert_eq!(reloaded.get_definitions().await, store.get_definitions().await);
    }

    #[tokio::test]
    async fn test_save_failure_surfaces_io_error() {
        let dir = tempdir().expect("tempdir");
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"file").unwrap();

        let store = DefinitionStore::new(Arc::new(FileStorage::new(&blocker)));
        let err = store.replace_and_save(sample()).await.unwrap_err();
        assert!(matches!(err, AppError::Io(_)));
    }
}
