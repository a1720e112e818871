//! In-process storage, used by tests and ephemeral runs

use super::{validate_key, Storage};
use crate::error::AppError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct MemoryStorage {
    documents: RwLock<BTreeMap<Vec<String>, Value>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(keys: &[&str]) -> Result<Vec<String>, AppError> {
        if keys.is_empty() {
            return Err(AppError::BadRequest("storage keys empty".to_string()));
        }
        keys.iter()
            .map(|k| validate_key(k).map(|_| k.to_string()))
            .collect()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn write(&self, keys: &[&str], data: &Value) -> Result<(), AppError> {
        let key = Self::key(keys)?;
        self.documents.write().await.insert(key, data.clone());
        Ok(())
    }

    async fn read(&self, keys: &[&str]) -> Result<Option<Value>, AppError> {
        let key = Self::key(keys)?;
        Ok(self.documents.read().await.get(&key).cloned())
    }

    async fn list(&self, keys: &[&str]) -> Result<Vec<String>, AppError> {
        let documents = self.documents.read().await;
        Ok(documents
            .keys()
            .filter(|k| k.len() == keys.len() + 1 && k.iter().zip(keys).all(|(a, b)| a == b))
            .filter_map(|k| k.last().cloned())
            .collect())
    }

    async fn delete(&self, keys: &[&str]) -> Result<bool, AppError> {
        let key = Self::key(keys)?;
        Ok(self.documents.write().await.remove(&key).is_some())
    }
}
