//! Durable storage for configuration state
//!
//! Values are JSON documents addressed by a short list of key segments,
//! e.g. `["definitions"]` or `["nodes", "agent-01"]`.

mod file;
mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

use crate::error::AppError;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

#[async_trait]
pub trait Storage: Send + Sync {
    async fn write(&self, keys: &[&str], data: &Value) -> Result<(), AppError>;
    async fn read(&self, keys: &[&str]) -> Result<Option<Value>, AppError>;
    /// Names of the documents directly under `keys`, sorted.
    async fn list(&self, keys: &[&str]) -> Result<Vec<String>, AppError>;
    /// Returns `false` when nothing was stored under `keys`.
    async fn delete(&self, keys: &[&str]) -> Result<bool, AppError>;
}

pub type SharedStorage = Arc<dyn Storage>;

pub(crate) fn validate_key(key: &str) -> Result<(), AppError> {
    if key.is_empty() || key == "." || key == ".." || key.contains('/') || key.contains('\\') {
        return Err(AppError::BadRequest(format!("invalid storage key {:?}", key)));
    }
    Ok(())
}
