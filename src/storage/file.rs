//! JSON-file backed storage rooted at the configured data directory

use super::{validate_key, Storage};
use crate::error::AppError;
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn dir_path(&self, keys: &[&str]) -> Result<PathBuf, AppError> {
        let mut path = self.root.clone();
        for key in keys {
            validate_key(key)?;
            path.push(key);
        }
        Ok(path)
    }

    fn file_path(&self, keys: &[&str]) -> Result<PathBuf, AppError> {
        let (last, parents) = keys
            .split_last()
            .ok_or_else(|| AppError::BadRequest("storage keys empty".to_string()))?;
        validate_key(last)?;
        let mut path = self.dir_path(parents)?;
        path.push(format!("{}.json", last));
        Ok(path)
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn write(&self, keys: &[&str], data: &Value) -> Result<(), AppError> {
        let path = self.file_path(keys)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let serialized = serde_json::to_vec_pretty(data)?;

        // Readers never observe a half-written document.
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serialized).await?;
        tokio::fs::rename(&tmp, &path).await?;

        tracing::debug!("Wrote {}", path.display());
        Ok(())
    }

    async fn read(&self, keys: &[&str]) -> Result<Option<Value>, AppError> {
        let path = self.file_path(keys)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    async fn list(&self, keys: &[&str]) -> Result<Vec<String>, AppError> {
        let dir = self.dir_path(keys)?;
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            if let Some(name) = file_name.to_str().and_then(|n| n.strip_suffix(".json")) {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    async fn delete(&self, keys: &[&str]) -> Result<bool, AppError> {
        let path = self.file_path(keys)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
