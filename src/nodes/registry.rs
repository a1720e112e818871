//! Node registry
//!
//! In-memory view of all nodes, written through to storage on every change.

use super::Node;
use crate::error::{conflict_error, not_found_error, AppError};
use crate::metadata::MetadataNodeProperty;
use crate::storage::SharedStorage;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

const NODES_KEY: &str = "nodes";

pub struct NodeRegistry {
    nodes: Arc<RwLock<HashMap<String, Node>>>,
    storage: SharedStorage,
}

impl NodeRegistry {
    pub fn new(storage: SharedStorage) -> Self {
        Self {
            nodes: Arc::new(RwLock::new(HashMap::new())),
            storage,
        }
    }

    /// Restore every saved node
    pub async fn load_all(storage: SharedStorage) -> Result<Self, AppError> {
        let registry = Self::new(storage);
        {
            let mut nodes = registry.nodes.write().await;
            for name in registry.storage.list(&[NODES_KEY]).await? {
                match registry.storage.read(&[NODES_KEY, name.as_str()]).await? {
                    Some(value) => {
                        let node: Node = serde_json::from_value(value)?;
                        nodes.insert(node.name.clone(), node);
                    }
                    None => tracing::warn!("Node {} disappeared while loading", name),
                }
            }
            tracing::info!("Loaded {} nodes", nodes.len());
        }

        Ok(registry)
    }

    /// Register a new node
    pub async fn create(&self, node: Node) -> Result<Node, AppError> {
        let mut nodes = self.nodes.write().await;
        if nodes.contains_key(&node.name) {
            return Err(conflict_error(format!("Node {} already exists", node.name)));
        }

        self.persist(&node).await?;
        nodes.insert(node.name.clone(), node.clone());

        tracing::info!("Created node {}", node.name);
        Ok(node)
    }

    /// Get a node by name
    pub async fn get(&self, name: &str) -> Result<Node, AppError> {
        let nodes = self.nodes.read().await;
        nodes
            .get(name)
            .cloned()
            .ok_or_else(|| not_found_error(format!("Node {} not found", name)))
    }

    /// All nodes, sorted by name
    pub async fn list(&self) -> Vec<Node> {
        let nodes = self.nodes.read().await;
        let mut list: Vec<_> = nodes.values().cloned().collect();
        list.sort_by(|a, b| a.name.cmp(&b.name));
        list
    }

    /// Change a node's metadata and save the node.
    ///
    /// An empty property is attached first when the node has none. When `f`
    /// or the save fails, the node is left as it was.
    pub async fn update_metadata<F, R>(&self, name: &str, f: F) -> Result<(Node, R), AppError>
    where
        F: FnOnce(&mut MetadataNodeProperty) -> Result<R, AppError>,
    {
        let mut nodes = self.nodes.write().await;
        let current = nodes
            .get(name)
            .ok_or_else(|| not_found_error(format!("Node {} not found", name)))?;

        let mut updated = current.clone();
        let result = f(updated.metadata_mut())?;
        updated.updated_at = Utc::now();

        self.persist(&updated).await?;
        nodes.insert(updated.name.clone(), updated.clone());
        Ok((updated, result))
    }

    /// Remove a node together with its properties
    pub async fn delete(&self, name: &str) -> Result<(), AppError> {
        let mut nodes = self.nodes.write().await;
        if !nodes.contains_key(name) {
            return Err(not_found_error(format!("Node {} not found", name)));
        }

        self.storage.delete(&[NODES_KEY, name]).await?;
        nodes.remove(name);

        tracing::info!("Deleted node {}", name);
        Ok(())
    }

    /// Re-read a node from storage, replacing the cached copy
    pub async fn reload(&self, name: &str) -> Result<Node, AppError> {
        let mut nodes = self.nodes.write().await;
        let value = self
            .storage
            .read(&[NODES_KEY, name])
            .await?
            .ok_or_else(|| not_found_error(format!("Node {} has no saved configuration", name)))?;

        let node: Node = serde_json::from_value(value)?;
        nodes.insert(node.name.clone(), node.clone());
        Ok(node)
    }

    pub async fn count(&self) -> usize {
        self.nodes.read().await.len()
    }

    async fn persist(&self, node: &Node) -> Result<(), AppError> {
        let value = serde_json::to_value(node)?;
        self.storage.write(&[NODES_KEY, node.name.as_str()], &value).await
    }
}
