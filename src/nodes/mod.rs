//! Build nodes
//!
//! Agents that run builds. Each node carries its own configuration,
//! including an optional metadata property.

mod registry;

pub use registry::NodeRegistry;

use crate::metadata::MetadataNodeProperty;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Configuration of one build node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default = "default_executors")]
    pub num_executors: u32,
    #[serde(default)]
    pub properties: NodeProperties,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_executors() -> u32 {
    1
}

/// Properties attached to a node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MetadataNodeProperty>,
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            description: None,
            labels: Vec::new(),
            num_executors: default_executors(),
            properties: NodeProperties::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// The node's metadata property, attaching an empty one if missing
    pub fn metadata_mut(&mut self) -> &mut MetadataNodeProperty {
        self.properties.metadata.get_or_insert_with(MetadataNodeProperty::default)
    }
}
