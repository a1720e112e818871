//! Per-node metadata property
//!
//! The root of a node's metadata tree. It lives inside the node's
//! configuration and is saved and restored with it.

use super::tree::{Metadata, MetadataParent};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataNodeProperty {
    #[serde(default)]
    pub values: Vec<Metadata>,
}

impl MetadataParent for MetadataNodeProperty {
    fn children(&self) -> &[Metadata] {
        &self.values
    }

    fn children_mut(&mut self) -> Option<&mut Vec<Metadata>> {
        Some(&mut self.values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{add_value, get_path};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_property_is_a_tree_root() {
        let mut property = MetadataNodeProperty::default();
        add_value(&mut property, "test", Some("description"), &["some", "kind", "of", "path"])
            .unwrap();

        assert_eq!(property.values.len(), 1);
        let value = get_path(&property, &["some", "kind", "of", "path"]).unwrap();
        assert_eq!(value.value().as_deref(), Some("test"));
    }

    #[test]
    fn test_serde_preserves_sibling_order() {
        let mut property = MetadataNodeProperty::default();
        for name in ["zeta", "alpha", "mid"] {
            add_value(&mut property, name, None, &["group", name]).unwrap();
        }
        add_value(&mut property, 8i64, Some("cores"), &["cpu"]).unwrap();

        let json = serde_json::to_string(&property).unwrap();
        let restored: MetadataNodeProperty = serde_json::from_str(&json).unwrap();

        assert_eq!(restored, property);
        let group = get_path(&restored, &["group"]).unwrap();
        let names: Vec<_> = group.children().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    }
}
