//! Metadata module
//!
//! Preset definitions configured by administrators, and the per-node
//! metadata trees that hold actual values.

mod definition;
mod property;
mod store;
mod tree;

pub use definition::{
    apply_defaults, decode_definitions, descriptors, DefinitionDescriptor, MetadataDefinition,
};
pub use property::MetadataNodeProperty;
pub use store::DefinitionStore;
pub use tree::{
    add_value, create_path, get_path, remove_path, LeafValue, Metadata, MetadataParent, TreeError,
};
