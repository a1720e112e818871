//! Preset metadata definitions
//!
//! Definitions are configured by an administrator and describe the metadata
//! fields that nodes are expected to carry. The configuration form submits
//! them as a heterogeneous list; each element names its variant in a `kind`
//! field.

use super::property::MetadataNodeProperty;
use super::tree::{
    add_value, create_path, get_path, LeafValue, TreeError, MAX_PATH_DEPTH, NAME_PATTERN,
};
use crate::error::{validation_error, AppError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use validator::Validate;

/// Discriminator field carried by every definition in a submitted list
pub const KIND_FIELD: &str = "kind";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MetadataDefinition {
    String(StringDefinition),
    Number(NumberDefinition),
    Date(DateDefinition),
    Tree(TreeDefinition),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct StringDefinition {
    #[validate(
        length(min = 1, max = 128, message = "Definition name must be between 1 and 128 characters"),
        custom(function = "validate_name")
    )]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub default_value: Option<String>,
    #[serde(default)]
    pub exposed_to_environment: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NumberDefinition {
    #[validate(
        length(min = 1, max = 128, message = "Definition name must be between 1 and 128 characters"),
        custom(function = "validate_name")
    )]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub default_value: Option<i64>,
    #[serde(default)]
    pub exposed_to_environment: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DateDefinition {
    #[validate(
        length(min = 1, max = 128, message = "Definition name must be between 1 and 128 characters"),
        custom(function = "validate_name")
    )]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub default_value: Option<DateTime<Utc>>,
    #[serde(default)]
    pub exposed_to_environment: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TreeDefinition {
    #[validate(
        length(min = 1, max = 128, message = "Definition name must be between 1 and 128 characters"),
        custom(function = "validate_name")
    )]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub exposed_to_environment: bool,
    #[serde(default)]
    pub children: Vec<MetadataDefinition>,
}

fn validate_name(name: &str) -> Result<(), validator::ValidationError> {
    if !NAME_PATTERN.is_match(name) {
        let mut err = validator::ValidationError::new("invalid_name");
        err.message = Some("Definition names must not contain '/', '\\' or control characters".into());
        return Err(err);
    }
    Ok(())
}

impl MetadataDefinition {
    pub fn name(&self) -> &str {
        match self {
            MetadataDefinition::String(d) => &d.name,
            MetadataDefinition::Number(d) => &d.name,
            MetadataDefinition::Date(d) => &d.name,
            MetadataDefinition::Tree(d) => &d.name,
        }
    }

    pub fn description(&self) -> Option<&str> {
        match self {
            MetadataDefinition::String(d) => d.description.as_deref(),
            MetadataDefinition::Number(d) => d.description.as_deref(),
            MetadataDefinition::Date(d) => d.description.as_deref(),
            MetadataDefinition::Tree(d) => d.description.as_deref(),
        }
    }

    pub fn exposed_to_environment(&self) -> bool {
        match self {
            MetadataDefinition::String(d) => d.exposed_to_environment,
            MetadataDefinition::Number(d) => d.exposed_to_environment,
            MetadataDefinition::Date(d) => d.exposed_to_environment,
            MetadataDefinition::Tree(d) => d.exposed_to_environment,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            MetadataDefinition::String(_) => "string",
            MetadataDefinition::Number(_) => "number",
            MetadataDefinition::Date(_) => "date",
            MetadataDefinition::Tree(_) => "tree",
        }
    }

    fn default_value(&self) -> Option<LeafValue> {
        match self {
            MetadataDefinition::String(d) => d.default_value.clone().map(LeafValue::from),
            MetadataDefinition::Number(d) => d.default_value.map(LeafValue::from),
            MetadataDefinition::Date(d) => d.default_value.map(LeafValue::from),
            MetadataDefinition::Tree(_) => None,
        }
    }

    fn validate_fields(&self) -> Result<(), validator::ValidationErrors> {
        match self {
            MetadataDefinition::String(d) => d.validate(),
            MetadataDefinition::Number(d) => d.validate(),
            MetadataDefinition::Date(d) => d.validate(),
            MetadataDefinition::Tree(d) => d.validate(),
        }
    }
}

/// A definition kind offered by the configuration form
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DefinitionDescriptor {
    pub kind: &'static str,
    pub display_name: &'static str,
}

/// Every kind the configuration form may submit
pub fn descriptors() -> Vec<DefinitionDescriptor> {
    vec![
        DefinitionDescriptor { kind: "string", display_name: "String" },
        DefinitionDescriptor { kind: "number", display_name: "Number" },
        DefinitionDescriptor { kind: "date", display_name: "Date" },
        DefinitionDescriptor { kind: "tree", display_name: "Tree Node" },
    ]
}

/// Decode the hetero-list stored under `field` of a submitted form.
///
/// A missing field is an empty list. A lone object counts as a list of one.
pub fn decode_definitions(form: &Value, field: &str) -> Result<Vec<MetadataDefinition>, AppError> {
    let elements = match form.get(field) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.clone(),
        Some(item) if item.is_object() => vec![item.clone()],
        Some(other) => {
            return Err(validation_error(format!(
                "'{}' must be a list of definitions, got {}",
                field, other
            )))
        }
    };

    let known: HashSet<&str> = descriptors().iter().map(|d| d.kind).collect();
    let mut definitions = Vec::with_capacity(elements.len());
    for (index, element) in elements.into_iter().enumerate() {
        let kind = element
            .get(KIND_FIELD)
            .and_then(Value::as_str)
            .ok_or_else(|| validation_error(format!("{}[{}] has no '{}'", field, index, KIND_FIELD)))?;
        if !known.contains(kind) {
            return Err(validation_error(format!(
                "{}[{}] has unknown kind '{}'",
                field, index, kind
            )));
        }
        let definition: MetadataDefinition = serde_json::from_value(element)
            .map_err(|e| validation_error(format!("{}[{}]: {}", field, index, e)))?;
        definitions.push(definition);
    }

    validate_definitions(&definitions, 1)?;
    Ok(definitions)
}

/// Check field rules and sibling name uniqueness, recursing into trees.
fn validate_definitions(definitions: &[MetadataDefinition], depth: usize) -> Result<(), AppError> {
    if !definitions.is_empty() && depth > MAX_PATH_DEPTH {
        return Err(validation_error(format!(
            "Definitions may nest at most {} levels deep",
            MAX_PATH_DEPTH
        )));
    }

    let mut seen = HashSet::new();
    for definition in definitions {
        definition
            .validate_fields()
            .map_err(|e| validation_error(e.to_string()))?;
        if !seen.insert(definition.name()) {
            return Err(validation_error(format!(
                "Duplicate definition name '{}'",
                definition.name()
            )));
        }
        if let MetadataDefinition::Tree(tree) = definition {
            validate_definitions(&tree.children, depth + 1)?;
        }
    }
    Ok(())
}

/// Fill in default values for every defined path the node does not have yet.
///
/// Existing values are left alone. Returns the number of values added.
pub fn apply_defaults(
    property: &mut MetadataNodeProperty,
    definitions: &[MetadataDefinition],
) -> Result<usize, TreeError> {
    fn walk(
        property: &mut MetadataNodeProperty,
        definitions: &[MetadataDefinition],
        prefix: &mut Vec<String>,
    ) -> Result<usize, TreeError> {
        let mut added = 0;
        for definition in definitions {
            prefix.push(definition.name().to_string());
            match definition {
                MetadataDefinition::Tree(tree) => {
                    {
                        let path: Vec<&str> = prefix.iter().map(String::as_str).collect();
                        let exists = get_path(&*property, &path).is_some();
                        let branch = create_path(property, &path)?;
                        if !exists {
                            branch.description = tree.description.clone();
                            branch.exposed_to_environment = tree.exposed_to_environment;
                        }
                    }
                    added += walk(property, &tree.children, prefix)?;
                }
                _ => {
                    let path: Vec<&str> = prefix.iter().map(String::as_str).collect();
                    if let Some(value) = definition.default_value() {
                        if get_path(&*property, &path).is_none() {
                            let entry = add_value(property, value, definition.description(), &path)?;
                            entry.exposed_to_environment = definition.exposed_to_environment();
                            added += 1;
                        }
                    }
                }
            }
            prefix.pop();
        }
        Ok(added)
    }

    walk(property, definitions, &mut Vec::new())
}
