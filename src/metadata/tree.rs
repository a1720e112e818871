//! Metadata values and path addressing
//!
//! A metadata tree is a list of named entries. An entry either carries a
//! scalar value or holds children of its own. Sibling names are unique, so a
//! sequence of names addresses at most one entry.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Names usable as a path segment: no separators, no control characters
pub(crate) static NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^/\\\p{Cc}]+$").expect("static regex"));

/// Deepest path a node can hold and still be read back from storage
pub const MAX_PATH_DEPTH: usize = 32;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("Metadata path is empty")]
    EmptyPath,

    #[error("Metadata names must not be empty or contain '/', '\\' or control characters")]
    InvalidName,

    #[error("Metadata paths are limited to {max} levels")]
    TooDeep { max: usize },

    #[error("Metadata '{path}' holds a value and cannot contain children")]
    NotAContainer { path: String },

    #[error("Metadata '{path}' is a tree and cannot hold a value")]
    NotALeaf { path: String },
}

/// One named entry of a metadata tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub exposed_to_environment: bool,
    #[serde(flatten)]
    pub kind: MetadataKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MetadataKind {
    String { value: String },
    Number { value: i64 },
    Date { value: DateTime<Utc> },
    Tree { children: Vec<Metadata> },
}

/// Scalar payload that can be stored at a leaf
#[derive(Debug, Clone, PartialEq)]
pub enum LeafValue {
    String(String),
    Number(i64),
    Date(DateTime<Utc>),
}

impl From<&str> for LeafValue {
    fn from(value: &str) -> Self {
        LeafValue::String(value.to_string())
    }
}

impl From<String> for LeafValue {
    fn from(value: String) -> Self {
        LeafValue::String(value)
    }
}

impl From<i64> for LeafValue {
    fn from(value: i64) -> Self {
        LeafValue::Number(value)
    }
}

impl From<DateTime<Utc>> for LeafValue {
    fn from(value: DateTime<Utc>) -> Self {
        LeafValue::Date(value)
    }
}

impl From<LeafValue> for MetadataKind {
    fn from(value: LeafValue) -> Self {
        match value {
            LeafValue::String(value) => MetadataKind::String { value },
            LeafValue::Number(value) => MetadataKind::Number { value },
            LeafValue::Date(value) => MetadataKind::Date { value },
        }
    }
}

impl Metadata {
    pub fn tree(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            exposed_to_environment: false,
            kind: MetadataKind::Tree { children: Vec::new() },
        }
    }

    pub fn is_leaf(&self) -> bool {
        !matches!(self.kind, MetadataKind::Tree { .. })
    }

    /// Display form of a leaf value; `None` for trees
    pub fn value(&self) -> Option<String> {
        match &self.kind {
            MetadataKind::String { value } => Some(value.clone()),
            MetadataKind::Number { value } => Some(value.to_string()),
            MetadataKind::Date { value } => Some(value.to_rfc3339()),
            MetadataKind::Tree { .. } => None,
        }
    }
}

/// Anything that owns a list of metadata children
pub trait MetadataParent {
    fn children(&self) -> &[Metadata];

    /// `None` when this entry is a leaf and cannot hold children.
    fn children_mut(&mut self) -> Option<&mut Vec<Metadata>>;

    fn child(&self, name: &str) -> Option<&Metadata> {
        self.children().iter().find(|c| c.name == name)
    }
}

impl MetadataParent for Metadata {
    fn children(&self) -> &[Metadata] {
        match &self.kind {
            MetadataKind::Tree { children } => children,
            _ => &[],
        }
    }

    fn children_mut(&mut self) -> Option<&mut Vec<Metadata>> {
        match &mut self.kind {
            MetadataKind::Tree { children } => Some(children),
            _ => None,
        }
    }
}

fn check_path(path: &[&str]) -> Result<(), TreeError> {
    if path.is_empty() {
        return Err(TreeError::EmptyPath);
    }
    if path.len() > MAX_PATH_DEPTH {
        return Err(TreeError::TooDeep {
            max: MAX_PATH_DEPTH,
        });
    }
    if !path.iter().all(|segment| NAME_PATTERN.is_match(segment)) {
        return Err(TreeError::InvalidName);
    }
    Ok(())
}

/// Walk `path` below `root`, creating missing tree entries on the way.
fn ensure_tree<'a>(
    root: &'a mut Vec<Metadata>,
    path: &[&str],
) -> Result<&'a mut Vec<Metadata>, TreeError> {
    let mut children = root;
    for (depth, segment) in path.iter().enumerate() {
        let index = match children.iter().position(|c| c.name == *segment) {
            Some(index) => index,
            None => {
                children.push(Metadata::tree(*segment));
                children.len() - 1
            }
        };
        children = match &mut children[index].kind {
            MetadataKind::Tree { children } => children,
            _ => {
                return Err(TreeError::NotAContainer {
                    path: path[..=depth].join("/"),
                })
            }
        };
    }
    Ok(children)
}

/// Set the leaf at `path`, creating intermediate trees as needed.
///
/// An existing leaf keeps its position and gets the new value and
/// description.
pub fn add_value<'a, P>(
    root: &'a mut P,
    value: impl Into<LeafValue>,
    description: Option<&str>,
    path: &[&str],
) -> Result<&'a mut Metadata, TreeError>
where
    P: MetadataParent + ?Sized,
{
    check_path(path)?;
    let (name, parents) = path.split_last().ok_or(TreeError::EmptyPath)?;
    let root_children = root.children_mut().ok_or_else(|| TreeError::NotAContainer {
        path: String::new(),
    })?;
    let siblings = ensure_tree(root_children, parents)?;
    let value: LeafValue = value.into();
    let kind = MetadataKind::from(value);

    match siblings.iter().position(|c| c.name == *name) {
        Some(index) => {
            let existing = &mut siblings[index];
            if !existing.is_leaf() {
                return Err(TreeError::NotALeaf {
                    path: path.join("/"),
                });
            }
            existing.kind = kind;
            existing.description = description.map(str::to_string);
            Ok(existing)
        }
        None => {
            siblings.push(Metadata {
                name: name.to_string(),
                description: description.map(str::to_string),
                exposed_to_environment: false,
                kind,
            });
            let last = siblings.len() - 1;
            Ok(&mut siblings[last])
        }
    }
}

/// Ensure every segment of `path` exists as a tree entry.
pub fn create_path<'a, P>(root: &'a mut P, path: &[&str]) -> Result<&'a mut Metadata, TreeError>
where
    P: MetadataParent + ?Sized,
{
    check_path(path)?;
    let (name, parents) = path.split_last().ok_or(TreeError::EmptyPath)?;
    let root_children = root.children_mut().ok_or_else(|| TreeError::NotAContainer {
        path: String::new(),
    })?;
    let siblings = ensure_tree(root_children, parents)?;

    let index = match siblings.iter().position(|c| c.name == *name) {
        Some(index) if siblings[index].is_leaf() => {
            return Err(TreeError::NotAContainer {
                path: path.join("/"),
            })
        }
        Some(index) => index,
        None => {
            siblings.push(Metadata::tree(*name));
            siblings.len() - 1
        }
    };
    Ok(&mut siblings[index])
}

/// Resolve `path` against the tree. Never fails; absence is `None`.
pub fn get_path<'a, P>(root: &'a P, path: &[&str]) -> Option<&'a Metadata>
where
    P: MetadataParent + ?Sized,
{
    let (first, rest) = path.split_first()?;
    let mut node = root.child(first)?;
    for segment in rest {
        node = node.child(segment)?;
    }
    Some(node)
}

/// Detach the entry at `path`, returning it.
pub fn remove_path<P>(root: &mut P, path: &[&str]) -> Result<Option<Metadata>, TreeError>
where
    P: MetadataParent + ?Sized,
{
    check_path(path)?;
    let (name, parents) = path.split_last().ok_or(TreeError::EmptyPath)?;

    let mut siblings = match root.children_mut() {
        Some(children) => children,
        None => return Ok(None),
    };
    for segment in parents {
        siblings = match siblings
            .iter_mut()
            .find(|c| c.name == *segment)
            .and_then(|c| c.children_mut())
        {
            Some(children) => children,
            None => return Ok(None),
        };
    }

    Ok(siblings
        .iter()
        .position(|c| c.name == *name)
        .map(|index| siblings.remove(index)))
}
