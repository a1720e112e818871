//! Build node routes
//!
//! Node registration plus reading and writing the metadata tree attached to
//! each node. Metadata paths are `/`-separated names.

use crate::auth::{require_permission, Claims, Permission};
use crate::error::{not_found_error, validation_error, AppError};
use crate::metadata::{
    add_value, apply_defaults, create_path, get_path, remove_path, LeafValue, Metadata,
    MetadataNodeProperty,
};
use crate::models::MessageResponse;
use crate::nodes::Node;
use crate::state::SharedState;
use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

// ==================== Request/Response Types ====================

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateNodeRequest {
    #[validate(length(min = 1, max = 64, message = "Node name must be between 1 and 64 characters"))]
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[validate(range(min = 1, max = 256, message = "A node needs between 1 and 256 executors"))]
    pub num_executors: Option<u32>,
}

/// Scalar to store at a metadata path, tagged like stored metadata
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ValueInput {
    String { value: String },
    Number { value: i64 },
    Date { value: DateTime<Utc> },
}

impl From<ValueInput> for LeafValue {
    fn from(input: ValueInput) -> Self {
        match input {
            ValueInput::String { value } => LeafValue::String(value),
            ValueInput::Number { value } => LeafValue::Number(value),
            ValueInput::Date { value } => LeafValue::Date(value),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetValueRequest {
    #[serde(flatten)]
    pub value: ValueInput,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub exposed_to_environment: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeResponse {
    pub success: bool,
    pub node: Node,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeListResponse {
    pub success: bool,
    pub nodes: Vec<Node>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyResponse {
    pub success: bool,
    pub node: String,
    pub metadata: MetadataNodeProperty,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataResponse {
    pub success: bool,
    pub path: String,
    pub metadata: Metadata,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyDefaultsResponse {
    pub success: bool,
    pub added: usize,
    pub metadata: MetadataNodeProperty,
}

fn split_path(raw: &str) -> Vec<&str> {
    raw.trim_matches('/').split('/').collect()
}

// ==================== Node Handlers ====================

/// GET /api/nodes
pub async fn list_nodes(State(state): State<SharedState>) -> Json<NodeListResponse> {
    Json(NodeListResponse {
        success: true,
        nodes: state.nodes.list().await,
    })
}

/// POST /api/nodes
pub async fn create_node(
    State(state): State<SharedState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateNodeRequest>,
) -> Result<(StatusCode, Json<NodeResponse>), AppError> {
    require_permission(&claims, Permission::ConfigureNodes)?;
    payload.validate().map_err(|e| validation_error(e.to_string()))?;

    let mut node = Node::new(payload.name);
    node.description = payload.description;
    node.labels = payload.labels;
    if let Some(executors) = payload.num_executors {
        node.num_executors = executors;
    }

    let node = state.nodes.create(node).await?;
    tracing::info!("User {} created node {}", claims.email, node.name);

    Ok((
        StatusCode::CREATED,
        Json(NodeResponse {
            success: true,
            node,
        }),
    ))
}

/// GET /api/nodes/{name}
pub async fn get_node(
    State(state): State<SharedState>,
    Path(name): Path<String>,
) -> Result<Json<NodeResponse>, AppError> {
    let node = state.nodes.get(&name).await?;
    Ok(Json(NodeResponse {
        success: true,
        node,
    }))
}

/// DELETE /api/nodes/{name}
pub async fn delete_node(
    State(state): State<SharedState>,
    Extension(claims): Extension<Claims>,
    Path(name): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    require_permission(&claims, Permission::ConfigureNodes)?;
    state.nodes.delete(&name).await?;
    Ok(Json(MessageResponse::new(format!("Node {} deleted", name))))
}

/// POST /api/nodes/{name}/reload
///
/// Drops the cached node and reads it back from its saved configuration.
pub async fn reload_node(
    State(state): State<SharedState>,
    Path(name): Path<String>,
) -> Result<Json<NodeResponse>, AppError> {
    let node = state.nodes.reload(&name).await?;
    Ok(Json(NodeResponse {
        success: true,
        node,
    }))
}

// ==================== Metadata Handlers ====================

/// GET /api/nodes/{name}/metadata
pub async fn get_metadata(
    State(state): State<SharedState>,
    Path(name): Path<String>,
) -> Result<Json<PropertyResponse>, AppError> {
    let node = state.nodes.get(&name).await?;
    Ok(Json(PropertyResponse {
        success: true,
        node: node.name,
        metadata: node.properties.metadata.unwrap_or_default(),
    }))
}

/// GET /api/nodes/{name}/metadata/{*path}
pub async fn get_metadata_path(
    State(state): State<SharedState>,
    Path((name, path)): Path<(String, String)>,
) -> Result<Json<MetadataResponse>, AppError> {
    let node = state.nodes.get(&name).await?;
    let segments = split_path(&path);

    let metadata = node
        .properties
        .metadata
        .as_ref()
        .and_then(|property| get_path(property, &segments))
        .cloned()
        .ok_or_else(|| not_found_error(format!("No metadata at {} on node {}", path, name)))?;

    Ok(Json(MetadataResponse {
        success: true,
        path,
        metadata,
    }))
}

/// PUT /api/nodes/{name}/metadata/{*path}
pub async fn set_metadata_value(
    State(state): State<SharedState>,
    Extension(claims): Extension<Claims>,
    Path((name, path)): Path<(String, String)>,
    Json(payload): Json<SetValueRequest>,
) -> Result<Json<MetadataResponse>, AppError> {
    require_permission(&claims, Permission::ConfigureNodes)?;
    let segments = split_path(&path);

    let (_, metadata) = state
        .nodes
        .update_metadata(&name, |property| {
            let entry = add_value(
                property,
                LeafValue::from(payload.value),
                payload.description.as_deref(),
                &segments,
            )?;
            if let Some(exposed) = payload.exposed_to_environment {
                entry.exposed_to_environment = exposed;
            }
            Ok(entry.clone())
        })
        .await?;

    tracing::info!("User {} set metadata {} on node {}", claims.email, path, name);
    Ok(Json(MetadataResponse {
        success: true,
        path,
        metadata,
    }))
}

/// POST /api/nodes/{name}/metadata/{*path}
///
/// Creates an empty branch (and any missing parents). `201` when the branch
/// is new, `200` when it was already there.
pub async fn create_metadata_path(
    State(state): State<SharedState>,
    Extension(claims): Extension<Claims>,
    Path((name, path)): Path<(String, String)>,
) -> Result<(StatusCode, Json<MetadataResponse>), AppError> {
    require_permission(&claims, Permission::ConfigureNodes)?;
    let segments = split_path(&path);

    let (_, (existed, metadata)) = state
        .nodes
        .update_metadata(&name, |property| {
            let existed = get_path(&*property, &segments).is_some();
            Ok((existed, create_path(property, &segments)?.clone()))
        })
        .await?;

    let status = if existed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((
        status,
        Json(MetadataResponse {
            success: true,
            path,
            metadata,
        }),
    ))
}

/// DELETE /api/nodes/{name}/metadata/{*path}
pub async fn delete_metadata_path(
    State(state): State<SharedState>,
    Extension(claims): Extension<Claims>,
    Path((name, path)): Path<(String, String)>,
) -> Result<Json<MetadataResponse>, AppError> {
    require_permission(&claims, Permission::ConfigureNodes)?;
    let segments = split_path(&path);

    let (_, metadata) = state
        .nodes
        .update_metadata(&name, |property| {
            remove_path(property, &segments)?
                .ok_or_else(|| not_found_error(format!("No metadata at {}", path)))
        })
        .await?;

    tracing::info!("User {} removed metadata {} from node {}", claims.email, path, name);
    Ok(Json(MetadataResponse {
        success: true,
        path,
        metadata,
    }))
}

/// POST /api/nodes/{name}/apply-definitions
///
/// Adds the default value of every configured definition the node is missing.
pub async fn apply_definitions(
    State(state): State<SharedState>,
    Extension(claims): Extension<Claims>,
    Path(name): Path<String>,
) -> Result<Json<ApplyDefaultsResponse>, AppError> {
    require_permission(&claims, Permission::ConfigureNodes)?;
    let definitions = state.definitions.get_definitions().await;

    let (node, added) = state
        .nodes
        .update_metadata(&name, |property| Ok(apply_defaults(property, &definitions)?))
        .await?;

    Ok(Json(ApplyDefaultsResponse {
        success: true,
        added,
        metadata: node.properties.metadata.unwrap_or_default(),
    }))
}
