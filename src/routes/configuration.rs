//! Metadata configuration page routes
//!
//! The administrator-facing page for the preset metadata definitions:
//! page descriptor, available definition kinds, current list and submit.

use crate::auth::{require_permission, Claims, Permission};
use crate::error::{validation_error, ApiResult};
use crate::metadata::{decode_definitions, descriptors, DefinitionDescriptor, MetadataDefinition};
use crate::state::SharedState;
use axum::{
    body::Bytes,
    extract::{Extension, State},
    response::Redirect,
    Json,
};
use serde::Serialize;

/// URL segment the page is mounted under
pub const URL_NAME: &str = "MetaDataConfiguration";

const ICON_FILE_NAME: &str = "clock.png";
const DISPLAY_NAME: &str = "Metadata Configuration";

/// Form field holding the submitted hetero-list
const DEFINITIONS_FIELD: &str = "definitions";

// ==================== Request/Response Types ====================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResponse {
    pub success: bool,
    pub url_name: &'static str,
    pub icon_file_name: Option<&'static str>,
    pub display_name: Option<&'static str>,
    pub required_permission: Permission,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DescriptorListResponse {
    pub success: bool,
    pub descriptors: Vec<DefinitionDescriptor>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DefinitionListResponse {
    pub success: bool,
    pub definitions: Vec<MetadataDefinition>,
}

// ==================== Handlers ====================

/// GET /MetaDataConfiguration/page
///
/// Callers without the configure permission get a page with no icon and no
/// display name, which keeps it out of their navigation.
pub async fn page(Extension(claims): Extension<Claims>) -> Json<PageResponse> {
    let visible = claims.role.has_permission(Permission::ConfigureDefinitions);

    Json(PageResponse {
        success: true,
        url_name: URL_NAME,
        icon_file_name: visible.then_some(ICON_FILE_NAME),
        display_name: visible.then_some(DISPLAY_NAME),
        required_permission: Permission::ConfigureDefinitions,
    })
}

/// GET /MetaDataConfiguration/descriptors
pub async fn list_descriptors(
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<DescriptorListResponse>> {
    require_permission(&claims, Permission::ConfigureDefinitions)?;

    Ok(Json(DescriptorListResponse {
        success: true,
        descriptors: descriptors(),
    }))
}

/// GET /MetaDataConfiguration/definitions
pub async fn list_definitions(
    State(state): State<SharedState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<DefinitionListResponse>> {
    require_permission(&claims, Permission::ConfigureDefinitions)?;

    Ok(Json(DefinitionListResponse {
        success: true,
        definitions: state.definitions.get_definitions().await,
    }))
}

/// POST /MetaDataConfiguration/configSubmit
///
/// Replaces every definition with the submitted list, saves, and redirects
/// back to the parent page. The body is only parsed once the caller is known
/// to be allowed to submit.
pub async fn configure_submit(
    State(state): State<SharedState>,
    Extension(claims): Extension<Claims>,
    body: Bytes,
) -> ApiResult<Redirect> {
    require_permission(&claims, Permission::ConfigureDefinitions)?;

    let form: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| validation_error(format!("Submitted form is not valid JSON: {}", e)))?;
    let definitions = decode_definitions(&form, DEFINITIONS_FIELD)?;
    let count = definitions.len();

    state.definitions.replace_and_save(definitions).await?;

    tracing::info!("User {} configured {} metadata definitions", claims.email, count);
    Ok(Redirect::to(".."))
}
