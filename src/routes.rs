//! Route definitions and router setup
//!
//! Configures all API routes and middleware.

mod auth;
mod configuration;
mod nodes;

use crate::auth::auth_middleware;
use crate::config::Settings;
use crate::state::SharedState;
use axum::{
    http::{header, Method},
    middleware,
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    request_id::MakeRequestUuid,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
    ServiceBuilderExt,
};
use tracing::Level;

pub use configuration::URL_NAME;

/// Create the application router with all routes and middleware
pub fn create_router(state: SharedState, settings: &Settings) -> Router {
    // Build CORS layer
    let cors = build_cors_layer(settings);

    // Build tracing/logging layer
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    // Build middleware stack
    let middleware_stack = ServiceBuilder::new()
        .set_x_request_id(MakeRequestUuid)
        .layer(trace_layer)
        .layer(CompressionLayer::new())
        .layer(cors)
        .propagate_x_request_id();

    let public = Router::new()
        .route("/health", get(health_check))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/refresh", post(auth::refresh));

    let protected = Router::new()
        .route("/api/auth/me", get(auth::me))
        // Metadata configuration page
        .route(&format!("/{}/page", URL_NAME), get(configuration::page))
        .route(
            &format!("/{}/descriptors", URL_NAME),
            get(configuration::list_descriptors),
        )
        .route(
            &format!("/{}/definitions", URL_NAME),
            get(configuration::list_definitions),
        )
        .route(
            &format!("/{}/configSubmit", URL_NAME),
            post(configuration::configure_submit),
        )
        // Nodes and node metadata
        .route("/api/nodes", get(nodes::list_nodes).post(nodes::create_node))
        .route(
            "/api/nodes/{name}",
            get(nodes::get_node).delete(nodes::delete_node),
        )
        .route("/api/nodes/{name}/reload", post(nodes::reload_node))
        .route(
            "/api/nodes/{name}/apply-definitions",
            post(nodes::apply_definitions),
        )
        .route("/api/nodes/{name}/metadata", get(nodes::get_metadata))
        .route(
            "/api/nodes/{name}/metadata/{*path}",
            get(nodes::get_metadata_path)
                .put(nodes::set_metadata_value)
                .post(nodes::create_metadata_path)
                .delete(nodes::delete_metadata_path),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    public
        .merge(protected)
        .layer(middleware_stack)
        .with_state(state)
}

/// Build CORS layer from settings
fn build_cors_layer(settings: &Settings) -> CorsLayer {
    let origins: Vec<_> = settings
        .cors
        .allowed_origins
        .iter()
        .filter_map(|s| s.parse().ok())
        .collect();

    let cors = if origins.is_empty() {
        CorsLayer::new().allow_origin(Any)
    } else {
        CorsLayer::new().allow_origin(origins)
    };

    cors.allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
        .max_age(Duration::from_secs(3600))
}

/// Health check endpoint
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "success": true,
        "message": "Server is running fine.",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{JwtKeys, Role};
    use crate::metadata::DefinitionStore;
    use crate::nodes::NodeRegistry;
    use crate::state::AppState;
    use crate::storage::{FileStorage, MemoryStorage, SharedStorage};
    use crate::users::UserStore;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::response::Response;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;
    use uuid::Uuid;

    struct TestApp {
        router: Router,
        state: SharedState,
    }

    impl TestApp {
        fn new() -> Self {
            Self::with_storage(Arc::new(MemoryStorage::new()))
        }

        fn with_storage(storage: SharedStorage) -> Self {
            let state = Arc::new(AppState {
                definitions: DefinitionStore::new(storage.clone()),
                nodes: NodeRegistry::new(storage),
                users: UserStore::new(),
                jwt: JwtKeys::new("router-test-secret"),
            });
            let router = create_router(state.clone(), &Settings::default());
            Self { router, state }
        }

        fn token(&self, role: Role) -> String {
            self.state
                .jwt
                .create_tokens(Uuid::new_v4(), "tester@example.com", role)
                .unwrap()
                .access_token
        }

        async fn send(&self, method: Method, uri: &str, role: Option<Role>, body: Option<Value>) -> Response {
            let mut builder = Request::builder().method(method).uri(uri);
            if let Some(role) = role {
                builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", self.token(role)));
            }
            let body = match body {
                Some(value) => {
                    builder = builder.header(header::CONTENT_TYPE, "application/json");
                    Body::from(value.to_string())
                }
                None => Body::empty(),
            };
            self.router
                .clone()
                .oneshot(builder.body(body).unwrap())
                .await
                .unwrap()
        }
    }

    async fn json_body(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn definitions_form() -> Value {
        json!({
            "definitions": [
                { "kind": "string", "name": "owner", "description": "Owning team", "defaultValue": "ci" },
                { "kind": "tree", "name": "os", "children": [
                    { "kind": "string", "name": "family", "defaultValue": "linux" }
                ] }
            ]
        })
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let app = TestApp::new();
        let response = app.send(Method::GET, "/health", None, None).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_protected_routes_need_a_token() {
        let app = TestApp::new();
        let response = app.send(Method::GET, "/api/nodes", None, None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn test_page_visibility_follows_permission() {
        let app = TestApp::new();

        let admin = json_body(app.send(Method::GET, "/MetaDataConfiguration/page", Some(Role::Admin), None).await).await;
        assert_eq!(admin["urlName"], "MetaDataConfiguration");
        assert_eq!(admin["iconFileName"], "clock.png");
        assert_eq!(admin["requiredPermission"], "configureDefinitions");

        let viewer = json_body(app.send(Method::GET, "/MetaDataConfiguration/page", Some(Role::Viewer), None).await).await;
        assert_eq!(viewer["urlName"], "MetaDataConfiguration");
        assert!(viewer["iconFileName"].is_null());
        assert!(viewer["displayName"].is_null());
    }

    #[tokio::test]
    async fn test_submit_replaces_definitions_and_redirects() {
        let app = TestApp::new();
        let response = app
            .send(
                Method::POST,
                "/MetaDataConfiguration/configSubmit",
                Some(Role::Admin),
                Some(definitions_form()),
            )
            .await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "..");

        let body = json_body(
            app.send(Method::GET, "/MetaDataConfiguration/definitions", Some(Role::Admin), None)
                .await,
        )
        .await;
        let names: Vec<_> = body["definitions"]
            .as_array()
            .unwrap()
            .iter()
            .map(|d| d["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["owner", "os"]);
    }

    #[tokio::test]
    async fn test_bad_submit_keeps_previous_definitions() {
        let app = TestApp::new();
        app.send(
            Method::POST,
            "/MetaDataConfiguration/configSubmit",
            Some(Role::Admin),
            Some(definitions_form()),
        )
        .await;

        let response = app
            .send(
                Method::POST,
                "/MetaDataConfiguration/configSubmit",
                Some(Role::Admin),
                Some(json!({ "definitions": [{ "kind": "hologram", "name": "x" }] })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["code"], "VALIDATION_ERROR");
        assert_eq!(app.state.definitions.count().await, 2);
    }

    #[tokio::test]
    async fn test_submit_forbidden_without_permission() {
        let app = TestApp::new();
        let response = app
            .send(
                Method::POST,
                "/MetaDataConfiguration/configSubmit",
                Some(Role::Configurer),
                Some(definitions_form()),
            )
            .await;

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(app.state.definitions.count().await, 0);
    }

    #[tokio::test]
    async fn test_submit_surfaces_storage_failure() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"file").unwrap();
        let app = TestApp::with_storage(Arc::new(FileStorage::new(&blocker)));

        let response = app
            .send(
                Method::POST,
                "/MetaDataConfiguration/configSubmit",
                Some(Role::Admin),
                Some(definitions_form()),
            )
            .await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_body(response).await["code"], "IO_ERROR");
    }

    #[tokio::test]
    async fn test_node_metadata_round_trip() {
        let app = TestApp::new();
        let created = app
            .send(Method::POST, "/api/nodes", Some(Role::Configurer), Some(json!({ "name": "slave0" })))
            .await;
        assert_eq!(created.status(), StatusCode::CREATED);

        let set = app
            .send(
                Method::PUT,
                "/api/nodes/slave0/metadata/some/kind/of/path",
                Some(Role::Configurer),
                Some(json!({ "type": "string", "value": "test", "description": "description" })),
            )
            .await;
        assert_eq!(set.status(), StatusCode::OK);

        let reloaded = app
            .send(Method::POST, "/api/nodes/slave0/reload", Some(Role::Viewer), None)
            .await;
        assert_eq!(reloaded.status(), StatusCode::OK);

        let body = json_body(
            app.send(
                Method::GET,
                "/api/nodes/slave0/metadata/some/kind/of/path",
                Some(Role::Viewer),
                None,
            )
            .await,
        )
        .await;
        assert_eq!(body["metadata"]["value"], "test");
        assert_eq!(body["metadata"]["description"], "description");

        let missing = app
            .send(Method::GET, "/api/nodes/slave0/metadata/some/other", Some(Role::Viewer), None)
            .await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_path_collision_is_a_conflict() {
        let app = TestApp::new();
        app.send(Method::POST, "/api/nodes", Some(Role::Admin), Some(json!({ "name": "n" })))
            .await;
        app.send(
            Method::PUT,
            "/api/nodes/n/metadata/a",
            Some(Role::Admin),
            Some(json!({ "type": "number", "value": 1 })),
        )
        .await;

        let response = app
            .send(
                Method::PUT,
                "/api/nodes/n/metadata/a/b",
                Some(Role::Admin),
                Some(json!({ "type": "string", "value": "x" })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_empty_path_segment_is_a_bad_request() {
        let app = TestApp::new();
        app.send(Method::POST, "/api/nodes", Some(Role::Admin), Some(json!({ "name": "n" })))
            .await;

        let response = app
            .send(
                Method::PUT,
                "/api/nodes/n/metadata/a//b",
                Some(Role::Admin),
                Some(json!({ "type": "string", "value": "x" })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["code"], "BAD_REQUEST");

        let metadata = json_body(app.send(Method::GET, "/api/nodes/n/metadata", Some(Role::Viewer), None).await).await;
        assert_eq!(metadata["metadata"]["values"], json!([]));
    }

    #[tokio::test]
    async fn test_apply_definitions_conflicts_with_existing_leaf() {
        let app = TestApp::new();
        app.send(
            Method::POST,
            "/MetaDataConfiguration/configSubmit",
            Some(Role::Admin),
            Some(definitions_form()),
        )
        .await;
        app.send(Method::POST, "/api/nodes", Some(Role::Admin), Some(json!({ "name": "n" })))
            .await;
        app.send(
            Method::PUT,
            "/api/nodes/n/metadata/os",
            Some(Role::Admin),
            Some(json!({ "type": "string", "value": "windows" })),
        )
        .await;

        let response = app
            .send(Method::POST, "/api/nodes/n/apply-definitions", Some(Role::Configurer), None)
            .await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(json_body(response).await["code"], "CONFLICT");

        let owner = app
            .send(Method::GET, "/api/nodes/n/metadata/owner", Some(Role::Viewer), None)
            .await;
        assert_eq!(owner.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_viewer_cannot_write_metadata() {
        let app = TestApp::new();
        app.send(Method::POST, "/api/nodes", Some(Role::Admin), Some(json!({ "name": "n" })))
            .await;

        let response = app
            .send(
                Method::PUT,
                "/api/nodes/n/metadata/a",
                Some(Role::Viewer),
                Some(json!({ "type": "string", "value": "x" })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_apply_definitions_fills_defaults() {
        let app = TestApp::new();
        app.send(
            Method::POST,
            "/MetaDataConfiguration/configSubmit",
            Some(Role::Admin),
            Some(definitions_form()),
        )
        .await;
        app.send(Method::POST, "/api/nodes", Some(Role::Admin), Some(json!({ "name": "n" })))
            .await;

        let body = json_body(
            app.send(Method::POST, "/api/nodes/n/apply-definitions", Some(Role::Configurer), None)
                .await,
        )
        .await;
        assert_eq!(body["added"], 2);

        let family = json_body(
            app.send(Method::GET, "/api/nodes/n/metadata/os/family", Some(Role::Viewer), None)
                .await,
        )
        .await;
        assert_eq!(family["metadata"]["value"], "linux");
    }

    #[tokio::test]
    async fn test_delete_metadata_and_node() {
        let app = TestApp::new();
        app.send(Method::POST, "/api/nodes", Some(Role::Admin), Some(json!({ "name": "n" })))
            .await;
        let branch = app
            .send(Method::POST, "/api/nodes/n/metadata/hw/gpu", Some(Role::Admin), None)
            .await;
        assert_eq!(branch.status(), StatusCode::CREATED);

        let existing = app
            .send(Method::POST, "/api/nodes/n/metadata/hw/gpu", Some(Role::Admin), None)
            .await;
        assert_eq!(existing.status(), StatusCode::OK);

        let removed = app
            .send(Method::DELETE, "/api/nodes/n/metadata/hw", Some(Role::Admin), None)
            .await;
        assert_eq!(removed.status(), StatusCode::OK);
        let again = app
            .send(Method::DELETE, "/api/nodes/n/metadata/hw", Some(Role::Admin), None)
            .await;
        assert_eq!(again.status(), StatusCode::NOT_FOUND);

        let deleted = app.send(Method::DELETE, "/api/nodes/n", Some(Role::Admin), None).await;
        assert_eq!(deleted.status(), StatusCode::OK);
        let gone = app.send(Method::GET, "/api/nodes/n", Some(Role::Viewer), None).await;
        assert_eq!(gone.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_login_issues_working_tokens() {
        let app = TestApp::new();
        app.state
            .users
            .register("admin@example.com", "admin-pass", "Admin", Role::Admin, 4)
            .await
            .unwrap();

        let bad = app
            .send(
                Method::POST,
                "/api/auth/login",
                None,
                Some(json!({ "email": "admin@example.com", "password": "nope" })),
            )
            .await;
        assert_eq!(bad.status(), StatusCode::UNAUTHORIZED);

        let body = json_body(
            app.send(
                Method::POST,
                "/api/auth/login",
                None,
                Some(json!({ "email": "admin@example.com", "password": "admin-pass" })),
            )
            .await,
        )
        .await;
        let token = body["tokens"]["accessToken"].as_str().unwrap().to_string();

        let me = app
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/auth/me")
                    .header(header::AUTHORIZATION, format!("Bearer {}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(me.status(), StatusCode::OK);
        assert_eq!(json_body(me).await["user"]["role"], "admin");
    }
}
