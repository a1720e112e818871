//! Application state management
//!
//! Contains shared state accessible across all handlers. Built once by
//! `main` and handed to the router.

use crate::auth::JwtKeys;
use crate::config::Settings;
use crate::error::AppError;
use crate::metadata::DefinitionStore;
use crate::nodes::NodeRegistry;
use crate::storage::SharedStorage;
use crate::users::UserStore;
use std::sync::Arc;

/// Application state shared across all handlers
pub struct AppState {
    /// Preset metadata definitions (one list for the whole process)
    pub definitions: DefinitionStore,

    /// Build nodes and their metadata properties
    pub nodes: NodeRegistry,

    /// Local user directory for token issuing
    pub users: UserStore,

    /// JWT keys for token signing
    pub jwt: JwtKeys,
}

impl AppState {
    /// Restore saved state from storage and seed the admin account
    pub async fn load(storage: SharedStorage, settings: &Settings) -> Result<Self, AppError> {
        let definitions = DefinitionStore::load(storage.clone()).await?;
        let nodes = NodeRegistry::load_all(storage).await?;

        let users = UserStore::new();
        match &settings.auth.admin_password {
            Some(password) => {
                users
                    .register(
                        &settings.auth.admin_email,
                        password,
                        "Administrator",
                        crate::auth::Role::Admin,
                        settings.auth.bcrypt_cost,
                    )
                    .await?;
                tracing::info!("Seeded administrator {}", settings.auth.admin_email);
            }
            None => tracing::warn!("ADMIN_PASSWORD not set, no administrator can log in"),
        }

        Ok(Self {
            definitions,
            nodes,
            users,
            jwt: JwtKeys::new(&settings.auth.jwt_secret),
        })
    }
}

/// Type alias for shared state
pub type SharedState = Arc<AppState>;
