//! User management module
//!
//! Local user directory used to issue tokens for the configuration API.

use crate::auth::{hash_password, Role};
use crate::error::{conflict_error, AppError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// User model
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub name: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// User response (without sensitive data)
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        UserResponse {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role,
        }
    }
}

/// In-memory user store
pub struct UserStore {
    users: Arc<RwLock<HashMap<Uuid, User>>>,
    email_index: Arc<RwLock<HashMap<String, Uuid>>>,
}

impl UserStore {
    pub fn new() -> Self {
        Self {
            users: Arc::new(RwLock::new(HashMap::new())),
            email_index: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Create a new user
    pub async fn create(&self, user: User) -> Result<User, AppError> {
        let mut users = self.users.write().await;
        let mut email_index = self.email_index.write().await;

        if email_index.contains_key(&user.email) {
            return Err(conflict_error("Email already registered"));
        }

        email_index.insert(user.email.clone(), user.id);
        users.insert(user.id, user.clone());

        Ok(user)
    }

    /// Find user by email
    pub async fn find_by_email(&self, email: &str) -> Option<User> {
        let email_index = self.email_index.read().await;
        let users = self.users.read().await;

        email_index.get(email).and_then(|id| users.get(id).cloned())
    }

    /// Find user by ID
    pub async fn find_by_id(&self, id: Uuid) -> Option<User> {
        let users = self.users.read().await;
        users.get(&id).cloned()
    }

    /// Add a user with a freshly hashed password
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        name: &str,
        role: Role,
        cost: u32,
    ) -> Result<User, AppError> {
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: hash_password(password, cost)?,
            name: name.to_string(),
            role,
            created_at: Utc::now(),
        };
        self.create(user).await
    }
}

impl Default for UserStore {
    fn default() -> Self {
        Self::new()
    }
}
