//! Authentication and authorization module
//!
//! Provides JWT-based authentication and permission checks for the
//! configuration endpoints.

mod jwt;
mod middleware;
mod password;

pub use jwt::{Claims, JwtKeys, TokenPair};
pub use middleware::{auth_middleware, require_permission};
pub use password::{hash_password, verify_password};

use serde::{Deserialize, Serialize};

/// User roles for authorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Can read definitions and node metadata
    #[default]
    Viewer,
    /// Can additionally manage nodes and their metadata
    Configurer,
    /// Can do everything, including editing metadata definitions
    Admin,
}

/// Actions guarded by a role check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Permission {
    Read,
    ConfigureNodes,
    ConfigureDefinitions,
}

impl Role {
    pub fn has_permission(&self, permission: Permission) -> bool {
        match permission {
            Permission::Read => true,
            Permission::ConfigureNodes => matches!(self, Role::Configurer | Role::Admin),
            Permission::ConfigureDefinitions => matches!(self, Role::Admin),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Viewer => write!(f, "viewer"),
            Role::Configurer => write!(f, "configurer"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Permission::Read => write!(f, "read"),
            Permission::ConfigureNodes => write!(f, "configure nodes"),
            Permission::ConfigureDefinitions => write!(f, "configure definitions"),
        }
    }
}
