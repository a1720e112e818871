//! Application configuration module
//!
//! Handles loading and validating configuration from environment variables.

use serde::Deserialize;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use thiserror::Error;

/// Secret used when `JWT_SECRET` is unset; development only
pub const DEV_JWT_SECRET: &str = "node-metadata-dev-secret-change-in-production";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: Ipv4Addr,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: Ipv4Addr::new(0, 0, 0, 0),
            port: 3000,
        }
    }
}

/// Where definitions and node configurations are saved
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
        }
    }
}

/// CORS configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["http://localhost:3001".to_string()],
        }
    }
}

/// Token signing and the seeded administrator account
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub admin_email: String,
    pub admin_password: Option<String>,
    pub bcrypt_cost: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: DEV_JWT_SECRET.to_string(),
            admin_email: "admin@node-metadata.local".to_string(),
            admin_password: None,
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }
}

/// Complete application settings
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub cors: CorsConfig,
    pub auth: AuthConfig,
}

impl Settings {
    /// Load settings from environment variables
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if it exists (ignore errors if file not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup, falling back to defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Settings::default();

        let server = ServerConfig {
            host: lookup("HOST")
                .and_then(|h| h.parse().ok())
                .unwrap_or(defaults.server.host),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.server.port),
        };

        let storage = StorageConfig {
            data_dir: lookup("DATA_DIR")
                .filter(|d| !d.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.storage.data_dir),
        };

        let cors = CorsConfig {
            allowed_origins: lookup("ALLOWED_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(defaults.cors.allowed_origins),
        };

        let bcrypt_cost = match lookup("BCRYPT_COST") {
            Some(raw) => {
                let cost: u32 = raw
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue(format!("BCRYPT_COST={}", raw)))?;
                if !(4..=31).contains(&cost) {
                    return Err(ConfigError::InvalidValue(format!(
                        "BCRYPT_COST must be between 4 and 31, got {}",
                        cost
                    )));
                }
                cost
            }
            None => defaults.auth.bcrypt_cost,
        };

        let auth = AuthConfig {
            jwt_secret: lookup("JWT_SECRET").unwrap_or(defaults.auth.jwt_secret),
            admin_email: lookup("ADMIN_EMAIL").unwrap_or(defaults.auth.admin_email),
            admin_password: lookup("ADMIN_PASSWORD").filter(|p| !p.is_empty()),
            bcrypt_cost,
        };

        Ok(Self {
            server,
            storage,
            cors,
            auth,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_server_config() {
        let config = ServerConfig::default();
        assert_eq!(config.host, Ipv4Addr::new(0, 0, 0, 0));
        assert_eq!(config.port, 3000);
    }

    #[test]
    fn test_values_from_lookup() {
        let settings = Settings::from_lookup(lookup(&[
            ("PORT", "8080"),
            ("DATA_DIR", "/var/lib/metadata"),
            ("ALLOWED_ORIGINS", "http://a, http://b"),
            ("ADMIN_PASSWORD", "hunter22"),
        ]))
        .unwrap();

        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.storage.data_dir, PathBuf::from("/var/lib/metadata"));
        assert_eq!(settings.cors.allowed_origins, vec!["http://a", "http://b"]);
        assert_eq!(settings.auth.admin_password.as_deref(), Some("hunter22"));
        assert_eq!(settings.auth.jwt_secret, DEV_JWT_SECRET);
    }

    #[test]
    fn test_unparsable_port_falls_back() {
        let settings = Settings::from_lookup(lookup(&[("PORT", "not-a-port")])).unwrap();
        assert_eq!(settings.server.port, 3000);
    }

    #[test]
    fn test_bad_bcrypt_cost_is_rejected() {
        assert!(Settings::from_lookup(lookup(&[("BCRYPT_COST", "2")])).is_err());
        assert!(Settings::from_lookup(lookup(&[("BCRYPT_COST", "many")])).is_err());
    }
}
