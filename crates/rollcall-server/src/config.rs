//! Server configuration
//!
//! Loaded from a TOML file, then overridden from the environment:
//! - `ROLLCALL_DATABASE_URL` replaces `database.url`
//! - `ROLLCALL_STORAGE_TOKEN` replaces `drive.access_token`
//! - `ROLLCALL_ADMIN_TOKEN` adds an administrative bearer token

use crate::auth::TokenEntry;
use rollcall_core::observability::LogFormat;
use rollcall_core::{ConfigError, PipelineConfig, StorageLayout};
use rollcall_render::ChromiumConfig;
use rollcall_storage::DriveConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

/// Environment variable overriding the database URL
pub const ENV_DATABASE_URL: &str = "ROLLCALL_DATABASE_URL";
/// Environment variable overriding the storage access token
pub const ENV_STORAGE_TOKEN: &str = "ROLLCALL_STORAGE_TOKEN";
/// Environment variable adding an admin token
pub const ENV_ADMIN_TOKEN: &str = "ROLLCALL_ADMIN_TOKEN";

/// HTTP listener settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Postgres connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Connection URL
    pub url: String,
    /// Pool size
    pub max_connections: u32,
    /// Create missing tables at startup
    pub ensure_schema: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            ensure_schema: true,
        }
    }
}

/// Bearer tokens accepted by the server
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Token table
    pub tokens: Vec<TokenEntry>,
}

/// Log output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Output format
    pub format: LogFormat,
    /// Filter used when `RUST_LOG` is unset
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            filter: "info".to_string(),
        }
    }
}

/// Complete server configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP listener
    pub server: ServerConfig,
    /// Batch sizes and render timings
    pub pipeline: PipelineConfig,
    /// Remote folder root and sharing
    pub storage: StorageLayout,
    /// Drive client
    pub drive: DriveConfig,
    /// Render service
    pub renderer: ChromiumConfig,
    /// Event store
    pub database: DatabaseConfig,
    /// Token table
    pub auth: AuthConfig,
    /// Log output
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Read a TOML file, apply environment overrides and validate
    ///
    /// # Errors
    /// - `ConfigError::Load` if the file cannot be read or parsed
    /// - Any validation error
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Load(format!("{}: {e}", path.display())))?;
        let mut config = Self::from_toml(&text)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse TOML text without overrides or validation
    ///
    /// # Errors
    /// - `ConfigError::Load` on malformed TOML
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Load(e.to_string()))
    }

    /// Apply overrides from a variable lookup
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_DATABASE_URL) {
            self.database.url = url;
        }
        if let Some(token) = lookup(ENV_STORAGE_TOKEN) {
            self.drive.access_token = token;
        }
        if let Some(token) = lookup(ENV_ADMIN_TOKEN) {
            self.auth.tokens.push(TokenEntry::admin("env-admin", token));
        }
    }

    /// Parsed listen address
    ///
    /// # Errors
    /// - `ConfigError::InvalidValue` if `server.bind` is not a socket address
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.server
            .bind
            .parse()
            .map_err(|e| ConfigError::invalid("server.bind", format!("{e}")))
    }

    /// Check every section
    ///
    /// # Errors
    /// The first invalid or missing setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bind_addr()?;
        self.pipeline.validate()?;
        self.storage.validate()?;
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::Missing("database.url"));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::invalid(
                "database.max_connections",
                "must be greater than zero",
            ));
        }
        if self.drive.access_token.trim().is_empty() {
            return Err(ConfigError::Missing("drive.access_token"));
        }
        if !self.auth.tokens.iter().any(|t| t.admin) {
            return Err(ConfigError::Missing("auth.tokens (admin)"));
        }
        Ok(())
    }
}
