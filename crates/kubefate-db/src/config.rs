//! Store configuration
//!
//! Parsed from TOML. Every field has a default, so an empty document yields
//! an in-memory store without the active-name index:
//!
//! ```toml
//! backend = "sqlite"
//! database_url = "sqlite:/var/lib/kubefate/kubefate.db?mode=rwc"
//! max_connections = 5
//! enforce_active_uniqueness = true
//! ```

use std::sync::Arc;

use kubefate_core::{Cluster, StoreError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::store::{MemoryStore, SqliteStore, Store, UniqueIndex};

/// Which store implementation to open
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct DbConfig {
    pub backend: Backend,
    /// `SQLx` connection URL, required for the sqlite backend
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
    pub max_connections: u32,
    /// Install the `(name, namespaces)` unique index over non-deleted clusters
    pub enforce_active_uniqueness: bool,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Memory,
            database_url: None,
            max_connections: 5,
            enforce_active_uniqueness: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("failed to open store: {0}")]
    Store(#[from] StoreError),
}

impl DbConfig {
    /// Parse and validate a TOML document
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` for malformed TOML or unknown keys, and
    /// `ConfigError::Invalid` if [`validate`](Self::validate) fails
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check field combinations the type system does not
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `max_connections` is zero
    /// - the sqlite backend has no `database_url`, or one without the
    ///   `sqlite:` scheme
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "max_connections must be at least 1".to_string(),
            ));
        }

        match (self.backend, self.database_url.as_deref()) {
            (Backend::Sqlite, None) => Err(ConfigError::Invalid(
                "database_url is required for the sqlite backend".to_string(),
            )),
            (Backend::Sqlite, Some(url)) if !url.starts_with("sqlite:") => Err(
                ConfigError::Invalid(format!("database_url '{url}' is not a sqlite URL")),
            ),
            _ => Ok(()),
        }
    }
}

/// Open the configured backend, installing the active-name index if asked
///
/// # Errors
///
/// Returns `ConfigError::Invalid` for an invalid config and
/// `ConfigError::Store` if the backend cannot be opened
pub async fn open_store(config: &DbConfig) -> Result<Arc<dyn Store>, ConfigError> {
    config.validate()?;

    let store: Arc<dyn Store> = match (config.backend, config.database_url.as_deref()) {
        (Backend::Memory, _) => {
            let store = MemoryStore::new();
            Arc::new(if config.enforce_active_uniqueness {
                store.with_index(Cluster::COLLECTION, UniqueIndex::active_cluster_name())
            } else {
                store
            })
        }
        (Backend::Sqlite, Some(url)) => {
            let store = SqliteStore::connect(url, config.max_connections).await?;
            if config.enforce_active_uniqueness {
                store
                    .create_index(Cluster::COLLECTION, &UniqueIndex::active_cluster_name())
                    .await?;
            }
            Arc::new(store)
        }
        (Backend::Sqlite, None) => {
            return Err(ConfigError::Invalid(
                "database_url is required for the sqlite backend".to_string(),
            ))
        }
    };

    info!(
        backend = ?config.backend,
        enforce_active_uniqueness = config.enforce_active_uniqueness,
        "opened cluster store"
    );
    Ok(store)
}
