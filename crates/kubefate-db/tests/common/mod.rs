//! Shared fixtures for repository integration tests
//!
//! Each backend is opened through `open_store` so the configuration path is
//! exercised by the same scenarios.

#![allow(dead_code)]

use std::sync::{Arc, Once};

use kubefate_core::Cluster;
use kubefate_db::{open_store, Backend, ClusterRepository, ConfigError, DbConfig, Store};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

pub const NAMESPACE: &str = "fate-demo";

/// Route `tracing` output through the test harness; `RUST_LOG` selects levels
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// A repository plus whatever must outlive it
pub struct Harness {
    pub repo: ClusterRepository,
    pub token: CancellationToken,
    _dir: Option<TempDir>,
}

impl Harness {
    pub async fn new(backend: Backend, enforce_active_uniqueness: bool) -> Result<Self, ConfigError> {
        match backend {
            Backend::Memory => Self::memory(enforce_active_uniqueness).await,
            Backend::Sqlite => Self::sqlite(enforce_active_uniqueness).await,
        }
    }

    pub async fn memory(enforce_active_uniqueness: bool) -> Result<Self, ConfigError> {
        let config = DbConfig {
            enforce_active_uniqueness,
            ..DbConfig::default()
        };
        Self::open(&config, None).await
    }

    pub async fn sqlite(enforce_active_uniqueness: bool) -> Result<Self, ConfigError> {
        let dir = TempDir::new().map_err(|e| ConfigError::Invalid(e.to_string()))?;
        let path = dir.path().join("kubefate.db");
        let config = DbConfig {
            backend: Backend::Sqlite,
            database_url: Some(format!("sqlite:{}?mode=rwc", path.display())),
            max_connections: 4,
            enforce_active_uniqueness,
        };
        Self::open(&config, Some(dir)).await
    }

    async fn open(config: &DbConfig, dir: Option<TempDir>) -> Result<Self, ConfigError> {
        init_tracing();
        let store: Arc<dyn Store> = open_store(config).await?;
        Ok(Self {
            repo: ClusterRepository::new(store),
            token: CancellationToken::new(),
            _dir: dir,
        })
    }
}

/// `fate` chart cluster in the shared test namespace
pub fn cluster(name: &str) -> Cluster {
    Cluster::new(name, NAMESPACE, "fate", "v1.2.0").expect("fixture arguments are non-empty")
}
