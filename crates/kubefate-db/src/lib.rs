//! kubefate-db - persistence for KubeFATE cluster records
//!
//! This crate provides:
//! - The `Store` collaborator trait and two backends (`MemoryStore`, `SqliteStore`)
//! - `UniqueIndex`, the partial unique index used for active-name uniqueness
//! - `ClusterRepository`, the typed query/mutation facade over a store
//! - `DbConfig` and `open_store` for choosing a backend from TOML

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod config;
pub mod repository;
pub mod store;

pub use config::{open_store, Backend, ConfigError, DbConfig};
pub use repository::ClusterRepository;
pub use store::{MemoryStore, SqliteStore, Store, UniqueIndex};
