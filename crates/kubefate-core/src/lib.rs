//! kubefate-core - cluster record domain for the KubeFATE deployment controller
//!
//! This crate provides:
//! - `ClusterStatus`, its lifecycle state machine and the symbolic status codec
//! - `Cluster`, the persisted record of one deployed Helm chart instance
//! - The document codec mapping clusters to stored documents
//! - `Filter` expressions used to query stored documents
//!
//! Nothing here performs I/O; stores and the repository live in `kubefate-db`.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod cluster;
pub mod document;
pub mod error;
pub mod filter;
pub mod status;

pub use cluster::{Cluster, ValueMap};
pub use document::{from_document, from_value, to_document, Document};
pub use error::{Error, Result, StoreError, StoreResult};
pub use filter::Filter;
pub use status::{decode_status, decode_status_into, encode_status, validate_transition, ClusterStatus};
