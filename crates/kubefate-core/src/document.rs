//! Document codec: cluster records in the document store's native form.
//!
//! Stored key spellings are fixed by existing data, including the legacy
//! plural `namespaces`. Status is stored as its integer ordinal.

use serde_json::Value;
use uuid::Uuid;

use crate::{
    cluster::{Cluster, ValueMap},
    status::ClusterStatus,
    Error, Result,
};

/// A record as held by the document store
pub type Document = serde_json::Map<String, Value>;

/// Persisted key names
pub mod keys {
    pub const UUID: &str = "uuid";
    pub const NAME: &str = "name";
    pub const NAMESPACE: &str = "namespaces";
    pub const REVISION: &str = "revision";
    pub const CHART_VERSION: &str = "chart_version";
    pub const CHART_NAME: &str = "chart_name";
    pub const CHART_VALUES: &str = "chart_values";
    pub const VALUES: &str = "values";
    pub const CLUSTER_TYPE: &str = "cluster_type";
    pub const METADATA: &str = "metadata";
    pub const STATUS: &str = "status";
    pub const CONFIG: &str = "config";
    pub const INFO: &str = "info";
}

/// Encode a cluster. `cluster_type`, `config` and `info` are left out when empty.
#[must_use]
pub fn to_document(cluster: &Cluster) -> Document {
    let mut doc = Document::new();
    doc.insert(keys::UUID.into(), Value::String(cluster.uuid.to_string()));
    doc.insert(keys::NAME.into(), Value::String(cluster.name.clone()));
    doc.insert(keys::NAMESPACE.into(), Value::String(cluster.namespace.clone()));
    doc.insert(keys::REVISION.into(), Value::from(cluster.revision));
    doc.insert(
        keys::CHART_VERSION.into(),
        Value::String(cluster.chart_version.clone()),
    );
    doc.insert(keys::CHART_NAME.into(), Value::String(cluster.chart_name.clone()));
    doc.insert(
        keys::CHART_VALUES.into(),
        Value::Object(cluster.chart_values.clone()),
    );
    doc.insert(keys::VALUES.into(), Value::String(cluster.values.clone()));
    doc.insert(keys::METADATA.into(), Value::Object(cluster.metadata.clone()));
    doc.insert(keys::STATUS.into(), Value::from(cluster.status.ordinal()));

    if !cluster.cluster_type.is_empty() {
        doc.insert(
            keys::CLUSTER_TYPE.into(),
            Value::String(cluster.cluster_type.clone()),
        );
    }
    if !cluster.config.is_empty() {
        doc.insert(keys::CONFIG.into(), Value::Object(cluster.config.clone()));
    }
    if !cluster.info.is_empty() {
        doc.insert(keys::INFO.into(), Value::Object(cluster.info.clone()));
    }

    doc
}

/// Decode a stored document. Unknown keys are ignored.
///
/// # Errors
///
/// - `Error::TypeAssertion` if `uuid`, `name`, `namespaces` or `status` is
///   missing, or any known key holds the wrong kind of value
/// - `Error::InvalidStatus` if the status ordinal is out of range
pub fn from_document(doc: &Document) -> Result<Cluster> {
    let uuid_text = required_str(doc, keys::UUID)?;
    let uuid = Uuid::parse_str(uuid_text)
        .map_err(|e| Error::type_assertion(format!("'{}' is not a uuid: {e}", keys::UUID)))?;

    let ordinal = required(doc, keys::STATUS)?
        .as_i64()
        .ok_or_else(|| wrong_kind(keys::STATUS, "an integer"))?;

    Ok(Cluster {
        uuid,
        name: required_str(doc, keys::NAME)?.to_string(),
        namespace: required_str(doc, keys::NAMESPACE)?.to_string(),
        revision: revision(doc)?,
        chart_version: optional_str(doc, keys::CHART_VERSION)?,
        chart_values: optional_map(doc, keys::CHART_VALUES)?,
        values: optional_str(doc, keys::VALUES)?,
        chart_name: optional_str(doc, keys::CHART_NAME)?,
        cluster_type: optional_str(doc, keys::CLUSTER_TYPE)?,
        metadata: optional_map(doc, keys::METADATA)?,
        status: ClusterStatus::from_ordinal(ordinal)?,
        config: optional_map(doc, keys::CONFIG)?,
        info: optional_map(doc, keys::INFO)?,
    })
}

/// Decode a loosely-typed store value.
///
/// # Errors
///
/// Returns `Error::NilTarget` for `null`, `Error::TypeAssertion` for anything
/// that is not an object, and the errors of [`from_document`] otherwise.
pub fn from_value(value: &Value) -> Result<Cluster> {
    match value {
        Value::Null => Err(Error::NilTarget),
        Value::Object(doc) => from_document(doc),
        other => Err(Error::type_assertion(format!(
            "expected a document, found {}",
            kind_of(other)
        ))),
    }
}

fn required<'a>(doc: &'a Document, key: &str) -> Result<&'a Value> {
    doc.get(key)
        .filter(|v| !v.is_null())
        .ok_or_else(|| Error::type_assertion(format!("missing key '{key}'")))
}

fn required_str<'a>(doc: &'a Document, key: &str) -> Result<&'a str> {
    required(doc, key)?
        .as_str()
        .ok_or_else(|| wrong_kind(key, "a string"))
}

fn optional_str(doc: &Document, key: &str) -> Result<String> {
    match doc.get(key) {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(wrong_kind(key, "a string")),
    }
}

fn optional_map(doc: &Document, key: &str) -> Result<ValueMap> {
    match doc.get(key) {
        None | Some(Value::Null) => Ok(ValueMap::new()),
        Some(Value::Object(map)) => Ok(map.clone()),
        Some(_) => Err(wrong_kind(key, "a mapping")),
    }
}

fn revision(doc: &Document) -> Result<u64> {
    match doc.get(keys::REVISION) {
        None | Some(Value::Null) => Ok(0),
        Some(value) => value
            .as_u64()
            .ok_or_else(|| wrong_kind(keys::REVISION, "a non-negative integer")),
    }
}

fn wrong_kind(key: &str, expected: &str) -> Error {
    Error::type_assertion(format!("'{key}' must be {expected}"))
}

const fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a bool",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a mapping",
    }
}
