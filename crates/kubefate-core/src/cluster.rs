//! The cluster record: one entry per deployed Helm chart instance.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    status::{validate_transition, ClusterStatus},
    Error, Result,
};

/// Open mapping used for chart values, metadata, config and runtime info
pub type ValueMap = serde_json::Map<String, serde_json::Value>;

/// A deployed application cluster.
///
/// The serde form is the external API encoding: the namespace is exposed as
/// `namespaces`, `Config`/`Info` keep their capitalization, status is the
/// symbolic name, and `cluster_type`, `Config`, `Info` are omitted when empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub(crate) uuid: Uuid,
    pub name: String,
    #[serde(rename = "namespaces")]
    pub namespace: String,
    /// Bumped by the repository on every successful update
    pub revision: u64,
    /// Helm chart version, example: fate v1.2.0
    pub chart_version: String,
    #[serde(default)]
    pub chart_values: ValueMap,
    /// Values handed to the chart when installing
    #[serde(default)]
    pub values: String,
    pub chart_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cluster_type: String,
    #[serde(default)]
    pub metadata: ValueMap,
    pub status: ClusterStatus,
    #[serde(rename = "Config", default, skip_serializing_if = "ValueMap::is_empty")]
    pub config: ValueMap,
    #[serde(rename = "Info", default, skip_serializing_if = "ValueMap::is_empty")]
    pub info: ValueMap,
}

impl Cluster {
    /// Collection holding cluster documents
    pub const COLLECTION: &'static str = "cluster";

    /// Create a cluster record with a fresh v4 uuid, revision 0 and status
    /// `Creating`. Nothing is persisted.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidArgument` if any argument is empty or whitespace-only.
    pub fn new(name: &str, namespace: &str, chart_name: &str, chart_version: &str) -> Result<Self> {
        require_non_empty("name", name)?;
        require_non_empty("namespace", namespace)?;
        require_non_empty("chart_name", chart_name)?;
        require_non_empty("chart_version", chart_version)?;

        Ok(Self {
            uuid: Uuid::new_v4(),
            name: name.to_string(),
            namespace: namespace.to_string(),
            revision: 0,
            chart_version: chart_version.to_string(),
            chart_values: ValueMap::new(),
            values: String::new(),
            chart_name: chart_name.to_string(),
            cluster_type: String::new(),
            metadata: ValueMap::new(),
            status: ClusterStatus::Creating,
            config: ValueMap::new(),
            info: ValueMap::new(),
        })
    }

    /// Primary key, fixed at construction
    #[must_use]
    pub const fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// Move to `next` if the lifecycle permits it.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidTransition` and leaves the status unchanged otherwise.
    pub fn transition_to(&mut self, next: ClusterStatus) -> Result<()> {
        validate_transition(self.status, next)?;
        self.status = next;
        Ok(())
    }

    #[must_use]
    pub fn with_chart_values(mut self, chart_values: ValueMap) -> Self {
        self.chart_values = chart_values;
        self
    }

    #[must_use]
    pub fn with_values(mut self, values: impl Into<String>) -> Self {
        self.values = values.into();
        self
    }

    #[must_use]
    pub fn with_cluster_type(mut self, cluster_type: impl Into<String>) -> Self {
        self.cluster_type = cluster_type.into();
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: ValueMap) -> Self {
        self.metadata = metadata;
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: ValueMap) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_info(mut self, info: ValueMap) -> Self {
        self.info = info;
        self
    }
}

fn require_non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(Error::invalid_argument(format!("{field} cannot be empty")))
    } else {
        Ok(())
    }
}
