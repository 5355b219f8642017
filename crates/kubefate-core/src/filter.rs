//! Portable filter expressions over stored documents.
//!
//! A filter is equality, not-equal, or an explicit AND of sub-filters. Stores
//! may evaluate it in process with [`Filter::matches`] or translate it with
//! [`Filter::to_query`].

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    document::{keys, Document},
    status::ClusterStatus,
};

/// Predicate over a single document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Filter {
    /// Field is present and equal to the value
    Eq { field: String, value: Value },
    /// Field is absent or differs from the value
    Ne { field: String, value: Value },
    /// Every sub-filter matches; an empty AND matches everything
    And(Vec<Filter>),
}

impl Filter {
    #[must_use]
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    #[must_use]
    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Ne {
            field: field.into(),
            value: value.into(),
        }
    }

    #[must_use]
    pub fn and(filters: impl IntoIterator<Item = Self>) -> Self {
        Self::And(filters.into_iter().collect())
    }

    /// Matches every document
    #[must_use]
    pub const fn all() -> Self {
        Self::And(Vec::new())
    }

    /// Conjoin another filter, flattening nested ANDs
    #[must_use]
    pub fn and_also(self, other: Self) -> Self {
        match (self, other) {
            (Self::And(mut left), Self::And(right)) => {
                left.extend(right);
                Self::And(left)
            }
            (Self::And(mut left), other) => {
                left.push(other);
                Self::And(left)
            }
            (this, Self::And(mut right)) => {
                right.insert(0, this);
                Self::And(right)
            }
            (this, other) => Self::And(vec![this, other]),
        }
    }

    /// Evaluate against a document
    #[must_use]
    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Self::Eq { field, value } => doc.get(field).is_some_and(|v| v == value),
            Self::Ne { field, value } => doc.get(field).map_or(true, |v| v != value),
            Self::And(filters) => filters.iter().all(|f| f.matches(doc)),
        }
    }

    /// Value pinned by a top-level equality on `field`, if any.
    ///
    /// Lets a backend narrow its scan before evaluating the full filter.
    #[must_use]
    pub fn pinned(&self, field: &str) -> Option<&Value> {
        match self {
            Self::Eq { field: f, value } if f == field => Some(value),
            Self::Eq { .. } | Self::Ne { .. } => None,
            Self::And(filters) => filters.iter().find_map(|f| f.pinned(field)),
        }
    }

    /// Render in document-store query syntax
    #[must_use]
    pub fn to_query(&self) -> Value {
        match self {
            Self::Eq { field, value } => json!({ field.as_str(): value }),
            Self::Ne { field, value } => json!({ field.as_str(): { "$ne": value } }),
            Self::And(filters) => {
                json!({ "$and": filters.iter().map(Self::to_query).collect::<Vec<_>>() })
            }
        }
    }
}

/// `uuid == id`
#[must_use]
pub fn by_uuid(id: &Uuid) -> Filter {
    Filter::eq(keys::UUID, id.to_string())
}

/// `name == N AND namespaces == NS AND status == Running`
#[must_use]
pub fn by_name_running(name: &str, namespace: &str) -> Filter {
    by_name(name, namespace).and_also(Filter::eq(
        keys::STATUS,
        ClusterStatus::Running.ordinal(),
    ))
}

/// `name == N AND namespaces == NS AND status != Deleted`
#[must_use]
pub fn by_name_active(name: &str, namespace: &str) -> Filter {
    by_name(name, namespace).and_also(active())
}

/// `status != Deleted`
#[must_use]
pub fn active() -> Filter {
    Filter::ne(keys::STATUS, ClusterStatus::Deleted.ordinal())
}

fn by_name(name: &str, namespace: &str) -> Filter {
    Filter::and([
        Filter::eq(keys::NAME, name),
        Filter::eq(keys::NAMESPACE, namespace),
    ])
}
