//! Partial unique indexes over document fields

use kubefate_core::{document::keys, filter, Document, Filter, StoreError, StoreResult};
use serde_json::Value;

/// Unique constraint over one or more fields, limited to documents matching
/// a partial filter. Documents missing any indexed field are not indexed.
#[derive(Debug, Clone, PartialEq)]
pub struct UniqueIndex {
    name: String,
    fields: Vec<String>,
    partial: Filter,
}

impl UniqueIndex {
    /// Index over `fields` covering every document
    #[must_use]
    pub fn new(name: impl Into<String>, fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            fields: fields.into_iter().map(Into::into).collect(),
            partial: Filter::all(),
        }
    }

    /// Restrict the index to documents matching `filter`
    #[must_use]
    pub fn partial(mut self, filter: Filter) -> Self {
        self.partial = filter;
        self
    }

    /// `(name, namespaces)` unique among clusters that are not deleted
    #[must_use]
    pub fn active_cluster_name() -> Self {
        Self::new("idx_cluster_active_name", [keys::NAME, keys::NAMESPACE])
            .partial(filter::active())
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    #[must_use]
    pub const fn partial_filter(&self) -> &Filter {
        &self.partial
    }

    /// Indexed values of `doc`, or `None` when the document is not covered
    pub(crate) fn key<'a>(&self, doc: &'a Document) -> Option<Vec<&'a Value>> {
        if !self.partial.matches(doc) {
            return None;
        }
        self.fields
            .iter()
            .map(|field| doc.get(field).filter(|v| !v.is_null()))
            .collect()
    }

    /// Reject `doc` if another document in `records` shares its key
    pub(crate) fn check<'a>(
        &self,
        records: impl IntoIterator<Item = (&'a String, &'a Document)>,
        uuid: &str,
        doc: &Document,
    ) -> StoreResult<()> {
        let Some(key) = self.key(doc) else {
            return Ok(());
        };

        let taken = records
            .into_iter()
            .filter(|(id, _)| id.as_str() != uuid)
            .any(|(_, other)| self.key(other).as_ref() == Some(&key));

        if taken {
            Err(StoreError::conflict(format!(
                "unique index '{}' already holds {}",
                self.name,
                render_key(&key)
            )))
        } else {
            Ok(())
        }
    }
}

fn render_key(key: &[&Value]) -> String {
    key.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
