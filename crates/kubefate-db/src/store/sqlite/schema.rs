//! Database schema definitions and initialization

use kubefate_core::{Filter, StoreError, StoreResult};
use serde_json::Value;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

use super::query::storage_error;
use crate::store::UniqueIndex;

/// Database schema as SQL string - executed once on open
pub(crate) const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS documents (
    collection TEXT NOT NULL,
    uuid TEXT NOT NULL,
    body TEXT NOT NULL CHECK(json_valid(body)),
    PRIMARY KEY (collection, uuid)
);
";

/// Create `SQLite` connection pool
pub(crate) async fn create_connection_pool(
    db_url: &str,
    max_connections: u32,
) -> StoreResult<SqlitePool> {
    SqlitePoolOptions::new()
        .max_connections(max_connections)
        .min_connections(1)
        .connect(db_url)
        .await
        .map_err(|e| storage_error("Failed to connect to database", e))
}

/// Initialize database schema
pub(crate) async fn init_schema(pool: &SqlitePool) -> StoreResult<()> {
    sqlx::query(SCHEMA)
        .execute(pool)
        .await
        .map(|_| ())
        .map_err(|e| storage_error("Failed to initialize schema", e))
}

/// `CREATE UNIQUE INDEX` statement for a partial unique index over JSON fields
pub(crate) fn index_ddl(collection: &str, index: &UniqueIndex) -> StoreResult<String> {
    let name = identifier(index.name())?;
    let columns = index
        .fields()
        .iter()
        .map(|field| json_field(field))
        .collect::<StoreResult<Vec<_>>>()?;

    if columns.is_empty() {
        return Err(StoreError::backend(format!(
            "index '{name}' has no fields"
        )));
    }

    Ok(format!(
        "CREATE UNIQUE INDEX IF NOT EXISTS {name} ON documents ({}) WHERE collection = {} AND {}",
        columns.join(", "),
        literal(&Value::String(collection.to_string()))?,
        predicate(index.partial_filter())?,
    ))
}

/// SQL boolean expression with the same meaning as `Filter::matches`.
///
/// Equality compares the JSON type as well as the value, so `true` never
/// equals `1` and `3.0` never equals `3`. `NULL` from an absent field counts
/// as "no match" for `Eq` and as a match for `Ne`.
///
/// # Errors
///
/// Returns `StoreError::Backend` for array or object values and for field
/// names that are not plain identifiers.
pub(crate) fn predicate(filter: &Filter) -> StoreResult<String> {
    match filter {
        Filter::Eq { field, value } => Ok(format!("IFNULL({}, 0)", equals(field, value)?)),
        Filter::Ne { field, value } => Ok(format!("NOT IFNULL({}, 0)", equals(field, value)?)),
        Filter::And(filters) if filters.is_empty() => Ok("1".to_string()),
        Filter::And(filters) => Ok(filters
            .iter()
            .map(|f| predicate(f).map(|p| format!("({p})")))
            .collect::<StoreResult<Vec<_>>>()?
            .join(" AND ")),
    }
}

fn equals(field: &str, value: &Value) -> StoreResult<String> {
    let field = identifier(field)?;
    let kind = format!("json_type(body, '$.{field}')");
    match value {
        Value::Null => Ok(format!("{kind} = 'null'")),
        Value::Bool(true) => Ok(format!("{kind} = 'true'")),
        Value::Bool(false) => Ok(format!("{kind} = 'false'")),
        Value::Number(n) => Ok(format!(
            "({kind} = '{}' AND {} = {n})",
            if n.is_f64() { "real" } else { "integer" },
            json_field(field)?
        )),
        Value::String(_) => Ok(format!(
            "({kind} = 'text' AND {} = {})",
            json_field(field)?,
            literal(value)?
        )),
        Value::Array(_) | Value::Object(_) => Err(StoreError::backend(format!(
            "cannot compare '{field}' with structured value {value}"
        ))),
    }
}

fn json_field(field: &str) -> StoreResult<String> {
    identifier(field).map(|f| format!("json_extract(body, '$.{f}')"))
}

/// Quote a text value as an SQL string literal
fn literal(value: &Value) -> StoreResult<String> {
    match value {
        Value::String(s) => Ok(format!("'{}'", s.replace('\'', "''"))),
        other => Err(StoreError::backend(format!(
            "expected a string literal, found {other}"
        ))),
    }
}

fn identifier(name: &str) -> StoreResult<&str> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(name)
    } else {
        Err(StoreError::backend(format!("invalid identifier '{name}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_cluster_index_ddl() -> StoreResult<()> {
        let ddl = index_ddl("cluster", &UniqueIndex::active_cluster_name())?;
        assert_eq!(
            ddl,
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_cluster_active_name ON documents \
             (json_extract(body, '$.name'), json_extract(body, '$.namespaces')) \
             WHERE collection = 'cluster' AND \
             NOT IFNULL((json_type(body, '$.status') = 'integer' \
             AND json_extract(body, '$.status') = 5), 0)"
        );
        Ok(())
    }

    #[test]
    fn test_literals_are_quoted() -> StoreResult<()> {
        assert_eq!(literal(&Value::String("o'brien".into()))?, "'o''brien'");
        assert!(literal(&Value::Null).is_err());
        Ok(())
    }

    #[test]
    fn test_equality_checks_json_type() -> StoreResult<()> {
        assert_eq!(
            predicate(&Filter::eq("flag", true))?,
            "IFNULL(json_type(body, '$.flag') = 'true', 0)"
        );
        assert_eq!(
            predicate(&Filter::eq("ratio", 3.0))?,
            "IFNULL((json_type(body, '$.ratio') = 'real' AND json_extract(body, '$.ratio') = 3.0), 0)"
        );
        assert_eq!(
            predicate(&Filter::ne("gone", Value::Null))?,
            "NOT IFNULL(json_type(body, '$.gone') = 'null', 0)"
        );
        assert!(predicate(&Filter::eq("tags", serde_json::json!(["a"]))).is_err());
        Ok(())
    }

    #[test]
    fn test_identifiers_reject_injection() {
        assert!(identifier("name").is_ok());
        assert!(identifier("name'); DROP TABLE documents; --").is_err());
        assert!(identifier("").is_err());
    }
}
