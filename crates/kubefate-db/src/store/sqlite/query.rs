//! Query execution and row parsing for the document table

use kubefate_core::{Document, Filter, StoreError, StoreResult};
use serde_json::Value;
use sqlx::{Row, SqlitePool};

use super::schema::predicate;

/// Map a `SQLx` failure to a store error, keeping unique violations distinct
pub(crate) fn storage_error(context: &str, err: sqlx::Error) -> StoreError {
    let unique = err
        .as_database_error()
        .is_some_and(|db| db.is_unique_violation());
    if unique {
        StoreError::conflict(format!("{context}: {err}"))
    } else {
        StoreError::backend(format!("{context}: {err}"))
    }
}

/// Parse a stored JSON body into a document
pub(crate) fn parse_body(row: &sqlx::sqlite::SqliteRow) -> StoreResult<Document> {
    let body: String = row
        .try_get("body")
        .map_err(|e| StoreError::backend(format!("Failed to read body: {e}")))?;
    match serde_json::from_str::<Value>(&body)? {
        Value::Object(doc) => Ok(doc),
        other => Err(StoreError::codec(format!(
            "stored body is not an object: {other}"
        ))),
    }
}

/// Bodies in `collection`, optionally narrowed to a single uuid and to rows
/// satisfying an SQL `clause` over `body`
pub(crate) async fn select_bodies(
    pool: &SqlitePool,
    collection: &str,
    uuid: Option<&str>,
    clause: Option<&str>,
) -> StoreResult<Vec<Document>> {
    let mut sql = String::from("SELECT body FROM documents WHERE collection = ?");
    if uuid.is_some() {
        sql.push_str(" AND uuid = ?");
    }
    if let Some(clause) = clause {
        sql.push_str(" AND (");
        sql.push_str(clause);
        sql.push(')');
    }
    sql.push_str(" ORDER BY uuid");

    let mut query = sqlx::query(&sql).bind(collection);
    if let Some(uuid) = uuid {
        query = query.bind(uuid);
    }
    let rows = query
        .fetch_all(pool)
        .await
        .map_err(|e| storage_error("Failed to query documents", e))?;

    rows.iter().map(parse_body).collect()
}

/// Insert or replace the body stored under `(collection, uuid)`
pub(crate) async fn upsert(
    pool: &SqlitePool,
    collection: &str,
    uuid: &str,
    doc: &Document,
) -> StoreResult<()> {
    let body = serde_json::to_string(doc)?;
    sqlx::query(
        "INSERT INTO documents (collection, uuid, body) VALUES (?, ?, ?)
         ON CONFLICT(collection, uuid) DO UPDATE SET body = excluded.body",
    )
    .bind(collection)
    .bind(uuid)
    .bind(body)
    .execute(pool)
    .await
    .map(|_| ())
    .map_err(|e| storage_error("Failed to write document", e))
}

/// Replace the stored body only while the current one matches `guard`.
///
/// The guard is rendered into the `WHERE` clause so the check and the write
/// are a single statement.
pub(crate) async fn replace_if(
    pool: &SqlitePool,
    collection: &str,
    uuid: &str,
    doc: &Document,
    guard: &Filter,
) -> StoreResult<bool> {
    let body = serde_json::to_string(doc)?;
    let sql = format!(
        "UPDATE documents SET body = ? WHERE collection = ? AND uuid = ? AND {}",
        predicate(guard)?
    );

    let result = sqlx::query(&sql)
        .bind(body)
        .bind(collection)
        .bind(uuid)
        .execute(pool)
        .await
        .map_err(|e| storage_error("Failed to replace document", e))?;

    Ok(result.rows_affected() > 0)
}
