//! Remote store abstraction.
//!
//! The remote store is the system of record. The dashboard reads whole
//! tables at startup, issues row-level writes, and learns about every change
//! (its own included) through a subscription feed.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::Result;
use crate::feed::ChangeFeed;
use crate::model::Table;

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

/// A wire row: a JSON object of column name to value.
pub type Row = Map<String, Value>;

#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Every row of a table, in store order.
    async fn read_all(&self, table: Table) -> Result<Vec<Value>>;

    /// Insert rows, returning the identifiers assigned to them.
    async fn insert(&self, table: Table, rows: Vec<Row>) -> Result<Vec<String>>;

    /// Overwrite the given columns of one row.
    async fn update(&self, table: Table, id: &str, fields: Row) -> Result<()>;

    async fn delete(&self, table: Table, id: &str) -> Result<()>;

    /// Open a change feed scoped to `tables`. Only changes committed after
    /// the subscription is open are delivered.
    async fn subscribe(&self, tables: &[Table]) -> Result<ChangeFeed>;
}

/// Serialize a typed payload into a wire row.
pub fn to_row<T: serde::Serialize>(payload: &T) -> Result<Row> {
    match serde_json::to_value(payload)? {
        Value::Object(row) => Ok(row),
        other => Err(crate::error::Error::InvalidArgument(format!(
            "expected an object row, got {other}"
        ))),
    }
}

/// Identifier of a wire row, stringified.
pub(crate) fn row_id(row: &Row) -> Option<String> {
    match row.get("id")? {
        Value::String(id) => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

/// Apply `fields` on top of `row`, column by column.
pub(crate) fn merge_fields(row: &mut Row, fields: Row) {
    for (column, value) in fields {
        if column == "id" {
            continue;
        }
        row.insert(column, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_overwrites_columns_but_never_the_id() {
        let mut row = to_row(&json!({"id": "1", "name": "Old", "designation": "Dev"})).unwrap();
        let fields = to_row(&json!({"id": "2", "name": "New"})).unwrap();
        merge_fields(&mut row, fields);
        assert_eq!(Value::Object(row), json!({"id": "1", "name": "New", "designation": "Dev"}));
    }

    #[test]
    fn to_row_rejects_non_objects() {
        assert!(to_row(&json!(["not", "a", "row"])).is_err());
    }
}
