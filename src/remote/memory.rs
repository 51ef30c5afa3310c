//! In-process remote store.
//!
//! Tables live behind `tokio::sync::RwLock`s and every committed write is
//! broadcast to subscribers. Reads and writes can be made to fail per table,
//! which lets tests exercise partial-failure paths.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

use super::{merge_fields, row_id, RemoteStore, Row};
use crate::error::{Error, Result};
use crate::feed::{ChangeEvent, ChangeFeed};
use crate::model::Table;

/// Default broadcast channel capacity
const DEFAULT_CAPACITY: usize = 1024;

pub struct MemoryStore {
    tasks: RwLock<Vec<Row>>,
    members: RwLock<Vec<Row>>,
    projects: RwLock<Vec<Row>>,
    next_id: AtomicU64,
    sender: broadcast::Sender<ChangeEvent>,
    failing_reads: Mutex<HashSet<Table>>,
    failing_writes: Mutex<HashSet<Table>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            tasks: RwLock::new(Vec::new()),
            members: RwLock::new(Vec::new()),
            projects: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            sender,
            failing_reads: Mutex::new(HashSet::new()),
            failing_writes: Mutex::new(HashSet::new()),
        }
    }

    /// Pre-load rows without emitting change events.
    pub fn with_rows(mut self, table: Table, rows: Vec<Value>) -> Self {
        let target = match table {
            Table::Tasks => self.tasks.get_mut(),
            Table::TeamMembers => self.members.get_mut(),
            Table::Projects => self.projects.get_mut(),
        };
        target.extend(rows.into_iter().filter_map(|value| match value {
            Value::Object(row) => Some(row),
            _ => None,
        }));
        self
    }

    /// Make every subsequent `read_all` of `table` fail.
    pub fn fail_reads(&self, table: Table) {
        lock(&self.failing_reads).insert(table);
    }

    /// Make every subsequent write to `table` fail.
    pub fn fail_writes(&self, table: Table) {
        lock(&self.failing_writes).insert(table);
    }

    pub fn heal(&self, table: Table) {
        lock(&self.failing_reads).remove(&table);
        lock(&self.failing_writes).remove(&table);
    }

    /// Number of active feed forwarders.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    fn rows(&self, table: Table) -> &RwLock<Vec<Row>> {
        match table {
            Table::Tasks => &self.tasks,
            Table::TeamMembers => &self.members,
            Table::Projects => &self.projects,
        }
    }

    /// Next sequential id not already used in the table.
    fn fresh_id(&self, taken: &HashSet<String>) -> String {
        loop {
            let id = self.next_id.fetch_add(1, Ordering::SeqCst).to_string();
            if !taken.contains(&id) {
                return id;
            }
        }
    }

    fn check_write(&self, table: Table) -> Result<()> {
        if lock(&self.failing_writes).contains(&table) {
            return Err(Error::Remote(format!("write to {table} rejected")));
        }
        Ok(())
    }

    fn emit(&self, event: ChangeEvent) {
        let table = event.table;
        let kind = event.kind;
        match self.sender.send(event) {
            Ok(subscribers) => {
                debug!(%table, ?kind, subscribers, "change event emitted");
            }
            Err(_) => {
                // No subscribers
            }
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn read_all(&self, table: Table) -> Result<Vec<Value>> {
        if lock(&self.failing_reads).contains(&table) {
            return Err(Error::Remote(format!("read of {table} failed")));
        }
        let rows = self.rows(table).read().await;
        Ok(rows.iter().cloned().map(Value::Object).collect())
    }

    async fn insert(&self, table: Table, rows: Vec<Row>) -> Result<Vec<String>> {
        self.check_write(table)?;
        let mut ids = Vec::with_capacity(rows.len());
        let mut events = Vec::with_capacity(rows.len());
        {
            let mut stored = self.rows(table).write().await;
            let mut taken: HashSet<String> = stored.iter().filter_map(row_id).collect();

            // The whole batch is checked before anything is committed.
            let mut batch = Vec::with_capacity(rows.len());
            for mut row in rows {
                let id = match row_id(&row) {
                    Some(id) if taken.contains(&id) => {
                        return Err(Error::Remote(format!("duplicate {table} id {id}")));
                    }
                    Some(id) => id,
                    None => self.fresh_id(&taken),
                };
                taken.insert(id.clone());
                row.insert("id".to_string(), Value::String(id.clone()));
                batch.push(row);
                ids.push(id);
            }

            for row in batch {
                events.push(ChangeEvent::insert(table, Value::Object(row.clone())));
                stored.push(row);
            }
        }
        for event in events {
            self.emit(event);
        }
        Ok(ids)
    }

    async fn update(&self, table: Table, id: &str, fields: Row) -> Result<()> {
        self.check_write(table)?;
        let event = {
            let mut stored = self.rows(table).write().await;
            let row = stored
                .iter_mut()
                .find(|row| row_id(row).as_deref() == Some(id))
                .ok_or_else(|| Error::RecordNotFound {
                    table,
                    id: id.to_string(),
                })?;
            let old = row.clone();
            merge_fields(row, fields);
            ChangeEvent::update(table, Value::Object(row.clone()), Some(Value::Object(old)))
        };
        self.emit(event);
        Ok(())
    }

    async fn delete(&self, table: Table, id: &str) -> Result<()> {
        self.check_write(table)?;
        let removed = {
            let mut stored = self.rows(table).write().await;
            let index = stored
                .iter()
                .position(|row| row_id(row).as_deref() == Some(id))
                .ok_or_else(|| Error::RecordNotFound {
                    table,
                    id: id.to_string(),
                })?;
            stored.remove(index)
        };
        self.emit(ChangeEvent::delete(table, Value::Object(removed)));
        Ok(())
    }

    async fn subscribe(&self, tables: &[Table]) -> Result<ChangeFeed> {
        let mut rx = self.sender.subscribe();
        let scope: HashSet<Table> = tables.iter().copied().collect();
        let (tx, feed) = ChangeFeed::channel();

        tokio::spawn(async move {
            loop {
                let received = tokio::select! {
                    _ = tx.closed() => break,
                    received = rx.recv() => received,
                };
                match received {
                    Ok(event) => {
                        if !scope.contains(&event.table) {
                            continue;
                        }
                        if tx.send(Ok(event)).is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        if tx.send(Err(Error::FeedLagged(skipped))).is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Ok(feed)
    }
}

fn lock(set: &Mutex<HashSet<Table>>) -> MutexGuard<'_, HashSet<Table>> {
    set.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::ChangeKind;
    use crate::remote::to_row;
    use serde_json::json;

    #[tokio::test]
    async fn insert_assigns_ids_and_feeds_subscribers() {
        let store = MemoryStore::new();
        let mut feed = store.subscribe(&[Table::Projects]).await.unwrap();

        let ids = store
            .insert(
                Table::Projects,
                vec![to_row(&json!({"name": "Apollo"})).unwrap()],
            )
            .await
            .unwrap();
        assert_eq!(ids, vec!["1".to_string()]);

        let event = feed.next().await.expect("event").expect("ok");
        assert_eq!(event.kind, ChangeKind::Insert);
        assert_eq!(event.new_record.unwrap()["name"], "Apollo");
    }

    #[tokio::test]
    async fn feed_is_scoped_to_subscribed_tables() {
        let store = MemoryStore::new();
        let mut feed = store.subscribe(&[Table::Tasks]).await.unwrap();

        store
            .insert(Table::Projects, vec![to_row(&json!({"name": "Skip"})).unwrap()])
            .await
            .unwrap();
        store
            .insert(
                Table::Tasks,
                vec![to_row(&json!({"description": "Keep", "status": "Pending"})).unwrap()],
            )
            .await
            .unwrap();

        let event = feed.next().await.expect("event").expect("ok");
        assert_eq!(event.table, Table::Tasks);
        assert!(feed.try_next().is_none());
    }

    #[tokio::test]
    async fn update_and_delete_report_old_rows() {
        let store = MemoryStore::new().with_rows(
            Table::TeamMembers,
            vec![json!({"id": "m-1", "name": "Asha", "designation": "Dev"})],
        );
        let mut feed = store.subscribe(&Table::ALL).await.unwrap();

        store
            .update(
                Table::TeamMembers,
                "m-1",
                to_row(&json!({"designation": "Lead"})).unwrap(),
            )
            .await
            .unwrap();
        store.delete(Table::TeamMembers, "m-1").await.unwrap();

        let update = feed.next().await.unwrap().unwrap();
        assert_eq!(update.new_record.unwrap()["designation"], "Lead");
        assert_eq!(update.old_record.unwrap()["designation"], "Dev");

        let delete = feed.next().await.unwrap().unwrap();
        assert_eq!(delete.kind, ChangeKind::Delete);
        assert_eq!(delete.old_record.unwrap()["id"], "m-1");
        assert!(store.read_all(Table::TeamMembers).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejected_batch_commits_nothing() {
        let store = MemoryStore::new().with_rows(Table::Tasks, vec![json!({"id": "x"})]);
        let mut feed = store.subscribe(&[Table::Tasks]).await.unwrap();

        let err = store
            .insert(
                Table::Tasks,
                vec![
                    to_row(&json!({"id": "a"})).unwrap(),
                    to_row(&json!({"id": "x"})).unwrap(),
                ],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Remote(_)));
        assert_eq!(store.read_all(Table::Tasks).await.unwrap().len(), 1);

        store
            .insert(Table::Tasks, vec![to_row(&json!({"id": "b"})).unwrap()])
            .await
            .unwrap();
        let event = feed.next().await.unwrap().unwrap();
        assert_eq!(event.new_record.unwrap()["id"], "b");
    }

    #[tokio::test]
    async fn generated_ids_skip_existing_rows() {
        let store = MemoryStore::new().with_rows(
            Table::Projects,
            vec![
                json!({"id": "1", "name": "Seeded"}),
                json!({"id": 2, "name": "Numeric"}),
            ],
        );

        let ids = store
            .insert(
                Table::Projects,
                vec![
                    to_row(&json!({"name": "New"})).unwrap(),
                    to_row(&json!({"name": "Newer"})).unwrap(),
                ],
            )
            .await
            .unwrap();
        assert_eq!(ids, vec!["3".to_string(), "4".to_string()]);

        let rows = store.read_all(Table::Projects).await.unwrap();
        let mut seen: Vec<String> = rows
            .iter()
            .filter_map(|row| row.as_object().and_then(row_id))
            .collect();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 4);
    }

    #[tokio::test]
    async fn unknown_ids_are_rejected() {
        let store = MemoryStore::new();
        let err = store.delete(Table::Tasks, "404").await.unwrap_err();
        assert!(matches!(err, Error::RecordNotFound { .. }));
    }

    #[tokio::test]
    async fn injected_failures_are_per_table() {
        let store = MemoryStore::new();
        store.fail_reads(Table::Tasks);
        store.fail_writes(Table::Projects);

        assert!(store.read_all(Table::Tasks).await.is_err());
        assert!(store.read_all(Table::Projects).await.is_ok());
        assert!(store
            .insert(Table::Projects, vec![to_row(&json!({"name": "x"})).unwrap()])
            .await
            .is_err());

        store.heal(Table::Tasks);
        assert!(store.read_all(Table::Tasks).await.is_ok());
    }
}
