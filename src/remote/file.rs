//! Directory-backed remote store
//!
//! # Layout
//!
//! ```text
//! <store>/
//!   tasks.json          # JSON array of task rows
//!   team_members.json   # JSON array of member rows
//!   projects.json       # JSON array of project rows
//!   changes.jsonl       # append-only change log, one ChangeEvent per line
//!   store.lock          # fs2 lock held for the duration of every write
//! ```
//!
//! Any number of processes may open the same directory. Writers serialize on
//! `store.lock`; subscribers tail `changes.jsonl` from the point they joined.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::mpsc as std_mpsc;
use std::thread;
use std::time::Duration;

use async_trait::async_trait;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use serde_json::Value;
use tracing::{debug, warn};

use super::{merge_fields, row_id, RemoteStore, Row};
use crate::error::{Error, Result};
use crate::feed::{ChangeEvent, ChangeFeed, FeedSender};
use crate::lock::{self, FileLock, DEFAULT_LOCK_TIMEOUT_MS};
use crate::model::Table;

pub const CHANGE_LOG: &str = "changes.jsonl";
pub const LOCK_FILE: &str = "store.lock";

/// Default change-log poll interval in milliseconds
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
    lock_timeout_ms: u64,
    poll_interval: Duration,
}

impl FileStore {
    /// Create the store directory and any missing table files. Existing data
    /// is left untouched.
    pub fn create(root: impl Into<PathBuf>) -> Result<Self> {
        let store = Self::at(root.into());
        fs::create_dir_all(&store.root)?;

        let _lock = FileLock::acquire(store.lock_path(), store.lock_timeout_ms)?;
        for table in Table::ALL {
            let path = store.table_path(table);
            if !path.exists() {
                lock::write_json_atomic(&path, &Vec::<Row>::new())?;
            }
        }
        if !store.log_path().exists() {
            File::create(store.log_path())?;
        }
        Ok(store)
    }

    /// Open a store previously set up with [`FileStore::create`].
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let store = Self::at(root.into());
        if !store.root.is_dir() {
            return Err(Error::InvalidConfig(format!(
                "no store at {}; run `taskboard init` first",
                store.root.display()
            )));
        }
        Ok(store)
    }

    fn at(root: PathBuf) -> Self {
        Self {
            root,
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }

    pub fn with_lock_timeout(mut self, timeout_ms: u64) -> Self {
        self.lock_timeout_ms = timeout_ms;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn table_path(&self, table: Table) -> PathBuf {
        self.root.join(format!("{}.json", table.as_str()))
    }

    pub fn log_path(&self) -> PathBuf {
        self.root.join(CHANGE_LOG)
    }

    fn lock_path(&self) -> PathBuf {
        self.root.join(LOCK_FILE)
    }

    fn load_rows(&self, table: Table) -> Result<Vec<Row>> {
        let path = self.table_path(table);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&path)?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    /// Run `change` against one table while holding the store lock, then
    /// persist the table and log the events it produced.
    fn mutate<R>(
        &self,
        table: Table,
        change: impl FnOnce(&mut Vec<Row>) -> Result<(R, Vec<ChangeEvent>)>,
    ) -> Result<R> {
        let _lock = FileLock::acquire(self.lock_path(), self.lock_timeout_ms)?;
        let mut rows = self.load_rows(table)?;
        let previous = rows.clone();
        let (result, events) = change(&mut rows)?;
        lock::write_json_atomic(self.table_path(table), &rows)?;
        // A write nobody can observe is rolled back.
        if let Err(err) = lock::append_jsonl(self.log_path(), &events) {
            warn!(%table, error = %err, "change log append failed, restoring table");
            lock::write_json_atomic(self.table_path(table), &previous)?;
            return Err(err);
        }
        debug!(%table, events = events.len(), "store write committed");
        Ok(result)
    }

    fn insert_blocking(&self, table: Table, rows: Vec<Row>) -> Result<Vec<String>> {
        self.mutate(table, |stored| {
            let mut ids = Vec::with_capacity(rows.len());
            let mut events = Vec::with_capacity(rows.len());
            for mut row in rows {
                let id = match row_id(&row) {
                    Some(id) => {
                        if stored.iter().any(|existing| row_id(existing).as_deref() == Some(&id)) {
                            return Err(Error::Remote(format!("duplicate {table} id {id}")));
                        }
                        id
                    }
                    None => ulid::Ulid::new().to_string(),
                };
                row.insert("id".to_string(), Value::String(id.clone()));
                events.push(ChangeEvent::insert(table, Value::Object(row.clone())));
                stored.push(row);
                ids.push(id);
            }
            Ok((ids, events))
        })
    }

    fn update_blocking(&self, table: Table, id: &str, fields: Row) -> Result<()> {
        self.mutate(table, |stored| {
            let row = stored
                .iter_mut()
                .find(|row| row_id(row).as_deref() == Some(id))
                .ok_or_else(|| Error::RecordNotFound {
                    table,
                    id: id.to_string(),
                })?;
            let old = row.clone();
            merge_fields(row, fields);
            let event =
                ChangeEvent::update(table, Value::Object(row.clone()), Some(Value::Object(old)));
            Ok(((), vec![event]))
        })
    }

    fn delete_blocking(&self, table: Table, id: &str) -> Result<()> {
        self.mutate(table, |stored| {
            let index = stored
                .iter()
                .position(|row| row_id(row).as_deref() == Some(id))
                .ok_or_else(|| Error::RecordNotFound {
                    table,
                    id: id.to_string(),
                })?;
            let removed = stored.remove(index);
            Ok(((), vec![ChangeEvent::delete(table, Value::Object(removed))]))
        })
    }

    async fn blocking<R, F>(&self, work: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce(FileStore) -> Result<R> + Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || work(store))
            .await
            .map_err(|e| Error::OperationFailed(format!("store task failed: {e}")))?
    }
}

#[async_trait]
impl RemoteStore for FileStore {
    async fn read_all(&self, table: Table) -> Result<Vec<Value>> {
        self.blocking(move |store| {
            let rows = store
                .load_rows(table)
                .map_err(|e| Error::Remote(format!("read of {table} failed: {e}")))?;
            Ok(rows.into_iter().map(Value::Object).collect())
        })
        .await
    }

    async fn insert(&self, table: Table, rows: Vec<Row>) -> Result<Vec<String>> {
        self.blocking(move |store| store.insert_blocking(table, rows))
            .await
    }

    async fn update(&self, table: Table, id: &str, fields: Row) -> Result<()> {
        let id = id.to_string();
        self.blocking(move |store| store.update_blocking(table, &id, fields))
            .await
    }

    async fn delete(&self, table: Table, id: &str) -> Result<()> {
        let id = id.to_string();
        self.blocking(move |store| store.delete_blocking(table, &id))
            .await
    }

    async fn subscribe(&self, tables: &[Table]) -> Result<ChangeFeed> {
        let log_path = self.log_path();
        if !log_path.exists() {
            File::create(&log_path)?;
        }
        let offset = fs::metadata(&log_path)?.len();
        let scope: HashSet<Table> = tables.iter().copied().collect();
        let (tx, feed) = ChangeFeed::channel();

        let tailer = LogTailer {
            path: log_path,
            offset,
            partial: Vec::new(),
            scope,
        };
        let poll_interval = self.poll_interval;
        thread::Builder::new()
            .name("taskboard-feed".to_string())
            .spawn(move || tailer.run(tx, poll_interval))?;

        Ok(feed)
    }
}

/// Follows `changes.jsonl`, forwarding complete lines as change events.
struct LogTailer {
    path: PathBuf,
    offset: u64,
    partial: Vec<u8>,
    scope: HashSet<Table>,
}

impl LogTailer {
    fn run(mut self, tx: FeedSender, poll_interval: Duration) {
        let (wake_tx, wake_rx) = std_mpsc::channel();
        let watcher: notify::Result<RecommendedWatcher> =
            notify::recommended_watcher(move |res| {
                let _ = wake_tx.send(res);
            });
        // Held for the lifetime of the loop; dropping it stops file events.
        let _watcher = match watcher {
            Ok(mut watcher) => {
                let dir = self.path.parent().unwrap_or(Path::new("."));
                if let Err(err) = watcher.watch(dir, RecursiveMode::NonRecursive) {
                    warn!(error = %err, "change log watch failed, polling only");
                }
                Some(watcher)
            }
            Err(err) => {
                warn!(error = %err, "file watcher unavailable, polling only");
                None
            }
        };

        let mut read_failing = false;
        loop {
            if tx.is_closed() {
                break;
            }

            match self.read_new_bytes() {
                Ok(()) => read_failing = false,
                Err(err) => {
                    if !read_failing && tx.send(Err(err)).is_err() {
                        break;
                    }
                    read_failing = true;
                }
            }
            if !self.forward_lines(&tx) {
                break;
            }

            match wake_rx.recv_timeout(poll_interval) {
                Ok(Ok(_)) | Err(std_mpsc::RecvTimeoutError::Timeout) => {}
                Ok(Err(err)) => {
                    if tx.send(Err(Error::Watch(err))).is_err() {
                        break;
                    }
                }
                Err(std_mpsc::RecvTimeoutError::Disconnected) => thread::sleep(poll_interval),
            }
        }
        debug!(path = %self.path.display(), "change log tailer stopped");
    }

    fn read_new_bytes(&mut self) -> Result<()> {
        let mut file = File::open(&self.path)?;
        let len = file.metadata()?.len();
        if len < self.offset {
            // Log was recreated underneath us; resume from its new end.
            self.offset = len;
            self.partial.clear();
            return Ok(());
        }
        if len == self.offset {
            return Ok(());
        }
        file.seek(SeekFrom::Start(self.offset))?;
        let mut chunk = Vec::with_capacity((len - self.offset) as usize);
        file.take(len - self.offset).read_to_end(&mut chunk)?;
        self.offset += chunk.len() as u64;
        self.partial.extend_from_slice(&chunk);
        Ok(())
    }

    /// Returns `false` once the receiving side is gone.
    fn forward_lines(&mut self, tx: &FeedSender) -> bool {
        while let Some(pos) = self.partial.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.partial.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line);
            let text = text.trim();
            if text.is_empty() {
                continue;
            }
            match serde_json::from_str::<ChangeEvent>(text) {
                Ok(event) => {
                    if !self.scope.contains(&event.table) {
                        continue;
                    }
                    if tx.send(Ok(event)).is_err() {
                        return false;
                    }
                }
                Err(err) => warn!(error = %err, "skipping malformed change log line"),
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::ChangeKind;
    use crate::remote::to_row;
    use serde_json::json;
    use tempfile::TempDir;
    use tokio::time::timeout;

    fn store(dir: &TempDir) -> FileStore {
        FileStore::create(dir.path().join("board"))
            .unwrap()
            .with_poll_interval(Duration::from_millis(20))
    }

    #[test]
    fn create_is_idempotent_and_open_requires_a_store() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            FileStore::open(dir.path().join("missing")),
            Err(Error::InvalidConfig(_))
        ));

        let first = store(&dir);
        first
            .insert_blocking(Table::Projects, vec![to_row(&json!({"name": "Apollo"})).unwrap()])
            .unwrap();
        FileStore::create(first.root()).unwrap();

        let reopened = FileStore::open(first.root()).unwrap();
        assert_eq!(reopened.load_rows(Table::Projects).unwrap().len(), 1);
    }

    #[test]
    fn unlogged_writes_are_rolled_back() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store
            .insert_blocking(Table::Projects, vec![to_row(&json!({"name": "Apollo"})).unwrap()])
            .unwrap();

        // A directory where the log should be makes every append fail.
        fs::remove_file(store.log_path()).unwrap();
        fs::create_dir(store.log_path()).unwrap();

        let result = store
            .insert_blocking(Table::Projects, vec![to_row(&json!({"name": "Zephyr"})).unwrap()]);
        assert!(result.is_err());
        let rows = store.load_rows(Table::Projects).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["name"], "Apollo");
    }

    #[tokio::test]
    async fn writes_persist_and_are_logged() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        let ids = store
            .insert(
                Table::TeamMembers,
                vec![to_row(&json!({"name": "Asha", "designation": "Dev"})).unwrap()],
            )
            .await
            .unwrap();
        store
            .update(Table::TeamMembers, &ids[0], to_row(&json!({"designation": "Lead"})).unwrap())
            .await
            .unwrap();

        let rows = store.read_all(Table::TeamMembers).await.unwrap();
        assert_eq!(rows[0]["designation"], "Lead");

        let log = fs::read_to_string(store.log_path()).unwrap();
        let kinds: Vec<ChangeKind> = log
            .lines()
            .map(|line| serde_json::from_str::<ChangeEvent>(line).unwrap().kind)
            .collect();
        assert_eq!(kinds, vec![ChangeKind::Insert, ChangeKind::Update]);
    }

    #[tokio::test]
    async fn delete_of_unknown_id_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let err = store.delete(Table::Tasks, "nope").await.unwrap_err();
        assert!(matches!(err, Error::RecordNotFound { table: Table::Tasks, .. }));
    }

    #[tokio::test]
    async fn subscription_starts_at_current_end_of_log() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store
            .insert(Table::Projects, vec![to_row(&json!({"name": "Before"})).unwrap()])
            .await
            .unwrap();

        let mut feed = store.subscribe(&Table::ALL).await.unwrap();
        store
            .insert(Table::Projects, vec![to_row(&json!({"name": "After"})).unwrap()])
            .await
            .unwrap();

        let event = timeout(Duration::from_secs(5), feed.next())
            .await
            .expect("event within timeout")
            .expect("feed open")
            .expect("event ok");
        assert_eq!(event.new_record.unwrap()["name"], "After");
    }

    #[test]
    fn tailer_holds_partial_lines_until_complete() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CHANGE_LOG);
        let line = serde_json::to_string(&ChangeEvent::delete(Table::Tasks, json!({"id": "7"})))
            .unwrap();
        let (head, tail) = line.split_at(10);
        fs::write(&path, head).unwrap();

        let mut tailer = LogTailer {
            path: path.clone(),
            offset: 0,
            partial: Vec::new(),
            scope: Table::ALL.into_iter().collect(),
        };
        let (tx, mut feed) = ChangeFeed::channel();

        tailer.read_new_bytes().unwrap();
        assert!(tailer.forward_lines(&tx));
        assert!(feed.try_next().is_none());

        fs::write(&path, format!("{head}{tail}\n")).unwrap();
        tailer.read_new_bytes().unwrap();
        assert!(tailer.forward_lines(&tx));
        let event = feed.try_next().unwrap().unwrap();
        assert_eq!(event.kind, ChangeKind::Delete);
    }
}
