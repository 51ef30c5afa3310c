#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use assert_cmd::Command;
use chrono::NaiveDate;
use serde_json::{json, Value};
use taskboard::model::{Table, DATE_FORMAT};
use taskboard::presenter::{Frame, Presenter};
use taskboard::Result;
use tempfile::TempDir;

/// A scratch working directory with a store under `board/`.
pub struct TestBoard {
    dir: TempDir,
}

impl TestBoard {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn store_dir(&self) -> PathBuf {
        self.dir.path().join("board")
    }

    /// `taskboard` running in the board's directory against its store.
    pub fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("taskboard").expect("binary");
        cmd.current_dir(self.dir.path())
            .env("TASKBOARD_STORE", self.store_dir())
            .env_remove("RUST_LOG");
        cmd
    }

    /// Run `taskboard init` and fail the test if it does not succeed.
    pub fn init(&self) {
        self.cmd().arg("init").assert().success();
    }

    pub fn write_config(&self, contents: &str) -> PathBuf {
        let path = self.dir.path().join(".taskboard.toml");
        fs::write(&path, contents).expect("write config");
        path
    }

    /// Rows currently stored for `table`.
    pub fn rows(&self, table: Table) -> Vec<Value> {
        let path = self.store_dir().join(format!("{}.json", table.as_str()));
        let raw = fs::read_to_string(path).expect("read table");
        serde_json::from_str(&raw).expect("table json")
    }

    /// Run a command with `--json` and return the `data` of the envelope.
    pub fn json_data(&self, args: &[&str]) -> Value {
        let output = self
            .cmd()
            .args(args)
            .arg("--json")
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        let envelope: Value = serde_json::from_slice(&output).expect("json envelope");
        assert_eq!(envelope["status"], "success");
        envelope["data"].clone()
    }
}

pub fn date(raw: &str) -> NaiveDate {
    NaiveDate::parse_from_str(raw, DATE_FORMAT).expect("date")
}

/// A wire task row with sensible defaults.
pub fn task_row(id: &str, owner: &str, status: &str, assigned: &str, promise: &str) -> Value {
    json!({
        "id": id,
        "description": format!("Task {id}"),
        "owner": owner,
        "project": null,
        "priority": "Medium",
        "status": status,
        "assigned_date": assigned,
        "promise_date": promise,
        "completed_date": null,
        "comments": null,
    })
}

/// What a presenter saw, shared with the test after the synchronizer takes
/// ownership of it.
#[derive(Debug, Clone, Default)]
pub struct Seen {
    pub frames: usize,
    pub task_ids: Vec<String>,
    pub members: usize,
    pub projects: usize,
    pub overdue: usize,
}

#[derive(Clone, Default)]
pub struct SharedRecorder {
    seen: Arc<Mutex<Seen>>,
}

impl SharedRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seen(&self) -> Seen {
        self.seen.lock().expect("recorder").clone()
    }
}

impl Presenter for SharedRecorder {
    fn render(&mut self, frame: &Frame<'_>) -> Result<()> {
        let mut seen = self.seen.lock().expect("recorder");
        seen.frames += 1;
        seen.task_ids = frame.view.tasks.iter().map(|task| task.id.clone()).collect();
        seen.members = frame.members.len();
        seen.projects = frame.projects.len();
        seen.overdue = frame.view.counts.overdue;
        Ok(())
    }
}
