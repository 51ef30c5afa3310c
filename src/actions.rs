//! Write requests against the remote store.
//!
//! Actions never touch the mirror. Their effects come back through the change
//! feed like anyone else's.

use std::collections::HashSet;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::info;

use crate::error::{Error, Result};
use crate::model::{completion_for, DateField, Priority, Status, Table, Task};
use crate::remote::{to_row, RemoteStore};

#[derive(Debug, Clone)]
pub struct NewTaskInput {
    pub description: String,
    /// One task row is created per distinct owner.
    pub owners: Vec<String>,
    pub project: Option<String>,
    pub priority: Priority,
    pub status: Status,
    pub promise_date: NaiveDate,
    pub comments: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EditTaskInput {
    pub description: String,
    pub owner: String,
    pub project: Option<String>,
    pub priority: Priority,
    pub status: Status,
    /// `None` leaves the stored promise date untouched.
    pub promise_date: Option<NaiveDate>,
    pub comments: Option<String>,
}

impl EditTaskInput {
    /// Start from the task as it is now.
    pub fn from_task(task: &Task) -> Self {
        Self {
            description: task.description.clone(),
            owner: task.owner.clone(),
            project: task.project.clone(),
            priority: task.priority,
            status: task.status,
            promise_date: None,
            comments: task.comments.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionOutcome {
    pub changed: bool,
    pub message: String,
    pub ids: Vec<String>,
}

impl ActionOutcome {
    fn unchanged(message: impl Into<String>) -> Self {
        Self {
            changed: false,
            message: message.into(),
            ids: Vec::new(),
        }
    }
}

/// Confirmation step in front of destructive actions.
pub trait Confirm {
    fn confirm(&self, prompt: &str) -> bool;
}

/// Confirms everything (`--yes`).
pub struct AssumeYes;

impl Confirm for AssumeYes {
    fn confirm(&self, _prompt: &str) -> bool {
        true
    }
}

#[derive(Serialize)]
struct TaskFields<'a> {
    description: &'a str,
    owner: &'a str,
    project: Option<&'a str>,
    priority: Priority,
    status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    assigned_date: Option<DateField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    promise_date: Option<DateField>,
    completed_date: Option<DateField>,
    comments: Option<&'a str>,
}

pub async fn create_tasks(
    store: &dyn RemoteStore,
    input: NewTaskInput,
    today: NaiveDate,
) -> Result<ActionOutcome> {
    let description = required(&input.description, "description")?;
    let owners = distinct_owners(&input.owners);
    if owners.is_empty() {
        return Err(Error::InvalidArgument(
            "at least one owner is required".to_string(),
        ));
    }
    let project = optional(input.project.as_deref());
    let comments = optional(input.comments.as_deref());
    let completed_date = completion_for(None, input.status, today);

    let rows = owners
        .iter()
        .map(|&owner| {
            to_row(&TaskFields {
                description,
                owner,
                project,
                priority: input.priority,
                status: input.status,
                assigned_date: Some(DateField::from_date(today)),
                promise_date: Some(DateField::from_date(input.promise_date)),
                completed_date: completed_date.clone(),
                comments,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let ids = store.insert(Table::Tasks, rows).await?;
    info!(count = ids.len(), owners = owners.len(), "tasks created");
    Ok(ActionOutcome {
        changed: true,
        message: match ids.len() {
            1 => "created 1 task".to_string(),
            n => format!("created {n} tasks"),
        },
        ids,
    })
}

/// Update `current` from `input`. The assigned date is never sent.
pub async fn edit_task(
    store: &dyn RemoteStore,
    current: &Task,
    input: EditTaskInput,
    today: NaiveDate,
) -> Result<ActionOutcome> {
    let description = required(&input.description, "description")?;
    let owner = required(&input.owner, "owner")?;
    let project = optional(input.project.as_deref());
    let comments = optional(input.comments.as_deref());
    let promise_date = input.promise_date.map(DateField::from_date);
    let completed_date = completion_for(Some(current), input.status, today);

    let unchanged = description == current.description
        && owner == current.owner
        && project == current.project.as_deref()
        && input.priority == current.priority
        && input.status == current.status
        && promise_date
            .as_ref()
            .map_or(true, |date| *date == current.promise_date)
        && completed_date == current.completed_date
        && comments == current.comments.as_deref();
    if unchanged {
        return Ok(ActionOutcome {
            ids: vec![current.id.clone()],
            ..ActionOutcome::unchanged("no changes")
        });
    }

    let fields = to_row(&TaskFields {
        description,
        owner,
        project,
        priority: input.priority,
        status: input.status,
        assigned_date: None,
        promise_date,
        completed_date,
        comments,
    })?;
    store.update(Table::Tasks, &current.id, fields).await?;
    info!(id = %current.id, status = %input.status, "task updated");
    Ok(ActionOutcome {
        changed: true,
        message: "task updated".to_string(),
        ids: vec![current.id.clone()],
    })
}

pub async fn delete_task(
    store: &dyn RemoteStore,
    id: &str,
    confirm: &dyn Confirm,
) -> Result<ActionOutcome> {
    delete(store, Table::Tasks, "task", id, confirm).await
}

pub async fn delete_member(
    store: &dyn RemoteStore,
    id: &str,
    confirm: &dyn Confirm,
) -> Result<ActionOutcome> {
    delete(store, Table::TeamMembers, "team member", id, confirm).await
}

pub async fn delete_project(
    store: &dyn RemoteStore,
    id: &str,
    confirm: &dyn Confirm,
) -> Result<ActionOutcome> {
    delete(store, Table::Projects, "project", id, confirm).await
}

async fn delete(
    store: &dyn RemoteStore,
    table: Table,
    noun: &str,
    id: &str,
    confirm: &dyn Confirm,
) -> Result<ActionOutcome> {
    let id = required(id, "id")?;
    if !confirm.confirm(&format!("Delete {noun} {id}?")) {
        return Ok(ActionOutcome::unchanged("deletion cancelled"));
    }
    store.delete(table, id).await?;
    info!(%table, %id, "record deleted");
    Ok(ActionOutcome {
        changed: true,
        message: format!("{noun} deleted"),
        ids: vec![id.to_string()],
    })
}

pub async fn add_member(
    store: &dyn RemoteStore,
    name: &str,
    designation: &str,
) -> Result<ActionOutcome> {
    #[derive(Serialize)]
    struct MemberFields<'a> {
        name: &'a str,
        designation: &'a str,
    }

    let name = required(name, "name")?;
    let designation = required(designation, "designation")?;
    let row = to_row(&MemberFields { name, designation })?;
    let ids = store.insert(Table::TeamMembers, vec![row]).await?;
    info!(%name, "team member added");
    Ok(ActionOutcome {
        changed: true,
        message: format!("added {name}"),
        ids,
    })
}

pub async fn add_project(store: &dyn RemoteStore, name: &str) -> Result<ActionOutcome> {
    #[derive(Serialize)]
    struct ProjectFields<'a> {
        name: &'a str,
    }

    let name = required(name, "name")?;
    let row = to_row(&ProjectFields { name })?;
    let ids = store.insert(Table::Projects, vec![row]).await?;
    info!(%name, "project added");
    Ok(ActionOutcome {
        changed: true,
        message: format!("added project {name}"),
        ids,
    })
}

fn required<'a>(value: &'a str, field: &str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidArgument(format!("{field} cannot be empty")));
    }
    Ok(trimmed)
}

fn optional(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn distinct_owners(owners: &[String]) -> Vec<&str> {
    let mut seen = HashSet::new();
    owners
        .iter()
        .map(|owner| owner.trim())
        .filter(|owner| !owner.is_empty() && seen.insert(*owner))
        .collect()
}
