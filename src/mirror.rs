//! Local mirror of the three remote tables.
//!
//! The mirror is owned by the synchronizer, which is its only writer. Other
//! components get read-only slices. Writes never trigger recomputation on
//! their own; the synchronizer does that after each applied change.

use crate::model::{Keyed, Project, Record, Table, Task, TeamMember};

/// Result of applying one change to a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Appended,
    Replaced,
    Removed,
    /// No record with the given id; the change was a no-op.
    Missed,
}

/// Rows for one table, as loaded by a bulk read.
#[derive(Debug, Clone)]
pub enum Rows {
    Tasks(Vec<Task>),
    Members(Vec<TeamMember>),
    Projects(Vec<Project>),
}

#[derive(Debug, Clone, Default)]
pub struct Mirror {
    tasks: Vec<Task>,
    members: Vec<TeamMember>,
    projects: Vec<Project>,
}

impl Mirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn members(&self) -> &[TeamMember] {
        &self.members
    }

    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    pub fn len(&self, table: Table) -> usize {
        match table {
            Table::Tasks => self.tasks.len(),
            Table::TeamMembers => self.members.len(),
            Table::Projects => self.projects.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        Table::ALL.iter().all(|table| self.len(*table) == 0)
    }

    pub fn find_task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    /// Replace a whole collection with a bulk read result.
    pub(crate) fn replace_all(&mut self, rows: Rows) {
        match rows {
            Rows::Tasks(tasks) => self.tasks = tasks,
            Rows::Members(members) => self.members = members,
            Rows::Projects(projects) => self.projects = projects,
        }
    }

    /// Append, or replace in place when the id is already present.
    pub(crate) fn apply_insert(&mut self, record: Record) -> Applied {
        match record {
            Record::Task(task) => upsert(&mut self.tasks, task),
            Record::Member(member) => upsert(&mut self.members, member),
            Record::Project(project) => upsert(&mut self.projects, project),
        }
    }

    pub(crate) fn apply_update(&mut self, record: Record) -> Applied {
        match record {
            Record::Task(task) => replace(&mut self.tasks, task),
            Record::Member(member) => replace(&mut self.members, member),
            Record::Project(project) => replace(&mut self.projects, project),
        }
    }

    pub(crate) fn apply_delete(&mut self, table: Table, id: &str) -> Applied {
        match table {
            Table::Tasks => remove(&mut self.tasks, id),
            Table::TeamMembers => remove(&mut self.members, id),
            Table::Projects => remove(&mut self.projects, id),
        }
    }
}

fn upsert<T: Keyed>(collection: &mut Vec<T>, record: T) -> Applied {
    match collection.iter().position(|item| item.id() == record.id()) {
        Some(index) => {
            collection[index] = record;
            Applied::Replaced
        }
        None => {
            collection.push(record);
            Applied::Appended
        }
    }
}

fn replace<T: Keyed>(collection: &mut [T], record: T) -> Applied {
    match collection.iter().position(|item| item.id() == record.id()) {
        Some(index) => {
            collection[index] = record;
            Applied::Replaced
        }
        None => Applied::Missed,
    }
}

fn remove<T: Keyed>(collection: &mut Vec<T>, id: &str) -> Applied {
    match collection.iter().position(|item| item.id() == id) {
        Some(index) => {
            collection.remove(index);
            Applied::Removed
        }
        None => Applied::Missed,
    }
}
