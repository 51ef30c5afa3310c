//! Derived dashboard views.
//!
//! Everything here is a pure function of the mirrored tasks, the filter and
//! sort state, and the current day. Renders call [`derive_view`] after every
//! mirror change and every filter/sort change.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::derive::{self, is_overdue, DisplayStatus};
use crate::error::{Error, Result};
use crate::model::{Priority, Status, Task};

/// Status filter. `Overdue` is its own bucket: a task that is overdue never
/// matches the filter for its base status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum StatusFilter {
    #[default]
    All,
    Overdue,
    Is(Status),
}

impl StatusFilter {
    pub fn matches(&self, task: &Task, today: NaiveDate) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Overdue => is_overdue(task, today),
            StatusFilter::Is(status) => task.status == *status && !is_overdue(task, today),
        }
    }
}

impl FromStr for StatusFilter {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "all" => Ok(StatusFilter::All),
            "overdue" => Ok(StatusFilter::Overdue),
            _ => raw.parse::<Status>().map(StatusFilter::Is),
        }
    }
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusFilter::All => f.write_str("all"),
            StatusFilter::Overdue => f.write_str("Overdue"),
            StatusFilter::Is(status) => f.write_str(status.as_str()),
        }
    }
}

/// Dashboard filters. `None` on a field means "all".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterState {
    pub search: String,
    pub owner: Option<String>,
    pub status: StatusFilter,
    pub project: Option<String>,
    pub priority: Option<Priority>,
    pub date_start: Option<NaiveDate>,
    pub date_end: Option<NaiveDate>,
}

impl FilterState {
    /// No filters except an assigned-date range covering the month of `today`.
    pub fn current_month(today: NaiveDate) -> Self {
        let first = today.with_day(1).unwrap_or(today);
        let (year, month) = if today.month() == 12 {
            (today.year() + 1, 1)
        } else {
            (today.year(), today.month() + 1)
        };
        let last = NaiveDate::from_ymd_opt(year, month, 1)
            .and_then(|next| next.pred_opt())
            .unwrap_or(today);
        Self {
            date_start: Some(first),
            date_end: Some(last),
            ..Self::default()
        }
    }

    pub fn matches(&self, task: &Task, today: NaiveDate) -> bool {
        self.passes(&self.search.to_lowercase(), task, today)
    }

    fn passes(&self, needle: &str, task: &Task, today: NaiveDate) -> bool {
        search_matches(needle, task)
            && self.owner.as_ref().map_or(true, |owner| task.owner == *owner)
            && self.status.matches(task, today)
            && self
                .project
                .as_ref()
                .map_or(true, |project| task.project.as_ref() == Some(project))
            && self
                .priority
                .map_or(true, |priority| task.priority == priority)
            && self.date_matches(task)
    }

    fn date_matches(&self, task: &Task) -> bool {
        if self.date_start.is_none() && self.date_end.is_none() {
            return true;
        }
        let Some(assigned) = task.assigned_date.date() else {
            return false;
        };
        self.date_start.map_or(true, |start| assigned >= start)
            && self.date_end.map_or(true, |end| assigned <= end)
    }
}

fn search_matches(needle: &str, task: &Task) -> bool {
    if needle.is_empty() {
        return true;
    }
    task.description.to_lowercase().contains(needle)
        || task
            .project
            .as_deref()
            .map(|project| project.to_lowercase().contains(needle))
            .unwrap_or(false)
        || task.owner.to_lowercase().contains(needle)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    Description,
    Owner,
    Project,
    Priority,
    Status,
    AssignedDate,
    PromiseDate,
    CompletedDate,
}

impl SortKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::Description => "description",
            SortKey::Owner => "owner",
            SortKey::Project => "project",
            SortKey::Priority => "priority",
            SortKey::Status => "status",
            SortKey::AssignedDate => "assigned_date",
            SortKey::PromiseDate => "promise_date",
            SortKey::CompletedDate => "completed_date",
        }
    }

    fn compare(&self, left: &Task, right: &Task) -> Ordering {
        match self {
            SortKey::Description => left.description.cmp(&right.description),
            SortKey::Owner => left.owner.cmp(&right.owner),
            SortKey::Project => left.project.cmp(&right.project),
            SortKey::Priority => left.priority.as_str().cmp(right.priority.as_str()),
            SortKey::Status => left.status.as_str().cmp(right.status.as_str()),
            SortKey::AssignedDate => left.assigned_date.date().cmp(&right.assigned_date.date()),
            SortKey::PromiseDate => left.promise_date.date().cmp(&right.promise_date.date()),
            SortKey::CompletedDate => {
                let left = left.completed_date.as_ref().and_then(|date| date.date());
                let right = right.completed_date.as_ref().and_then(|date| date.date());
                left.cmp(&right)
            }
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortKey {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim() {
            "description" => Ok(SortKey::Description),
            "owner" => Ok(SortKey::Owner),
            "project" => Ok(SortKey::Project),
            "priority" => Ok(SortKey::Priority),
            "status" => Ok(SortKey::Status),
            "assigned_date" | "assignedDate" => Ok(SortKey::AssignedDate),
            "promise_date" | "promiseDate" => Ok(SortKey::PromiseDate),
            "completed_date" | "completedDate" => Ok(SortKey::CompletedDate),
            other => Err(Error::InvalidArgument(format!("unknown sort key '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }

    pub fn flipped(self) -> Self {
        match self {
            SortOrder::Asc => SortOrder::Desc,
            SortOrder::Desc => SortOrder::Asc,
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortOrder {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(Error::InvalidArgument(format!(
                "unknown sort order '{other}' (expected asc|desc)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SortState {
    pub key: SortKey,
    pub order: SortOrder,
}

impl Default for SortState {
    fn default() -> Self {
        Self {
            key: SortKey::PromiseDate,
            order: SortOrder::Asc,
        }
    }
}

impl SortState {
    /// Column-header behavior: the active key flips direction, a new key
    /// starts ascending.
    pub fn toggled(self, key: SortKey) -> Self {
        if self.key == key {
            Self {
                key,
                order: self.order.flipped(),
            }
        } else {
            Self {
                key,
                order: SortOrder::Asc,
            }
        }
    }
}

/// Stable sort; ties keep their input order in both directions.
pub fn sort_tasks(tasks: &mut [Task], sort: SortState) {
    tasks.sort_by(|left, right| {
        let ordering = sort.key.compare(left, right);
        match sort.order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });
}

pub fn filter_tasks(tasks: &[Task], filters: &FilterState, today: NaiveDate) -> Vec<Task> {
    let needle = filters.search.to_lowercase();
    tasks
        .iter()
        .filter(|task| filters.passes(&needle, task, today))
        .cloned()
        .collect()
}

/// Summary-card counts. `pending`, `in_progress` and `overdue` never overlap;
/// done tasks only count toward `total`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Aggregates {
    pub total: usize,
    pub pending: usize,
    pub in_progress: usize,
    pub overdue: usize,
}

pub fn aggregate(tasks: &[Task], today: NaiveDate) -> Aggregates {
    let mut counts = Aggregates {
        total: tasks.len(),
        ..Aggregates::default()
    };
    for task in tasks {
        match DisplayStatus::of(task, today) {
            DisplayStatus::Overdue => counts.overdue += 1,
            DisplayStatus::Pending => counts.pending += 1,
            DisplayStatus::InProgress => counts.in_progress += 1,
            DisplayStatus::Done => {}
        }
    }
    counts
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectGroup {
    /// `None` is the bucket for tasks without a project.
    pub project: Option<String>,
    pub tasks: Vec<Task>,
}

/// Partition by project name. Groups appear in first-seen order; the
/// no-project bucket, when non-empty, comes last.
pub fn group_by_project(tasks: &[Task]) -> Vec<ProjectGroup> {
    let mut groups: Vec<ProjectGroup> = Vec::new();
    let mut index_by_project: HashMap<String, usize> = HashMap::new();
    let mut unassigned = Vec::new();

    for task in tasks {
        let Some(project) = task.project.as_ref() else {
            unassigned.push(task.clone());
            continue;
        };
        match index_by_project.get(project) {
            Some(&idx) => groups[idx].tasks.push(task.clone()),
            None => {
                index_by_project.insert(project.clone(), groups.len());
                groups.push(ProjectGroup {
                    project: Some(project.clone()),
                    tasks: vec![task.clone()],
                });
            }
        }
    }

    if !unassigned.is_empty() {
        groups.push(ProjectGroup {
            project: None,
            tasks: unassigned,
        });
    }
    groups
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChartPoint {
    pub label: String,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<&'static str>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Charts {
    pub status: Vec<ChartPoint>,
    pub priority: Vec<ChartPoint>,
    pub owners: Vec<ChartPoint>,
}

pub fn chart_series(tasks: &[Task], today: NaiveDate) -> Charts {
    let status = DisplayStatus::ALL
        .iter()
        .map(|bucket| ChartPoint {
            label: bucket.label().to_string(),
            count: tasks
                .iter()
                .filter(|task| DisplayStatus::of(task, today) == *bucket)
                .count(),
            color: Some(bucket.color()),
        })
        .collect();

    let priority = Priority::ALL
        .iter()
        .map(|priority| ChartPoint {
            label: priority.as_str().to_string(),
            count: tasks
                .iter()
                .filter(|task| task.priority == *priority)
                .count(),
            color: Some(derive::priority_badge(*priority).color),
        })
        .collect();

    let mut owners: Vec<ChartPoint> = Vec::new();
    for task in tasks {
        match owners.iter_mut().find(|point| point.label == task.owner) {
            Some(point) => point.count += 1,
            None => owners.push(ChartPoint {
                label: task.owner.clone(),
                count: 1,
                color: None,
            }),
        }
    }

    Charts {
        status,
        priority,
        owners,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarEntry {
    pub task_id: String,
    pub title: String,
    pub date: NaiveDate,
    pub color: &'static str,
    pub assigned: String,
    pub promise: String,
    pub window: String,
}

/// One entry per task with a usable promise date.
pub fn calendar_entries(tasks: &[Task], today: NaiveDate) -> Vec<CalendarEntry> {
    tasks
        .iter()
        .filter_map(|task| {
            let date = task.promise_date.date()?;
            Some(CalendarEntry {
                task_id: task.id.clone(),
                title: format!("{}: {}", task.owner, task.description),
                date,
                color: DisplayStatus::of(task, today).color(),
                assigned: task.assigned_date.to_string(),
                promise: task.promise_date.to_string(),
                window: derive::promise_window(task).to_string(),
            })
        })
        .collect()
}

/// Everything a render needs, computed in one pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DerivedView {
    pub tasks: Vec<Task>,
    pub counts: Aggregates,
    pub by_project: Vec<ProjectGroup>,
    pub charts: Charts,
    pub calendar: Vec<CalendarEntry>,
}

pub fn derive_view(
    tasks: &[Task],
    filters: &FilterState,
    sort: SortState,
    today: NaiveDate,
) -> DerivedView {
    let mut filtered = filter_tasks(tasks, filters, today);
    let counts = aggregate(&filtered, today);
    sort_tasks(&mut filtered, sort);
    DerivedView {
        by_project: group_by_project(&filtered),
        charts: chart_series(&filtered, today),
        calendar: calendar_entries(&filtered, today),
        counts,
        tasks: filtered,
    }
}
