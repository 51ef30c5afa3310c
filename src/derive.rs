//! Per-task derived values: overdue status, display badges, elapsed days.
//!
//! Every function here degrades to a "not applicable" sentinel when a date
//! field cannot be parsed, so one bad row never breaks a render.

use std::fmt;

use chrono::{Local, NaiveDate};

use crate::model::{Priority, Status, Task, DATE_FORMAT};

/// Today's calendar date in local time.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// A task is overdue when it is not done and its promise date is strictly
/// before `today`. An unparseable promise date is never overdue.
pub fn is_overdue(task: &Task, today: NaiveDate) -> bool {
    if task.status == Status::Done {
        return false;
    }
    task.promise_date
        .date()
        .map(|promise| promise < today)
        .unwrap_or(false)
}

/// Status bucket shown to users; overdue takes precedence over the base status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum DisplayStatus {
    Pending,
    #[serde(rename = "In Progress")]
    InProgress,
    Done,
    Overdue,
}

impl DisplayStatus {
    pub const ALL: [DisplayStatus; 4] = [
        DisplayStatus::Pending,
        DisplayStatus::InProgress,
        DisplayStatus::Done,
        DisplayStatus::Overdue,
    ];

    pub fn of(task: &Task, today: NaiveDate) -> Self {
        if is_overdue(task, today) {
            return DisplayStatus::Overdue;
        }
        match task.status {
            Status::Pending => DisplayStatus::Pending,
            Status::InProgress => DisplayStatus::InProgress,
            Status::Done => DisplayStatus::Done,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DisplayStatus::Pending => "Pending",
            DisplayStatus::InProgress => "In Progress",
            DisplayStatus::Done => "Done",
            DisplayStatus::Overdue => "Overdue",
        }
    }

    /// Calendar/chart color for the bucket.
    pub fn color(&self) -> &'static str {
        match self {
            DisplayStatus::Pending => "#FBBF24",
            DisplayStatus::InProgress => "#3B82F6",
            DisplayStatus::Done => "#10B981",
            DisplayStatus::Overdue => "#EF4444",
        }
    }
}

impl fmt::Display for DisplayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Badge {
    pub label: &'static str,
    pub color: &'static str,
}

pub fn status_badge(task: &Task, today: NaiveDate) -> Badge {
    let status = DisplayStatus::of(task, today);
    Badge {
        label: status.label(),
        color: status.color(),
    }
}

pub fn priority_badge(priority: Priority) -> Badge {
    let color = match priority {
        Priority::Urgent => "#EF4444",
        Priority::High => "#F97316",
        Priority::Medium => "#3B82F6",
        Priority::Low => "#6B7280",
    };
    Badge {
        label: priority.as_str(),
        color,
    }
}

/// Days between assignment and completion of a finished task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaysTaken {
    NotApplicable,
    SameDay,
    Days(i64),
}

impl fmt::Display for DaysTaken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DaysTaken::NotApplicable => f.write_str("—"),
            DaysTaken::SameDay => f.write_str("Today"),
            DaysTaken::Days(days) => write!(f, "{days}d"),
        }
    }
}

pub fn days_taken(task: &Task) -> DaysTaken {
    if task.status != Status::Done {
        return DaysTaken::NotApplicable;
    }
    let Some(completed) = task.completed_date.as_ref().and_then(|date| date.date()) else {
        return DaysTaken::NotApplicable;
    };
    let Some(assigned) = task.assigned_date.date() else {
        return DaysTaken::NotApplicable;
    };
    match (completed - assigned).num_days().abs() {
        0 => DaysTaken::SameDay,
        days => DaysTaken::Days(days),
    }
}

/// Inclusive length of the window from assignment to promise, in days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromiseWindow {
    NotApplicable,
    Days(i64),
}

impl fmt::Display for PromiseWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PromiseWindow::NotApplicable => f.write_str("N/A"),
            PromiseWindow::Days(days) => write!(f, "{days} day(s)"),
        }
    }
}

pub fn promise_window(task: &Task) -> PromiseWindow {
    match (task.assigned_date.date(), task.promise_date.date()) {
        (Some(assigned), Some(promise)) => PromiseWindow::Days((promise - assigned).num_days() + 1),
        _ => PromiseWindow::NotApplicable,
    }
}
