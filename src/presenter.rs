//! Rendering of derived views.
//!
//! The synchronizer hands a [`Frame`] to its [`Presenter`] after every mirror
//! change and every filter/sort change. Two presenters ship with the crate:
//! a plain-text dashboard and a JSON-lines stream for external integrations.

use std::fmt;
use std::io::Write;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::derive::{self, DisplayStatus};
use crate::error::{Error, Result};
use crate::model::{Project, Task, TeamMember};
use crate::view::{ChartPoint, DerivedView, FilterState, SortState};

pub const FRAME_SCHEMA_VERSION: &str = "taskboard.frame.v1";

/// Everything one render shows.
#[derive(Debug, Clone, Serialize)]
pub struct Frame<'a> {
    pub today: NaiveDate,
    pub view: &'a DerivedView,
    pub members: &'a [TeamMember],
    pub projects: &'a [Project],
    pub filters: &'a FilterState,
    pub sort: SortState,
}

pub trait Presenter {
    fn render(&mut self, frame: &Frame<'_>) -> Result<()>;
}

impl<P: Presenter + ?Sized> Presenter for Box<P> {
    fn render(&mut self, frame: &Frame<'_>) -> Result<()> {
        (**self).render(frame)
    }
}

/// Which body the text dashboard draws under the summary cards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    #[default]
    List,
    Projects,
    Calendar,
    Charts,
}

impl Layout {
    pub fn as_str(&self) -> &'static str {
        match self {
            Layout::List => "list",
            Layout::Projects => "projects",
            Layout::Calendar => "calendar",
            Layout::Charts => "charts",
        }
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Layout {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "list" => Ok(Layout::List),
            "projects" | "project" => Ok(Layout::Projects),
            "calendar" => Ok(Layout::Calendar),
            "charts" | "chart" => Ok(Layout::Charts),
            other => Err(Error::InvalidArgument(format!(
                "unknown layout '{other}' (expected list, projects, calendar or charts)"
            ))),
        }
    }
}

/// Plain-text dashboard.
pub struct TextPresenter<W: Write> {
    out: W,
    layout: Layout,
    frames: usize,
}

impl<W: Write> TextPresenter<W> {
    pub fn new(out: W, layout: Layout) -> Self {
        Self {
            out,
            layout,
            frames: 0,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Presenter for TextPresenter<W> {
    fn render(&mut self, frame: &Frame<'_>) -> Result<()> {
        let mut lines = Vec::new();
        if self.frames > 0 {
            lines.push(String::new());
            lines.push("=".repeat(72));
        }
        self.frames += 1;

        push_cards(&mut lines, frame);
        lines.push(String::new());
        match self.layout {
            Layout::List => push_task_table(&mut lines, &frame.view.tasks, frame.today),
            Layout::Projects => push_projects(&mut lines, frame),
            Layout::Calendar => push_calendar(&mut lines, frame),
            Layout::Charts => push_charts(&mut lines, frame),
        }
        lines.push(String::new());
        push_rosters(&mut lines, frame);

        writeln!(self.out, "{}", lines.join("\n"))?;
        self.out.flush()?;
        Ok(())
    }
}

fn push_cards(lines: &mut Vec<String>, frame: &Frame<'_>) {
    let counts = frame.view.counts;
    lines.push(format!(
        "Total: {}  Pending: {}  In Progress: {}  Overdue: {}",
        counts.total, counts.pending, counts.in_progress, counts.overdue
    ));
    lines.push(format!(
        "Filters: {}  Sort: {} {}",
        describe_filters(frame.filters),
        frame.sort.key,
        frame.sort.order.as_str()
    ));
}

fn describe_filters(filters: &FilterState) -> String {
    let mut parts = Vec::new();
    if !filters.search.trim().is_empty() {
        parts.push(format!("search=\"{}\"", filters.search.trim()));
    }
    if let Some(owner) = &filters.owner {
        parts.push(format!("owner={owner}"));
    }
    parts.push(format!("status={}", filters.status));
    if let Some(project) = &filters.project {
        parts.push(format!("project={project}"));
    }
    if let Some(priority) = filters.priority {
        parts.push(format!("priority={priority}"));
    }
    let range = match (filters.date_start, filters.date_end) {
        (None, None) => "all dates".to_string(),
        (start, end) => format!(
            "{}..{}",
            start.map(derive::format_date).unwrap_or_default(),
            end.map(derive::format_date).unwrap_or_default()
        ),
    };
    parts.push(range);
    parts.join(" ")
}

fn push_task_table(lines: &mut Vec<String>, tasks: &[Task], today: NaiveDate) {
    if tasks.is_empty() {
        lines.push("No tasks match the current filters.".to_string());
        return;
    }
    lines.push(format!(
        "{:<10} {:<11} {:<7} {:<14} {:<14} {:<10} {:<10} {:<10} {:>5}  DESCRIPTION",
        "ID", "STATUS", "PRIO", "OWNER", "PROJECT", "ASSIGNED", "PROMISE", "DONE", "TAKEN"
    ));
    for task in tasks {
        lines.push(task_row(task, today));
    }
}

fn task_row(task: &Task, today: NaiveDate) -> String {
    let completed = task
        .completed_date
        .as_ref()
        .map(|date| date_text(date.date()))
        .unwrap_or_else(|| "—".to_string());
    format!(
        "{:<10} {:<11} {:<7} {:<14} {:<14} {:<10} {:<10} {:<10} {:>5}  {}",
        truncate(&task.id, 10),
        DisplayStatus::of(task, today).label(),
        task.priority.as_str(),
        truncate(&task.owner, 14),
        truncate(task.project.as_deref().unwrap_or("—"), 14),
        date_text(task.assigned_date.date()),
        date_text(task.promise_date.date()),
        completed,
        derive::days_taken(task).to_string(),
        task.description
    )
}

fn date_text(date: Option<NaiveDate>) -> String {
    date.map(derive::format_date)
        .unwrap_or_else(|| "N/A".to_string())
}

fn truncate(value: &str, width: usize) -> String {
    if value.chars().count() <= width {
        return value.to_string();
    }
    let mut cut: String = value.chars().take(width.saturating_sub(1)).collect();
    cut.push('…');
    cut
}

fn push_projects(lines: &mut Vec<String>, frame: &Frame<'_>) {
    if frame.view.by_project.is_empty() {
        lines.push("No tasks match the current filters.".to_string());
        return;
    }
    for group in &frame.view.by_project {
        let name = group.project.as_deref().unwrap_or("No project");
        lines.push(format!("{name} ({})", group.tasks.len()));
        for task in &group.tasks {
            lines.push(format!(
                "  [{}] {} ({}, {}) promise {}",
                DisplayStatus::of(task, frame.today).label(),
                task.description,
                task.owner,
                task.priority,
                date_text(task.promise_date.date())
            ));
        }
    }
}

fn push_calendar(lines: &mut Vec<String>, frame: &Frame<'_>) {
    if frame.view.calendar.is_empty() {
        lines.push("Nothing on the calendar.".to_string());
        return;
    }
    let mut current: Option<NaiveDate> = None;
    for entry in &frame.view.calendar {
        if current != Some(entry.date) {
            lines.push(derive::format_date(entry.date));
            current = Some(entry.date);
        }
        lines.push(format!(
            "  {}  (assigned {}, promise {}, window {})",
            entry.title, entry.assigned, entry.promise, entry.window
        ));
    }
}

fn push_charts(lines: &mut Vec<String>, frame: &Frame<'_>) {
    let charts = &frame.view.charts;
    push_chart(lines, "By status", &charts.status);
    lines.push(String::new());
    push_chart(lines, "By priority", &charts.priority);
    lines.push(String::new());
    push_chart(lines, "By owner", &charts.owners);
}

fn push_chart(lines: &mut Vec<String>, title: &str, points: &[ChartPoint]) {
    lines.push(format!("{title}:"));
    if points.is_empty() {
        lines.push("  (no data)".to_string());
        return;
    }
    let width = points
        .iter()
        .map(|point| point.label.chars().count())
        .max()
        .unwrap_or(0);
    for point in points {
        lines.push(format!(
            "  {:<width$} {} {}",
            point.label,
            "#".repeat(point.count),
            point.count
        ));
    }
}

fn push_rosters(lines: &mut Vec<String>, frame: &Frame<'_>) {
    let members: Vec<String> = frame
        .members
        .iter()
        .map(|member| {
            if member.designation.is_empty() {
                member.name.clone()
            } else {
                format!("{} ({})", member.name, member.designation)
            }
        })
        .collect();
    lines.push(format!("Team ({}): {}", members.len(), members.join(", ")));

    let projects: Vec<&str> = frame.projects.iter().map(|p| p.name.as_str()).collect();
    lines.push(format!("Projects ({}): {}", projects.len(), projects.join(", ")));
}

/// One JSON object per frame, newline-delimited.
pub struct JsonPresenter<W: Write> {
    out: W,
}

#[derive(Serialize)]
struct FrameRecord<'a> {
    schema_version: &'static str,
    timestamp: DateTime<Utc>,
    #[serde(flatten)]
    frame: &'a Frame<'a>,
}

impl<W: Write> JsonPresenter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Presenter for JsonPresenter<W> {
    fn render(&mut self, frame: &Frame<'_>) -> Result<()> {
        let record = FrameRecord {
            schema_version: FRAME_SCHEMA_VERSION,
            timestamp: Utc::now(),
            frame,
        };
        let line = serde_json::to_string(&record)?;
        writeln!(self.out, "{line}")?;
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DateField, Priority, Status, DATE_FORMAT};
    use crate::view::derive_view;

    fn date(raw: &str) -> NaiveDate {
        NaiveDate::parse_from_str(raw, DATE_FORMAT).unwrap()
    }

    fn task(id: &str, status: Status, project: Option<&str>, promise: &str) -> Task {
        Task {
            id: id.to_string(),
            description: format!("task {id}"),
            owner: "Asha".to_string(),
            project: project.map(str::to_string),
            priority: Priority::High,
            status,
            assigned_date: DateField::new("2024-05-01"),
            promise_date: DateField::new(promise),
            completed_date: None,
            comments: None,
        }
    }

    fn render_with(presenter: &mut dyn Presenter, tasks: &[Task]) {
        let today = date("2024-05-10");
        let filters = FilterState::default();
        let view = derive_view(tasks, &filters, SortState::default(), today);
        let members = vec![TeamMember {
            id: "m-1".to_string(),
            name: "Asha".to_string(),
            designation: "Dev".to_string(),
        }];
        let frame = Frame {
            today,
            view: &view,
            members: &members,
            projects: &[],
            filters: &filters,
            sort: SortState::default(),
        };
        presenter.render(&frame).unwrap();
    }

    #[test]
    fn list_layout_shows_cards_rows_and_overdue_label() {
        let tasks = vec![
            task("1", Status::Pending, Some("Apollo"), "2024-05-01"),
            task("2", Status::InProgress, None, "2024-05-20"),
        ];
        let mut presenter = TextPresenter::new(Vec::new(), Layout::List);
        render_with(&mut presenter, &tasks);
        let text = String::from_utf8(presenter.into_inner()).unwrap();

        assert!(text.contains("Total: 2  Pending: 0  In Progress: 1  Overdue: 1"));
        assert!(text.contains("Overdue"));
        assert!(text.contains("Team (1): Asha (Dev)"));
        assert!(text.contains("Projects (0): "));
    }

    #[test]
    fn projects_layout_puts_unassigned_last() {
        let tasks = vec![
            task("1", Status::Pending, None, "2024-05-20"),
            task("2", Status::Pending, Some("Apollo"), "2024-05-21"),
        ];
        let mut presenter = TextPresenter::new(Vec::new(), Layout::Projects);
        render_with(&mut presenter, &tasks);
        let text = String::from_utf8(presenter.into_inner()).unwrap();

        let apollo = text.find("Apollo (1)").unwrap();
        let none = text.find("No project (1)").unwrap();
        assert!(apollo < none);
    }

    #[test]
    fn later_frames_are_separated() {
        let mut presenter = TextPresenter::new(Vec::new(), Layout::Charts);
        render_with(&mut presenter, &[]);
        render_with(&mut presenter, &[]);
        let text = String::from_utf8(presenter.into_inner()).unwrap();
        assert_eq!(text.matches(&"=".repeat(72)).count(), 1);
        assert!(text.contains("By status:"));
    }

    #[test]
    fn json_presenter_writes_one_line_per_frame() {
        let tasks = vec![task("1", Status::Done, Some("Apollo"), "2024-05-20")];
        let mut presenter = JsonPresenter::new(Vec::new());
        render_with(&mut presenter, &tasks);
        render_with(&mut presenter, &tasks);
        let text = String::from_utf8(presenter.into_inner()).unwrap();

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let value: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(value["schema_version"], FRAME_SCHEMA_VERSION);
        assert_eq!(value["view"]["counts"]["total"], 1);
        assert_eq!(value["members"][0]["name"], "Asha");
    }

    #[test]
    fn layout_parses_case_insensitively() {
        assert_eq!("Calendar".parse::<Layout>().unwrap(), Layout::Calendar);
        assert!("grid".parse::<Layout>().is_err());
    }
}
