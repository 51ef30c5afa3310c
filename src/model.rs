//! Records mirrored from the remote store.
//!
//! Three tables are mirrored: `tasks`, `team_members` and `projects`. Rows are
//! decoded per table from wire JSON. Date fields stay as wire text and are
//! parsed on demand, so a malformed date never rejects a whole row.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};

/// Wire format for calendar dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A mirrored remote table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Tasks,
    TeamMembers,
    Projects,
}

impl Table {
    pub const ALL: [Table; 3] = [Table::Tasks, Table::TeamMembers, Table::Projects];

    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Tasks => "tasks",
            Table::TeamMembers => "team_members",
            Table::Projects => "projects",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Table {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "tasks" => Ok(Table::Tasks),
            "team_members" | "members" => Ok(Table::TeamMembers),
            "projects" => Ok(Table::Projects),
            other => Err(Error::InvalidArgument(format!("unknown table '{other}'"))),
        }
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl Priority {
    /// Display order, most pressing first.
    pub const ALL: [Priority; 4] = [
        Priority::Urgent,
        Priority::High,
        Priority::Medium,
        Priority::Low,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
            Priority::Urgent => "Urgent",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "urgent" => Ok(Priority::Urgent),
            _ => Err(Error::InvalidArgument(format!(
                "invalid priority '{}' (expected Low|Medium|High|Urgent)",
                raw.trim()
            ))),
        }
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Status {
    #[default]
    Pending,
    #[serde(rename = "In Progress")]
    InProgress,
    Done,
}

impl Status {
    pub const ALL: [Status; 3] = [Status::Pending, Status::InProgress, Status::Done];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pending => "Pending",
            Status::InProgress => "In Progress",
            Status::Done => "Done",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self> {
        let normalized = raw.trim().to_ascii_lowercase().replace(['_', '-'], " ");
        match normalized.as_str() {
            "pending" => Ok(Status::Pending),
            "in progress" => Ok(Status::InProgress),
            "done" => Ok(Status::Done),
            _ => Err(Error::InvalidArgument(format!(
                "invalid status '{}' (expected Pending|In Progress|Done)",
                raw.trim()
            ))),
        }
    }
}

/// A calendar date as it appears on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DateField(String);

impl DateField {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self(date.format(DATE_FORMAT).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The parsed calendar date, or `None` when the wire text is not a date.
    pub fn date(&self) -> Option<NaiveDate> {
        parse_date(&self.0)
    }
}

impl fmt::Display for DateField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parse a wire date, ignoring any time-of-day component.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(trimmed, DATE_FORMAT)
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(trimmed)
                .ok()
                .map(|dt| dt.date_naive())
        })
        .or_else(|| {
            NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|dt| dt.date())
        })
}

/// Records addressable by a stable identifier.
pub trait Keyed {
    fn id(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub owner: String,
    #[serde(
        default,
        deserialize_with = "deserialize_optional_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub project: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub priority: Priority,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: Status,
    #[serde(default)]
    pub assigned_date: DateField,
    #[serde(default)]
    pub promise_date: DateField,
    #[serde(
        default,
        deserialize_with = "deserialize_optional_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub completed_date: Option<DateField>,
    #[serde(
        default,
        deserialize_with = "deserialize_optional_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub comments: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMember {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub designation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub name: String,
}

impl Keyed for Task {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Keyed for TeamMember {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Keyed for Project {
    fn id(&self) -> &str {
        &self.id
    }
}

/// One typed row, tagged with its table.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Task(Task),
    Member(TeamMember),
    Project(Project),
}

impl Record {
    pub fn table(&self) -> Table {
        match self {
            Record::Task(_) => Table::Tasks,
            Record::Member(_) => Table::TeamMembers,
            Record::Project(_) => Table::Projects,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Record::Task(task) => task.id(),
            Record::Member(member) => member.id(),
            Record::Project(project) => project.id(),
        }
    }

    /// Decode a wire row for the given table.
    pub fn decode(table: Table, value: serde_json::Value) -> Result<Record> {
        Ok(match table {
            Table::Tasks => Record::Task(serde_json::from_value(value)?),
            Table::TeamMembers => Record::Member(serde_json::from_value(value)?),
            Table::Projects => Record::Project(serde_json::from_value(value)?),
        })
    }
}

/// Extract the identifier of a wire row (string or integer).
pub fn wire_id(value: &serde_json::Value) -> Option<String> {
    match value.get("id")? {
        serde_json::Value::String(id) => Some(id.clone()),
        serde_json::Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

/// Completed date implied by moving a task to `next`.
///
/// `previous` is `None` for a task being created. The result is present
/// exactly when `next` is `Done`; an already-done task keeps its date.
pub fn completion_for(previous: Option<&Task>, next: Status, today: NaiveDate) -> Option<DateField> {
    if next != Status::Done {
        return None;
    }
    match previous {
        Some(task) if task.status == Status::Done => task
            .completed_date
            .clone()
            .or_else(|| Some(DateField::from_date(today))),
        _ => Some(DateField::from_date(today)),
    }
}

fn deserialize_id<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(id) => id,
        RawId::Number(id) => id.to_string(),
    })
}

fn deserialize_optional_text<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|text| !text.trim().is_empty()))
}

fn deserialize_optional_date<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<DateField>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(deserialize_optional_text(deserializer)?.map(DateField::new))
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn date(raw: &str) -> NaiveDate {
        NaiveDate::parse_from_str(raw, DATE_FORMAT).expect("date")
    }

    fn done_task(completed: Option<&str>) -> Task {
        Task {
            id: "t-1".to_string(),
            description: "Ship".to_string(),
            owner: "Asha".to_string(),
            project: None,
            priority: Priority::Medium,
            status: Status::Done,
            assigned_date: DateField::new("2024-05-01"),
            promise_date: DateField::new("2024-05-03"),
            completed_date: completed.map(DateField::new),
            comments: None,
        }
    }

    #[test]
    fn decodes_task_with_numeric_id_and_wire_labels() {
        let record = Record::decode(
            Table::Tasks,
            json!({
                "id": 42,
                "description": "Quarterly report",
                "owner": "Asha",
                "project": "",
                "priority": null,
                "status": "In Progress",
                "assigned_date": "2024-05-01",
                "promise_date": "2024-05-10",
                "completed_date": null,
                "comments": "  "
            }),
        )
        .expect("decode");

        let Record::Task(task) = record else {
            panic!("expected task");
        };
        assert_eq!(task.id, "42");
        assert_eq!(task.project, None);
        assert_eq!(task.priority, Priority::Medium);
        assert_eq!(task.status, Status::InProgress);
        assert_eq!(task.completed_date, None);
        assert_eq!(task.comments, None);
    }

    #[test]
    fn malformed_dates_do_not_reject_the_row() {
        let record = Record::decode(
            Table::Tasks,
            json!({
                "id": "t-9",
                "description": "Broken",
                "owner": "Ben",
                "status": "Pending",
                "assigned_date": "not a date",
                "promise_date": "2024-13-45"
            }),
        )
        .expect("decode");
        let Record::Task(task) = record else {
            panic!("expected task");
        };
        assert_eq!(task.assigned_date.date(), None);
        assert_eq!(task.promise_date.date(), None);
    }

    #[test]
    fn decode_rejects_unknown_status() {
        let result = Record::decode(
            Table::Tasks,
            json!({"id": "t-1", "status": "Blocked"}),
        );
        assert!(result.is_err());
    }

    #[test]
    fn parse_date_ignores_time_of_day() {
        assert_eq!(parse_date("2024-03-01"), Some(date("2024-03-01")));
        assert_eq!(parse_date("2024-03-01T23:10:00"), Some(date("2024-03-01")));
        assert_eq!(
            parse_date("2024-03-01T08:00:00.250+02:00"),
            Some(date("2024-03-01"))
        );
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("03/01/2024"), None);
    }

    #[test]
    fn wire_id_accepts_text_and_numbers() {
        assert_eq!(wire_id(&json!({"id": "abc"})), Some("abc".to_string()));
        assert_eq!(wire_id(&json!({"id": 7})), Some("7".to_string()));
        assert_eq!(wire_id(&json!({"name": "x"})), None);
    }

    #[test]
    fn table_and_enum_parsing() {
        assert_eq!("team_members".parse::<Table>().unwrap(), Table::TeamMembers);
        assert_eq!("in_progress".parse::<Status>().unwrap(), Status::InProgress);
        assert_eq!("In Progress".parse::<Status>().unwrap(), Status::InProgress);
        assert_eq!("URGENT".parse::<Priority>().unwrap(), Priority::Urgent);
        assert!("someday".parse::<Priority>().is_err());
    }

    #[test]
    fn completion_set_when_entering_done() {
        let today = date("2024-06-01");
        assert_eq!(
            completion_for(None, Status::Done, today),
            Some(DateField::new("2024-06-01"))
        );
        let mut pending = done_task(None);
        pending.status = Status::Pending;
        assert_eq!(
            completion_for(Some(&pending), Status::Done, today),
            Some(DateField::new("2024-06-01"))
        );
    }

    #[test]
    fn completion_kept_while_done_and_cleared_on_leave() {
        let today = date("2024-06-01");
        let done = done_task(Some("2024-05-04"));
        assert_eq!(
            completion_for(Some(&done), Status::Done, today),
            Some(DateField::new("2024-05-04"))
        );
        assert_eq!(completion_for(Some(&done), Status::InProgress, today), None);
        assert_eq!(completion_for(None, Status::Pending, today), None);

        let missing = done_task(None);
        assert_eq!(
            completion_for(Some(&missing), Status::Done, today),
            Some(DateField::new("2024-06-01"))
        );
    }
}
