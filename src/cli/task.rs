//! taskboard task command implementations.

use chrono::{Duration, NaiveDate};
use serde::Serialize;

use crate::actions::{self, EditTaskInput, NewTaskInput};
use crate::cli::{confirmer, Context, FilterArgs};
use crate::derive::{self, DisplayStatus};
use crate::error::Result;
use crate::model::{Priority, Status, Table, Task};
use crate::output::{emit_success, HumanOutput};
use crate::view::{derive_view, Aggregates};

pub struct AddOptions {
    pub description: String,
    pub owners: Vec<String>,
    pub project: Option<String>,
    pub priority: Option<Priority>,
    pub status: Option<Status>,
    pub promise: Option<NaiveDate>,
    pub comments: Option<String>,
}

pub struct EditOptions {
    pub id: String,
    pub description: Option<String>,
    pub owner: Option<String>,
    pub project: Option<String>,
    pub priority: Option<Priority>,
    pub status: Option<Status>,
    pub promise: Option<NaiveDate>,
    pub comments: Option<String>,
}

#[derive(Serialize)]
struct TaskListOutput {
    counts: Aggregates,
    tasks: Vec<Task>,
}

pub async fn run_add(ctx: &Context, options: AddOptions) -> Result<()> {
    let today = derive::today();
    let promise_date = options
        .promise
        .unwrap_or_else(|| today + Duration::days(i64::from(ctx.config.tasks.promise_days)));
    let priority = match options.priority {
        Some(priority) => priority,
        None => ctx.config.default_priority()?,
    };
    let status = match options.status {
        Some(status) => status,
        None => ctx.config.default_status()?,
    };

    let input = NewTaskInput {
        description: options.description,
        owners: options.owners,
        project: options.project,
        priority,
        status,
        promise_date,
        comments: options.comments,
    };
    let outcome = actions::create_tasks(ctx.store(), input, today).await?;

    let mut human = HumanOutput::new(format!("taskboard task add: {}", outcome.message));
    human.push_summary("priority", priority.as_str());
    human.push_summary("status", status.as_str());
    human.push_summary("promise", derive::format_date(promise_date));
    if promise_date < today {
        human.push_warning("promise date is already in the past");
    }
    for id in &outcome.ids {
        human.push_detail(id.clone());
    }
    emit_success(ctx.output, "task add", &outcome, Some(&human))
}

pub async fn run_edit(ctx: &Context, options: EditOptions) -> Result<()> {
    let today = derive::today();
    let current = ctx.find_task(&options.id).await?;

    let mut input = EditTaskInput::from_task(&current);
    if let Some(description) = options.description {
        input.description = description;
    }
    if let Some(owner) = options.owner {
        input.owner = owner;
    }
    if let Some(project) = options.project {
        input.project = Some(project);
    }
    if let Some(priority) = options.priority {
        input.priority = priority;
    }
    if let Some(status) = options.status {
        input.status = status;
    }
    if let Some(promise) = options.promise {
        input.promise_date = Some(promise);
    }
    if let Some(comments) = options.comments {
        input.comments = Some(comments);
    }

    let status = input.status;
    let outcome = actions::edit_task(ctx.store(), &current, input, today).await?;

    let mut human = HumanOutput::new(format!("taskboard task edit: {}", outcome.message));
    human.push_summary("id", current.id.clone());
    if status != current.status {
        human.push_summary("status", format!("{} -> {}", current.status, status));
    }
    emit_success(ctx.output, "task edit", &outcome, Some(&human))
}

pub async fn run_delete(ctx: &Context, id: &str, yes: bool) -> Result<()> {
    let confirm = confirmer(yes);
    let outcome = actions::delete_task(ctx.store(), id, confirm.as_ref()).await?;
    let human = HumanOutput::new(format!("taskboard task delete: {}", outcome.message));
    emit_success(ctx.output, "task delete", &outcome, Some(&human))
}

pub async fn run_list(ctx: &Context, filters: FilterArgs) -> Result<()> {
    let today = derive::today();
    let (filters, sort) = filters.resolve(&ctx.config, today)?;
    let tasks: Vec<Task> = ctx.load(Table::Tasks).await?;
    let view = derive_view(&tasks, &filters, sort, today);

    let mut human = HumanOutput::new("Tasks");
    human.push_summary("Total", view.counts.total.to_string());
    human.push_summary("Pending", view.counts.pending.to_string());
    human.push_summary("In Progress", view.counts.in_progress.to_string());
    human.push_summary("Overdue", view.counts.overdue.to_string());
    for task in &view.tasks {
        let mut line = format!(
            "[{}][{}] {} {} ({}, promise {})",
            DisplayStatus::of(task, today),
            task.priority,
            task.id,
            task.description,
            task.owner,
            task.promise_date
        );
        if let Some(project) = task.project.as_ref() {
            line.push_str(&format!(" (project: {project})"));
        }
        human.push_detail(line);
    }

    let output = TaskListOutput {
        counts: view.counts,
        tasks: view.tasks,
    };
    emit_success(ctx.output, "task list", &output, Some(&human))
}
