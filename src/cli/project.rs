//! taskboard project command implementations.

use serde::Serialize;

use crate::actions;
use crate::cli::{confirmer, Context};
use crate::error::Result;
use crate::model::{Project, Table, Task};
use crate::output::{emit_success, HumanOutput};

#[derive(Serialize)]
struct ProjectSummary {
    #[serde(flatten)]
    project: Project,
    tasks: usize,
}

#[derive(Serialize)]
struct ProjectListOutput {
    total: usize,
    projects: Vec<ProjectSummary>,
}

pub async fn run_add(ctx: &Context, name: &str) -> Result<()> {
    let outcome = actions::add_project(ctx.store(), name).await?;
    let mut human = HumanOutput::new(format!("taskboard project add: {}", outcome.message));
    if let Some(id) = outcome.ids.first() {
        human.push_summary("id", id.clone());
    }
    emit_success(ctx.output, "project add", &outcome, Some(&human))
}

pub async fn run_delete(ctx: &Context, id: &str, yes: bool) -> Result<()> {
    let confirm = confirmer(yes);
    let outcome = actions::delete_project(ctx.store(), id, confirm.as_ref()).await?;
    let mut human = HumanOutput::new(format!("taskboard project delete: {}", outcome.message));
    if outcome.changed {
        human.push_warning("tasks in this project keep its name");
    }
    emit_success(ctx.output, "project delete", &outcome, Some(&human))
}

pub async fn run_list(ctx: &Context) -> Result<()> {
    let projects: Vec<Project> = ctx.load(Table::Projects).await?;
    let tasks: Vec<Task> = ctx.load(Table::Tasks).await?;

    let projects: Vec<ProjectSummary> = projects
        .into_iter()
        .map(|project| ProjectSummary {
            tasks: tasks
                .iter()
                .filter(|task| task.project.as_deref() == Some(project.name.as_str()))
                .count(),
            project,
        })
        .collect();

    let mut human = HumanOutput::new("Projects");
    human.push_summary("Total", projects.len().to_string());
    for summary in &projects {
        human.push_detail(format!(
            "{} {} ({} tasks)",
            summary.project.id, summary.project.name, summary.tasks
        ));
    }

    let output = ProjectListOutput {
        total: projects.len(),
        projects,
    };
    emit_success(ctx.output, "project list", &output, Some(&human))
}
