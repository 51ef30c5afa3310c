//! taskboard member command implementations.

use serde::Serialize;

use crate::actions;
use crate::cli::{confirmer, Context};
use crate::error::Result;
use crate::model::{Table, TeamMember};
use crate::output::{emit_success, HumanOutput};

#[derive(Serialize)]
struct MemberListOutput {
    total: usize,
    members: Vec<TeamMember>,
}

pub async fn run_add(ctx: &Context, name: &str, designation: &str) -> Result<()> {
    let outcome = actions::add_member(ctx.store(), name, designation).await?;
    let mut human = HumanOutput::new(format!("taskboard member add: {}", outcome.message));
    if let Some(id) = outcome.ids.first() {
        human.push_summary("id", id.clone());
    }
    emit_success(ctx.output, "member add", &outcome, Some(&human))
}

pub async fn run_delete(ctx: &Context, id: &str, yes: bool) -> Result<()> {
    let confirm = confirmer(yes);
    let outcome = actions::delete_member(ctx.store(), id, confirm.as_ref()).await?;
    let mut human = HumanOutput::new(format!("taskboard member delete: {}", outcome.message));
    if outcome.changed {
        human.push_warning("tasks owned by this member are kept");
    }
    emit_success(ctx.output, "member delete", &outcome, Some(&human))
}

pub async fn run_list(ctx: &Context) -> Result<()> {
    let members: Vec<TeamMember> = ctx.load(Table::TeamMembers).await?;

    let mut human = HumanOutput::new("Team members");
    human.push_summary("Total", members.len().to_string());
    for member in &members {
        human.push_detail(format!("{} {} ({})", member.id, member.name, member.designation));
    }

    let output = MemberListOutput {
        total: members.len(),
        members,
    };
    emit_success(ctx.output, "member list", &output, Some(&human))
}
