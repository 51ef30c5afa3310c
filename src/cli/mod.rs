//! Command-line interface for taskboard
//!
//! This module defines the CLI structure using clap derive macros.
//! Each command group is implemented in its own submodule.

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use tracing::warn;

use crate::actions::{AssumeYes, Confirm};
use crate::config::{Config, DateRange};
use crate::error::{Error, Result};
use crate::model::{Priority, Status, Table, Task};
use crate::output::OutputOptions;
use crate::presenter::Layout;
use crate::remote::{FileStore, RemoteStore};
use crate::view::{FilterState, SortKey, SortOrder, SortState, StatusFilter};

mod board;
mod init;
mod member;
mod project;
mod task;

/// taskboard - team task dashboard
///
/// Tracks tasks, owners and projects in a shared store directory and keeps
/// every open dashboard in sync through the store's change feed.
#[derive(Parser, Debug)]
#[command(name = "taskboard")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Store directory (defaults to the configured or platform data dir)
    #[arg(long, global = true, env = "TASKBOARD_STORE")]
    pub store: Option<PathBuf>,

    /// Config file (defaults to ./.taskboard.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the store directory and a default .taskboard.toml
    Init,

    /// Load the board once and render it
    Show {
        #[command(flatten)]
        filters: FilterArgs,

        /// Layout: list, projects, calendar, charts
        #[arg(long)]
        layout: Option<Layout>,
    },

    /// Render the board and re-render on every change until Ctrl-C
    Watch {
        #[command(flatten)]
        filters: FilterArgs,

        /// Layout: list, projects, calendar, charts
        #[arg(long)]
        layout: Option<Layout>,
    },

    /// Task management
    #[command(subcommand)]
    Task(TaskCommands),

    /// Team member management
    #[command(subcommand)]
    Member(MemberCommands),

    /// Project management
    #[command(subcommand)]
    Project(ProjectCommands),
}

#[derive(Subcommand, Debug)]
pub enum TaskCommands {
    /// Create a task, one row per owner
    Add {
        /// What needs doing
        description: String,

        /// Owner name (repeat for several owners)
        #[arg(short, long = "owner", required = true)]
        owners: Vec<String>,

        #[arg(long)]
        project: Option<String>,

        /// Low, Medium, High, Urgent (default from config)
        #[arg(long)]
        priority: Option<Priority>,

        /// Pending, "In Progress", Done (default from config)
        #[arg(long)]
        status: Option<Status>,

        /// Promise date YYYY-MM-DD (default: today + tasks.promise_days)
        #[arg(long)]
        promise: Option<NaiveDate>,

        #[arg(long)]
        comments: Option<String>,
    },

    /// Edit a task; unspecified fields keep their value
    Edit {
        id: String,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        owner: Option<String>,

        /// New project; pass an empty string to clear
        #[arg(long)]
        project: Option<String>,

        #[arg(long)]
        priority: Option<Priority>,

        #[arg(long)]
        status: Option<Status>,

        #[arg(long)]
        promise: Option<NaiveDate>,

        /// New comments; pass an empty string to clear
        #[arg(long)]
        comments: Option<String>,
    },

    /// Delete a task
    Delete {
        id: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// List tasks matching the filters
    List {
        #[command(flatten)]
        filters: FilterArgs,
    },
}

#[derive(Subcommand, Debug)]
pub enum MemberCommands {
    /// Add a team member
    Add {
        name: String,

        #[arg(short, long)]
        designation: String,
    },

    /// Delete a team member (their tasks are kept)
    Delete {
        id: String,

        #[arg(short, long)]
        yes: bool,
    },

    /// List team members
    List,
}

#[derive(Subcommand, Debug)]
pub enum ProjectCommands {
    /// Add a project
    Add { name: String },

    /// Delete a project (its tasks are kept)
    Delete {
        id: String,

        #[arg(short, long)]
        yes: bool,
    },

    /// List projects
    List,
}

/// Filter and sort flags shared by `show`, `watch` and `task list`
#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Case-insensitive match on description, project or owner
    #[arg(long)]
    pub search: Option<String>,

    #[arg(long)]
    pub owner: Option<String>,

    /// Pending, "In Progress", Done, Overdue or all
    #[arg(long)]
    pub status: Option<StatusFilter>,

    #[arg(long)]
    pub project: Option<String>,

    #[arg(long)]
    pub priority: Option<Priority>,

    /// Earliest assigned date (YYYY-MM-DD)
    #[arg(long)]
    pub from: Option<NaiveDate>,

    /// Latest assigned date (YYYY-MM-DD)
    #[arg(long)]
    pub to: Option<NaiveDate>,

    /// Ignore the default assigned-date range
    #[arg(long, conflicts_with_all = ["from", "to"])]
    pub all_dates: bool,

    /// Sort key, e.g. promise_date, priority, owner
    #[arg(long)]
    pub sort: Option<SortKey>,

    /// Sort descending
    #[arg(long)]
    pub desc: bool,
}

impl FilterArgs {
    /// Combine flags with configured defaults.
    pub fn resolve(&self, config: &Config, today: NaiveDate) -> Result<(FilterState, SortState)> {
        let base = if self.all_dates || self.from.is_some() || self.to.is_some() {
            FilterState::default()
        } else {
            match config.date_range()? {
                DateRange::CurrentMonth => FilterState::current_month(today),
                DateRange::All => FilterState::default(),
            }
        };

        let filters = FilterState {
            search: self.search.clone().unwrap_or_default(),
            owner: non_empty(self.owner.as_deref()),
            status: self.status.unwrap_or_default(),
            project: non_empty(self.project.as_deref()),
            priority: self.priority,
            date_start: self.from.or(base.date_start),
            date_end: self.to.or(base.date_end),
        };
        if let (Some(start), Some(end)) = (filters.date_start, filters.date_end) {
            if start > end {
                return Err(Error::InvalidArgument(format!(
                    "--from {start} is after --to {end}"
                )));
            }
        }

        let configured = config.sort_state()?;
        let sort = SortState {
            key: self.sort.unwrap_or(configured.key),
            order: if self.desc {
                SortOrder::Desc
            } else if self.sort.is_some() {
                SortOrder::Asc
            } else {
                configured.order
            },
        };
        Ok((filters, sort))
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Shared state for commands that talk to the store.
pub(crate) struct Context {
    pub config: Config,
    pub store: Arc<FileStore>,
    pub output: OutputOptions,
}

impl Context {
    pub fn store(&self) -> &dyn RemoteStore {
        self.store.as_ref()
    }

    /// Read and decode one table, skipping rows that do not decode.
    pub async fn load<T: serde::de::DeserializeOwned>(&self, table: Table) -> Result<Vec<T>> {
        let rows = self.store.read_all(table).await?;
        Ok(rows
            .into_iter()
            .filter_map(|row: Value| match serde_json::from_value(row) {
                Ok(record) => Some(record),
                Err(err) => {
                    warn!(%table, error = %err, "skipping undecodable row");
                    None
                }
            })
            .collect())
    }

    pub async fn find_task(&self, id: &str) -> Result<Task> {
        self.load::<Task>(Table::Tasks)
            .await?
            .into_iter()
            .find(|task| task.id == id)
            .ok_or_else(|| Error::RecordNotFound {
                table: Table::Tasks,
                id: id.to_string(),
            })
    }
}

/// Asks on stderr, reads the answer from stdin. Anything but y/yes declines.
struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        eprint!("{prompt} [y/N] ");
        let _ = std::io::stderr().flush();
        let mut answer = String::new();
        if std::io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
    }
}

pub(crate) fn confirmer(yes: bool) -> Box<dyn Confirm> {
    if yes {
        Box::new(AssumeYes)
    } else {
        Box::new(StdinConfirm)
    }
}

impl Cli {
    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(self.dispatch())
    }

    async fn dispatch(self) -> Result<()> {
        let output = OutputOptions {
            json: self.json,
            quiet: self.quiet,
        };
        let config = self.load_config()?;

        let command = match self.command {
            Commands::Init => {
                return init::run(init::InitOptions {
                    store: self.store,
                    config_path: self.config,
                    config,
                    output,
                });
            }
            command => command,
        };

        let store_dir = self.store.unwrap_or_else(|| config.store_dir());
        let store = FileStore::open(store_dir)?
            .with_lock_timeout(config.feed.lock_timeout_ms)
            .with_poll_interval(Duration::from_millis(config.feed.poll_interval_ms));
        let ctx = Context {
            config,
            store: Arc::new(store),
            output,
        };

        match command {
            Commands::Init => Ok(()),
            Commands::Show { filters, layout } => {
                board::run_show(&ctx, board::BoardOptions { filters, layout }).await
            }
            Commands::Watch { filters, layout } => {
                board::run_watch(&ctx, board::BoardOptions { filters, layout }).await
            }
            Commands::Task(cmd) => match cmd {
                TaskCommands::Add {
                    description,
                    owners,
                    project,
                    priority,
                    status,
                    promise,
                    comments,
                } => {
                    task::run_add(
                        &ctx,
                        task::AddOptions {
                            description,
                            owners,
                            project,
                            priority,
                            status,
                            promise,
                            comments,
                        },
                    )
                    .await
                }
                TaskCommands::Edit {
                    id,
                    description,
                    owner,
                    project,
                    priority,
                    status,
                    promise,
                    comments,
                } => {
                    task::run_edit(
                        &ctx,
                        task::EditOptions {
                            id,
                            description,
                            owner,
                            project,
                            priority,
                            status,
                            promise,
                            comments,
                        },
                    )
                    .await
                }
                TaskCommands::Delete { id, yes } => task::run_delete(&ctx, &id, yes).await,
                TaskCommands::List { filters } => task::run_list(&ctx, filters).await,
            },
            Commands::Member(cmd) => match cmd {
                MemberCommands::Add { name, designation } => {
                    member::run_add(&ctx, &name, &designation).await
                }
                MemberCommands::Delete { id, yes } => member::run_delete(&ctx, &id, yes).await,
                MemberCommands::List => member::run_list(&ctx).await,
            },
            Commands::Project(cmd) => match cmd {
                ProjectCommands::Add { name } => project::run_add(&ctx, &name).await,
                ProjectCommands::Delete { id, yes } => project::run_delete(&ctx, &id, yes).await,
                ProjectCommands::List => project::run_list(&ctx).await,
            },
        }
    }

    /// An explicit `--config` must load; the implicit lookup falls back to
    /// defaults.
    fn load_config(&self) -> Result<Config> {
        match &self.config {
            Some(path) => Config::load(path),
            None => Ok(Config::load_from_dir(&std::env::current_dir()?)),
        }
    }
}
