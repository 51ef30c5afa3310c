//! Mirror synchronization.
//!
//! [`Synchronizer`] owns the [`Mirror`] and is its only writer. It bootstraps
//! every table from the remote store, then applies change events one at a
//! time in delivery order. Every mirror change and every filter/sort change
//! recomputes the derived view and hands it to the presenter.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::derive;
use crate::error::Result;
use crate::feed::{ChangeEvent, ChangeFeed, ChangeKind};
use crate::mirror::{Applied, Mirror, Rows};
use crate::model::{wire_id, Record, Table};
use crate::presenter::{Frame, Presenter};
use crate::remote::RemoteStore;
use crate::view::{derive_view, DerivedView, FilterState, SortKey, SortState};

/// Outcome of the initial bulk load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BootstrapReport {
    pub tasks: usize,
    pub members: usize,
    pub projects: usize,
    /// Rows that were read but could not be decoded.
    pub skipped_rows: usize,
    /// Tables whose read failed; their collections are empty.
    pub failed: Vec<Table>,
}

impl BootstrapReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.skipped_rows == 0
    }
}

/// Counters for one streaming session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub applied: usize,
    pub missed: usize,
    pub skipped: usize,
    pub errors: usize,
}

pub struct Synchronizer<P: Presenter> {
    store: Arc<dyn RemoteStore>,
    mirror: Mirror,
    filters: FilterState,
    sort: SortState,
    presenter: P,
    fixed_today: Option<NaiveDate>,
}

impl<P: Presenter> Synchronizer<P> {
    pub fn new(store: Arc<dyn RemoteStore>, presenter: P) -> Self {
        Self {
            store,
            mirror: Mirror::new(),
            filters: FilterState::default(),
            sort: SortState::default(),
            presenter,
            fixed_today: None,
        }
    }

    /// Pin "today" instead of reading the local clock.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.fixed_today = Some(today);
        self
    }

    /// Initial view state; nothing is rendered until the first change.
    pub fn with_view(mut self, filters: FilterState, sort: SortState) -> Self {
        self.filters = filters;
        self.sort = sort;
        self
    }

    pub fn today(&self) -> NaiveDate {
        self.fixed_today.unwrap_or_else(derive::today)
    }

    pub fn mirror(&self) -> &Mirror {
        &self.mirror
    }

    pub fn filters(&self) -> &FilterState {
        &self.filters
    }

    pub fn sort(&self) -> SortState {
        self.sort
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    /// Current derived view.
    pub fn derive(&self) -> DerivedView {
        derive_view(self.mirror.tasks(), &self.filters, self.sort, self.today())
    }

    pub fn set_filters(&mut self, filters: FilterState) {
        self.filters = filters;
        self.render();
    }

    pub fn set_sort(&mut self, sort: SortState) {
        self.sort = sort;
        self.render();
    }

    /// Header-click semantics: same key flips direction, new key sorts
    /// ascending.
    pub fn toggle_sort(&mut self, key: SortKey) {
        self.sort = self.sort.toggled(key);
        self.render();
    }

    /// Load all three tables concurrently. Never fails: a table whose read
    /// fails stays empty and is named in the report.
    pub async fn bootstrap(&mut self) -> BootstrapReport {
        let store = Arc::clone(&self.store);
        let (tasks, members, projects) = tokio::join!(
            store.read_all(Table::Tasks),
            store.read_all(Table::TeamMembers),
            store.read_all(Table::Projects),
        );

        let mut report = BootstrapReport::default();
        let tasks = load(Table::Tasks, tasks, &mut report);
        let members = load(Table::TeamMembers, members, &mut report);
        let projects = load(Table::Projects, projects, &mut report);
        report.tasks = tasks.len();
        report.members = members.len();
        report.projects = projects.len();

        self.mirror.replace_all(Rows::Tasks(tasks));
        self.mirror.replace_all(Rows::Members(members));
        self.mirror.replace_all(Rows::Projects(projects));

        info!(
            tasks = report.tasks,
            members = report.members,
            projects = report.projects,
            skipped = report.skipped_rows,
            failed = report.failed.len(),
            "bootstrap complete"
        );
        self.render();
        report
    }

    /// Apply one change event and re-render.
    ///
    /// Returns `None` when the event could not be decoded; nothing changes
    /// and nothing is rendered in that case.
    pub fn apply_event(&mut self, event: ChangeEvent) -> Option<Applied> {
        let table = event.table;
        let kind = event.kind;
        let applied = match kind {
            ChangeKind::Insert | ChangeKind::Update => {
                let Some(value) = event.new_record else {
                    warn!(%table, ?kind, "change event without a record, skipped");
                    return None;
                };
                let record = match Record::decode(table, value) {
                    Ok(record) => record,
                    Err(err) => {
                        warn!(%table, ?kind, error = %err, "undecodable change event, skipped");
                        return None;
                    }
                };
                if kind == ChangeKind::Insert {
                    self.mirror.apply_insert(record)
                } else {
                    self.mirror.apply_update(record)
                }
            }
            ChangeKind::Delete => {
                let Some(id) = event.old_record.as_ref().and_then(wire_id) else {
                    warn!(%table, "delete event without an id, skipped");
                    return None;
                };
                self.mirror.apply_delete(table, &id)
            }
        };

        if applied == Applied::Missed {
            warn!(%table, ?kind, "change for a record not in the mirror ignored");
        } else {
            debug!(%table, ?kind, ?applied, "change applied");
        }
        self.render();
        Some(applied)
    }

    /// Consume `feed` until it closes. Transport errors are logged and the
    /// loop keeps going.
    pub async fn stream(&mut self, mut feed: ChangeFeed) -> StreamStats {
        let mut stats = StreamStats::default();
        while let Some(item) = feed.next().await {
            match item {
                Ok(event) => match self.apply_event(event) {
                    Some(Applied::Missed) => stats.missed += 1,
                    Some(_) => stats.applied += 1,
                    None => stats.skipped += 1,
                },
                Err(err) => {
                    warn!(error = %err, "change feed error");
                    stats.errors += 1;
                }
            }
        }
        info!(
            applied = stats.applied,
            missed = stats.missed,
            skipped = stats.skipped,
            errors = stats.errors,
            "change feed closed"
        );
        stats
    }

    /// Subscribe, bootstrap, then stream until the feed closes.
    ///
    /// The subscription opens first so that changes committed while the
    /// snapshot loads are buffered and applied afterwards.
    pub async fn run(&mut self) -> Result<BootstrapReport> {
        let feed = self.store.subscribe(&Table::ALL).await?;
        let report = self.bootstrap().await;
        self.stream(feed).await;
        Ok(report)
    }

    fn render(&mut self) {
        let today = self.today();
        let view = self.derive();
        let frame = Frame {
            today,
            view: &view,
            members: self.mirror.members(),
            projects: self.mirror.projects(),
            filters: &self.filters,
            sort: self.sort,
        };
        if let Err(err) = self.presenter.render(&frame) {
            warn!(error = %err, "render failed");
        }
    }
}

fn load<T: DeserializeOwned>(
    table: Table,
    read: Result<Vec<Value>>,
    report: &mut BootstrapReport,
) -> Vec<T> {
    let rows = match read {
        Ok(rows) => rows,
        Err(err) => {
            warn!(%table, error = %err, "bootstrap read failed, table left empty");
            report.failed.push(table);
            return Vec::new();
        }
    };
    rows.into_iter()
        .filter_map(|row| match serde_json::from_value(row) {
            Ok(record) => Some(record),
            Err(err) => {
                warn!(%table, error = %err, "skipping undecodable row");
                report.skipped_rows += 1;
                None
            }
        })
        .collect()
}
