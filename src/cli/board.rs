//! taskboard show / watch command implementations.

use std::sync::Arc;

use tracing::{info, warn};

use crate::cli::{Context, FilterArgs};
use crate::derive;
use crate::error::Result;
use crate::presenter::{JsonPresenter, Layout, Presenter, TextPresenter};
use crate::remote::RemoteStore;
use crate::sync::Synchronizer;

pub struct BoardOptions {
    pub filters: FilterArgs,
    pub layout: Option<Layout>,
}

fn synchronizer(
    ctx: &Context,
    options: &BoardOptions,
) -> Result<Synchronizer<Box<dyn Presenter>>> {
    let today = derive::today();
    let (filters, sort) = options.filters.resolve(&ctx.config, today)?;
    let presenter: Box<dyn Presenter> = if ctx.output.json {
        Box::new(JsonPresenter::new(std::io::stdout()))
    } else {
        let layout = match options.layout {
            Some(layout) => layout,
            None => ctx.config.layout()?,
        };
        Box::new(TextPresenter::new(std::io::stdout(), layout))
    };
    let store: Arc<dyn RemoteStore> = ctx.store.clone();
    Ok(Synchronizer::new(store, presenter).with_view(filters, sort))
}

pub async fn run_show(ctx: &Context, options: BoardOptions) -> Result<()> {
    let mut sync = synchronizer(ctx, &options)?;
    let report = sync.bootstrap().await;
    for table in &report.failed {
        warn!(%table, "table could not be loaded; shown empty");
    }
    Ok(())
}

pub async fn run_watch(ctx: &Context, options: BoardOptions) -> Result<()> {
    let mut sync = synchronizer(ctx, &options)?;
    tokio::select! {
        result = sync.run() => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted, stopping watch");
        }
    }
    Ok(())
}
