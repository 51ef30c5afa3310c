//! taskboard init command implementation
//!
//! Creates the store directory and a default `.taskboard.toml`.

use std::path::{Path, PathBuf};

use crate::config::{Config, CONFIG_FILE};
use crate::error::{Error, Result};
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::remote::FileStore;

pub struct InitOptions {
    pub store: Option<PathBuf>,
    pub config_path: Option<PathBuf>,
    pub config: Config,
    pub output: OutputOptions,
}

#[derive(serde::Serialize)]
struct InitReport {
    store: PathBuf,
    config: PathBuf,
    created: InitCreated,
}

#[derive(serde::Serialize)]
struct InitCreated {
    store: bool,
    config: bool,
}

pub fn run(options: InitOptions) -> Result<()> {
    let store_dir = options
        .store
        .clone()
        .unwrap_or_else(|| options.config.store_dir());
    let created_store = !store_dir.exists();
    FileStore::create(&store_dir)?;

    let config_path = match options.config_path {
        Some(path) => path,
        None => std::env::current_dir()?.join(CONFIG_FILE),
    };
    let mut config = options.config;
    if options.store.is_some() {
        config.store = Some(store_dir.clone());
    }
    let created_config = ensure_config(&config_path, &config)?;

    let report = InitReport {
        store: store_dir.clone(),
        config: config_path.clone(),
        created: InitCreated {
            store: created_store,
            config: created_config,
        },
    };

    let header = if created_store || created_config {
        "taskboard init: initialized"
    } else {
        "taskboard init: nothing to do"
    };
    let mut human = HumanOutput::new(header);
    human.push_summary("store", store_dir.display().to_string());
    human.push_summary("config", config_path.display().to_string());
    human.push_next_step("taskboard member add <name> --designation <role>");
    human.push_next_step("taskboard task add <description> --owner <name>");

    emit_success(options.output, "init", &report, Some(&human))
}

fn ensure_config(path: &Path, config: &Config) -> Result<bool> {
    if path.exists() {
        if !path.is_file() {
            return Err(Error::OperationFailed(format!(
                "{} exists but is not a file",
                path.display()
            )));
        }
        return Ok(false);
    }
    config.save(path)?;
    Ok(true)
}
