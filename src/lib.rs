//! taskboard - team task dashboard library
//!
//! Keeps a local mirror of three remote tables (tasks, team members,
//! projects) consistent with a push-based change feed, and recomputes the
//! filtered, sorted and aggregated dashboard view after every change.
//!
//! # Module Organization
//!
//! - `model`: records, tables and the completed-date transition
//! - `derive`: overdue status, badges, days taken, promise windows
//! - `mirror`: in-memory replica of the remote tables
//! - `view`: filtering, sorting, aggregation, grouping, charts, calendar
//! - `feed`: change events and the subscription channel
//! - `remote`: the remote store trait with in-memory and file-backed stores
//! - `sync`: bootstrap and event application
//! - `actions`: create/update/delete requests
//! - `presenter`: text and JSON-lines rendering
//! - `config`: `.taskboard.toml` loading
//! - `lock`: file locking and atomic writes
//! - `output`: CLI output envelopes
//! - `cli`: command-line interface using clap

pub mod actions;
pub mod cli;
pub mod config;
pub mod derive;
pub mod error;
pub mod feed;
pub mod lock;
pub mod mirror;
pub mod model;
pub mod output;
pub mod presenter;
pub mod remote;
pub mod sync;
pub mod view;

pub use error::{Error, Result};
