//! Error types for taskboard
//!
//! Exit codes:
//! - 0: Success
//! - 2: User error (bad args, bad config, unknown record)
//! - 4: Operation failed (remote call, IO, feed, lock)

use std::path::PathBuf;
use thiserror::Error;

use crate::model::Table;

/// Exit codes for the taskboard CLI
pub mod exit_codes {
    pub const USER_ERROR: i32 = 2;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Main error type for taskboard operations
#[derive(Error, Debug)]
pub enum Error {
    // User errors (exit code 2)
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("No {table} record with id {id}")]
    RecordNotFound { table: Table, id: String },

    // Operation failures (exit code 4)
    #[error("Remote store error: {0}")]
    Remote(String),

    #[error("Change feed lagged, {0} events dropped")]
    FeedLagged(u64),

    #[error("Lock acquisition failed: {0}")]
    LockFailed(PathBuf),

    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

impl Error {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::InvalidConfig(_) | Error::InvalidArgument(_) | Error::RecordNotFound { .. } => {
                exit_codes::USER_ERROR
            }

            Error::Remote(_)
            | Error::FeedLagged(_)
            | Error::LockFailed(_)
            | Error::Watch(_)
            | Error::Io(_)
            | Error::Json(_)
            | Error::TomlSerialize(_)
            | Error::OperationFailed(_) => exit_codes::OPERATION_FAILED,
        }
    }

    /// Structured details for JSON error output, when the variant carries any.
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Error::RecordNotFound { table, id } => Some(serde_json::json!({
                "table": table.as_str(),
                "id": id,
            })),
            Error::LockFailed(path) => Some(serde_json::json!({
                "path": path.display().to_string(),
            })),
            _ => None,
        }
    }
}

/// Result type alias for taskboard operations
pub type Result<T> = std::result::Result<T, Error>;
