//! Error types for sheetsync
//!
//! Exit codes:
//! - 0: Success
//! - 2: User error (bad args, missing sheet, protected row)
//! - 3: Conflict (cell/row/sheet held by another user; retryable)
//! - 4: Operation failed (I/O error, corrupt config)

use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the sheetsync CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 2;
    pub const CONFLICT: i32 = 3;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Main error type for sheetsync operations
#[derive(Error, Debug)]
pub enum Error {
    // User errors (exit code 2)
    #[error("Sheet not found: {0}")]
    SheetNotFound(String),

    #[error("Row not found: {0}")]
    RowNotFound(usize),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Path escapes the sheet root: {0}")]
    OutsideRoot(PathBuf),

    // Conflicts (exit code 3)
    #[error("Cell already locked by {owner}")]
    LockConflict { owner: String },

    #[error("Row in use: column {column} is being edited by {owner}")]
    RowLocked { column: usize, owner: String },

    #[error("Sheet {path} is locked by {owner}")]
    SheetLocked { path: String, owner: String },

    // Operation failures (exit code 4)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("File lock acquisition failed: {0}")]
    FileLockFailed(PathBuf),

    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

impl Error {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            // User errors
            Error::SheetNotFound(_)
            | Error::RowNotFound(_)
            | Error::InvalidArgument(_)
            | Error::InvalidConfig(_)
            | Error::OutsideRoot(_) => exit_codes::USER_ERROR,

            // Conflicts
            Error::LockConflict { .. }
            | Error::RowLocked { .. }
            | Error::SheetLocked { .. } => exit_codes::CONFLICT,

            // Operation failures
            Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::TomlSerialize(_)
            | Error::FileLockFailed(_)
            | Error::OperationFailed(_) => exit_codes::OPERATION_FAILED,
        }
    }

    /// Whether this error is a lock conflict a client may retry after,
    /// as opposed to a hard failure that requires a reload.
    pub fn is_conflict(&self) -> bool {
        self.exit_code() == exit_codes::CONFLICT
    }

    /// Structured details for JSON error envelopes.
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Error::LockConflict { owner } => {
                Some(serde_json::json!({ "owner": owner }))
            }
            Error::RowLocked { column, owner } => {
                Some(serde_json::json!({ "column": column, "owner": owner }))
            }
            Error::SheetLocked { path, owner } => {
                Some(serde_json::json!({ "path": path, "owner": owner }))
            }
            _ => None,
        }
    }
}

/// Result type alias for sheetsync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Wrapper for displaying errors in JSON format
#[derive(serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<&Error> for JsonError {
    fn from(err: &Error) -> Self {
        JsonError {
            error: err.to_string(),
            code: err.exit_code(),
            details: err.details(),
        }
    }
}
