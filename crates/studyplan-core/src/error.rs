//! Core error types for studyplan-core.
//!
//! Every failure in the alert subsystem is isolated to a tick or a plan, so
//! these types are reported and logged rather than propagated to the host.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for studyplan-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Plan store errors
    #[error("Plan source error: {0}")]
    PlanSource(#[from] PlanSourceError),

    /// Alert presentation errors
    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Stored row could not be decoded
    #[error("Corrupt record for plan '{plan_id}': {message}")]
    CorruptRecord { plan_id: String, message: String },

    /// Database is locked
    #[error("Database is locked")]
    Locked,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Data directory could not be resolved or created
    #[error("Failed to access data directory: {0}")]
    DataDir(String),
}

/// Errors raised while fetching plans from the external plan store.
#[derive(Error, Debug)]
pub enum PlanSourceError {
    /// Transport-level failure
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Plan store answered with a non-success status
    #[error("Plan store returned HTTP {status}")]
    Status { status: u16 },

    /// Fetch did not finish within the configured timeout
    #[error("Plan fetch timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// Base URL could not be used to build the request URL
    #[error("Invalid plan store URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Plan file could not be read
    #[error("Failed to read plans file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Response or file body was malformed
    #[error("Malformed plan data: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Errors raised while presenting an alert.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// Receiving side of the alert channel is gone
    #[error("Alert channel closed")]
    ChannelClosed,

    /// Sink-specific failure
    #[error("Sink '{sink}' failed: {message}")]
    Sink { sink: String, message: String },
}

/// Validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Empty collection
    #[error("Empty collection: {0}")]
    EmptyCollection(String),

    /// Two entries share an identifier
    #[error("Duplicate {kind} '{id}'")]
    Duplicate { kind: String, id: String },

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

// Helper implementations for converting from other error types

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg) => {
                if e.code == rusqlite::ErrorCode::DatabaseBusy
                    || e.code == rusqlite::ErrorCode::DatabaseLocked
                {
                    DatabaseError::Locked
                } else {
                    DatabaseError::QueryFailed(err.to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Database(err.into())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
