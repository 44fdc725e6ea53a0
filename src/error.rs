//! Error types for uniconf

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for uniconf operations
pub type Result<T> = std::result::Result<T, Error>;

/// Why loading a config file failed
#[derive(Error, Debug)]
pub enum LoadFailure {
    #[error("file does not exist")]
    Missing,

    #[error("file is malformed: {0}")]
    Malformed(String),

    #[error("{0}")]
    Io(#[source] std::io::Error),
}

/// Main error type for uniconf
#[derive(Error, Debug)]
pub enum Error {
    // -------------------------------------------------------------------------
    // Registry Errors
    // -------------------------------------------------------------------------
    #[error("No config registered for owner '{0}'")]
    NotRegistered(String),

    #[error("Config for owner '{0}' is registered but was never loaded")]
    NotInitialized(String),

    #[error("Invalid owner name '{0}': must be a single path component")]
    InvalidOwner(String),

    #[error("Config schema '{0}' is not registered")]
    UnknownSchema(&'static str),

    #[error("Config schema '{schema}' is already registered by owner '{existing_owner}', cannot register it for '{owner}'")]
    DuplicateSchema {
        schema: &'static str,
        existing_owner: String,
        owner: String,
    },

    #[error("Owner '{owner}' is registered with schema '{registered}', not '{requested}'")]
    SchemaMismatch {
        owner: String,
        registered: &'static str,
        requested: &'static str,
    },

    #[error("Failed to load config for '{owner}' from '{path}': {reason}")]
    Load {
        owner: String,
        path: PathBuf,
        #[source]
        reason: LoadFailure,
    },

    // -------------------------------------------------------------------------
    // Tracked File Errors
    // -------------------------------------------------------------------------
    #[error("File '{path}' is not tracked for owner '{owner}'")]
    FileNotTracked { owner: String, path: PathBuf },

    #[error("Invalid tracked file path '{path}': {reason}")]
    InvalidPath { path: PathBuf, reason: String },

    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("Failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create directory '{path}': {source}")]
    DirectoryCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Failed to serialize config: {0}")]
    Serialize(String),

    #[error("Failed to deserialize config: {0}")]
    Deserialize(String),

    // -------------------------------------------------------------------------
    // Watch / Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Failed to watch '{path}': {source}")]
    Watch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Check if this is a "not found" type error
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::NotRegistered(_)
                | Error::UnknownSchema(_)
                | Error::FileNotTracked { .. }
                | Error::Load {
                    reason: LoadFailure::Missing,
                    ..
                }
        )
    }

    /// Check if this error came from loading a config file
    #[must_use]
    pub fn is_load_error(&self) -> bool {
        matches!(self, Error::Load { .. })
    }
}
