//! Error types for the host API.

use std::io::Error as IoError;
use std::path::PathBuf;

/// Errors that can occur during event system operations.
///
/// This enum covers all possible error conditions in the event system,
/// from serialization failures to handler execution errors.
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    /// Serialization failed when converting event to bytes
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// Deserialization failed when converting bytes to event
    #[error("Deserialization error: {0}")]
    Deserialization(serde_json::Error),
    /// No handler found for the specified event type
    #[error("Handler not found: {0}")]
    HandlerNotFound(String),
    /// Handler execution failed during event processing
    #[error("Handler execution error: {0}")]
    HandlerExecution(String),
}

/// Errors that can occur during plugin operations.
///
/// - **InitializationFailed**: Plugin failed to initialize properly
/// - **ExecutionError**: Runtime error during normal operation
/// - **NotFound**: Requested plugin or resource doesn't exist
/// - **Runtime**: Panic or other unexpected runtime condition
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    #[error("Plugin initialization failed: {0}")]
    InitializationFailed(String),
    #[error("Plugin execution error: {0}")]
    ExecutionError(String),
    #[error("Plugin not found: {0}")]
    NotFound(String),
    #[error("Plugin runtime error: {0}")]
    Runtime(String),
}

impl From<EventError> for PluginError {
    fn from(e: EventError) -> Self {
        PluginError::ExecutionError(e.to_string())
    }
}

/// Errors raised by host services when a plugin asks for something the
/// host cannot do.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Permission {0} is not registered")]
    UnknownPermission(String),
    #[error("Permission {name} is already registered by {owner}")]
    PermissionConflict { name: String, owner: String },
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ServerError> for PluginError {
    fn from(e: ServerError) -> Self {
        PluginError::InitializationFailed(e.to_string())
    }
}

/// Config persistence errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigStoreError {
    #[error("Failed to create config directory {0}: {1}")]
    DirectoryCreate(PathBuf, IoError),

    #[error("Failed to read config file {0}: {1}")]
    FileRead(PathBuf, IoError),

    #[error("Failed to write config file {0}: {1}")]
    FileWrite(PathBuf, IoError),

    #[error("Failed to rename config file from {0} to {1}: {2}")]
    FileRename(PathBuf, PathBuf, IoError),

    #[error("Failed to serialize config {0}: {1}")]
    Serialization(String, serde_json::Error),

    #[error("Failed to parse config file {0}: {1}")]
    Deserialization(PathBuf, serde_json::Error),

    #[error("Invalid config name: {0:?}")]
    InvalidName(String),
}

impl From<ConfigStoreError> for PluginError {
    fn from(e: ConfigStoreError) -> Self {
        PluginError::InitializationFailed(e.to_string())
    }
}
