//! Error types for collaborator boundaries
//!
//! Each external collaborator reports failures through its own enum:
//! - [`StoreError`] for the attendee/event store
//! - [`StorageError`] for the remote object-storage provider
//! - [`RenderError`] for the rendering engine
//! - [`ConfigError`] for invalid configuration

use std::time::Duration;

/// Attendee/event store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Backend query failed
    #[error("store query failed: {0}")]
    Query(String),

    /// Stored row could not be decoded
    #[error("invalid stored record: {0}")]
    Decode(String),

    /// Backend unreachable
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Remote storage provider errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Provider returned a non-success status
    #[error("storage request failed ({status}): {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Provider message
        message: String,
    },

    /// Transport-level failure
    #[error("storage transport error: {0}")]
    Transport(String),

    /// Provider response could not be decoded
    #[error("invalid storage response: {0}")]
    InvalidResponse(String),

    /// Folder resolution failed for a key
    #[error("folder '{name}' under '{parent}' could not be resolved: {message}")]
    FolderResolution {
        /// Parent folder id
        parent: String,
        /// Folder name
        name: String,
        /// Underlying failure
        message: String,
    },
}

impl StorageError {
    /// Create status error
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }
}

/// Rendering engine errors
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// Engine could not be started
    #[error("render engine launch failed: {0}")]
    Launch(String),

    /// Isolated context could not be opened
    #[error("could not open render context: {0}")]
    OpenContext(String),

    /// Markup failed to load
    #[error("content load failed: {0}")]
    Load(String),

    /// Output capture failed
    #[error("capture failed: {0}")]
    Capture(String),

    /// A render step exceeded its bound
    #[error("{} timed out after {}ms", .stage, .after.as_millis())]
    Timeout {
        /// Step that timed out
        stage: RenderStage,
        /// Configured bound
        after: Duration,
    },

    /// Template could not be bound
    #[error("template binding failed: {0}")]
    Binding(String),
}

/// Render step, used in timeout reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStage {
    /// Waiting for markup to load
    Load,
    /// Waiting for capture output
    Capture,
}

impl std::fmt::Display for RenderStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Load => f.write_str("content load"),
            Self::Capture => f.write_str("capture"),
        }
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A value is outside its allowed range
    #[error("invalid value for '{field}': {reason}")]
    InvalidValue {
        /// Offending field
        field: &'static str,
        /// Why it is invalid
        reason: String,
    },

    /// Required value missing
    #[error("missing required setting '{0}'")]
    Missing(&'static str),

    /// File could not be read or parsed
    #[error("could not load configuration: {0}")]
    Load(String),
}

impl ConfigError {
    /// Create invalid value error
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}
