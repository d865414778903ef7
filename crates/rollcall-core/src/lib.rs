//! Rollcall Core - shared vocabulary of the document generation pipeline
//!
//! Holds what every other crate agrees on:
//! - Domain records (events, attendees, templates, categories)
//! - Collaborator traits for the event store, remote storage and renderer
//! - Pipeline configuration and its invariants
//! - Error enums for each collaborator boundary
//! - Logging initialisation
//!
//! # Example
//!
//! ```rust
//! use rollcall_core::{DocumentCategory, EventId, GenerationRequest, PipelineConfig};
//!
//! let config = PipelineConfig::new().with_batch_size(20).with_concurrent_pages(4);
//! assert!(config.validate().is_ok());
//!
//! let request = GenerationRequest::new(EventId::new("ev-42"), DocumentCategory::Invitation);
//! assert_eq!(request.document_category.as_str(), "invitation");
//! ```

#![warn(unreachable_pub)]

pub mod config;
pub mod error;
pub mod format;
pub mod observability;
pub mod ports;
pub mod types;

pub use config::{PermissionPolicy, PipelineConfig, StorageLayout};
pub use error::{ConfigError, RenderError, RenderStage, StorageError, StoreError};
pub use format::{CanvasSpec, CaptureFormat, PageSpec, RenderedDocument};
pub use ports::{EventStore, RenderContext, RenderEngine, RenderLauncher, StorageProvider};
pub use types::{
    Attendee, AttendeeId, BindingData, DocumentCategory, DocumentTemplate, EventId, EventRecord,
    FileId, FolderId, GenerationRequest, ItemError, RemoteFile, RunId, RunSummary,
    SelectionFilter, UnknownCategory,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
