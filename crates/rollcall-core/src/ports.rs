//! Collaborator traits
//!
//! The pipeline talks to three external systems, each behind an async trait:
//! - [`EventStore`]: attendee roster, templates, document URLs and counters
//! - [`StorageProvider`]: remote folder tree and objects
//! - [`RenderLauncher`] / [`RenderEngine`] / [`RenderContext`]: the document renderer

use crate::config::PermissionPolicy;
use crate::error::{RenderError, StorageError, StoreError};
use crate::format::CaptureFormat;
use crate::types::{
    Attendee, AttendeeId, DocumentCategory, DocumentTemplate, EventId, EventRecord, FileId,
    FolderId, RemoteFile, SelectionFilter,
};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Attendee and event persistence
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Look up an event
    async fn find_event(&self, event: &EventId) -> Result<Option<EventRecord>, StoreError>;

    /// Load the compiled template for an event and category
    async fn find_template(
        &self,
        event: &EventId,
        category: DocumentCategory,
    ) -> Result<Option<DocumentTemplate>, StoreError>;

    /// Attendees registered for `event` that match `filter`
    ///
    /// Attendees that already hold a URL for `filter.category` on this event
    /// are never returned.
    async fn eligible_attendees(
        &self,
        event: &EventId,
        filter: &SelectionFilter,
    ) -> Result<Vec<Attendee>, StoreError>;

    /// Persist the per-attendee, per-event document URL
    async fn record_document_url(
        &self,
        event: &EventId,
        attendee: &AttendeeId,
        category: DocumentCategory,
        url: &str,
    ) -> Result<(), StoreError>;

    /// Atomically add `by` to the event-level generated counter
    async fn increment_generated(
        &self,
        event: &EventId,
        category: DocumentCategory,
        by: u64,
    ) -> Result<(), StoreError>;
}

/// Remote object storage with a folder hierarchy
#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// Find a non-trashed folder with exactly `name` directly under `parent`
    async fn find_folder(
        &self,
        parent: &FolderId,
        name: &str,
    ) -> Result<Option<FolderId>, StorageError>;

    /// Create a folder under `parent`
    async fn create_folder(&self, parent: &FolderId, name: &str)
        -> Result<FolderId, StorageError>;

    /// Non-trashed objects named exactly `name` in `folder`
    async fn find_files(&self, folder: &FolderId, name: &str)
        -> Result<Vec<FileId>, StorageError>;

    /// Delete an object
    async fn delete_file(&self, file: &FileId) -> Result<(), StorageError>;

    /// Create an object
    async fn create_file(
        &self,
        folder: &FolderId,
        name: &str,
        mime_type: &str,
        bytes: Vec<u8>,
    ) -> Result<RemoteFile, StorageError>;

    /// Grant read access on an object
    async fn grant_read(
        &self,
        file: &FileId,
        permission: &PermissionPolicy,
    ) -> Result<(), StorageError>;
}

/// Starts a rendering engine for one run
#[async_trait]
pub trait RenderLauncher: Send + Sync {
    /// Launch a shared engine instance
    async fn launch(&self) -> Result<Arc<dyn RenderEngine>, RenderError>;
}

/// Long-lived shared rendering engine
#[async_trait]
pub trait RenderEngine: Send + Sync {
    /// Open a fresh isolated context for one item
    async fn open_context(&self) -> Result<Box<dyn RenderContext>, RenderError>;

    /// Release the engine
    async fn shutdown(&self) -> Result<(), RenderError>;
}

/// Per-item isolated execution context (one page)
#[async_trait]
pub trait RenderContext: Send {
    /// Load bound markup and wait for it to finish loading
    async fn load(&mut self, markup: &str) -> Result<(), RenderError>;

    /// Give asynchronous content (fonts, images) `delay` to finish before
    /// capture. Engines that load remotely apply the delay inside capture.
    async fn settle(&mut self, delay: Duration) -> Result<(), RenderError>;

    /// Capture the loaded content
    async fn capture(&mut self, format: &CaptureFormat) -> Result<Vec<u8>, RenderError>;

    /// Tear the context down
    async fn close(self: Box<Self>) -> Result<(), RenderError>;
}
