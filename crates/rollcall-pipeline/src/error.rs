//! Run-level errors

use rollcall_core::{
    ConfigError, DocumentCategory, EventId, RenderError, StorageError, StoreError,
};
use thiserror::Error;

/// Errors that stop a run (or keep it from starting)
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Event does not exist
    #[error("event not found: {0}")]
    EventNotFound(EventId),

    /// Event has no template for the category
    #[error("no {category} template for event {event}")]
    TemplateNotFound {
        /// Event
        event: EventId,
        /// Requested category
        category: DocumentCategory,
    },

    /// Every attendee already has a document, or none match
    #[error("no eligible attendees for {category} on event {event}")]
    NoEligibleAttendees {
        /// Event
        event: EventId,
        /// Requested category
        category: DocumentCategory,
    },

    /// Event store failure
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Remote storage failure
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Rendering engine failure
    #[error(transparent)]
    Render(#[from] RenderError),

    /// Invalid configuration
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Durable counter could not be advanced after a batch
    #[error("could not commit counter for batch {batch}: {source}")]
    CounterUpdate {
        /// 1-based batch index
        batch: usize,
        /// Underlying failure
        source: StoreError,
    },
}

impl PipelineError {
    /// Whether the caller sent something that cannot succeed as-is
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::EventNotFound(_) | Self::TemplateNotFound { .. } | Self::NoEligibleAttendees { .. }
        )
    }

    /// HTTP status class for errors reported before streaming starts
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::EventNotFound(_) | Self::TemplateNotFound { .. } | Self::NoEligibleAttendees { .. } => {
                404
            }
            Self::Storage(_) | Self::Render(_) => 502,
            Self::Store(_) | Self::Config(_) | Self::CounterUpdate { .. } => 500,
        }
    }
}
