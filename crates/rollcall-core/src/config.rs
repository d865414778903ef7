//! Pipeline configuration
//!
//! All knobs of a generation run. Every struct has a `Default` matching the
//! production constants and `with_*` builders for tests and embedding.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Attendees per batch (durable counter checkpoint)
pub const DEFAULT_BATCH_SIZE: usize = 50;
/// Render contexts open at once
pub const DEFAULT_CONCURRENT_PAGES: usize = 5;
/// Failures surfaced per batch and in the final summary
pub const DEFAULT_MAX_REPORTED_ERRORS: usize = 10;

/// Batching, concurrency and render timing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Items per batch
    pub batch_size: usize,
    /// Items rendered concurrently within a batch
    pub concurrent_pages: usize,
    /// Cap on reported item failures
    pub max_reported_errors: usize,
    /// Bound on markup load, in milliseconds
    pub load_timeout_ms: u64,
    /// Fixed delay after load, in milliseconds
    pub settle_delay_ms: u64,
    /// Bound on output capture, in milliseconds
    pub capture_timeout_ms: u64,
}

impl PipelineConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With batch size
    #[inline]
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// With concurrency window size
    #[inline]
    #[must_use]
    pub fn with_concurrent_pages(mut self, concurrent_pages: usize) -> Self {
        self.concurrent_pages = concurrent_pages;
        self
    }

    /// With reported error cap
    #[inline]
    #[must_use]
    pub fn with_max_reported_errors(mut self, max: usize) -> Self {
        self.max_reported_errors = max;
        self
    }

    /// With render timings
    #[inline]
    #[must_use]
    pub fn with_timings(mut self, load: Duration, settle: Duration, capture: Duration) -> Self {
        self.load_timeout_ms = duration_ms(load);
        self.settle_delay_ms = duration_ms(settle);
        self.capture_timeout_ms = duration_ms(capture);
        self
    }

    /// Markup load bound
    #[inline]
    #[must_use]
    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout_ms)
    }

    /// Settle delay
    #[inline]
    #[must_use]
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Capture bound
    #[inline]
    #[must_use]
    pub fn capture_timeout(&self) -> Duration {
        Duration::from_millis(self.capture_timeout_ms)
    }

    /// Check invariants
    ///
    /// # Errors
    /// - `ConfigError::InvalidValue` if a size is zero or the window exceeds the batch
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::invalid("batch_size", "must be greater than zero"));
        }
        if self.concurrent_pages == 0 {
            return Err(ConfigError::invalid(
                "concurrent_pages",
                "must be greater than zero",
            ));
        }
        if self.concurrent_pages > self.batch_size {
            return Err(ConfigError::invalid(
                "concurrent_pages",
                format!(
                    "must not exceed batch_size ({} > {})",
                    self.concurrent_pages, self.batch_size
                ),
            ));
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            concurrent_pages: DEFAULT_CONCURRENT_PAGES,
            max_reported_errors: DEFAULT_MAX_REPORTED_ERRORS,
            load_timeout_ms: 30_000,
            settle_delay_ms: 1_000,
            capture_timeout_ms: 30_000,
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Read access granted on uploaded documents
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PermissionPolicy {
    /// Anyone with the link
    #[default]
    Anyone,
    /// Everyone in a domain
    Domain {
        /// Domain name
        domain: String,
    },
    /// A single principal
    User {
        /// Principal email
        email: String,
    },
    /// Leave provider defaults untouched
    None,
}

/// Where documents land in remote storage
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageLayout {
    /// Folder under which event folders are created
    pub root_folder_id: String,
    /// Permission applied to each upload
    pub permission: PermissionPolicy,
}

impl StorageLayout {
    /// Create layout rooted at a folder
    #[inline]
    #[must_use]
    pub fn new(root_folder_id: impl Into<String>) -> Self {
        Self {
            root_folder_id: root_folder_id.into(),
            permission: PermissionPolicy::default(),
        }
    }

    /// With permission policy
    #[inline]
    #[must_use]
    pub fn with_permission(mut self, permission: PermissionPolicy) -> Self {
        self.permission = permission;
        self
    }

    /// Check invariants
    ///
    /// # Errors
    /// - `ConfigError::Missing` if no root folder is configured
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.root_folder_id.trim().is_empty() {
            return Err(ConfigError::Missing("storage.root_folder_id"));
        }
        Ok(())
    }
}
