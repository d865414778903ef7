//! Core domain types
//!
//! Defines the records that flow through a generation run:
//! - Identifiers for events, attendees, runs and remote objects
//! - Document categories and the selection filters they imply
//! - Attendee and template records loaded from the event store
//! - Per-item failure and run summary records

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

/// Event identifier issued by the event collaborator
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub String);

impl EventId {
    /// Create from any string-like value
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow as str
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Attendee identifier issued by the roster collaborator
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttendeeId(pub String);

impl AttendeeId {
    /// Create from any string-like value
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow as str
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AttendeeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Run identifier (ULID for sortability), used for log correlation only
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RunId(pub Ulid);

impl RunId {
    /// Generate new run ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Remote folder identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FolderId(pub String);

impl FolderId {
    /// Create from any string-like value
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow as str
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FolderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Remote object (file) identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(pub String);

impl FileId {
    /// Create from any string-like value
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow as str
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A freshly created remote object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFile {
    /// Object identifier
    pub id: FileId,
    /// Browser link, when the provider returns one
    pub web_view_link: Option<String>,
}

/// Kind of document produced by a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentCategory {
    /// PDF invitation letter
    Invitation,
    /// JPG identity card
    IdentityCard,
}

impl DocumentCategory {
    /// All categories, in a stable order
    pub const ALL: [DocumentCategory; 2] = [Self::Invitation, Self::IdentityCard];

    /// Wire name (`invitation` / `identity-card`)
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Invitation => "invitation",
            Self::IdentityCard => "identity-card",
        }
    }
}

impl fmt::Display for DocumentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a category name is not recognised
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown document category: '{0}'")]
pub struct UnknownCategory(pub String);

impl FromStr for DocumentCategory {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "invitation" => Ok(Self::Invitation),
            "identity-card" | "id-card" => Ok(Self::IdentityCard),
            other => Err(UnknownCategory(other.to_string())),
        }
    }
}

/// One invocation of the pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    /// Event whose attendees are processed
    pub event_id: EventId,
    /// Kind of document to produce
    pub document_category: DocumentCategory,
}

impl GenerationRequest {
    /// Create a request
    #[inline]
    #[must_use]
    pub fn new(event_id: EventId, document_category: DocumentCategory) -> Self {
        Self {
            event_id,
            document_category,
        }
    }
}

/// Attendee selection predicate sent to the event store
///
/// Attendees registered for the event that already hold a document URL for
/// `category` are always excluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionFilter {
    /// Category whose document URL must still be missing
    pub category: DocumentCategory,
    /// Only attendees without a secondary identifier
    pub require_no_secondary_id: bool,
}

impl SelectionFilter {
    /// Filter that only excludes already generated documents
    #[inline]
    #[must_use]
    pub fn missing(category: DocumentCategory) -> Self {
        Self {
            category,
            require_no_secondary_id: false,
        }
    }

    /// Also require the attendee to have no secondary identifier
    #[inline]
    #[must_use]
    pub fn without_secondary_id(mut self) -> Self {
        self.require_no_secondary_id = true;
        self
    }

    /// Evaluate the category-specific part of the filter
    #[inline]
    #[must_use]
    pub fn admits(&self, attendee: &Attendee) -> bool {
        !self.require_no_secondary_id || attendee.secondary_id.is_none()
    }
}

/// Event as seen by the pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Event identifier
    pub id: EventId,
    /// Display name, also the name of the event's base folder
    pub name: String,
}

/// Registered attendee
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attendee {
    /// Attendee identifier
    pub id: AttendeeId,
    /// Full display name
    pub full_name: String,
    /// Contact email
    #[serde(default)]
    pub email: Option<String>,
    /// Sub-group (delegation, organisation, ...); names the leaf folder
    pub sub_group: String,
    /// Secondary identifier (e.g. an existing badge number)
    #[serde(default)]
    pub secondary_id: Option<String>,
    /// Additional template fields
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl Attendee {
    /// Create attendee with required fields
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        full_name: impl Into<String>,
        sub_group: impl Into<String>,
    ) -> Self {
        Self {
            id: AttendeeId::new(id),
            full_name: full_name.into(),
            email: None,
            sub_group: sub_group.into(),
            secondary_id: None,
            attributes: BTreeMap::new(),
        }
    }

    /// With email
    #[inline]
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// With secondary identifier
    #[inline]
    #[must_use]
    pub fn with_secondary_id(mut self, secondary_id: impl Into<String>) -> Self {
        self.secondary_id = Some(secondary_id.into());
        self
    }

    /// With an additional template attribute
    #[inline]
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// Compiled template markup for one event and category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentTemplate {
    /// Category the template renders
    pub category: DocumentCategory,
    /// Markup with `{{ key }}` placeholders
    pub markup: String,
}

impl DocumentTemplate {
    /// Create template
    #[inline]
    #[must_use]
    pub fn new(category: DocumentCategory, markup: impl Into<String>) -> Self {
        Self {
            category,
            markup: markup.into(),
        }
    }
}

/// Template variables for one work item
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BindingData(pub BTreeMap<String, String>);

impl BindingData {
    /// Create empty binding
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a variable, replacing any previous value
    #[inline]
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Builder-style insert
    #[inline]
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Look up a variable
    #[inline]
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Number of variables
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Per-item failure surfaced in progress events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemError {
    /// Failed attendee
    pub attendee_id: AttendeeId,
    /// Attendee display name
    pub attendee_name: String,
    /// Human-readable reason
    pub message: String,
}

impl ItemError {
    /// Create item error for an attendee
    #[must_use]
    pub fn new(attendee: &Attendee, message: impl Into<String>) -> Self {
        Self {
            attendee_id: attendee.id.clone(),
            attendee_name: attendee.full_name.clone(),
            message: message.into(),
        }
    }
}

/// Final totals of a completed run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Eligible items at discovery time
    pub total: usize,
    /// Items that reached an outcome
    pub processed: usize,
    /// Items uploaded and recorded
    pub success: usize,
    /// Items that failed
    pub failed: usize,
    /// First failures, truncated to the reporting cap
    pub errors: Vec<ItemError>,
    /// Wall-clock duration of the run
    pub elapsed_ms: u64,
}
