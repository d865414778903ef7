//! Per-category variation points
//!
//! Both document categories run through the same pipeline. A
//! [`DocumentStrategy`] supplies what differs: who is selected, where the
//! output goes, how it is captured and what the template sees.

use rollcall_core::{
    Attendee, BindingData, CanvasSpec, CaptureFormat, DocumentCategory, EventRecord, PageSpec,
    SelectionFilter,
};
use std::sync::Arc;

/// Leaf folder used when an attendee has no sub-group
pub const UNGROUPED_FOLDER: &str = "Ungrouped";

/// Category plugin for the generation pipeline
pub trait DocumentStrategy: Send + Sync + std::fmt::Debug {
    /// Category produced
    fn category(&self) -> DocumentCategory;

    /// Store-side selection of eligible attendees
    fn selection(&self) -> SelectionFilter {
        SelectionFilter::missing(self.category())
    }

    /// Name of the category folder under the event folder
    fn folder_label(&self) -> &'static str;

    /// How the rendered page is captured
    fn capture_format(&self) -> CaptureFormat;

    /// Leaf folder for an attendee
    fn leaf_folder(&self, attendee: &Attendee) -> String {
        let group = sanitize(&attendee.sub_group);
        if group.is_empty() {
            UNGROUPED_FOLDER.to_string()
        } else {
            group
        }
    }

    /// Remote file name for an attendee; stable across runs
    fn file_name(&self, attendee: &Attendee) -> String {
        format!(
            "{}_{}.{}",
            sanitize(&attendee.full_name),
            sanitize(attendee.id.as_str()),
            self.capture_format().extension()
        )
    }

    /// Template variables for an attendee
    fn binding(&self, event: &EventRecord, attendee: &Attendee) -> BindingData {
        let mut data = BindingData::new();
        for (key, value) in &attendee.attributes {
            data.insert(key.clone(), value.clone());
        }
        data.insert("attendee_id", attendee.id.as_str());
        data.insert("full_name", attendee.full_name.as_str());
        data.insert("email", attendee.email.clone().unwrap_or_default());
        data.insert("sub_group", attendee.sub_group.as_str());
        data.insert("secondary_id", attendee.secondary_id.clone().unwrap_or_default());
        data.insert("event_id", event.id.as_str());
        data.insert("event_name", event.name.as_str());
        data.insert("category", self.category().as_str());
        data
    }
}

/// PDF invitation letters on A4
#[derive(Debug, Clone, Copy, Default)]
pub struct InvitationStrategy;

impl DocumentStrategy for InvitationStrategy {
    fn category(&self) -> DocumentCategory {
        DocumentCategory::Invitation
    }

    fn folder_label(&self) -> &'static str {
        "Invitations"
    }

    fn capture_format(&self) -> CaptureFormat {
        CaptureFormat::Pdf(PageSpec::a4())
    }
}

/// JPEG identity cards for attendees without an existing badge number
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityCardStrategy;

impl DocumentStrategy for IdentityCardStrategy {
    fn category(&self) -> DocumentCategory {
        DocumentCategory::IdentityCard
    }

    fn selection(&self) -> SelectionFilter {
        SelectionFilter::missing(self.category()).without_secondary_id()
    }

    fn folder_label(&self) -> &'static str {
        "Identity Cards"
    }

    fn capture_format(&self) -> CaptureFormat {
        CaptureFormat::Jpeg(CanvasSpec::identity_card())
    }
}

/// Built-in strategy for a category
#[must_use]
pub fn strategy_for(category: DocumentCategory) -> Arc<dyn DocumentStrategy> {
    match category {
        DocumentCategory::Invitation => Arc::new(InvitationStrategy),
        DocumentCategory::IdentityCard => Arc::new(IdentityCardStrategy),
    }
}

/// Base folder for an event's documents; the event id stands in for a name
/// with nothing left after sanitizing
#[must_use]
pub fn event_folder(event: &EventRecord) -> String {
    let name = sanitize(&event.name);
    if name.chars().all(|c| c == '_') {
        sanitize(event.id.as_str())
    } else {
        name
    }
}

/// Make a value safe for use as a remote file or folder name
#[must_use]
pub fn sanitize(value: &str) -> String {
    value
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect::<String>()
        .trim()
        .to_string()
}
