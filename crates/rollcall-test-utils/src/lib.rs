//! Testing utilities for Rollcall workspace
//!
//! In-memory collaborators with counters and fault injection, plus fixtures.

#![allow(missing_docs)]

pub mod render;
pub mod storage;
pub mod store;

pub use render::{FakeEngine, FakeLauncher, RenderGauge, FAIL_CAPTURE, HANG_LOAD};
pub use storage::{MemoryStorage, StoredFile, StoredFolder};
pub use store::MemoryEventStore;

use rollcall_core::{Attendee, DocumentCategory, EventId, FolderId};

pub const ROOT_FOLDER: &str = "root-folder";

pub const INVITATION_MARKUP: &str =
    "<html><body><h1>Dear {{ full_name }}</h1><p>{{ event_name }}</p>{{ note }}</body></html>";
pub const CARD_MARKUP: &str =
    "<html><body><div class=\"card\">{{ full_name }} / {{ sub_group }}{{ note }}</div></body></html>";

pub fn root_folder() -> FolderId {
    FolderId::new(ROOT_FOLDER)
}

/// `count` attendees spread round-robin over `groups`
pub fn attendees(count: usize, groups: &[&str]) -> Vec<Attendee> {
    (0..count)
        .map(|i| {
            let group = groups[i % groups.len()];
            Attendee::new(format!("att-{i:03}"), format!("Attendee {i}"), group)
                .with_email(format!("attendee{i}@example.org"))
        })
        .collect()
}

/// Store with one event, both templates and the given attendees registered
pub fn seeded_store(event: &str, roster: Vec<Attendee>) -> (MemoryEventStore, EventId) {
    let store = MemoryEventStore::new();
    let id = store.add_event(event, "Annual Summit");
    store.add_template(&id, DocumentCategory::Invitation, INVITATION_MARKUP);
    store.add_template(&id, DocumentCategory::IdentityCard, CARD_MARKUP);
    store.register(&id, roster);
    (store, id)
}
