//! In-memory event store

use async_trait::async_trait;
use parking_lot::Mutex;
use rollcall_core::{
    Attendee, AttendeeId, DocumentCategory, DocumentTemplate, EventId, EventRecord, EventStore,
    SelectionFilter, StoreError,
};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Default)]
struct State {
    events: HashMap<EventId, EventRecord>,
    templates: HashMap<(EventId, DocumentCategory), DocumentTemplate>,
    attendees: Vec<Attendee>,
    registrations: HashSet<(EventId, AttendeeId)>,
    urls: HashMap<(EventId, AttendeeId, DocumentCategory), String>,
    counters: HashMap<(EventId, DocumentCategory), u64>,
    increments: Vec<u64>,
    fail_discovery: bool,
    fail_increment: bool,
    fail_record_for: HashSet<AttendeeId>,
}

/// Event store backed by a mutex-guarded map
#[derive(Debug, Default)]
pub struct MemoryEventStore {
    state: Mutex<State>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_event(&self, id: &str, name: &str) -> EventId {
        let id = EventId::new(id);
        self.state.lock().events.insert(
            id.clone(),
            EventRecord {
                id: id.clone(),
                name: name.to_string(),
            },
        );
        id
    }

    pub fn add_template(&self, event: &EventId, category: DocumentCategory, markup: &str) {
        self.state.lock().templates.insert(
            (event.clone(), category),
            DocumentTemplate::new(category, markup),
        );
    }

    /// Register attendees for an event
    pub fn register(&self, event: &EventId, attendees: impl IntoIterator<Item = Attendee>) {
        let mut state = self.state.lock();
        for attendee in attendees {
            state
                .registrations
                .insert((event.clone(), attendee.id.clone()));
            if !state.attendees.iter().any(|a| a.id == attendee.id) {
                state.attendees.push(attendee);
            }
        }
    }

    pub fn set_url(&self, event: &EventId, attendee: &str, category: DocumentCategory, url: &str) {
        self.state.lock().urls.insert(
            (event.clone(), AttendeeId::new(attendee), category),
            url.to_string(),
        );
    }

    pub fn url(&self, event: &EventId, attendee: &str, category: DocumentCategory) -> Option<String> {
        self.state
            .lock()
            .urls
            .get(&(event.clone(), AttendeeId::new(attendee), category))
            .cloned()
    }

    pub fn url_count(&self, event: &EventId, category: DocumentCategory) -> usize {
        self.state
            .lock()
            .urls
            .keys()
            .filter(|(e, _, c)| e == event && *c == category)
            .count()
    }

    pub fn counter(&self, event: &EventId, category: DocumentCategory) -> u64 {
        self.state
            .lock()
            .counters
            .get(&(event.clone(), category))
            .copied()
            .unwrap_or(0)
    }

    /// Every increment applied, in call order
    pub fn increments(&self) -> Vec<u64> {
        self.state.lock().increments.clone()
    }

    pub fn fail_discovery(&self) {
        self.state.lock().fail_discovery = true;
    }

    pub fn fail_increment(&self) {
        self.state.lock().fail_increment = true;
    }

    pub fn fail_record_for(&self, attendee: &str) {
        self.state
            .lock()
            .fail_record_for
            .insert(AttendeeId::new(attendee));
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn find_event(&self, event: &EventId) -> Result<Option<EventRecord>, StoreError> {
        Ok(self.state.lock().events.get(event).cloned())
    }

    async fn find_template(
        &self,
        event: &EventId,
        category: DocumentCategory,
    ) -> Result<Option<DocumentTemplate>, StoreError> {
        Ok(self
            .state
            .lock()
            .templates
            .get(&(event.clone(), category))
            .cloned())
    }

    async fn eligible_attendees(
        &self,
        event: &EventId,
        filter: &SelectionFilter,
    ) -> Result<Vec<Attendee>, StoreError> {
        let state = self.state.lock();
        if state.fail_discovery {
            return Err(StoreError::Unavailable("roster offline".to_string()));
        }
        Ok(state
            .attendees
            .iter()
            .filter(|a| state.registrations.contains(&(event.clone(), a.id.clone())))
            .filter(|a| {
                !state
                    .urls
                    .contains_key(&(event.clone(), a.id.clone(), filter.category))
            })
            .filter(|a| filter.admits(a))
            .cloned()
            .collect())
    }

    async fn record_document_url(
        &self,
        event: &EventId,
        attendee: &AttendeeId,
        category: DocumentCategory,
        url: &str,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        if state.fail_record_for.contains(attendee) {
            return Err(StoreError::Query(format!("write rejected for {attendee}")));
        }
        state
            .urls
            .insert((event.clone(), attendee.clone(), category), url.to_string());
        Ok(())
    }

    async fn increment_generated(
        &self,
        event: &EventId,
        category: DocumentCategory,
        by: u64,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        if state.fail_increment {
            return Err(StoreError::Query("counter update rejected".to_string()));
        }
        *state.counters.entry((event.clone(), category)).or_default() += by;
        state.increments.push(by);
        Ok(())
    }
}
