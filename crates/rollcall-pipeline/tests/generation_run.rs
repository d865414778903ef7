//! End-to-end runs over in-memory collaborators

use pretty_assertions::assert_eq;
use rollcall_core::{
    Attendee, DocumentCategory, EventId, EventStore, GenerationRequest, PipelineConfig,
    RenderLauncher, RunSummary, StorageLayout, StorageProvider,
};
use rollcall_pipeline::{channel, PipelineError, ProgressEvent, RunCoordinator};
use rollcall_test_utils::{
    attendees, seeded_store, FakeLauncher, MemoryEventStore, MemoryStorage, FAIL_CAPTURE,
    ROOT_FOLDER,
};
use std::sync::Arc;
use std::time::Duration;

const GROUPS: [&str; 3] = ["Press", "Staff", "Guests"];

struct Harness {
    store: Arc<MemoryEventStore>,
    storage: Arc<MemoryStorage>,
    launcher: FakeLauncher,
    event: EventId,
    config: PipelineConfig,
}

impl Harness {
    fn new(roster: Vec<Attendee>) -> Self {
        let (store, event) = seeded_store("ev-1", roster);
        Self {
            store: Arc::new(store),
            storage: Arc::new(MemoryStorage::new()),
            launcher: FakeLauncher::new(),
            event,
            config: PipelineConfig::new().with_timings(
                Duration::from_secs(5),
                Duration::ZERO,
                Duration::from_secs(5),
            ),
        }
    }

    fn with_windows(mut self, batch_size: usize, concurrent_pages: usize) -> Self {
        self.config = self
            .config
            .with_batch_size(batch_size)
            .with_concurrent_pages(concurrent_pages);
        self
    }

    fn coordinator(&self) -> RunCoordinator {
        RunCoordinator::new(
            Arc::clone(&self.store) as Arc<dyn EventStore>,
            Arc::clone(&self.storage) as Arc<dyn StorageProvider>,
            Arc::new(self.launcher.clone()) as Arc<dyn RenderLauncher>,
            self.config.clone(),
            StorageLayout::new(ROOT_FOLDER),
        )
        .unwrap()
    }

    async fn run(
        &self,
        category: DocumentCategory,
    ) -> (Result<RunSummary, PipelineError>, Vec<ProgressEvent>) {
        let (tx, rx) = channel();
        let request = GenerationRequest::new(self.event.clone(), category);
        let result = self.coordinator().run(&request, tx).await;
        (result, rx.collect_all().await)
    }

    fn folder_named(&self, name: &str) -> rollcall_core::FolderId {
        self.storage
            .folders()
            .into_iter()
            .find(|f| f.name == name)
            .map(|f| f.id)
            .unwrap()
    }
}

fn batch_sizes(events: &[ProgressEvent]) -> Vec<usize> {
    events
        .iter()
        .filter_map(|e| match e {
            ProgressEvent::BatchStarted { size, .. } => Some(*size),
            _ => None,
        })
        .collect()
}

fn batch_results(events: &[ProgressEvent]) -> Vec<(usize, usize)> {
    events
        .iter()
        .filter_map(|e| match e {
            ProgressEvent::BatchComplete {
                success, failed, ..
            } => Some((*success, *failed)),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn fifty_seven_attendees_run_in_two_batches() {
    let h = Harness::new(attendees(57, &GROUPS));

    let (result, events) = h.run(DocumentCategory::Invitation).await;
    let summary = result.unwrap();

    assert_eq!(
        events[0],
        ProgressEvent::Started {
            total: 57,
            categories: 3,
            total_batches: 2
        }
    );
    assert_eq!(batch_sizes(&events), vec![50, 7]);
    assert_eq!(batch_results(&events), vec![(50, 0), (7, 0)]);
    match events.last().unwrap() {
        ProgressEvent::Complete {
            summary,
            percentage,
        } => {
            assert_eq!(summary.total, 57);
            assert_eq!(summary.success, 57);
            assert_eq!(*percentage, 100.0);
        }
        other => panic!("expected complete, got {other:?}"),
    }

    assert_eq!(summary.processed, 57);
    assert_eq!(h.store.increments(), vec![50, 7]);
    assert_eq!(h.store.counter(&h.event, DocumentCategory::Invitation), 57);
    assert_eq!(h.store.url_count(&h.event, DocumentCategory::Invitation), 57);
    assert_eq!(h.storage.files().len(), 57);

    let gauge = h.launcher.gauge();
    assert!(gauge.peak() <= 5);
    assert_eq!(gauge.opened(), 57);
    assert_eq!(gauge.open(), 0);
    assert_eq!(gauge.launches(), 1);
    assert_eq!(gauge.shutdowns(), 1);
}

#[tokio::test]
async fn folder_tree_is_created_once_per_key() {
    let h = Harness::new(attendees(30, &GROUPS)).with_windows(10, 5);

    h.run(DocumentCategory::Invitation).await.0.unwrap();

    // event, category, and one leaf per sub-group
    assert_eq!(h.storage.folder_creates(), 2 + GROUPS.len());
    let category = h.folder_named("Invitations");
    for group in GROUPS {
        assert_eq!(h.storage.folders_named(&category, group), 1);
    }
    let press = h.folder_named("Press");
    assert_eq!(h.storage.files_in(&press).len(), 10);
}

#[tokio::test]
async fn blank_event_name_files_under_event_id() {
    let h = Harness::new(attendees(4, &["Press"]));
    h.store.add_event("ev-1", "  ");

    h.run(DocumentCategory::Invitation).await.0.unwrap();

    let root = rollcall_test_utils::root_folder();
    assert_eq!(h.storage.folders_named(&root, "ev-1"), 1);
    assert_eq!(h.storage.folders_named(&root, ""), 0);
    let category = h.folder_named("Invitations");
    assert_eq!(h.storage.folders_named(&category, "Press"), 1);
}

#[tokio::test]
async fn second_run_finds_no_work() {
    let h = Harness::new(attendees(12, &GROUPS));

    h.run(DocumentCategory::Invitation).await.0.unwrap();
    let (result, events) = h.run(DocumentCategory::Invitation).await;

    assert!(matches!(
        result,
        Err(PipelineError::NoEligibleAttendees { .. })
    ));
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind(), "error");
    assert_eq!(h.storage.files().len(), 12);
    assert_eq!(h.store.counter(&h.event, DocumentCategory::Invitation), 12);
    assert_eq!(h.launcher.gauge().launches(), 1);
}

#[tokio::test]
async fn attendees_with_documents_are_skipped() {
    let h = Harness::new(attendees(8, &GROUPS));
    h.store.set_url(
        &h.event,
        "att-000",
        DocumentCategory::Invitation,
        "https://files.test/earlier",
    );

    let summary = h.run(DocumentCategory::Invitation).await.0.unwrap();

    assert_eq!(summary.total, 7);
    assert_eq!(
        h.store
            .url(&h.event, "att-000", DocumentCategory::Invitation)
            .as_deref(),
        Some("https://files.test/earlier")
    );
}

#[tokio::test]
async fn render_failure_is_contained_to_its_item() {
    let mut roster = attendees(20, &GROUPS);
    roster[3] = roster[3].clone().with_attribute("note", FAIL_CAPTURE);
    let h = Harness::new(roster).with_windows(10, 5);

    let (result, events) = h.run(DocumentCategory::Invitation).await;
    let summary = result.unwrap();

    assert_eq!(batch_results(&events), vec![(9, 1), (10, 0)]);
    assert_eq!(summary.success, 19);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.errors.len(), 1);
    assert_eq!(summary.errors[0].attendee_id.as_str(), "att-003");
    assert!(summary.errors[0].message.contains("capture"));
    assert_eq!(h.store.url(&h.event, "att-003", DocumentCategory::Invitation), None);
    assert_eq!(h.store.counter(&h.event, DocumentCategory::Invitation), 19);
    assert_eq!(h.launcher.gauge().open(), 0);
}

#[tokio::test]
async fn counter_grows_by_exactly_the_successes() {
    let roster = attendees(23, &GROUPS);
    let h = Harness::new(roster.clone()).with_windows(10, 3);
    for victim in [1, 12, 13, 22] {
        h.storage
            .fail_upload(&format!("{}_{}.pdf", roster[victim].full_name, roster[victim].id));
    }

    let (result, events) = h.run(DocumentCategory::Invitation).await;
    let summary = result.unwrap();

    let per_batch: Vec<u64> = batch_results(&events)
        .into_iter()
        .map(|(success, _)| success as u64)
        .collect();
    assert_eq!(per_batch, vec![9, 8, 2]);
    assert_eq!(h.store.increments(), per_batch);
    assert_eq!(
        h.store.counter(&h.event, DocumentCategory::Invitation),
        summary.success as u64
    );
    assert_eq!(summary.failed, 4);
}

#[tokio::test]
async fn reported_errors_are_capped() {
    let mut roster = attendees(30, &GROUPS);
    for attendee in &mut roster {
        *attendee = attendee.clone().with_attribute("note", FAIL_CAPTURE);
    }
    let mut h = Harness::new(roster).with_windows(15, 5);
    h.config = h.config.clone().with_max_reported_errors(4);

    let summary = h.run(DocumentCategory::Invitation).await.0.unwrap();

    assert_eq!(summary.failed, 30);
    assert_eq!(summary.errors.len(), 4);
    assert!(h.store.increments().is_empty());
}

#[tokio::test(start_paused = true)]
async fn open_contexts_never_exceed_window() {
    let mut h = Harness::new(attendees(40, &GROUPS)).with_windows(20, 4);
    h.launcher = FakeLauncher::new().with_work(Duration::from_millis(50));

    h.run(DocumentCategory::Invitation).await.0.unwrap();

    let gauge = h.launcher.gauge();
    assert_eq!(gauge.peak(), 4);
    assert_eq!(gauge.closed(), 40);
}

#[tokio::test]
async fn progress_is_monotonic_and_ends_at_100() {
    let h = Harness::new(attendees(37, &GROUPS)).with_windows(8, 3);

    let (_, events) = h.run(DocumentCategory::Invitation).await;

    let mut last_pct = 0.0;
    let mut last_batch = 0;
    for event in &events {
        match event {
            ProgressEvent::BatchStarted { batch, .. } => {
                assert_eq!(*batch, last_batch + 1);
                last_batch = *batch;
            }
            ProgressEvent::BatchComplete { percentage, .. } => {
                assert!(*percentage >= last_pct);
                last_pct = *percentage;
            }
            _ => {}
        }
    }
    assert_eq!(last_batch, 5);
    assert_eq!(last_pct, 100.0);
    assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
    assert!(events.last().unwrap().is_terminal());
}

#[tokio::test]
async fn launch_failure_aborts_before_work() {
    let h = Harness::new(attendees(5, &GROUPS));
    h.launcher.fail_launch();

    let (result, events) = h.run(DocumentCategory::Invitation).await;

    assert!(matches!(result, Err(PipelineError::Render(_))));
    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0], ProgressEvent::Error { message } if message.contains("launch")));
    assert!(h.storage.folders().is_empty());
    assert_eq!(h.store.counter(&h.event, DocumentCategory::Invitation), 0);
}

#[tokio::test]
async fn category_folder_failure_is_fatal() {
    let h = Harness::new(attendees(5, &GROUPS));
    h.storage.fail_folder("Invitations");

    let (result, events) = h.run(DocumentCategory::Invitation).await;

    assert!(matches!(result, Err(PipelineError::Storage(_))));
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind(), "error");
    assert_eq!(h.launcher.gauge().opened(), 0);
    assert_eq!(h.launcher.gauge().shutdowns(), 1);
}

#[tokio::test]
async fn sub_group_folder_failure_fails_only_its_items() {
    let h = Harness::new(attendees(9, &GROUPS));
    h.storage.fail_folder("Staff");

    let summary = h.run(DocumentCategory::Invitation).await.0.unwrap();

    assert_eq!(summary.success, 6);
    assert_eq!(summary.failed, 3);
    assert!(summary.errors.iter().all(|e| e.message.contains("Staff")));
}

#[tokio::test]
async fn counter_failure_stops_the_run() {
    let h = Harness::new(attendees(25, &GROUPS)).with_windows(10, 5);
    h.store.fail_increment();

    let (result, events) = h.run(DocumentCategory::Invitation).await;

    assert!(matches!(
        result,
        Err(PipelineError::CounterUpdate { batch: 1, .. })
    ));
    assert_eq!(batch_sizes(&events), vec![10]);
    assert_eq!(events.last().unwrap().kind(), "error");
    assert_eq!(h.store.url_count(&h.event, DocumentCategory::Invitation), 10);
    assert_eq!(h.launcher.gauge().shutdowns(), 1);
}

#[tokio::test]
async fn rerun_replaces_unrecorded_upload() {
    let h = Harness::new(attendees(4, &GROUPS));
    h.store.fail_record_for("att-001");

    let first = h.run(DocumentCategory::Invitation).await.0.unwrap();
    assert_eq!(first.failed, 1);
    assert_eq!(h.storage.files().len(), 4);

    let second = h.run(DocumentCategory::Invitation).await.0.unwrap();
    assert_eq!(second.total, 1);
    assert_eq!(h.storage.deletes(), 1);
    assert_eq!(h.storage.files().len(), 4);
}

#[tokio::test]
async fn identity_cards_exclude_badged_attendees() {
    let mut roster = attendees(6, &GROUPS);
    roster[0] = roster[0].clone().with_secondary_id("BADGE-1");
    roster[4] = roster[4].clone().with_secondary_id("BADGE-2");
    let h = Harness::new(roster);

    let summary = h.run(DocumentCategory::IdentityCard).await.0.unwrap();

    assert_eq!(summary.total, 4);
    assert!(h
        .storage
        .files()
        .iter()
        .all(|f| f.mime_type == "image/jpeg" && f.name.ends_with(".jpg")));
    assert_eq!(h.store.counter(&h.event, DocumentCategory::IdentityCard), 4);
    assert_eq!(h.store.counter(&h.event, DocumentCategory::Invitation), 0);
    assert!(h.storage.folders().iter().any(|f| f.name == "Identity Cards"));
}

#[tokio::test]
async fn prepare_reports_missing_event_and_template() {
    let h = Harness::new(attendees(3, &GROUPS));
    let coordinator = h.coordinator();

    let missing = GenerationRequest::new(EventId::new("ev-404"), DocumentCategory::Invitation);
    assert!(matches!(
        coordinator.prepare(&missing).await,
        Err(PipelineError::EventNotFound(_))
    ));

    let bare = h.store.add_event("ev-2", "Workshop");
    let no_template = GenerationRequest::new(bare, DocumentCategory::Invitation);
    assert!(matches!(
        coordinator.prepare(&no_template).await,
        Err(PipelineError::TemplateNotFound { .. })
    ));
}

#[tokio::test]
async fn discovery_failure_is_a_store_error() {
    let h = Harness::new(attendees(3, &GROUPS));
    h.store.fail_discovery();

    let (result, events) = h.run(DocumentCategory::Invitation).await;

    let err = result.unwrap_err();
    assert!(matches!(err, PipelineError::Store(_)));
    assert_eq!(err.status_code(), 500);
    assert_eq!(events.len(), 1);
}

#[test]
fn invalid_config_is_rejected() {
    let h = Harness::new(Vec::new()).with_windows(4, 8);
    let result = RunCoordinator::new(
        Arc::clone(&h.store) as Arc<dyn EventStore>,
        Arc::clone(&h.storage) as Arc<dyn StorageProvider>,
        Arc::new(FakeLauncher::new()) as Arc<dyn RenderLauncher>,
        h.config,
        StorageLayout::new(ROOT_FOLDER),
    );
    assert!(matches!(result, Err(PipelineError::Config(_))));
}
