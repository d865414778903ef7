//! Run orchestration
//!
//! A run has two phases:
//! - [`RunCoordinator::prepare`] looks up the event and template and discovers
//!   eligible attendees. Its errors are reported before any stream exists.
//! - [`PreparedRun::execute`] launches the engine, resolves the folder tree,
//!   then processes batches in order, windows in order within a batch, and the
//!   items of a window concurrently.
//!
//! Each item is rendered, uploaded and its URL recorded before the batch's
//! success count is added to the durable counter in a single increment.

use crate::error::PipelineError;
use crate::progress::{percentage, ErrorLog, ProgressEvent, ProgressSender};
use crate::schedule::{Batch, BatchPlan};
use crate::strategy::{event_folder, strategy_for, DocumentStrategy};
use futures::future::join_all;
use futures::stream::{FuturesUnordered, StreamExt};
use rollcall_core::observability::{batch_span, run_span};
use rollcall_core::{
    Attendee, CaptureFormat, DocumentTemplate, EventRecord, EventStore, FolderId,
    GenerationRequest, ItemError, PipelineConfig, RenderEngine, RenderLauncher, RunId, RunSummary,
    StorageLayout, StorageProvider,
};
use rollcall_render::{DocumentRenderer, RenderTimings};
use rollcall_storage::{FolderResolver, Uploader};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn, Instrument};

/// Entry point for generation runs
pub struct RunCoordinator {
    store: Arc<dyn EventStore>,
    storage: Arc<dyn StorageProvider>,
    launcher: Arc<dyn RenderLauncher>,
    config: PipelineConfig,
    layout: StorageLayout,
}

impl std::fmt::Debug for RunCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunCoordinator")
            .field("config", &self.config)
            .field("layout", &self.layout)
            .finish_non_exhaustive()
    }
}

impl RunCoordinator {
    /// Create coordinator over its collaborators
    ///
    /// # Errors
    /// - `PipelineError::Config` if the pipeline settings or storage layout are invalid
    pub fn new(
        store: Arc<dyn EventStore>,
        storage: Arc<dyn StorageProvider>,
        launcher: Arc<dyn RenderLauncher>,
        config: PipelineConfig,
        layout: StorageLayout,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        layout.validate()?;
        Ok(Self {
            store,
            storage,
            launcher,
            config,
            layout,
        })
    }

    /// Pipeline settings
    #[inline]
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Discover the work for a request
    ///
    /// # Errors
    /// - `PipelineError::EventNotFound` if the event does not exist
    /// - `PipelineError::TemplateNotFound` if the event has no template for the category
    /// - `PipelineError::NoEligibleAttendees` if nothing is left to generate
    /// - `PipelineError::Store` if the store fails
    pub async fn prepare(&self, request: &GenerationRequest) -> Result<PreparedRun, PipelineError> {
        let category = request.document_category;
        let strategy = strategy_for(category);

        let event = self
            .store
            .find_event(&request.event_id)
            .await?
            .ok_or_else(|| PipelineError::EventNotFound(request.event_id.clone()))?;

        let template = self
            .store
            .find_template(&event.id, category)
            .await?
            .ok_or_else(|| PipelineError::TemplateNotFound {
                event: event.id.clone(),
                category,
            })?;

        let attendees = self
            .store
            .eligible_attendees(&event.id, &strategy.selection())
            .await?;
        if attendees.is_empty() {
            return Err(PipelineError::NoEligibleAttendees {
                event: event.id.clone(),
                category,
            });
        }

        let plan = BatchPlan::new(attendees.len(), &self.config)?;
        let run_id = RunId::new();
        info!(
            run_id = %run_id,
            event_id = %event.id,
            category = %category,
            eligible = attendees.len(),
            batches = plan.batch_count(),
            "generation run prepared"
        );

        Ok(PreparedRun {
            run_id,
            store: Arc::clone(&self.store),
            storage: Arc::clone(&self.storage),
            launcher: Arc::clone(&self.launcher),
            config: self.config.clone(),
            layout: self.layout.clone(),
            strategy,
            event,
            template,
            attendees,
            plan,
        })
    }

    /// Prepare and execute in one call, reporting preparation errors on the stream
    ///
    /// # Errors
    /// Any preparation or execution error; it is also sent as the stream's `error` event.
    pub async fn run(
        &self,
        request: &GenerationRequest,
        progress: ProgressSender,
    ) -> Result<RunSummary, PipelineError> {
        match self.prepare(request).await {
            Ok(run) => run.execute(progress).await,
            Err(e) => {
                progress.fail(e.to_string());
                Err(e)
            }
        }
    }
}

/// Discovered run, ready to execute
pub struct PreparedRun {
    run_id: RunId,
    store: Arc<dyn EventStore>,
    storage: Arc<dyn StorageProvider>,
    launcher: Arc<dyn RenderLauncher>,
    config: PipelineConfig,
    layout: StorageLayout,
    strategy: Arc<dyn DocumentStrategy>,
    event: EventRecord,
    template: DocumentTemplate,
    attendees: Vec<Attendee>,
    plan: BatchPlan,
}

impl std::fmt::Debug for PreparedRun {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreparedRun")
            .field("run_id", &self.run_id)
            .field("event", &self.event.id)
            .field("category", &self.strategy.category())
            .field("total", &self.attendees.len())
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
struct BatchOutcome {
    success: usize,
    failed: usize,
    errors: ErrorLog,
}

impl PreparedRun {
    /// Run identifier used in logs
    #[inline]
    #[must_use]
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Eligible items
    #[inline]
    #[must_use]
    pub fn total(&self) -> usize {
        self.attendees.len()
    }

    /// Batch layout of the run
    #[inline]
    #[must_use]
    pub fn plan(&self) -> &BatchPlan {
        &self.plan
    }

    /// Execute the run, streaming progress
    ///
    /// The stream is closed with `complete` on success or `error` on a fatal
    /// failure. The engine is shut down on both paths.
    ///
    /// # Errors
    /// - `PipelineError::Render` if the engine cannot be launched
    /// - `PipelineError::Storage` if the event or category folder cannot be resolved
    /// - `PipelineError::CounterUpdate` if a batch counter cannot be committed
    pub async fn execute(self, progress: ProgressSender) -> Result<RunSummary, PipelineError> {
        let span = run_span(self.run_id, &self.event.id, self.strategy.category());
        async move {
            let started = Instant::now();
            let engine = match self.launcher.launch().await {
                Ok(engine) => engine,
                Err(e) => {
                    error!(error = %e, "render engine launch failed");
                    progress.fail(e.to_string());
                    return Err(e.into());
                }
            };

            let outcome = self.drive(Arc::clone(&engine), &progress, started).await;

            if let Err(e) = engine.shutdown().await {
                warn!(error = %e, "render engine shutdown failed");
            }

            match outcome {
                Ok(summary) => {
                    info!(
                        success = summary.success,
                        failed = summary.failed,
                        elapsed_ms = summary.elapsed_ms,
                        "generation run complete"
                    );
                    progress.finish(summary.clone());
                    Ok(summary)
                }
                Err(e) => {
                    error!(error = %e, "generation run aborted");
                    progress.fail(e.to_string());
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn drive(
        &self,
        engine: Arc<dyn RenderEngine>,
        progress: &ProgressSender,
        started: Instant,
    ) -> Result<RunSummary, PipelineError> {
        let folders = Arc::new(FolderResolver::new(Arc::clone(&self.storage)));
        let uploader = Uploader::new(
            Arc::clone(&self.storage),
            Arc::clone(&folders),
            self.layout.permission.clone(),
        );

        let root = FolderId::new(self.layout.root_folder_id.clone());
        let base = event_folder(&self.event);
        let category_folder = folders
            .resolve_path(&root, &[base.as_str(), self.strategy.folder_label()])
            .await?;

        let leaves: BTreeSet<String> = self
            .attendees
            .iter()
            .map(|a| self.strategy.leaf_folder(a))
            .collect();
        let resolved = join_all(leaves.iter().map(|leaf| folders.resolve(&category_folder, leaf))).await;
        for (leaf, result) in leaves.iter().zip(resolved) {
            if let Err(e) = result {
                warn!(folder = %leaf, error = %e, "sub-group folder unavailable, items will retry it");
            }
        }
        debug!(folders = folders.cached_len(), "folder tree resolved");

        let total = self.attendees.len();
        let total_batches = self.plan.batch_count();
        progress.started(total, leaves.len(), total_batches);

        let worker = Worker {
            run: self,
            renderer: DocumentRenderer::new(engine, RenderTimings::from(&self.config))?,
            uploader,
            category_folder,
            format: self.strategy.capture_format(),
        };

        let mut success = 0;
        let mut failed = 0;
        let mut errors = ErrorLog::new(self.config.max_reported_errors);

        for batch in self.plan.batches() {
            progress.batch_started(batch.index, total_batches, batch.len());

            let outcome = worker
                .run_batch(&batch)
                .instrument(batch_span(batch.index, batch.len()))
                .await;

            if outcome.success > 0 {
                self.store
                    .increment_generated(
                        &self.event.id,
                        self.strategy.category(),
                        outcome.success as u64,
                    )
                    .await
                    .map_err(|source| PipelineError::CounterUpdate {
                        batch: batch.index,
                        source,
                    })?;
            }

            success += outcome.success;
            failed += outcome.failed;
            errors.extend(outcome.errors);
            let processed = success + failed;

            info!(
                batch = batch.index,
                success = outcome.success,
                failed = outcome.failed,
                processed,
                "batch complete"
            );
            progress.batch_complete(ProgressEvent::BatchComplete {
                batch: batch.index,
                success: outcome.success,
                failed: outcome.failed,
                processed,
                total_success: success,
                total_failed: failed,
                percentage: percentage(processed, total),
            });
        }

        Ok(RunSummary {
            total,
            processed: success + failed,
            success,
            failed,
            errors: errors.into_inner(),
            elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        })
    }
}

struct Worker<'a> {
    run: &'a PreparedRun,
    renderer: DocumentRenderer,
    uploader: Uploader,
    category_folder: FolderId,
    format: CaptureFormat,
}

impl Worker<'_> {
    async fn run_batch(&self, batch: &Batch) -> BatchOutcome {
        let mut outcome = BatchOutcome {
            success: 0,
            failed: 0,
            errors: ErrorLog::new(self.run.config.max_reported_errors),
        };

        for window in batch.windows() {
            let mut pending: FuturesUnordered<_> = self.run.attendees[window]
                .iter()
                .map(|attendee| async move { (attendee, self.process(attendee).await) })
                .collect();

            while let Some((attendee, result)) = pending.next().await {
                match result {
                    Ok(url) => {
                        outcome.success += 1;
                        debug!(attendee = %attendee.id, url = %url, "document stored");
                    }
                    Err(e) => {
                        outcome.failed += 1;
                        warn!(attendee = %attendee.id, error = %e, "document failed");
                        outcome.errors.push(ItemError::new(attendee, e.to_string()));
                    }
                }
            }
        }

        outcome
    }

    async fn process(&self, attendee: &Attendee) -> Result<String, PipelineError> {
        let strategy = &self.run.strategy;
        let data = strategy.binding(&self.run.event, attendee);
        let document = self
            .renderer
            .render(&self.run.template, &data, &self.format)
            .await?;

        let url = self
            .uploader
            .upload_into(
                &self.category_folder,
                &strategy.leaf_folder(attendee),
                &strategy.file_name(attendee),
                document,
            )
            .await?;

        self.run
            .store
            .record_document_url(&self.run.event.id, &attendee.id, strategy.category(), &url)
            .await?;
        Ok(url)
    }
}
