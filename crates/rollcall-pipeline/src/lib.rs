//! Rollcall Pipeline - bulk document generation runs
//!
//! - [`BatchPlan`]: batches for counter checkpoints, windows for bounded concurrency
//! - [`ProgressSender`] / [`ProgressStream`]: ordered lifecycle events of one run
//! - [`DocumentStrategy`]: per-category selection, folders, capture and binding
//! - [`RunCoordinator`]: discovery, then batch execution with durable counters
//!
//! # Example
//!
//! ```rust,ignore
//! use rollcall_pipeline::{progress, RunCoordinator};
//!
//! let coordinator = RunCoordinator::new(store, storage, launcher, config, layout)?;
//! let run = coordinator.prepare(&request).await?;
//! let (tx, mut events) = progress::channel();
//! tokio::spawn(run.execute(tx));
//! while let Some(event) = events.recv().await {
//!     println!("{}", serde_json::to_string(&event)?);
//! }
//! ```

#![warn(unreachable_pub)]

pub mod coordinator;
pub mod error;
pub mod progress;
pub mod schedule;
pub mod strategy;

pub use coordinator::{PreparedRun, RunCoordinator};
pub use error::PipelineError;
pub use progress::{channel, ErrorLog, ProgressEvent, ProgressSender, ProgressStream};
pub use schedule::{Batch, BatchPlan};
pub use strategy::{
    event_folder, sanitize, strategy_for, DocumentStrategy, IdentityCardStrategy, InvitationStrategy,
};
