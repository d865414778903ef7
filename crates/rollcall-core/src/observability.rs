//! Logging initialisation and span helpers

use crate::types::{DocumentCategory, EventId, RunId};
use serde::{Deserialize, Serialize};
use std::sync::Once;
use tracing::Span;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// JSON structured logs (for production)
    Json,
    /// Pretty-printed logs (for development)
    #[default]
    Pretty,
}

/// Initialise the global subscriber
///
/// `RUST_LOG` wins over `default_filter` when set. Safe to call more than
/// once; later calls are no-ops.
pub fn init_logging(format: LogFormat, default_filter: &str) {
    INIT.call_once(|| {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_filter));

        match format {
            LogFormat::Json => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().json())
                    .init();
            }
            LogFormat::Pretty => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().pretty())
                    .init();
            }
        }
    });
}

/// Span covering one generation run
#[must_use]
pub fn run_span(run_id: RunId, event: &EventId, category: DocumentCategory) -> Span {
    tracing::info_span!(
        "generation_run",
        run_id = %run_id,
        event_id = %event,
        category = %category,
    )
}

/// Span covering one batch of a run
#[must_use]
pub fn batch_span(batch: usize, size: usize) -> Span {
    tracing::info_span!("batch", batch = batch, size = size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_logging_is_idempotent() {
        init_logging(LogFormat::Pretty, "info");
        init_logging(LogFormat::Json, "debug");
    }

    #[test]
    fn spans_can_be_entered() {
        let span = run_span(RunId::new(), &EventId::new("ev-1"), DocumentCategory::Invitation);
        let _guard = span.enter();
        let inner = batch_span(1, 50);
        let _inner = inner.enter();
        tracing::info!("inside batch span");
    }
}
