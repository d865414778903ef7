//! Per-item rendering over a shared engine
//!
//! Each render opens its own context on the run's engine and walks the fixed
//! step sequence: load (bounded) → settle → capture (bounded) → close. The
//! context is closed on every path, including failures and timeouts.
//!
//! Settling is delegated to the context: a local page waits in place, while a
//! remote engine forwards the delay so the service waits after its own load.

use crate::binding::TemplateBinder;
use rollcall_core::{
    BindingData, CaptureFormat, DocumentTemplate, PipelineConfig, RenderContext, RenderEngine,
    RenderError, RenderStage, RenderedDocument,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Step bounds for one render
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTimings {
    /// Bound on content load
    pub load_timeout: Duration,
    /// Fixed pause between load and capture
    pub settle_delay: Duration,
    /// Bound on capture
    pub capture_timeout: Duration,
}

impl From<&PipelineConfig> for RenderTimings {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            load_timeout: config.load_timeout(),
            settle_delay: config.settle_delay(),
            capture_timeout: config.capture_timeout(),
        }
    }
}

impl Default for RenderTimings {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

/// Renders bound templates through isolated contexts of one engine
pub struct DocumentRenderer {
    engine: Arc<dyn RenderEngine>,
    binder: TemplateBinder,
    timings: RenderTimings,
}

impl std::fmt::Debug for DocumentRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentRenderer")
            .field("timings", &self.timings)
            .finish_non_exhaustive()
    }
}

impl DocumentRenderer {
    /// Create renderer over a launched engine
    ///
    /// # Errors
    /// - `RenderError::Binding` if the template binder cannot be built
    pub fn new(engine: Arc<dyn RenderEngine>, timings: RenderTimings) -> Result<Self, RenderError> {
        Ok(Self {
            engine,
            binder: TemplateBinder::new()?,
            timings,
        })
    }

    /// Step bounds in use
    #[inline]
    #[must_use]
    pub fn timings(&self) -> RenderTimings {
        self.timings
    }

    /// Bind `data` into `template` and capture it as `format`
    ///
    /// # Errors
    /// - `RenderError::OpenContext` if no context could be opened
    /// - `RenderError::Timeout` if load or capture exceeded its bound
    /// - Any load or capture failure reported by the engine
    pub async fn render(
        &self,
        template: &DocumentTemplate,
        data: &BindingData,
        format: &CaptureFormat,
    ) -> Result<RenderedDocument, RenderError> {
        let markup = self.binder.bind(&template.markup, data);
        let mut context = self.engine.open_context().await?;

        let outcome = self.run_steps(context.as_mut(), &markup, format).await;

        if let Err(e) = context.close().await {
            warn!(error = %e, "render context did not close cleanly");
        }

        let bytes = outcome?;
        debug!(bytes = bytes.len(), mime = format.mime_type(), "captured document");
        Ok(RenderedDocument::new(bytes, format))
    }

    /// Release the engine
    ///
    /// # Errors
    /// Returns the engine's shutdown failure.
    pub async fn shutdown(&self) -> Result<(), RenderError> {
        self.engine.shutdown().await
    }

    async fn run_steps(
        &self,
        context: &mut dyn RenderContext,
        markup: &str,
        format: &CaptureFormat,
    ) -> Result<Vec<u8>, RenderError> {
        bounded(RenderStage::Load, self.timings.load_timeout, context.load(markup)).await?;
        if !self.timings.settle_delay.is_zero() {
            context.settle(self.timings.settle_delay).await?;
        }
        bounded(
            RenderStage::Capture,
            self.timings.capture_timeout,
            context.capture(format),
        )
        .await
    }
}

async fn bounded<T>(
    stage: RenderStage,
    after: Duration,
    step: impl Future<Output = Result<T, RenderError>>,
) -> Result<T, RenderError> {
    tokio::time::timeout(after, step)
        .await
        .map_err(|_| RenderError::Timeout { stage, after })?
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollcall_core::{DocumentCategory, PageSpec, RenderLauncher};
    use rollcall_test_utils::{FakeLauncher, FAIL_CAPTURE, HANG_LOAD};

    fn timings() -> RenderTimings {
        RenderTimings {
            load_timeout: Duration::from_millis(500),
            settle_delay: Duration::from_millis(10),
            capture_timeout: Duration::from_millis(500),
        }
    }

    async fn renderer(launcher: &FakeLauncher) -> DocumentRenderer {
        let engine = launcher.launch().await.unwrap();
        DocumentRenderer::new(engine, timings()).unwrap()
    }

    fn pdf() -> CaptureFormat {
        CaptureFormat::Pdf(PageSpec::a4())
    }

    #[tokio::test]
    async fn renders_bound_markup() {
        let launcher = FakeLauncher::new();
        let renderer = renderer(&launcher).await;
        let template = DocumentTemplate::new(DocumentCategory::Invitation, "<h1>{{ name }}</h1>");

        let doc = renderer
            .render(&template, &BindingData::new().with("name", "Grace"), &pdf())
            .await
            .unwrap();

        assert_eq!(doc.mime_type, "application/pdf");
        assert_eq!(doc.bytes, b"pdf:<h1>Grace</h1>".to_vec());
        assert_eq!(launcher.gauge().loaded(), vec!["<h1>Grace</h1>".to_string()]);
    }

    #[tokio::test]
    async fn capture_failure_closes_context() {
        let launcher = FakeLauncher::new();
        let renderer = renderer(&launcher).await;
        let template = DocumentTemplate::new(DocumentCategory::Invitation, FAIL_CAPTURE);

        let err = renderer
            .render(&template, &BindingData::new(), &pdf())
            .await
            .unwrap_err();

        assert!(matches!(err, RenderError::Capture(_)));
        let gauge = launcher.gauge();
        assert_eq!(gauge.opened(), 1);
        assert_eq!(gauge.closed(), 1);
        assert_eq!(gauge.open(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_load_times_out_and_closes_context() {
        let launcher = FakeLauncher::new();
        let renderer = renderer(&launcher).await;
        let template = DocumentTemplate::new(DocumentCategory::IdentityCard, HANG_LOAD);

        let err = renderer
            .render(&template, &BindingData::new(), &pdf())
            .await
            .unwrap_err();

        match err {
            RenderError::Timeout { stage, after } => {
                assert_eq!(stage, RenderStage::Load);
                assert_eq!(after, Duration::from_millis(500));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
        assert_eq!(launcher.gauge().open(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_capture_times_out() {
        let launcher = FakeLauncher::new().with_work(Duration::from_secs(5));
        let renderer = renderer(&launcher).await;
        let template = DocumentTemplate::new(DocumentCategory::Invitation, "<p>slow</p>");

        let err = renderer
            .render(&template, &BindingData::new(), &pdf())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            RenderError::Timeout {
                stage: RenderStage::Capture,
                ..
            }
        ));
        assert_eq!(launcher.gauge().closed(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn settle_delay_is_applied_by_the_context() {
        let launcher = FakeLauncher::new();
        let renderer = renderer(&launcher).await;
        let template = DocumentTemplate::new(DocumentCategory::Invitation, "<p>fonts</p>");

        let started = tokio::time::Instant::now();
        renderer
            .render(&template, &BindingData::new(), &pdf())
            .await
            .unwrap();

        assert_eq!(launcher.gauge().settled(), vec![Duration::from_millis(10)]);
        assert!(started.elapsed() >= Duration::from_millis(10));
    }

    #[tokio::test]
    async fn zero_settle_delay_skips_the_step() {
        let launcher = FakeLauncher::new();
        let engine = launcher.launch().await.unwrap();
        let renderer = DocumentRenderer::new(
            engine,
            RenderTimings {
                settle_delay: Duration::ZERO,
                ..timings()
            },
        )
        .unwrap();
        let template = DocumentTemplate::new(DocumentCategory::Invitation, "<p>now</p>");

        renderer
            .render(&template, &BindingData::new(), &pdf())
            .await
            .unwrap();

        assert!(launcher.gauge().settled().is_empty());
    }

    #[tokio::test]
    async fn shutdown_reaches_engine() {
        let launcher = FakeLauncher::new();
        let renderer = renderer(&launcher).await;
        renderer.shutdown().await.unwrap();
        assert_eq!(launcher.gauge().shutdowns(), 1);
    }

    #[test]
    fn timings_follow_pipeline_config() {
        let config = PipelineConfig::new().with_timings(
            Duration::from_secs(2),
            Duration::ZERO,
            Duration::from_secs(3),
        );
        let timings = RenderTimings::from(&config);
        assert_eq!(timings.load_timeout, Duration::from_secs(2));
        assert!(timings.settle_delay.is_zero());
        assert_eq!(timings.capture_timeout, Duration::from_secs(3));
    }
}
