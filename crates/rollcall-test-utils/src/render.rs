//! Fake render engine with an open-context gauge and markup-driven faults
//!
//! Markup containing [`FAIL_CAPTURE`] fails at capture; markup containing
//! [`HANG_LOAD`] never finishes loading, so the renderer's load timeout fires.

use async_trait::async_trait;
use parking_lot::Mutex;
use rollcall_core::{
    CaptureFormat, RenderContext, RenderEngine, RenderError, RenderLauncher,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

// Plain tokens so they survive HTML escaping when bound into templates
pub const FAIL_CAPTURE: &str = "__fail_capture__";
pub const HANG_LOAD: &str = "__hang_load__";

/// Shared counters observed by tests
#[derive(Debug, Default)]
pub struct RenderGauge {
    open: AtomicUsize,
    peak: AtomicUsize,
    opened: AtomicUsize,
    closed: AtomicUsize,
    launches: AtomicUsize,
    shutdowns: AtomicUsize,
    loaded: Mutex<Vec<String>>,
    settled: Mutex<Vec<Duration>>,
}

impl RenderGauge {
    /// Contexts currently open
    pub fn open(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneously open contexts
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }

    /// Every markup string loaded, in load order
    pub fn loaded(&self) -> Vec<String> {
        self.loaded.lock().clone()
    }

    /// Settle delays applied, in order
    pub fn settled(&self) -> Vec<Duration> {
        self.settled.lock().clone()
    }
}

/// Launcher producing [`FakeEngine`]s that share one gauge
#[derive(Debug, Clone, Default)]
pub struct FakeLauncher {
    gauge: Arc<RenderGauge>,
    work: Duration,
    fail_launch: Arc<AtomicBool>,
}

impl FakeLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Each capture takes `work` before returning
    #[must_use]
    pub fn with_work(mut self, work: Duration) -> Self {
        self.work = work;
        self
    }

    pub fn fail_launch(&self) {
        self.fail_launch.store(true, Ordering::SeqCst);
    }

    pub fn gauge(&self) -> Arc<RenderGauge> {
        Arc::clone(&self.gauge)
    }
}

#[async_trait]
impl RenderLauncher for FakeLauncher {
    async fn launch(&self) -> Result<Arc<dyn RenderEngine>, RenderError> {
        if self.fail_launch.load(Ordering::SeqCst) {
            return Err(RenderError::Launch("browser binary not found".to_string()));
        }
        self.gauge.launches.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(FakeEngine {
            gauge: Arc::clone(&self.gauge),
            work: self.work,
        }))
    }
}

#[derive(Debug)]
pub struct FakeEngine {
    gauge: Arc<RenderGauge>,
    work: Duration,
}

#[async_trait]
impl RenderEngine for FakeEngine {
    async fn open_context(&self) -> Result<Box<dyn RenderContext>, RenderError> {
        let now = self.gauge.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.gauge.peak.fetch_max(now, Ordering::SeqCst);
        self.gauge.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeContext {
            gauge: Arc::clone(&self.gauge),
            work: self.work,
            markup: None,
        }))
    }

    async fn shutdown(&self) -> Result<(), RenderError> {
        self.gauge.shutdowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct FakeContext {
    gauge: Arc<RenderGauge>,
    work: Duration,
    markup: Option<String>,
}

#[async_trait]
impl RenderContext for FakeContext {
    async fn load(&mut self, markup: &str) -> Result<(), RenderError> {
        if markup.contains(HANG_LOAD) {
            std::future::pending::<()>().await;
        }
        self.gauge.loaded.lock().push(markup.to_string());
        self.markup = Some(markup.to_string());
        Ok(())
    }

    async fn settle(&mut self, delay: Duration) -> Result<(), RenderError> {
        self.gauge.settled.lock().push(delay);
        tokio::time::sleep(delay).await;
        Ok(())
    }

    async fn capture(&mut self, format: &CaptureFormat) -> Result<Vec<u8>, RenderError> {
        if !self.work.is_zero() {
            tokio::time::sleep(self.work).await;
        }
        let markup = self
            .markup
            .as_deref()
            .ok_or_else(|| RenderError::Capture("nothing loaded".to_string()))?;
        if markup.contains(FAIL_CAPTURE) {
            return Err(RenderError::Capture("page crashed".to_string()));
        }
        let mut bytes = format!("{}:", format.extension()).into_bytes();
        bytes.extend_from_slice(markup.as_bytes());
        Ok(bytes)
    }

    async fn close(self: Box<Self>) -> Result<(), RenderError> {
        self.gauge.open.fetch_sub(1, Ordering::SeqCst);
        self.gauge.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
