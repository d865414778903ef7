//! HTTP render engine backed by a headless-Chromium conversion service
//!
//! The service exposes `GET /health`, `POST /forms/chromium/convert/html`
//! (PDF) and `POST /forms/chromium/screenshot/html` (image). One launch per
//! run verifies the service is reachable; each context stages markup locally
//! and submits it as an `index.html` form part at capture time. The service
//! performs the actual page load, so the settle delay travels with the form
//! as `waitDelay` and the capture bound covers the remote load.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use rollcall_core::{
    CanvasSpec, CaptureFormat, PageSpec, RenderContext, RenderEngine, RenderError, RenderLauncher,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Connection settings for [`ChromiumServiceLauncher`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChromiumConfig {
    /// Service origin
    pub base_url: String,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
}

impl Default for ChromiumConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            request_timeout_secs: 60,
        }
    }
}

impl ChromiumConfig {
    /// With service origin
    #[inline]
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// Launches [`ChromiumServiceEngine`]s after a health probe
#[derive(Debug, Clone)]
pub struct ChromiumServiceLauncher {
    config: ChromiumConfig,
}

impl ChromiumServiceLauncher {
    /// Create launcher
    #[must_use]
    pub fn new(config: ChromiumConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl RenderLauncher for ChromiumServiceLauncher {
    async fn launch(&self) -> Result<Arc<dyn RenderEngine>, RenderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(self.config.request_timeout_secs))
            .build()
            .map_err(|e| RenderError::Launch(e.to_string()))?;
        let base = self.config.base_url.trim_end_matches('/').to_string();

        let response = client
            .get(format!("{base}/health"))
            .send()
            .await
            .map_err(|e| RenderError::Launch(format!("render service unreachable: {e}")))?;
        if !response.status().is_success() {
            return Err(RenderError::Launch(format!(
                "render service unhealthy ({})",
                response.status()
            )));
        }

        info!(service = %base, "render service ready");
        Ok(Arc::new(ChromiumServiceEngine { client, base }))
    }
}

/// Shared client for one run
#[derive(Debug)]
pub struct ChromiumServiceEngine {
    client: Client,
    base: String,
}

#[async_trait]
impl RenderEngine for ChromiumServiceEngine {
    async fn open_context(&self) -> Result<Box<dyn RenderContext>, RenderError> {
        Ok(Box::new(ChromiumPage {
            client: self.client.clone(),
            base: self.base.clone(),
            markup: None,
            wait_delay: Duration::ZERO,
        }))
    }

    async fn shutdown(&self) -> Result<(), RenderError> {
        debug!(service = %self.base, "render engine released");
        Ok(())
    }
}

struct ChromiumPage {
    client: Client,
    base: String,
    markup: Option<String>,
    wait_delay: Duration,
}

impl ChromiumPage {
    async fn submit(&self, endpoint: &str, form: Form) -> Result<Vec<u8>, RenderError> {
        let response = self
            .client
            .post(format!("{}{endpoint}", self.base))
            .multipart(form)
            .send()
            .await
            .map_err(|e| RenderError::Capture(format!("render request failed: {e}")))?;
        let response = ensure_success(response).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| RenderError::Capture(format!("render response unreadable: {e}")))?;
        if bytes.is_empty() {
            return Err(RenderError::Capture("render service returned no content".to_string()));
        }
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl RenderContext for ChromiumPage {
    async fn load(&mut self, markup: &str) -> Result<(), RenderError> {
        if markup.trim().is_empty() {
            return Err(RenderError::Load("bound markup is empty".to_string()));
        }
        self.markup = Some(markup.to_string());
        Ok(())
    }

    async fn settle(&mut self, delay: Duration) -> Result<(), RenderError> {
        self.wait_delay = delay;
        Ok(())
    }

    async fn capture(&mut self, format: &CaptureFormat) -> Result<Vec<u8>, RenderError> {
        let markup = self
            .markup
            .as_deref()
            .ok_or_else(|| RenderError::Capture("capture before load".to_string()))?;
        let markup = match format {
            CaptureFormat::Pdf(_) => markup.to_string(),
            CaptureFormat::Jpeg(canvas) => scaled_markup(markup, canvas.scale_factor),
        };
        let document = Part::bytes(markup.into_bytes())
            .file_name("index.html")
            .mime_str("text/html")
            .map_err(|e| RenderError::Capture(e.to_string()))?;
        let form = with_wait_delay(Form::new().part("files", document), self.wait_delay);

        match format {
            CaptureFormat::Pdf(page) => {
                self.submit("/forms/chromium/convert/html", pdf_fields(form, page))
                    .await
            }
            CaptureFormat::Jpeg(canvas) => {
                self.submit("/forms/chromium/screenshot/html", screenshot_fields(form, canvas))
                    .await
            }
        }
    }

    async fn close(self: Box<Self>) -> Result<(), RenderError> {
        Ok(())
    }
}

fn pdf_fields(form: Form, page: &PageSpec) -> Form {
    let margin = page.margin_in.to_string();
    form.text("paperWidth", page.width_in.to_string())
        .text("paperHeight", page.height_in.to_string())
        .text("marginTop", margin.clone())
        .text("marginBottom", margin.clone())
        .text("marginLeft", margin.clone())
        .text("marginRight", margin)
        .text("printBackground", page.print_background.to_string())
}

fn with_wait_delay(form: Form, delay: Duration) -> Form {
    if delay.is_zero() {
        return form;
    }
    form.text("waitDelay", format!("{}ms", delay.as_millis()))
}

/// Zoom the document by `scale` so a layout sized in CSS pixels fills the
/// scaled screenshot viewport
///
/// The style goes right after the opening `<head>` (or `<html>`) tag so a
/// leading doctype keeps the page in standards mode.
#[must_use]
pub fn scaled_markup(markup: &str, scale: u32) -> String {
    if scale <= 1 {
        return markup.to_string();
    }
    let style = format!("<style>html{{zoom:{scale}}}</style>");
    let lower = markup.to_ascii_lowercase();
    let anchor = ["<head", "<html"].iter().find_map(|tag| {
        lower.match_indices(tag).find_map(|(start, _)| {
            let rest = &lower[start + tag.len()..];
            let whole_tag = rest.starts_with(|c: char| c == '>' || c.is_ascii_whitespace());
            if !whole_tag {
                return None;
            }
            rest.find('>').map(|end| start + tag.len() + end + 1)
        })
    });
    match anchor {
        Some(at) => format!("{}{style}{}", &markup[..at], &markup[at..]),
        None => format!("{style}{markup}"),
    }
}

// The service has no device-scale option, so the canvas is requested at its
// scaled output size and the markup is zoomed to match.
fn screenshot_fields(form: Form, canvas: &CanvasSpec) -> Form {
    let (width, height) = canvas.output_dimensions();
    form.text("width", width.to_string())
        .text("height", height.to_string())
        .text("clip", "true")
        .text("format", "jpeg")
        .text("quality", canvas.quality.to_string())
}

async fn ensure_success(response: Response) -> Result<Response, RenderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(RenderError::Capture(format!(
        "render service rejected request ({status}): {}",
        body.trim()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use warp::http::StatusCode;
    use warp::Filter;

    macro_rules! serve {
        ($routes:expr) => {{
            let (addr, server) = warp::serve($routes).bind_ephemeral(([127, 0, 0, 1], 0));
            tokio::spawn(server);
            format!("http://{addr}")
        }};
    }

    fn health() -> impl Filter<Extract = (&'static str,), Error = warp::Rejection> + Clone {
        warp::get().and(warp::path("health")).map(|| "ok")
    }

    #[tokio::test]
    async fn launch_fails_when_service_is_down() {
        let route = warp::path("health")
            .map(|| warp::reply::with_status("starting", StatusCode::SERVICE_UNAVAILABLE));
        let base = serve!(route);

        let err = ChromiumServiceLauncher::new(ChromiumConfig::default().with_base_url(base))
            .launch()
            .await
            .err()
            .unwrap();
        assert!(matches!(err, RenderError::Launch(_)));
    }

    #[tokio::test]
    async fn pdf_capture_posts_page_fields() {
        let convert = warp::post()
            .and(warp::path!("forms" / "chromium" / "convert" / "html"))
            .and(warp::header::<String>("content-type"))
            .and(warp::body::bytes())
            .map(|content_type: String, body: warp::hyper::body::Bytes| {
                let text = String::from_utf8_lossy(&body).to_string();
                let ok = content_type.starts_with("multipart/form-data")
                    && text.contains("index.html")
                    && text.contains("paperWidth")
                    && text.contains("8.27")
                    && text.contains("printBackground")
                    && text.contains("<p>Hi</p>");
                if ok {
                    warp::reply::with_status("%PDF-1.7".to_string(), StatusCode::OK)
                } else {
                    warp::reply::with_status(text, StatusCode::BAD_REQUEST)
                }
            });
        let base = serve!(health().or(convert));

        let engine = ChromiumServiceLauncher::new(ChromiumConfig::default().with_base_url(base))
            .launch()
            .await
            .unwrap();
        let mut page = engine.open_context().await.unwrap();
        page.load("<p>Hi</p>").await.unwrap();
        let bytes = page
            .capture(&CaptureFormat::Pdf(PageSpec::a4()))
            .await
            .unwrap();
        page.close().await.unwrap();

        assert_eq!(bytes, b"%PDF-1.7".to_vec());
    }

    #[tokio::test]
    async fn screenshot_requests_scaled_canvas() {
        let shot = warp::post()
            .and(warp::path!("forms" / "chromium" / "screenshot" / "html"))
            .and(warp::body::bytes())
            .map(|body: warp::hyper::body::Bytes| {
                let text = String::from_utf8_lossy(&body).to_string();
                let ok = text.contains("972")
                    && text.contains("612")
                    && text.contains("jpeg")
                    && text.contains("<style>html{zoom:3}</style><div>card</div>")
                    && text.contains("waitDelay")
                    && text.contains("1000ms");
                if ok {
                    warp::reply::with_status("JFIF".to_string(), StatusCode::OK)
                } else {
                    warp::reply::with_status(text, StatusCode::BAD_REQUEST)
                }
            });
        let base = serve!(health().or(shot));

        let engine = ChromiumServiceLauncher::new(ChromiumConfig::default().with_base_url(base))
            .launch()
            .await
            .unwrap();
        let mut page = engine.open_context().await.unwrap();
        page.load("<div>card</div>").await.unwrap();
        page.settle(Duration::from_secs(1)).await.unwrap();
        let bytes = page
            .capture(&CaptureFormat::Jpeg(CanvasSpec::identity_card()))
            .await
            .unwrap();

        assert_eq!(bytes, b"JFIF".to_vec());
    }

    #[tokio::test]
    async fn pdf_capture_forwards_settle_delay_without_zoom() {
        let convert = warp::post()
            .and(warp::path!("forms" / "chromium" / "convert" / "html"))
            .and(warp::body::bytes())
            .map(|body: warp::hyper::body::Bytes| {
                let text = String::from_utf8_lossy(&body).to_string();
                if text.contains("waitDelay") && text.contains("250ms") && !text.contains("zoom") {
                    warp::reply::with_status("%PDF-1.7".to_string(), StatusCode::OK)
                } else {
                    warp::reply::with_status(text, StatusCode::BAD_REQUEST)
                }
            });
        let base = serve!(health().or(convert));

        let engine = ChromiumServiceLauncher::new(ChromiumConfig::default().with_base_url(base))
            .launch()
            .await
            .unwrap();
        let mut page = engine.open_context().await.unwrap();
        page.load("<p>Hi</p>").await.unwrap();
        page.settle(Duration::from_millis(250)).await.unwrap();
        let bytes = page
            .capture(&CaptureFormat::Pdf(PageSpec::a4()))
            .await
            .unwrap();

        assert_eq!(bytes, b"%PDF-1.7".to_vec());
    }

    #[test]
    fn zoom_is_placed_inside_the_document_head() {
        assert_eq!(
            scaled_markup("<!DOCTYPE html><html><head><title>x</title></head></html>", 3),
            "<!DOCTYPE html><html><head><style>html{zoom:3}</style><title>x</title></head></html>"
        );
        assert_eq!(
            scaled_markup("<HTML lang=\"en\"><body>card</body></HTML>", 2),
            "<HTML lang=\"en\"><style>html{zoom:2}</style><body>card</body></HTML>"
        );
        assert_eq!(
            scaled_markup("<header>card</header>", 3),
            "<style>html{zoom:3}</style><header>card</header>"
        );
        assert_eq!(scaled_markup("<div>card</div>", 1), "<div>card</div>");
    }

    #[tokio::test]
    async fn service_rejection_is_a_capture_error() {
        let convert = warp::post()
            .and(warp::path!("forms" / "chromium" / "convert" / "html"))
            .map(|| warp::reply::with_status("chromium crashed", StatusCode::INTERNAL_SERVER_ERROR));
        let base = serve!(health().or(convert));

        let engine = ChromiumServiceLauncher::new(ChromiumConfig::default().with_base_url(base))
            .launch()
            .await
            .unwrap();
        let mut page = engine.open_context().await.unwrap();
        page.load("<p>x</p>").await.unwrap();
        let err = page
            .capture(&CaptureFormat::Pdf(PageSpec::a4()))
            .await
            .unwrap_err();

        match err {
            RenderError::Capture(message) => assert!(message.contains("chromium crashed")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_markup_fails_to_load() {
        let base = serve!(health());
        let engine = ChromiumServiceLauncher::new(ChromiumConfig::default().with_base_url(base))
            .launch()
            .await
            .unwrap();
        let mut page = engine.open_context().await.unwrap();
        assert!(matches!(page.load("  ").await, Err(RenderError::Load(_))));
    }
}
