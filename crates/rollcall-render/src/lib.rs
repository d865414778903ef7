//! Rollcall Render - turns templates into captured documents
//!
//! - [`TemplateBinder`]: `{{ key }}` substitution with HTML escaping
//! - [`DocumentRenderer`]: one isolated context per item, bounded load and
//!   capture steps, context always closed
//! - [`ChromiumServiceLauncher`]: engine backed by a headless-Chromium HTTP service
//!
//! # Example
//!
//! ```rust,ignore
//! use rollcall_render::{ChromiumConfig, ChromiumServiceLauncher, DocumentRenderer, RenderTimings};
//!
//! let engine = ChromiumServiceLauncher::new(ChromiumConfig::default()).launch().await?;
//! let renderer = DocumentRenderer::new(engine, RenderTimings::default())?;
//! let pdf = renderer.render(&template, &data, &CaptureFormat::Pdf(PageSpec::a4())).await?;
//! ```

#![warn(unreachable_pub)]

pub mod binding;
pub mod chromium;
pub mod renderer;

pub use binding::{escape_html, TemplateBinder};
pub use chromium::{scaled_markup, ChromiumConfig, ChromiumServiceEngine, ChromiumServiceLauncher};
pub use renderer::{DocumentRenderer, RenderTimings};
