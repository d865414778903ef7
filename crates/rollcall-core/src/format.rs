//! Capture formats and rendered output

use serde::{Deserialize, Serialize};

/// A4 width in inches
pub const A4_WIDTH_IN: f64 = 8.27;
/// A4 height in inches
pub const A4_HEIGHT_IN: f64 = 11.69;

/// CR80 card width at 96 dpi (85.6mm)
pub const CARD_WIDTH_PX: u32 = 324;
/// CR80 card height at 96 dpi (54mm)
pub const CARD_HEIGHT_PX: u32 = 204;
/// Device scale factor for card captures
pub const CARD_SCALE_FACTOR: u32 = 3;
/// JPEG quality for card captures
pub const CARD_JPEG_QUALITY: u8 = 95;

/// Fixed page used for paged (PDF) output
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSpec {
    /// Page width in inches
    pub width_in: f64,
    /// Page height in inches
    pub height_in: f64,
    /// Uniform margin in inches
    pub margin_in: f64,
    /// Include background graphics
    pub print_background: bool,
}

impl PageSpec {
    /// A4 portrait, no margins, backgrounds printed
    #[must_use]
    pub fn a4() -> Self {
        Self {
            width_in: A4_WIDTH_IN,
            height_in: A4_HEIGHT_IN,
            margin_in: 0.0,
            print_background: true,
        }
    }
}

/// Fixed pixel canvas used for image output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanvasSpec {
    /// Canvas width in CSS pixels
    pub width_px: u32,
    /// Canvas height in CSS pixels
    pub height_px: u32,
    /// Device scale factor
    pub scale_factor: u32,
    /// JPEG quality (1-100)
    pub quality: u8,
}

impl CanvasSpec {
    /// CR80 identity card canvas
    #[must_use]
    pub fn identity_card() -> Self {
        Self {
            width_px: CARD_WIDTH_PX,
            height_px: CARD_HEIGHT_PX,
            scale_factor: CARD_SCALE_FACTOR,
            quality: CARD_JPEG_QUALITY,
        }
    }

    /// Output dimensions in device pixels
    #[inline]
    #[must_use]
    pub fn output_dimensions(&self) -> (u32, u32) {
        (
            self.width_px * self.scale_factor,
            self.height_px * self.scale_factor,
        )
    }
}

/// How a render context captures its output
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CaptureFormat {
    /// Paged PDF output
    Pdf(PageSpec),
    /// Single JPEG image
    Jpeg(CanvasSpec),
}

impl CaptureFormat {
    /// MIME type of the captured bytes
    #[inline]
    #[must_use]
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Pdf(_) => "application/pdf",
            Self::Jpeg(_) => "image/jpeg",
        }
    }

    /// File extension without the dot
    #[inline]
    #[must_use]
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Pdf(_) => "pdf",
            Self::Jpeg(_) => "jpg",
        }
    }
}

/// Captured document bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDocument {
    /// Raw output
    pub bytes: Vec<u8>,
    /// MIME type
    pub mime_type: &'static str,
}

impl RenderedDocument {
    /// Create from bytes and the format that produced them
    #[must_use]
    pub fn new(bytes: Vec<u8>, format: &CaptureFormat) -> Self {
        Self {
            bytes,
            mime_type: format.mime_type(),
        }
    }

    /// Size in bytes
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Check if empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
