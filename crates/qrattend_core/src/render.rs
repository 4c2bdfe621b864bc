//! QR image rendering seam.
//!
//! The token codec never depends on rendering; services receive a
//! `QrRenderer` and hand it the wire token as QR text.

use qrcode::render::{svg, unicode};
use qrcode::{EcLevel, QrCode};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Pixel size of one QR module in SVG output.
const SVG_MODULE_PX: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderError(pub String);

impl Display for RenderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "qr render failed: {}", self.0)
    }
}

impl Error for RenderError {}

pub trait QrRenderer: Send + Sync {
    /// MIME type of the rendered output.
    fn media_type(&self) -> &'static str;

    fn render(&self, payload: &str) -> Result<String, RenderError>;
}

fn encode(payload: &str) -> Result<QrCode, RenderError> {
    QrCode::with_error_correction_level(payload.as_bytes(), EcLevel::L)
        .map_err(|err| RenderError(err.to_string()))
}

/// Standalone SVG document, black on white with a quiet zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SvgQrRenderer;

impl QrRenderer for SvgQrRenderer {
    fn media_type(&self) -> &'static str {
        "image/svg+xml"
    }

    fn render(&self, payload: &str) -> Result<String, RenderError> {
        let code = encode(payload)?;
        Ok(code
            .render()
            .module_dimensions(SVG_MODULE_PX, SVG_MODULE_PX)
            .dark_color(svg::Color("#000000"))
            .light_color(svg::Color("#ffffff"))
            .build())
    }
}

/// Half-block unicode art for terminals with dark backgrounds.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalQrRenderer;

impl QrRenderer for TerminalQrRenderer {
    fn media_type(&self) -> &'static str {
        "text/plain; charset=utf-8"
    }

    fn render(&self, payload: &str) -> Result<String, RenderError> {
        let code = encode(payload)?;
        Ok(code
            .render::<unicode::Dense1x2>()
            .dark_color(unicode::Dense1x2::Light)
            .light_color(unicode::Dense1x2::Dark)
            .build())
    }
}

#[cfg(test)]
mod tests {
    use super::{QrRenderer, SvgQrRenderer, TerminalQrRenderer};

    const TOKEN: &str = "42:1000:cb74121b77476f11bca71e6a1310d5ddf502934039ba88ece2c249892d351822";

    #[test]
    fn svg_renderer_emits_svg_document() {
        let svg = SvgQrRenderer.render(TOKEN).expect("render");
        assert!(svg.contains("<svg"));
        assert!(svg.contains("#000000"));
        assert_eq!(SvgQrRenderer.media_type(), "image/svg+xml");
    }

    #[test]
    fn terminal_renderer_emits_multiline_art() {
        let art = TerminalQrRenderer.render(TOKEN).expect("render");
        assert!(art.lines().count() > 10);
    }
}
