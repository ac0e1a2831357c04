//! Builtin surface: pure-Rust engine, no external browser required.

use super::{CapturedFrame, RenderSurface};
use crate::rendering;
use crate::{Error, Result, Viewport};
use image::RgbaImage;
use log::debug;
use std::path::Path;

/// Surface backed by the builtin document engine.
///
/// Painting happens synchronously inside `load`, background images included,
/// so the surface is settled as soon as it reports readiness.
pub struct BuiltinSurface {
    viewport: Viewport,
    frame: Option<RgbaImage>,
    closed: bool,
}

impl RenderSurface for BuiltinSurface {
    fn open(viewport: Viewport) -> Result<Self> {
        if viewport.width == 0 || viewport.height == 0 {
            return Err(Error::InitializationError(format!(
                "Invalid canvas {}x{}",
                viewport.width, viewport.height
            )));
        }
        Ok(Self {
            viewport,
            frame: None,
            closed: false,
        })
    }

    fn load(&mut self, document: &Path) -> Result<()> {
        if self.closed {
            return Err(Error::RenderLoadError("Surface is closed".into()));
        }
        let html = std::fs::read_to_string(document)
            .map_err(|e| Error::RenderLoadError(format!("{}: {}", document.display(), e)))?;
        let frame = rendering::render_document(&html, self.viewport)?;
        debug!(
            "painted {} at {}x{}",
            document.display(),
            self.viewport.width,
            self.viewport.height
        );
        self.frame = Some(frame);
        Ok(())
    }

    fn is_settled(&mut self) -> Result<bool> {
        Ok(self.frame.is_some())
    }

    fn capture_frame(&mut self) -> Result<CapturedFrame> {
        if self.closed {
            return Err(Error::CaptureError("Surface is closed".into()));
        }
        self.frame
            .clone()
            .map(CapturedFrame::new)
            .ok_or_else(|| Error::CaptureError("No document loaded".into()))
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        self.frame = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_capture_close() {
        let dir = tempfile::tempdir().unwrap();
        let doc = dir.path().join("doc.html");
        std::fs::write(
            &doc,
            r#"<html><head><style>:root { --planning-titles: #FFFFFF; }</style></head>
            <body><header><h1>Week</h1></header>
            <main class="days"><section class="day day-off"><h2>Sunday</h2><p class="label">Off</p></section></main>
            </body></html>"#,
        )
        .unwrap();

        let mut surface = BuiltinSurface::open(Viewport { width: 320, height: 180 }).unwrap();
        assert!(surface.capture_frame().is_err());
        assert!(!surface.is_settled().unwrap());

        surface.load(&doc).unwrap();
        assert!(surface.is_settled().unwrap());
        let frame = surface.capture_frame().unwrap();
        assert_eq!((frame.width(), frame.height()), (320, 180));
        // top-left corner is plain canvas
        assert_eq!(frame.as_image().get_pixel(0, 0).0, [16, 16, 20, 255]);

        surface.close().unwrap();
        surface.close().unwrap();
        assert!(surface.capture_frame().is_err());
    }

    #[test]
    fn missing_document_is_load_error() {
        let mut surface = BuiltinSurface::open(Viewport::default()).unwrap();
        let err = surface.load(Path::new("/no/such/doc.html")).unwrap_err();
        assert!(matches!(err, Error::RenderLoadError(_)));
    }

    #[test]
    fn zero_canvas_is_rejected() {
        assert!(BuiltinSurface::open(Viewport { width: 0, height: 10 }).is_err());
    }
}
