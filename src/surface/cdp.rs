//! Chrome DevTools Protocol surface (uses the `headless_chrome` crate)

use super::{CapturedFrame, RenderSurface};
use crate::{Error, Result, Viewport};
use headless_chrome::browser::tab::Tab;
use headless_chrome::protocol::cdp::Page;
use headless_chrome::{Browser, LaunchOptions};
use log::{debug, warn};
use std::path::Path;
use std::sync::Arc;

const SETTLED_PROBE: &str = r#"
(function() {
    const fontsReady = !document.fonts || document.fonts.status === 'loaded';
    const imagesReady = Array.from(document.images).every(function(img) { return img.complete; });
    return document.readyState === 'complete' && fontsReady && imagesReady;
})()
"#;

/// Headless Chrome tab sized to the canvas.
///
/// Holds the browser process for the lifetime of the surface; `close` drops
/// both so the child process is terminated promptly.
pub struct CdpSurface {
    browser: Option<Browser>,
    tab: Option<Arc<Tab>>,
    viewport: Viewport,
    loaded: bool,
}

impl CdpSurface {
    fn tab(&self) -> Result<&Arc<Tab>> {
        self.tab
            .as_ref()
            .ok_or_else(|| Error::CdpError("Surface is closed".into()))
    }
}

impl RenderSurface for CdpSurface {
    fn open(viewport: Viewport) -> Result<Self> {
        let launch_options = LaunchOptions::default_builder()
            .headless(true)
            .window_size(Some((viewport.width, viewport.height)))
            .build()
            .map_err(|e| Error::InitializationError(format!("Failed to build launch options: {}", e)))?;

        let browser = Browser::new(launch_options)
            .map_err(|e| Error::InitializationError(format!("Failed to launch browser: {}", e)))?;

        let tab = browser
            .new_tab()
            .map_err(|e| Error::InitializationError(format!("Failed to create tab: {}", e)))?;

        Ok(Self {
            browser: Some(browser),
            tab: Some(tab),
            viewport,
            loaded: false,
        })
    }

    fn load(&mut self, document: &Path) -> Result<()> {
        let url = url::Url::from_file_path(document).map_err(|_| {
            Error::RenderLoadError(format!("Not an absolute path: {}", document.display()))
        })?;
        let tab = self.tab().map_err(|e| Error::RenderLoadError(e.to_string()))?;

        tab.navigate_to(url.as_str())
            .map_err(|e| Error::RenderLoadError(format!("Navigation failed: {}", e)))?;
        tab.wait_until_navigated()
            .map_err(|e| Error::RenderLoadError(format!("Wait for navigation failed: {}", e)))?;

        debug!("navigated to {} ({}x{})", url, self.viewport.width, self.viewport.height);
        self.loaded = true;
        Ok(())
    }

    fn is_settled(&mut self) -> Result<bool> {
        let eval = self
            .tab()?
            .evaluate(SETTLED_PROBE, false)
            .map_err(|e| Error::CdpError(format!("Settle probe failed: {}", e)))?;
        Ok(eval.value.and_then(|v| v.as_bool()).unwrap_or(false))
    }

    fn capture_frame(&mut self) -> Result<CapturedFrame> {
        if !self.loaded {
            return Err(Error::CaptureError("No document loaded".into()));
        }
        let png = self
            .tab()
            .map_err(|e| Error::CaptureError(e.to_string()))?
            .capture_screenshot(Page::CaptureScreenshotFormatOption::Png, None, None, true)
            .map_err(|e| Error::CaptureError(format!("Screenshot failed: {}", e)))?;

        let mut frame = image::load_from_memory_with_format(&png, image::ImageFormat::Png)
            .map_err(|e| Error::CaptureError(format!("Undecodable screenshot: {}", e)))?
            .to_rgba8();

        // Window chrome can make the page area differ slightly from the canvas.
        if frame.dimensions() != (self.viewport.width, self.viewport.height) {
            warn!(
                "screenshot is {}x{}, resizing to {}x{}",
                frame.width(),
                frame.height(),
                self.viewport.width,
                self.viewport.height
            );
            frame = image::imageops::resize(
                &frame,
                self.viewport.width,
                self.viewport.height,
                image::imageops::FilterType::Lanczos3,
            );
        }
        Ok(CapturedFrame::new(frame))
    }

    fn close(&mut self) -> Result<()> {
        self.loaded = false;
        drop(self.tab.take());
        drop(self.browser.take());
        Ok(())
    }
}
