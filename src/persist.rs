//! Final image encoding and persistence

use crate::surface::CapturedFrame;
use crate::{Error, Result};
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use log::debug;
use std::path::Path;

/// Maximum JPEG quality, used by default
pub const MAX_QUALITY: u8 = 100;

/// Encodes captured frames as JPEG and writes them to their destination.
#[derive(Debug, Clone, Copy)]
pub struct ImagePersister {
    quality: u8,
}

impl Default for ImagePersister {
    fn default() -> Self {
        Self { quality: MAX_QUALITY }
    }
}

impl ImagePersister {
    /// Persister with a given JPEG quality, clamped to `1..=100`
    pub fn with_quality(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, MAX_QUALITY),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Encode a frame to JPEG bytes. The alpha channel is dropped.
    pub fn encode(&self, frame: CapturedFrame) -> Result<Vec<u8>> {
        let rgb = DynamicImage::ImageRgba8(frame.into_image()).to_rgb8();
        let mut buf = Vec::new();
        JpegEncoder::new_with_quality(&mut buf, self.quality)
            .encode_image(&rgb)
            .map_err(|e| Error::WriteError(format!("JPEG encoding failed: {}", e)))?;
        Ok(buf)
    }

    /// Encode `frame` and write it to `dest`, overwriting any existing file.
    /// Parent directories are not created.
    pub async fn persist(&self, frame: CapturedFrame, dest: &Path) -> Result<()> {
        let persister = *self;
        let bytes = tokio::task::spawn_blocking(move || persister.encode(frame))
            .await
            .map_err(|e| Error::WriteError(format!("Encoder task failed: {}", e)))??;

        tokio::fs::write(dest, &bytes)
            .await
            .map_err(|e| Error::WriteError(format!("{}: {}", dest.display(), e)))?;
        debug!("wrote {} ({} bytes)", dest.display(), bytes.len());
        Ok(())
    }
}
