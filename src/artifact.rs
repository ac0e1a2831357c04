//! Transient markup documents handed to the render surface.

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use std::path::{Path, PathBuf};

/// Default file name prefix for markup artifacts
pub const DEFAULT_PREFIX: &str = "StreamPlan_Planning";

/// Extension of the markup documents
pub const MARKUP_EXT: &str = "html";

/// A temporary markup file owned by one render job.
///
/// The file is removed by [`TempArtifact::release`]; if the job never gets
/// there (panic, dropped future) the guard removes it on drop.
#[derive(Debug)]
pub struct TempArtifact {
    path: PathBuf,
    released: bool,
}

impl TempArtifact {
    /// Allocate a path under `base_dir`.
    ///
    /// The name carries the current UTC date and time to the minute plus a
    /// per-job token, `{prefix}_{YYYY-MM-DD}_{HH-MM}_{token}.html`. Nothing is
    /// created on disk yet and no collision check is made.
    pub fn allocate(base_dir: &Path, prefix: &str) -> Self {
        Self::allocate_at(base_dir, prefix, Utc::now())
    }

    fn allocate_at(base_dir: &Path, prefix: &str, now: DateTime<Utc>) -> Self {
        let token = uuid::Uuid::new_v4().simple().to_string();
        let name = format!(
            "{}_{}_{}.{}",
            prefix,
            now.format("%Y-%m-%d_%H-%M"),
            &token[..12],
            MARKUP_EXT
        );
        Self {
            path: base_dir.join(name),
            released: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create or overwrite the file with `content`.
    pub async fn write(&self, content: &str) -> Result<()> {
        tokio::fs::write(&self.path, content.as_bytes())
            .await
            .map_err(|e| Error::ArtifactWriteError(format!("{}: {}", self.path.display(), e)))?;
        debug!("wrote markup artifact {} ({} bytes)", self.path.display(), content.len());
        Ok(())
    }

    /// Delete the file. A missing file is not an error.
    pub async fn release(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                debug!("released markup artifact {}", self.path.display());
                self.released = true;
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.released = true;
                Ok(())
            }
            // Left unreleased so the drop guard tries again.
            Err(e) => Err(Error::Other(format!(
                "Failed to remove artifact {}: {}",
                self.path.display(),
                e
            ))),
        }
    }
}

impl Drop for TempArtifact {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("could not remove artifact {}: {}", self.path.display(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn name_embeds_date_minute_and_token() {
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 59).unwrap();
        let a = TempArtifact::allocate_at(Path::new("/tmp"), "P", now);
        let name = a.path().file_name().unwrap().to_str().unwrap().to_string();
        assert!(name.starts_with("P_2024-03-09_07-05_"), "{}", name);
        assert!(name.ends_with(".html"));

        let b = TempArtifact::allocate_at(Path::new("/tmp"), "P", now);
        assert_ne!(a.path(), b.path());
    }

    #[tokio::test]
    async fn write_then_release_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut a = TempArtifact::allocate(dir.path(), DEFAULT_PREFIX);
        a.write("<p>one</p>").await.unwrap();
        a.write("<p>two</p>").await.unwrap();
        assert_eq!(std::fs::read_to_string(a.path()).unwrap(), "<p>two</p>");

        a.release().await.unwrap();
        assert!(!a.path().exists());
        a.release().await.unwrap();
    }

    #[tokio::test]
    async fn release_without_write_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let mut a = TempArtifact::allocate(dir.path(), "x");
        a.release().await.unwrap();
    }

    #[tokio::test]
    async fn drop_removes_unreleased_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = {
            let a = TempArtifact::allocate(dir.path(), "x");
            a.write("x").await.unwrap();
            a.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn failed_release_is_retried_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let mut a = TempArtifact::allocate(dir.path(), "x");
        // A directory in the artifact's place makes remove_file fail.
        std::fs::create_dir(a.path()).unwrap();
        assert!(a.release().await.is_err());
        assert!(!a.released);

        std::fs::remove_dir(a.path()).unwrap();
        a.write("x").await.unwrap();
        let path = a.path().to_path_buf();
        drop(a);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn write_into_missing_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let a = TempArtifact::allocate(&dir.path().join("missing"), "x");
        let err = a.write("x").await.unwrap_err();
        assert!(matches!(err, Error::ArtifactWriteError(_)));
    }
}
