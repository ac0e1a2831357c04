//! Streamplan
//!
//! Renders a weekly stream schedule ("planning") to a publishable JPEG. The
//! planning is turned into an HTML document, loaded into a hidden fixed-size
//! render surface, captured once it has settled, and encoded at maximum
//! quality. Temporary artifacts are always cleaned up, whatever the outcome.
//!
//! # Features
//!
//! - **Builtin backend** (default): pure-Rust layout and rasterization, no browser needed
//! - **CDP backend** (`cdp` feature): renders through headless Chrome
//! - **Per-job isolation**: every job owns its surface and temp file, so jobs can run concurrently
//!
//! # Example
//!
//! ```no_run
//! use streamplan::{MemoryStore, PlanningConfig, ScheduleEntry};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let planning = PlanningConfig {
//!     dest_file: Some("/tmp/out.jpg".into()),
//!     entries: vec![
//!         ScheduleEntry::on("Monday", "20:00", "Just Chatting"),
//!         ScheduleEntry::off("Tuesday"),
//!     ],
//!     ..Default::default()
//! };
//!
//! let written = streamplan::run_planning_render(&planning, &MemoryStore::with_defaults()).await?;
//! println!("written: {}", written);
//! # Ok(())
//! # }
//! ```

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub mod artifact;
pub mod coordinator;
pub mod error;
pub mod markup;
pub mod persist;
pub mod planning;
pub mod rendering;
pub mod settings;
pub mod surface;

pub use coordinator::{CaptureCoordinator, JobState, RenderJob};
pub use error::{Error, Result};
pub use planning::{PlanningConfig, ScheduleEntry};
pub use settings::{ConfigStore, MemoryStore, SettingsStore, StyleSnapshot};
pub use surface::{Backend, CapturedFrame, RenderSurface, SurfaceFactory};

/// Configuration of the render pipeline
///
/// Defaults match the published image format: a 1920x1080 canvas, JPEG at
/// quality 100, markup files in the OS temporary directory, and a 300ms
/// settle bound.
///
/// Every field is optional when deserializing, so a partial JSON file only
/// overrides what it names:
///
/// ```
/// let cfg: streamplan::RenderConfig = serde_json::from_str(r#"{ "jpeg_quality": 90 }"#).unwrap();
/// assert_eq!(cfg.jpeg_quality, 90);
/// assert_eq!(cfg.viewport.width, 1920);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Canvas size of the render surface and the output image
    pub viewport: Viewport,
    /// Rendering backend
    pub backend: Backend,
    /// Directory receiving temporary markup documents
    pub temp_dir: PathBuf,
    /// File name prefix of temporary markup documents
    pub artifact_prefix: String,
    /// Readiness policy applied after load
    pub settle: SettleConfig,
    /// Upper bound for load, settle, capture and persist of one job
    pub job_timeout_ms: u64,
    /// JPEG quality (1-100)
    pub jpeg_quality: u8,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            viewport: Viewport::default(),
            backend: Backend::default(),
            temp_dir: std::env::temp_dir(),
            artifact_prefix: artifact::DEFAULT_PREFIX.to_string(),
            settle: SettleConfig::default(),
            job_timeout_ms: 30000,
            jpeg_quality: persist::MAX_QUALITY,
        }
    }
}

/// How long to wait for sub-resources after the surface reports readiness
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SettleConfig {
    /// Fixed pause before the first probe
    pub min_delay_ms: u64,
    /// Interval between quiescence probes
    pub poll_interval_ms: u64,
    /// Capture anyway once this much time has passed
    pub timeout_ms: u64,
}

impl Default for SettleConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: 0,
            poll_interval_ms: 25,
            timeout_ms: 300,
        }
    }
}

/// Canvas dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
        }
    }
}

/// Generate the planning markup. Pure apart from reads against `store`.
pub fn generate_planning(config: &PlanningConfig, store: &dyn ConfigStore) -> Result<String> {
    markup::generate(config, store)
}

/// Render a planning with the default [`RenderConfig`].
///
/// Resolves `true` iff the image was written to `destFile`. Rejects only with
/// [`Error::ConfigurationError`].
pub async fn run_planning_render(config: &PlanningConfig, store: &dyn ConfigStore) -> Result<bool> {
    run_planning_render_with(config, store, &RenderConfig::default()).await
}

/// Render a planning with an explicit [`RenderConfig`].
pub async fn run_planning_render_with(
    config: &PlanningConfig,
    store: &dyn ConfigStore,
    render: &RenderConfig,
) -> Result<bool> {
    CaptureCoordinator::new(render.clone())?.run(config, store).await
}

/// Render several plannings with at most `concurrency` jobs in flight.
///
/// Results are returned in input order. `concurrency == 0` uses the number of
/// CPUs.
pub async fn render_batch(
    configs: &[PlanningConfig],
    store: &dyn ConfigStore,
    render: &RenderConfig,
    concurrency: usize,
) -> Vec<Result<bool>> {
    let limit = if concurrency == 0 { num_cpus::get() } else { concurrency };
    let coordinator = match CaptureCoordinator::new(render.clone()) {
        Ok(c) => c,
        Err(e) => {
            // Only an unavailable backend fails here, which is a configuration error.
            let msg = e.to_string();
            return configs
                .iter()
                .map(|_| Err(Error::ConfigurationError(msg.clone())))
                .collect();
        }
    };

    stream::iter(configs)
        .map(|cfg| {
            let coordinator = &coordinator;
            async move { coordinator.run(cfg, store).await }
        })
        .buffered(limit.max(1))
        .collect()
        .await
}
