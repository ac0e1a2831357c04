//! Render job orchestration.
//!
//! A job walks `Created → MarkupWritten → SurfaceLoaded → Settled → Captured →
//! Persisted → CleanedUp`; any failure goes to `Failed` and then still runs
//! cleanup. Only configuration errors escape [`CaptureCoordinator::run`];
//! everything after allocation is logged and reported as `false`.

use crate::artifact::TempArtifact;
use crate::markup;
use crate::persist::ImagePersister;
use crate::planning::PlanningConfig;
use crate::settings::{ConfigStore, StyleSnapshot};
use crate::surface::{CapturedFrame, SurfaceFactory, SurfaceHandle};
use crate::{Error, RenderConfig, Result};
use log::{debug, error, info, warn};
use std::path::Path;
use std::time::Duration;
use tokio::time::{sleep, timeout, Instant};

// Upper bound for closing a surface whose engine is stuck.
const CLOSE_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Created,
    MarkupWritten,
    SurfaceLoaded,
    Settled,
    Captured,
    Persisted,
    Failed,
    CleanedUp,
}

/// One execution of the pipeline for a single planning.
#[derive(Debug)]
pub struct RenderJob {
    id: String,
    digest: String,
    state: JobState,
}

impl RenderJob {
    fn new(markup: &str) -> Self {
        let id = uuid::Uuid::new_v4().simple().to_string()[..8].to_string();
        Self {
            id,
            digest: markup::fingerprint(markup)[..16].to_string(),
            state: JobState::Created,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    fn advance(&mut self, next: JobState) {
        debug!("job {}: {:?} -> {:?}", self.id, self.state, next);
        self.state = next;
    }
}

/// Runs render jobs against a surface backend.
#[derive(Clone)]
pub struct CaptureCoordinator {
    config: RenderConfig,
    factory: SurfaceFactory,
}

impl CaptureCoordinator {
    /// Coordinator using the backend named in `config`
    pub fn new(config: RenderConfig) -> Result<Self> {
        let factory = config.backend.factory()?;
        Ok(Self::with_factory(config, factory))
    }

    /// Coordinator with a custom surface factory
    pub fn with_factory(config: RenderConfig, factory: SurfaceFactory) -> Self {
        Self { config, factory }
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Render `planning` to its destination.
    ///
    /// Returns `Err` only for configuration problems, detected before anything
    /// is written. Otherwise resolves `true` when the image was written and
    /// `false` on any failure; in both cases the surface is closed and the
    /// temporary markup file removed before returning.
    pub async fn run(&self, planning: &PlanningConfig, store: &dyn ConfigStore) -> Result<bool> {
        let style = StyleSnapshot::resolve(store)?;
        let dest = planning.validate()?.to_path_buf();
        let markup = markup::render(planning, &style)?;

        let mut job = RenderJob::new(&markup);
        let mut artifact = TempArtifact::allocate(&self.config.temp_dir, &self.config.artifact_prefix);
        debug!(
            "job {}: dest={} markup={} artifact={}",
            job.id,
            dest.display(),
            job.digest,
            artifact.path().display()
        );

        let outcome = match artifact.write(&markup).await {
            Ok(()) => {
                job.advance(JobState::MarkupWritten);
                self.render(&mut job, artifact.path(), &dest).await
            }
            Err(e) => Err(e),
        };

        let ok = match outcome {
            Ok(()) => true,
            Err(e) => {
                error!(
                    "job {} failed in {:?}: {} (dest={}, markup={})",
                    job.id,
                    job.state,
                    e,
                    dest.display(),
                    job.digest
                );
                job.advance(JobState::Failed);
                false
            }
        };

        if let Err(e) = artifact.release().await {
            warn!("job {}: {}", job.id, e);
        }
        job.advance(JobState::CleanedUp);

        if ok {
            info!("job {}: wrote {}", job.id, dest.display());
        }
        Ok(ok)
    }

    // The job timeout bounds surface work only. Persisting starts after the
    // surface is closed and is never abandoned half way, so a timed out job
    // cannot write `dest` behind the caller's back.
    async fn render(&self, job: &mut RenderJob, document: &Path, dest: &Path) -> Result<()> {
        let mut surface = None;
        let budget = Duration::from_millis(self.config.job_timeout_ms);
        let captured = match timeout(budget, self.capture(job, &mut surface, document)).await {
            Ok(res) => res,
            Err(_) => Err(Error::Timeout(self.config.job_timeout_ms)),
        };

        // A spawn cut short by the timeout leaves no handle; its worker closes
        // the surface on its own once the factory returns.
        if let Some(handle) = surface {
            match timeout(CLOSE_GRACE, handle.close()).await {
                Ok(Ok(())) => debug!("job {}: surface closed", job.id),
                Ok(Err(e)) => warn!("job {}: surface close failed: {}", job.id, e),
                Err(_) => warn!("job {}: surface close timed out, abandoning worker", job.id),
            }
        }

        let frame = captured?;
        ImagePersister::with_quality(self.config.jpeg_quality)
            .persist(frame, dest)
            .await?;
        job.advance(JobState::Persisted);
        Ok(())
    }

    async fn capture(
        &self,
        job: &mut RenderJob,
        surface: &mut Option<SurfaceHandle>,
        document: &Path,
    ) -> Result<CapturedFrame> {
        let handle = surface.insert(
            SurfaceHandle::spawn(self.factory.clone(), self.config.viewport, &job.id).await?,
        );

        handle.load(document).await?;
        job.advance(JobState::SurfaceLoaded);

        self.settle(job, handle).await?;
        job.advance(JobState::Settled);

        let frame = handle.capture_frame().await?;
        job.advance(JobState::Captured);
        Ok(frame)
    }

    /// Wait for the surface to report quiescence, bounded by the settle timeout.
    async fn settle(&self, job: &RenderJob, handle: &SurfaceHandle) -> Result<()> {
        let settle = &self.config.settle;
        if settle.min_delay_ms > 0 {
            sleep(Duration::from_millis(settle.min_delay_ms)).await;
        }

        let deadline = Instant::now() + Duration::from_millis(settle.timeout_ms);
        let poll = Duration::from_millis(settle.poll_interval_ms.max(1));
        loop {
            match handle.is_settled().await {
                Ok(true) => return Ok(()),
                Ok(false) => {}
                // A broken probe is not fatal; fall back to the bound.
                Err(e) => debug!("job {}: settle probe failed: {}", job.id, e),
            }
            if Instant::now() >= deadline {
                warn!(
                    "job {}: surface not settled after {}ms, capturing anyway",
                    job.id, settle.timeout_ms
                );
                return Ok(());
            }
            sleep(poll).await;
        }
    }
}
