//! Off-screen render surfaces.
//!
//! A [`RenderSurface`] is a synchronous, possibly non-`Send` engine. The
//! pipeline never touches one directly: [`SurfaceHandle`] moves it onto a
//! dedicated worker thread and exposes every operation as an async
//! request/response scoped to a single job.

use crate::{Error, Result, Viewport};
use image::RgbaImage;
use log::{debug, warn};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread;
use tokio::sync::oneshot;

pub mod builtin;

#[cfg(feature = "cdp")]
pub mod cdp;

/// A captured bitmap of the surface contents
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    image: RgbaImage,
}

impl CapturedFrame {
    pub fn new(image: RgbaImage) -> Self {
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn as_image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }
}

/// Core trait for off-screen rendering contexts
pub trait RenderSurface {
    /// Create a hidden surface with a fixed canvas
    fn open(viewport: Viewport) -> Result<Self>
    where
        Self: Sized;

    /// Load a document from disk. Returns once the initial layout and paint
    /// are ready to present; sub-resources may still be in flight.
    fn load(&mut self, document: &Path) -> Result<()>;

    /// Whether every sub-resource (fonts, images) has finished rendering.
    /// Engines without such a signal report `true` right after `load`.
    fn is_settled(&mut self) -> Result<bool> {
        Ok(true)
    }

    /// Snapshot the current visual contents
    fn capture_frame(&mut self) -> Result<CapturedFrame>;

    /// Release all resources. Safe to call more than once and without a
    /// prior load.
    fn close(&mut self) -> Result<()>;
}

/// Creates surfaces on the worker thread that will own them.
pub type SurfaceFactory = Arc<dyn Fn(Viewport) -> Result<Box<dyn RenderSurface>> + Send + Sync>;

/// Available rendering backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Pure-Rust engine for planning documents
    #[default]
    Builtin,
    /// Headless Chrome over the DevTools protocol (`cdp` feature)
    Cdp,
}

impl Backend {
    /// Factory opening surfaces of this backend
    pub fn factory(self) -> Result<SurfaceFactory> {
        match self {
            Backend::Builtin => {
                let factory: SurfaceFactory =
                    Arc::new(|viewport: Viewport| -> Result<Box<dyn RenderSurface>> {
                        Ok(Box::new(builtin::BuiltinSurface::open(viewport)?))
                    });
                Ok(factory)
            }
            #[cfg(feature = "cdp")]
            Backend::Cdp => {
                let factory: SurfaceFactory =
                    Arc::new(|viewport: Viewport| -> Result<Box<dyn RenderSurface>> {
                        Ok(Box::new(cdp::CdpSurface::open(viewport)?))
                    });
                Ok(factory)
            }
            #[cfg(not(feature = "cdp"))]
            Backend::Cdp => Err(Error::ConfigurationError(
                "the cdp backend requires the `cdp` feature".into(),
            )),
        }
    }
}

impl FromStr for Backend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "builtin" => Ok(Backend::Builtin),
            "cdp" | "chrome" => Ok(Backend::Cdp),
            other => Err(Error::ConfigurationError(format!("unknown backend '{}'", other))),
        }
    }
}

enum Command {
    Load(PathBuf, oneshot::Sender<Result<()>>),
    Settled(oneshot::Sender<Result<bool>>),
    Capture(oneshot::Sender<Result<CapturedFrame>>),
    Close(oneshot::Sender<Result<()>>),
}

/// Async handle to a surface owned by a worker thread.
///
/// Dropping the handle without calling [`SurfaceHandle::close`] still closes
/// the surface once the worker finishes its current command.
pub struct SurfaceHandle {
    cmd_tx: Sender<Command>,
}

impl SurfaceHandle {
    /// Spawn a worker thread and open a surface on it.
    pub async fn spawn(factory: SurfaceFactory, viewport: Viewport, label: &str) -> Result<Self> {
        let (cmd_tx, cmd_rx) = mpsc::channel::<Command>();
        let (init_tx, init_rx) = oneshot::channel::<Result<()>>();
        let name = format!("surface-{}", label);

        thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                let mut surface = match factory(viewport) {
                    Ok(s) => s,
                    Err(err) => {
                        let _ = init_tx.send(Err(err));
                        return;
                    }
                };
                let _ = init_tx.send(Ok(()));

                let mut closed = false;
                while let Ok(cmd) = cmd_rx.recv() {
                    match cmd {
                        Command::Load(path, resp) => {
                            let _ = resp.send(surface.load(&path));
                        }
                        Command::Settled(resp) => {
                            let _ = resp.send(surface.is_settled());
                        }
                        Command::Capture(resp) => {
                            let _ = resp.send(surface.capture_frame());
                        }
                        Command::Close(resp) => {
                            let _ = resp.send(surface.close());
                            closed = true;
                            break;
                        }
                    }
                }

                if !closed {
                    // Handle dropped (job timed out or panicked)
                    if let Err(e) = surface.close() {
                        warn!("{}: close after abandon failed: {}", name, e);
                    }
                }
                debug!("{} worker exited", name);
            })
            .map_err(|e| Error::InitializationError(format!("Failed to spawn surface worker: {}", e)))?;

        init_rx
            .await
            .map_err(|e| Error::InitializationError(format!("Surface worker init canceled: {}", e)))??;

        Ok(Self { cmd_tx })
    }

    fn send(&self, cmd: Command) -> Result<()> {
        self.cmd_tx
            .send(cmd)
            .map_err(|_| Error::Other("Surface worker has exited".into()))
    }

    /// Load a document; resolves on readiness to present
    pub async fn load(&self, document: &Path) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Load(document.to_path_buf(), tx))?;
        rx.await
            .map_err(|e| Error::RenderLoadError(format!("Load canceled: {}", e)))?
    }

    /// Probe sub-resource quiescence
    pub async fn is_settled(&self) -> Result<bool> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Settled(tx))?;
        rx.await
            .map_err(|e| Error::Other(format!("Settle probe canceled: {}", e)))?
    }

    /// Capture the current frame
    pub async fn capture_frame(&self) -> Result<CapturedFrame> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Capture(tx))
            .map_err(|e| Error::CaptureError(e.to_string()))?;
        rx.await
            .map_err(|e| Error::CaptureError(format!("Capture canceled: {}", e)))?
    }

    /// Close the surface and stop the worker
    pub async fn close(self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Close(tx))?;
        rx.await
            .map_err(|e| Error::Other(format!("Close canceled: {}", e)))?
    }
}
