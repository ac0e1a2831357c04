use image::RgbaImage;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use streamplan::{
    CaptureCoordinator, CapturedFrame, Error, MemoryStore, PlanningConfig, RenderConfig,
    RenderSurface, Result, ScheduleEntry, SettleConfig, SurfaceFactory, Viewport,
};

#[derive(Clone, Copy)]
enum Fault {
    None,
    Load,
    Capture,
    SlowOpen,
    SlowLoad,
    SlowCapture,
    NeverSettles,
}

// Scripted surface recording how the pipeline drove it.
struct Scripted {
    fault: Fault,
    probes: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
}

impl RenderSurface for Scripted {
    fn open(_viewport: Viewport) -> Result<Self> {
        unreachable!("built through the factory")
    }

    fn load(&mut self, document: &Path) -> Result<()> {
        assert!(document.exists(), "markup must be on disk before load");
        match self.fault {
            Fault::Load => Err(Error::RenderLoadError("broken document".into())),
            Fault::SlowLoad => {
                std::thread::sleep(Duration::from_millis(400));
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn is_settled(&mut self) -> Result<bool> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        Ok(!matches!(self.fault, Fault::NeverSettles))
    }

    fn capture_frame(&mut self) -> Result<CapturedFrame> {
        match self.fault {
            Fault::Capture => Err(Error::CaptureError("surface lost".into())),
            Fault::SlowCapture => {
                std::thread::sleep(Duration::from_millis(400));
                Ok(CapturedFrame::new(RgbaImage::new(16, 9)))
            }
            _ => Ok(CapturedFrame::new(RgbaImage::new(16, 9))),
        }
    }

    fn close(&mut self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct Harness {
    coordinator: CaptureCoordinator,
    probes: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
    temp: tempfile::TempDir,
    out: tempfile::TempDir,
}

impl Harness {
    fn new(fault: Fault, job_timeout_ms: u64) -> Self {
        let probes = Arc::new(AtomicUsize::new(0));
        let closes = Arc::new(AtomicUsize::new(0));
        let temp = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();

        let (p, c) = (probes.clone(), closes.clone());
        let factory: SurfaceFactory = Arc::new(move |_: Viewport| -> Result<Box<dyn RenderSurface>> {
            if matches!(fault, Fault::SlowOpen) {
                std::thread::sleep(Duration::from_millis(400));
            }
            Ok(Box::new(Scripted {
                fault,
                probes: p.clone(),
                closes: c.clone(),
            }))
        });

        let config = RenderConfig {
            temp_dir: temp.path().to_path_buf(),
            settle: SettleConfig {
                min_delay_ms: 0,
                poll_interval_ms: 10,
                timeout_ms: 60,
            },
            job_timeout_ms,
            ..Default::default()
        };

        Self {
            coordinator: CaptureCoordinator::with_factory(config, factory),
            probes,
            closes,
            temp,
            out,
        }
    }

    fn planning(&self, name: &str) -> PlanningConfig {
        PlanningConfig {
            dest_file: Some(self.out.path().join(name)),
            entries: vec![ScheduleEntry::on("Friday", "19:00", "Retro night")],
            ..Default::default()
        }
    }

    async fn run(&self, planning: &PlanningConfig) -> Result<bool> {
        self.coordinator.run(planning, &MemoryStore::with_defaults()).await
    }

    async fn closes_eventually(&self, expected: usize) -> bool {
        for _ in 0..100 {
            if self.closes.load(Ordering::SeqCst) == expected {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    fn temp_is_empty(&self) -> bool {
        std::fs::read_dir(self.temp.path()).unwrap().next().is_none()
    }
}

#[tokio::test]
async fn scripted_success_writes_image() {
    let h = Harness::new(Fault::None, 5_000);
    let cfg = h.planning("ok.jpg");
    assert!(h.run(&cfg).await.unwrap());
    assert!(h.out.path().join("ok.jpg").exists());
    assert_eq!(h.closes.load(Ordering::SeqCst), 1);
    assert!(h.temp_is_empty());
}

#[tokio::test]
async fn write_failure_reports_false() {
    let h = Harness::new(Fault::None, 5_000);
    let cfg = h.planning("no/such/dir/out.jpg");
    assert!(!h.run(&cfg).await.unwrap());
    assert_eq!(h.closes.load(Ordering::SeqCst), 1);
    assert!(h.temp_is_empty());
}

#[tokio::test]
async fn capture_failure_reports_false_and_cleans_up() {
    let h = Harness::new(Fault::Capture, 5_000);
    let cfg = h.planning("capture.jpg");
    assert!(!h.run(&cfg).await.unwrap());
    assert!(!h.out.path().join("capture.jpg").exists());
    assert_eq!(h.closes.load(Ordering::SeqCst), 1);
    assert!(h.temp_is_empty());
}

#[tokio::test]
async fn load_failure_reports_false_and_cleans_up() {
    let h = Harness::new(Fault::Load, 5_000);
    let cfg = h.planning("load.jpg");
    assert!(!h.run(&cfg).await.unwrap());
    assert!(!h.out.path().join("load.jpg").exists());
    assert_eq!(h.probes.load(Ordering::SeqCst), 0);
    assert_eq!(h.closes.load(Ordering::SeqCst), 1);
    assert!(h.temp_is_empty());
}

#[tokio::test]
async fn unsettled_surface_is_captured_after_bound() {
    let h = Harness::new(Fault::NeverSettles, 5_000);
    let cfg = h.planning("late.jpg");
    assert!(h.run(&cfg).await.unwrap());
    assert!(h.probes.load(Ordering::SeqCst) >= 2);
    assert!(h.out.path().join("late.jpg").exists());
}

#[tokio::test]
async fn job_timeout_reports_false() {
    let h = Harness::new(Fault::SlowLoad, 100);
    let cfg = h.planning("slow.jpg");
    assert!(!h.run(&cfg).await.unwrap());
    assert!(!h.out.path().join("slow.jpg").exists());
    assert!(h.temp_is_empty());
    // The worker closes the surface once the stuck load returns.
    assert!(h.closes_eventually(1).await);
}

#[tokio::test]
async fn stalled_surface_open_is_bounded_by_job_timeout() {
    let h = Harness::new(Fault::SlowOpen, 100);
    let cfg = h.planning("open.jpg");

    let started = std::time::Instant::now();
    assert!(!h.run(&cfg).await.unwrap());
    assert!(started.elapsed() < Duration::from_millis(350));
    assert!(h.temp_is_empty());
    // Worker closes the surface once the factory finally returns.
    assert!(h.closes_eventually(1).await);
    assert!(!h.out.path().join("open.jpg").exists());
}

#[tokio::test]
async fn timed_out_job_never_writes_destination() {
    let h = Harness::new(Fault::SlowCapture, 100);
    let cfg = h.planning("late-capture.jpg");
    assert!(!h.run(&cfg).await.unwrap());
    assert!(h.temp_is_empty());

    // Let the stuck capture finish; nothing may land on disk afterwards.
    assert!(h.closes_eventually(1).await);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!h.out.path().join("late-capture.jpg").exists());
}

#[tokio::test]
async fn configuration_error_creates_nothing() {
    let h = Harness::new(Fault::None, 5_000);

    let mut no_dest = h.planning("x.jpg");
    no_dest.dest_file = None;
    let err = h.run(&no_dest).await.unwrap_err();
    assert!(err.is_configuration());

    let mut store = MemoryStore::with_defaults();
    store.remove("titlesColor");
    let err = h.coordinator.run(&h.planning("y.jpg"), &store).await.unwrap_err();
    assert!(matches!(err, Error::ConfigurationError(_)));

    assert_eq!(h.closes.load(Ordering::SeqCst), 0);
    assert!(h.temp_is_empty());
}

#[tokio::test]
async fn factory_failure_reports_false() {
    let temp = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let factory: SurfaceFactory = Arc::new(|_: Viewport| -> Result<Box<dyn RenderSurface>> {
        Err(Error::InitializationError("no display".into()))
    });
    let coordinator = CaptureCoordinator::with_factory(
        RenderConfig {
            temp_dir: temp.path().to_path_buf(),
            ..Default::default()
        },
        factory,
    );
    let cfg = PlanningConfig {
        dest_file: Some(out.path().join("x.jpg")),
        entries: vec![ScheduleEntry::off("Sunday")],
        ..Default::default()
    };

    assert!(!coordinator.run(&cfg, &MemoryStore::with_defaults()).await.unwrap());
    assert!(std::fs::read_dir(temp.path()).unwrap().next().is_none());
}
