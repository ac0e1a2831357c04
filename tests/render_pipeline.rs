use std::path::Path;
use streamplan::{
    MemoryStore, PlanningConfig, RenderConfig, ScheduleEntry, SettleConfig, Viewport,
};

fn planning(dest: &Path) -> PlanningConfig {
    PlanningConfig {
        dest_file: Some(dest.to_path_buf()),
        title: Some("This week".into()),
        subtitle: Some("Oct 12 - Oct 18".into()),
        entries: vec![
            ScheduleEntry::on("Monday", "20:00", "Just Chatting"),
            ScheduleEntry::off("Tuesday"),
            ScheduleEntry::on("Wednesday", "21:00", "Speedrun"),
        ],
    }
}

fn render_config(temp: &Path) -> RenderConfig {
    RenderConfig {
        viewport: Viewport { width: 480, height: 270 },
        temp_dir: temp.to_path_buf(),
        settle: SettleConfig {
            timeout_ms: 50,
            ..Default::default()
        },
        ..Default::default()
    }
}

fn assert_empty(dir: &Path) {
    let left: Vec<_> = std::fs::read_dir(dir).unwrap().collect();
    assert!(left.is_empty(), "temporary artifacts left behind: {:?}", left);
}

#[tokio::test]
async fn renders_jpeg_and_cleans_up() {
    let out = tempfile::tempdir().unwrap();
    let temp = tempfile::tempdir().unwrap();
    let dest = out.path().join("planning.jpg");

    let mut store = MemoryStore::with_defaults();
    store.set("channelName", "someone");

    let ok = streamplan::run_planning_render_with(&planning(&dest), &store, &render_config(temp.path()))
        .await
        .unwrap();
    assert!(ok);

    let bytes = std::fs::read(&dest).unwrap();
    assert!(!bytes.is_empty());
    assert_eq!(&bytes[..3], &[0xFF, 0xD8, 0xFF]);
    let img = image::load_from_memory(&bytes).unwrap();
    assert_eq!((img.width(), img.height()), (480, 270));

    assert_empty(temp.path());
}

#[tokio::test]
async fn rerun_writes_both_destinations() {
    let out = tempfile::tempdir().unwrap();
    let temp = tempfile::tempdir().unwrap();
    let store = MemoryStore::with_defaults();
    let render = render_config(temp.path());

    let first = out.path().join("a.jpg");
    let second = out.path().join("b.jpg");
    assert!(streamplan::run_planning_render_with(&planning(&first), &store, &render).await.unwrap());
    assert!(streamplan::run_planning_render_with(&planning(&second), &store, &render).await.unwrap());

    assert!(first.exists());
    assert!(second.exists());
    assert_empty(temp.path());
}

#[tokio::test]
async fn existing_destination_is_overwritten() {
    let out = tempfile::tempdir().unwrap();
    let temp = tempfile::tempdir().unwrap();
    let dest = out.path().join("planning.jpg");
    std::fs::write(&dest, b"old").unwrap();

    let ok = streamplan::run_planning_render_with(
        &planning(&dest),
        &MemoryStore::with_defaults(),
        &render_config(temp.path()),
    )
    .await
    .unwrap();
    assert!(ok);
    assert_eq!(&std::fs::read(&dest).unwrap()[..2], &[0xFF, 0xD8]);
}

#[tokio::test]
async fn concurrent_jobs_are_isolated() {
    let out = tempfile::tempdir().unwrap();
    let temp = tempfile::tempdir().unwrap();
    let store = MemoryStore::with_defaults();
    let render = render_config(temp.path());

    let a = planning(&out.path().join("a.jpg"));
    let b = planning(&out.path().join("b.jpg"));
    let (ra, rb) = tokio::join!(
        streamplan::run_planning_render_with(&a, &store, &render),
        streamplan::run_planning_render_with(&b, &store, &render),
    );
    assert!(ra.unwrap());
    assert!(rb.unwrap());
    assert!(out.path().join("a.jpg").exists());
    assert!(out.path().join("b.jpg").exists());
    assert_empty(temp.path());
}

#[tokio::test]
async fn batch_preserves_input_order() {
    let out = tempfile::tempdir().unwrap();
    let temp = tempfile::tempdir().unwrap();
    let store = MemoryStore::with_defaults();

    let good = planning(&out.path().join("good.jpg"));
    let unwritable = planning(&out.path().join("missing").join("x.jpg"));
    let mut invalid = planning(&out.path().join("invalid.jpg"));
    invalid.entries.clear();

    let results = streamplan::render_batch(
        &[good, unwritable, invalid],
        &store,
        &render_config(temp.path()),
        2,
    )
    .await;

    assert_eq!(results.len(), 3);
    assert!(matches!(results[0], Ok(true)));
    assert!(matches!(results[1], Ok(false)));
    assert!(results[2].as_ref().unwrap_err().is_configuration());
    assert_empty(temp.path());
}

#[test]
fn markup_is_deterministic() {
    let store = MemoryStore::with_defaults();
    let cfg = planning(Path::new("/tmp/out.jpg"));
    let a = streamplan::generate_planning(&cfg, &store).unwrap();
    let b = streamplan::generate_planning(&cfg, &store).unwrap();
    assert_eq!(a, b);
    assert!(a.contains("Just Chatting"));
    assert!(a.contains("Speedrun"));
}
