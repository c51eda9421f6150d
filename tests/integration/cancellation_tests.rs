use dupelink::dedupe::{DedupeConfig, Deduplicator};
use dupelink::error::ExitCode;
use dupelink::index::{Durability, SqliteIndex};
use dupelink::progress::ProgressCallback;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

fn populate(root: &Path, files: usize) {
    for i in 0..files {
        let dir = root.join(format!("d{}", i % 8));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(format!("f{i}")), format!("content {}", i % 4)).unwrap();
    }
}

/// Requests shutdown as soon as the first canonical is registered.
struct StopAfterFirst(Arc<AtomicBool>);

impl ProgressCallback for StopAfterFirst {
    fn on_canonical(&self, _path: &Path) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[test]
fn test_shutdown_before_start_processes_nothing() {
    let index_dir = TempDir::new().unwrap();
    let root = TempDir::new().unwrap();
    populate(root.path(), 20);

    let flag = Arc::new(AtomicBool::new(true));
    let index = SqliteIndex::open(&index_dir.path().join("fp.db"), Durability::Normal).unwrap();
    let config = DedupeConfig::default().with_shutdown_flag(flag);
    let summary = Deduplicator::new(Arc::new(index), config)
        .run(root.path())
        .unwrap();

    assert!(summary.interrupted);
    assert_eq!(summary.duplicates_linked, 0);
    assert_eq!(summary.exit_code(), ExitCode::Interrupted);
}

#[test]
fn test_shutdown_mid_run_leaves_every_path_consistent() {
    let index_dir = TempDir::new().unwrap();
    let root = TempDir::new().unwrap();
    populate(root.path(), 200);

    let flag = Arc::new(AtomicBool::new(false));
    let index = SqliteIndex::open(&index_dir.path().join("fp.db"), Durability::Normal).unwrap();
    let config = DedupeConfig::default()
        .with_queue_capacity(2)
        .with_shutdown_flag(Arc::clone(&flag))
        .with_progress_callback(Arc::new(StopAfterFirst(Arc::clone(&flag))));
    let summary = Deduplicator::new(Arc::new(index), config)
        .run(root.path())
        .unwrap();

    assert!(summary.interrupted);
    assert_eq!(summary.data_loss_count(), 0);
    assert!(summary.files_hashed < 200);

    for i in 0..200 {
        let path = root.path().join(format!("d{}", i % 8)).join(format!("f{i}"));
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            format!("content {}", i % 4),
            "{} lost its content",
            path.display()
        );
    }
}
