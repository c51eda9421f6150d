use dupelink::actions::LinkError;
use dupelink::dedupe::{DedupeConfig, Deduplicator, Issue, RunSummary};
use dupelink::error::ExitCode;
use dupelink::index::{Durability, SqliteIndex};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn run(index: &Path, root: &Path) -> RunSummary {
    let index = SqliteIndex::open(index, Durability::Normal).unwrap();
    Deduplicator::new(Arc::new(index), DedupeConfig::default())
        .run(root)
        .unwrap()
}

#[test]
fn test_missing_canonical_leaves_duplicate_intact() {
    let index_dir = TempDir::new().unwrap();
    let index = index_dir.path().join("fp.db");
    let first = TempDir::new().unwrap();
    let second = TempDir::new().unwrap();
    let original = first.path().join("orig");
    fs::write(&original, "vanishing").unwrap();
    let copy = second.path().join("copy");
    fs::write(&copy, "vanishing").unwrap();

    run(&index, first.path());
    fs::remove_file(&original).unwrap();
    let summary = run(&index, second.path());

    assert_eq!(summary.duplicates_linked, 0);
    assert_eq!(summary.issues.len(), 1);
    assert!(matches!(
        summary.issues[0],
        Issue::Link(LinkError::CanonicalMissing { .. })
    ));
    assert_eq!(summary.exit_code(), ExitCode::PartialSuccess);
    assert!(fs::symlink_metadata(&copy).unwrap().is_file());
    assert_eq!(fs::read_to_string(&copy).unwrap(), "vanishing");
}

#[cfg(unix)]
#[test]
fn test_unreadable_directory_does_not_stop_the_run() {
    use std::os::unix::fs::PermissionsExt;

    let index_dir = TempDir::new().unwrap();
    let root = TempDir::new().unwrap();
    let locked = root.path().join("locked");
    fs::create_dir(&locked).unwrap();
    fs::write(locked.join("hidden"), "dup").unwrap();
    fs::write(root.path().join("a"), "dup").unwrap();
    fs::write(root.path().join("b"), "dup").unwrap();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

    // Permission bits do not apply to root.
    if fs::read_dir(&locked).is_ok() {
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        return;
    }

    let summary = run(&index_dir.path().join("fp.db"), root.path());
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

    assert_eq!(summary.duplicates_linked, 1);
    assert_eq!(summary.issues.len(), 1);
    assert_eq!(summary.issues[0].kind(), "traversal");
    assert_eq!(summary.exit_code(), ExitCode::PartialSuccess);
}

#[cfg(unix)]
#[test]
fn test_unreadable_file_is_reported_and_skipped() {
    use std::os::unix::fs::PermissionsExt;

    let index_dir = TempDir::new().unwrap();
    let root = TempDir::new().unwrap();
    let secret = root.path().join("secret");
    fs::write(&secret, "dup").unwrap();
    fs::write(root.path().join("open"), "dup").unwrap();
    fs::set_permissions(&secret, fs::Permissions::from_mode(0o000)).unwrap();

    if fs::File::open(&secret).is_ok() {
        return;
    }

    let summary = run(&index_dir.path().join("fp.db"), root.path());
    fs::set_permissions(&secret, fs::Permissions::from_mode(0o644)).unwrap();

    assert_eq!(summary.files_hashed, 1);
    assert_eq!(summary.canonicals, 1);
    assert_eq!(summary.issues.len(), 1);
    assert_eq!(summary.issues[0].kind(), "hash");
    assert!(fs::symlink_metadata(&secret).unwrap().is_file());
}
