use dupelink::actions::LinkStrategy;
use dupelink::dedupe::{DedupeConfig, Deduplicator, RunSummary};
use dupelink::error::ExitCode;
use dupelink::index::{Durability, SqliteIndex};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

fn run(index: &Path, root: &Path, config: DedupeConfig) -> RunSummary {
    let index = SqliteIndex::open(index, Durability::Normal).unwrap();
    Deduplicator::new(Arc::new(index), config).run(root).unwrap()
}

fn write(root: &Path, rel: &str, content: &str) -> PathBuf {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, content).unwrap();
    path
}

fn index_len(index: &Path) -> u64 {
    SqliteIndex::open(index, Durability::Normal)
        .unwrap()
        .len()
        .unwrap()
}

fn is_regular(path: &Path) -> bool {
    fs::symlink_metadata(path).unwrap().file_type().is_file()
}

fn is_symlink(path: &Path) -> bool {
    fs::symlink_metadata(path).unwrap().file_type().is_symlink()
}

/// Three copies of one content and one unique file.
fn three_copies(root: &Path) -> Vec<PathBuf> {
    vec![
        write(root, "a/x", "hello"),
        write(root, "b/y", "hello"),
        write(root, "c/z", "hello"),
        write(root, "d/w", "world"),
    ]
}

#[test]
fn test_three_copies_collapse_to_one_canonical() {
    let index_dir = TempDir::new().unwrap();
    let root = TempDir::new().unwrap();
    let files = three_copies(root.path());

    let index = index_dir.path().join("fp.db");
    let summary = run(&index, root.path(), DedupeConfig::default());

    assert_eq!(index_len(&index), 2);
    assert_eq!(summary.files_hashed, 4);
    assert_eq!(summary.canonicals, 2);
    assert_eq!(summary.duplicates_linked, 2);
    assert_eq!(summary.bytes_reclaimed, 10);
    assert_eq!(summary.exit_code(), ExitCode::Success);

    let copies = &files[..3];
    let canonicals: Vec<_> = copies.iter().filter(|p| is_regular(p)).collect();
    assert_eq!(canonicals.len(), 1, "exactly one copy stays a regular file");

    let canonical = fs::canonicalize(canonicals[0]).unwrap();
    for path in copies.iter().filter(|p| is_symlink(p)) {
        assert_eq!(fs::read_link(path).unwrap(), canonical);
        assert_eq!(fs::read_to_string(path).unwrap(), "hello");
    }

    assert!(is_regular(&files[3]));
    assert_eq!(fs::read_to_string(&files[3]).unwrap(), "world");
}

#[test]
fn test_second_run_is_a_no_op() {
    let index_dir = TempDir::new().unwrap();
    let index = index_dir.path().join("fp.db");
    let root = TempDir::new().unwrap();
    three_copies(root.path());

    run(&index, root.path(), DedupeConfig::default());
    assert_eq!(index_len(&index), 2);
    let second = run(&index, root.path(), DedupeConfig::default());
    assert_eq!(index_len(&index), 2);

    assert_eq!(second.files_hashed, 2);
    assert_eq!(second.skipped_symlinks, 2);
    assert_eq!(second.already_canonical, 2);
    assert_eq!(second.canonicals, 0);
    assert_eq!(second.duplicates_linked, 0);
    assert!(!second.has_issues());
}

#[test]
fn test_later_run_links_to_earlier_canonical() {
    let index_dir = TempDir::new().unwrap();
    let index = index_dir.path().join("fp.db");
    let first_root = TempDir::new().unwrap();
    let second_root = TempDir::new().unwrap();
    let original = write(first_root.path(), "keep.bin", "shared bytes");
    let copy = write(second_root.path(), "nested/copy.bin", "shared bytes");

    run(&index, first_root.path(), DedupeConfig::default());
    let summary = run(&index, second_root.path(), DedupeConfig::default());

    assert_eq!(summary.canonicals, 0);
    assert_eq!(summary.duplicates_linked, 1);
    assert!(is_symlink(&copy));
    assert_eq!(
        fs::read_link(&copy).unwrap(),
        fs::canonicalize(&original).unwrap()
    );
}

#[test]
fn test_dry_run_changes_nothing() {
    let index_dir = TempDir::new().unwrap();
    let root = TempDir::new().unwrap();
    let files = three_copies(root.path());

    let summary = run(
        &index_dir.path().join("fp.db"),
        root.path(),
        DedupeConfig::default().with_dry_run(true),
    );

    assert!(summary.dry_run);
    assert_eq!(summary.duplicates_linked, 2);
    for path in &files {
        assert!(is_regular(path), "{} must be untouched", path.display());
    }
}

#[test]
fn test_delete_then_link_strategy() {
    let index_dir = TempDir::new().unwrap();
    let root = TempDir::new().unwrap();
    let files = three_copies(root.path());

    let summary = run(
        &index_dir.path().join("fp.db"),
        root.path(),
        DedupeConfig::default().with_link_strategy(LinkStrategy::DeleteThenLink),
    );

    assert_eq!(summary.duplicates_linked, 2);
    assert_eq!(files.iter().filter(|p| is_symlink(p)).count(), 2);
    for path in &files[..3] {
        assert_eq!(fs::read_to_string(path).unwrap(), "hello");
    }
}

#[test]
fn test_paranoid_mode_links_unchanged_canonicals() {
    let index_dir = TempDir::new().unwrap();
    let root = TempDir::new().unwrap();
    three_copies(root.path());

    let summary = run(
        &index_dir.path().join("fp.db"),
        root.path(),
        DedupeConfig::default().with_paranoid(true),
    );

    assert_eq!(summary.duplicates_linked, 2);
    assert!(!summary.has_issues());
}

#[test]
fn test_many_copies_single_canonical_under_contention() {
    let index_dir = TempDir::new().unwrap();
    let root = TempDir::new().unwrap();
    let files: Vec<_> = (0..200)
        .map(|i| write(root.path(), &format!("d{}/f{}", i % 10, i), "same content"))
        .collect();

    let config = DedupeConfig::default()
        .with_hash_workers(8)
        .with_resolve_workers(8)
        .with_traversal_workers(4)
        .with_queue_capacity(4);
    let summary = run(&index_dir.path().join("fp.db"), root.path(), config);

    assert_eq!(summary.canonicals, 1);
    assert_eq!(summary.duplicates_linked, 199);
    assert_eq!(files.iter().filter(|p| is_regular(p)).count(), 1);
    assert!(!summary.has_issues());
}

#[test]
fn test_empty_files_are_deduplicated() {
    let index_dir = TempDir::new().unwrap();
    let root = TempDir::new().unwrap();
    let a = write(root.path(), "a.empty", "");
    let b = write(root.path(), "b.empty", "");

    let summary = run(
        &index_dir.path().join("fp.db"),
        root.path(),
        DedupeConfig::default(),
    );

    assert_eq!(summary.canonicals, 1);
    assert_eq!(summary.duplicates_linked, 1);
    assert_eq!(summary.bytes_reclaimed, 0);
    assert_ne!(is_symlink(&a), is_symlink(&b));
}

#[test]
fn test_min_size_and_ignore_filters() {
    let index_dir = TempDir::new().unwrap();
    let root = TempDir::new().unwrap();
    let small_a = write(root.path(), "small_a", "x");
    let small_b = write(root.path(), "small_b", "x");
    let log_a = write(root.path(), "one.log", "a long enough line");
    let log_b = write(root.path(), "two.log", "a long enough line");

    let config = DedupeConfig::default().with_walker_config(
        dupelink::scanner::WalkerConfig::default()
            .with_min_size(Some(2))
            .with_ignore_patterns(vec!["*.log".to_string()]),
    );
    let summary = run(&index_dir.path().join("fp.db"), root.path(), config);

    assert_eq!(summary.files_found, 0);
    for path in [small_a, small_b, log_a, log_b] {
        assert!(is_regular(&path));
    }
}

#[test]
fn test_long_file_names_are_linked() {
    let index_dir = TempDir::new().unwrap();
    let root = TempDir::new().unwrap();
    let short = write(root.path(), "a", "same");
    let long = write(root.path(), &format!("z/{}", "d".repeat(240)), "same");

    let summary = run(
        &index_dir.path().join("fp.db"),
        root.path(),
        DedupeConfig::default(),
    );

    assert!(!summary.has_issues(), "{:?}", summary.issues);
    assert_eq!(summary.canonicals, 1);
    assert_eq!(summary.duplicates_linked, 1);
    assert_eq!(
        [&short, &long].iter().filter(|p| is_regular(p)).count(),
        1
    );
    assert_eq!(fs::read_to_string(&long).unwrap(), "same");
}
