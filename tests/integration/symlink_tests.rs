#![cfg(unix)]

use dupelink::dedupe::{DedupeConfig, Deduplicator, RunSummary};
use dupelink::index::{Durability, SqliteIndex};
use std::fs;
use std::os::unix::fs::symlink;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn run(index_dir: &TempDir, root: &Path) -> RunSummary {
    let index = SqliteIndex::open(&index_dir.path().join("fp.db"), Durability::Normal).unwrap();
    Deduplicator::new(Arc::new(index), DedupeConfig::default())
        .run(root)
        .unwrap()
}

#[test]
fn test_existing_symlinks_are_left_alone() {
    let index_dir = TempDir::new().unwrap();
    let root = TempDir::new().unwrap();
    let target = root.path().join("target.txt");
    fs::write(&target, "payload").unwrap();
    let link = root.path().join("link.txt");
    symlink(&target, &link).unwrap();

    let summary = run(&index_dir, root.path());

    assert_eq!(summary.files_hashed, 1);
    assert_eq!(summary.skipped_symlinks, 1);
    assert_eq!(summary.duplicates_linked, 0);
    assert_eq!(fs::read_link(&link).unwrap(), target);
}

#[test]
fn test_directory_symlink_loop_terminates() {
    let index_dir = TempDir::new().unwrap();
    let root = TempDir::new().unwrap();
    let sub = root.path().join("sub");
    fs::create_dir(&sub).unwrap();
    fs::write(sub.join("file"), "data").unwrap();
    symlink(root.path(), sub.join("loop")).unwrap();

    let summary = run(&index_dir, root.path());

    assert_eq!(summary.files_hashed, 1);
    assert_eq!(summary.directories, 2);
    assert_eq!(summary.skipped_symlinks, 1);
    assert!(!summary.has_issues());
}

#[test]
fn test_dangling_symlink_is_not_an_issue() {
    let index_dir = TempDir::new().unwrap();
    let root = TempDir::new().unwrap();
    symlink(root.path().join("nowhere"), root.path().join("dangling")).unwrap();

    let summary = run(&index_dir, root.path());

    assert_eq!(summary.skipped_symlinks, 1);
    assert!(!summary.has_issues());
}

#[test]
fn test_symlinked_root_is_resolved() {
    let index_dir = TempDir::new().unwrap();
    let real = TempDir::new().unwrap();
    fs::write(real.path().join("a"), "dup").unwrap();
    fs::write(real.path().join("b"), "dup").unwrap();
    let holder = TempDir::new().unwrap();
    let alias = holder.path().join("alias");
    symlink(real.path(), &alias).unwrap();

    let summary = run(&index_dir, &alias);

    assert_eq!(summary.root, fs::canonicalize(real.path()).unwrap());
    assert_eq!(summary.duplicates_linked, 1);
}
