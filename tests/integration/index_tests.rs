use clap::Parser;
use dupelink::cli::Cli;
use dupelink::error::ExitCode;
use dupelink::index::{Durability, FingerprintIndex, SqliteIndex};
use dupelink::scanner::Hasher;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use tempfile::TempDir;

fn run_cli(args: &[&str]) -> ExitCode {
    let mut argv = vec!["dupelink", "-q"];
    argv.extend_from_slice(args);
    dupelink::run_app(Cli::try_parse_from(argv).unwrap()).unwrap()
}

fn arg(path: &Path) -> &str {
    path.to_str().unwrap()
}

#[test]
fn test_index_inside_root_is_never_linked() {
    let root = TempDir::new().unwrap();
    let index = root.path().join("state").join("fp.db");
    fs::write(root.path().join("a"), "twin").unwrap();
    fs::write(root.path().join("b"), "twin").unwrap();

    let code = run_cli(&["dedupe", arg(root.path()), "--index", arg(&index)]);
    assert_eq!(code, ExitCode::Success);
    assert!(fs::symlink_metadata(&index).unwrap().is_file());

    // A second run must see the index it wrote and skip it again.
    let code = run_cli(&["dedupe", arg(root.path()), "--index", arg(&index)]);
    assert_eq!(code, ExitCode::Success);
    assert!(fs::symlink_metadata(&index).unwrap().is_file());

    let index = SqliteIndex::open(&index, Durability::Normal).unwrap();
    assert_eq!(index.len().unwrap(), 1);
}

#[test]
fn test_invalid_root_is_fatal_and_creates_no_index() {
    let dir = TempDir::new().unwrap();
    let index = dir.path().join("fp.db");
    let cli = Cli::try_parse_from([
        "dupelink",
        "-q",
        "dedupe",
        arg(&dir.path().join("missing")),
        "--index",
        arg(&index),
    ])
    .unwrap();

    let err = dupelink::run_app(cli).unwrap_err();
    assert_eq!(ExitCode::for_error(&err), ExitCode::UsageError);
    assert!(!index.exists());
}

#[test]
fn test_unusable_index_is_fatal() {
    let root = TempDir::new().unwrap();
    let not_a_db = TempDir::new().unwrap();
    let cli = Cli::try_parse_from([
        "dupelink",
        "-q",
        "dedupe",
        arg(root.path()),
        "--index",
        arg(not_a_db.path()),
    ])
    .unwrap();

    let err = dupelink::run_app(cli).unwrap_err();
    assert_eq!(ExitCode::for_error(&err), ExitCode::GeneralError);
}

#[test]
fn test_index_subcommands() {
    let dir = TempDir::new().unwrap();
    let index = dir.path().join("fp.db");
    let root = TempDir::new().unwrap();
    let file = root.path().join("a");
    fs::write(&file, "indexed").unwrap();

    assert_eq!(run_cli(&["index", "stats", "--index", arg(&index)]), ExitCode::Success);
    assert_eq!(
        run_cli(&["index", "lookup", arg(&file), "--index", arg(&index)]),
        ExitCode::Success
    );
    assert!(!index.exists());

    run_cli(&["dedupe", arg(root.path()), "--index", arg(&index)]);
    assert_eq!(run_cli(&["index", "stats", "--index", arg(&index)]), ExitCode::Success);
    assert_eq!(
        run_cli(&["index", "lookup", arg(&file), "--index", arg(&index)]),
        ExitCode::Success
    );
    assert_eq!(
        run_cli(&["index", "clear", "--yes", "--index", arg(&index)]),
        ExitCode::Success
    );

    let index = SqliteIndex::open(&index, Durability::Normal).unwrap();
    assert!(index.is_empty().unwrap());
}

#[test]
fn test_separate_handles_agree_on_first_insert() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("fp.db");
    let fingerprint = *blake3::hash(b"contended").as_bytes();

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let path = path.clone();
            thread::spawn(move || {
                let index = SqliteIndex::open(&path, Durability::Normal).unwrap();
                let candidate = PathBuf::from(format!("/candidate/{i}"));
                index.lookup_or_insert(&fingerprint, &candidate).unwrap()
            })
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(results.iter().filter(|r| r.inserted).count(), 1);
    let winner = &results[0].existing;
    assert!(results.iter().all(|r| &r.existing == winner));
}

#[test]
fn test_lookup_uses_same_fingerprint_as_pipeline() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("f");
    fs::write(&file, "abc").unwrap();

    let (fingerprint, size) = Hasher::new().fingerprint(&file).unwrap();
    assert_eq!(size, 3);
    assert_eq!(fingerprint, *blake3::hash(b"abc").as_bytes());
}
