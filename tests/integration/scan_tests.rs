use dupetrail::engine::{Engine, EngineConfig};
use dupetrail::registry::Providers;
use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::{tempdir, TempDir};

fn open(db: &Path, config: EngineConfig) -> Engine {
    let providers = Arc::new(Providers::with_defaults().unwrap());
    Engine::open(config.with_database(db), providers).unwrap()
}

fn setup() -> (TempDir, TempDir) {
    let files = tempdir().unwrap();
    let state = tempdir().unwrap();
    (files, state)
}

#[test]
fn test_scan_empty_directory() {
    let (files, state) = setup();
    let engine = open(&state.path().join("db.sqlite"), EngineConfig::default());

    let scan = engine.scan(&[files.path().to_path_buf()], &[]).unwrap();
    assert_eq!(scan.files, 0);
    assert!(scan.errors.is_empty());

    let report = engine.find_exact_duplicates().unwrap();
    assert!(report.groups.is_empty());
    assert_eq!(report.wasted_space(), 0);
}

#[test]
fn test_scan_nested_and_multiple_roots() {
    let (files, state) = setup();
    let left = files.path().join("left");
    let right = files.path().join("right").join("deep");
    fs::create_dir_all(&left).unwrap();
    fs::create_dir_all(&right).unwrap();
    fs::write(left.join("photo.raw"), b"identical payload").unwrap();
    fs::write(right.join("photo-copy.raw"), b"identical payload").unwrap();
    fs::write(right.join("notes.txt"), b"something else").unwrap();

    let engine = open(&state.path().join("db.sqlite"), EngineConfig::default());
    let scan = engine
        .scan(&[left.clone(), files.path().join("right")], &[])
        .unwrap();
    assert_eq!(scan.files, 3);

    let report = engine.find_exact_duplicates().unwrap();
    assert_eq!(report.groups.len(), 1);
    let paths = report.groups[0].paths();
    assert!(paths.contains(&left.join("photo.raw")));
    assert!(paths.contains(&right.join("photo-copy.raw")));
    assert_eq!(report.wasted_space(), b"identical payload".len() as u64);
}

#[test]
fn test_results_persist_across_reopen() {
    let (files, state) = setup();
    let db = state.path().join("db.sqlite");
    fs::write(files.path().join("a"), b"twin").unwrap();
    fs::write(files.path().join("b"), b"twin").unwrap();

    {
        let engine = open(&db, EngineConfig::default());
        engine.scan(&[files.path().to_path_buf()], &[]).unwrap();
        engine.find_exact_duplicates().unwrap();
    }

    let engine = open(&db, EngineConfig::default());
    assert_eq!(engine.store().group_count().unwrap(), 1);
    let report = engine.find_exact_duplicates().unwrap();
    assert_eq!(report.groups.len(), 1);
    assert_eq!(report.cache_hits, 2);
}

fn memberships(engine: &Engine) -> HashSet<BTreeSet<PathBuf>> {
    engine
        .find_exact_duplicates()
        .unwrap()
        .groups
        .iter()
        .map(|group| group.paths().into_iter().collect())
        .collect()
}

#[test]
fn test_repeated_detection_yields_same_groups() {
    let (files, state) = setup();
    let nested = files.path().join("nested");
    fs::create_dir_all(&nested).unwrap();
    fs::write(files.path().join("a1"), b"group a").unwrap();
    fs::write(nested.join("a2"), b"group a").unwrap();
    fs::write(files.path().join("b1"), b"group b!").unwrap();
    fs::write(nested.join("b2"), b"group b!").unwrap();
    fs::write(nested.join("b3"), b"group b!").unwrap();
    fs::write(files.path().join("lonely"), b"no twin").unwrap();

    let engine = open(&state.path().join("db.sqlite"), EngineConfig::default());
    engine.scan(&[files.path().to_path_buf()], &[]).unwrap();

    let first = memberships(&engine);
    let second = memberships(&engine);
    assert_eq!(first.len(), 2);
    assert_eq!(first, second);
    assert_eq!(engine.store().group_count().unwrap(), 2);
}

#[test]
fn test_rescan_does_not_duplicate_records() {
    let (files, state) = setup();
    fs::write(files.path().join("a"), b"one").unwrap();
    fs::write(files.path().join("b"), b"two").unwrap();

    let engine = open(&state.path().join("db.sqlite"), EngineConfig::default());
    engine.scan(&[files.path().to_path_buf()], &[]).unwrap();
    let first = engine.store().file_count().unwrap();
    engine.scan(&[files.path().to_path_buf()], &[]).unwrap();
    assert_eq!(engine.store().file_count().unwrap(), first);
}

#[test]
fn test_min_size_excludes_small_files() {
    let (files, state) = setup();
    fs::write(files.path().join("small-a"), b"tiny").unwrap();
    fs::write(files.path().join("small-b"), b"tiny").unwrap();

    let config = EngineConfig {
        min_size: 1024,
        ..EngineConfig::default()
    };
    let engine = open(&state.path().join("db.sqlite"), config);
    engine.scan(&[files.path().to_path_buf()], &[]).unwrap();
    let report = engine.find_exact_duplicates().unwrap();
    assert!(report.groups.is_empty());
    assert_eq!(report.candidates, 0);
}

#[test]
fn test_file_removed_after_scan_is_reported() {
    let (files, state) = setup();
    fs::write(files.path().join("a"), b"same size!").unwrap();
    fs::write(files.path().join("b"), b"same size!").unwrap();
    fs::write(files.path().join("c"), b"same size!").unwrap();

    let engine = open(&state.path().join("db.sqlite"), EngineConfig::default());
    engine.scan(&[files.path().to_path_buf()], &[]).unwrap();
    fs::remove_file(files.path().join("c")).unwrap();

    let report = engine.find_exact_duplicates().unwrap();
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].0, files.path().join("c"));
    assert_eq!(report.groups.len(), 1);
    assert_eq!(report.groups[0].len(), 2);
}

#[test]
fn test_mmap_hasher_finds_same_groups() {
    let (files, state) = setup();
    let big = vec![7u8; 256 * 1024];
    fs::write(files.path().join("big-a"), &big).unwrap();
    fs::write(files.path().join("big-b"), &big).unwrap();

    let engine = open(
        &state.path().join("db.sqlite"),
        EngineConfig::default().with_mmap(),
    );
    engine.scan(&[files.path().to_path_buf()], &[]).unwrap();
    let report = engine.find_exact_duplicates().unwrap();
    assert_eq!(report.groups.len(), 1);
    assert_eq!(report.strong_verified, 2);
}
