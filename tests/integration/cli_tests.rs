//! End-to-end runs of the command dispatcher against a temporary database.

use clap::Parser;
use dupetrail::cli::Cli;
use dupetrail::error::ExitCode;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn run(db: &Path, args: &[&str]) -> anyhow::Result<ExitCode> {
    let mut argv = vec![
        "dupetrail".to_string(),
        "--quiet".to_string(),
        "--output".to_string(),
        "json".to_string(),
        "--database".to_string(),
        db.display().to_string(),
    ];
    argv.extend(args.iter().map(|a| (*a).to_string()));
    dupetrail::run_app(Cli::try_parse_from(argv).unwrap())
}

#[test]
fn test_exit_codes_through_the_workflow() {
    let files = tempdir().unwrap();
    let state = tempdir().unwrap();
    let db = state.path().join("trail.db");
    let root = files.path().to_str().unwrap();

    fs::write(files.path().join("unique.txt"), b"unique").unwrap();
    assert_eq!(run(&db, &["scan", root]).unwrap(), ExitCode::Success);
    assert_eq!(run(&db, &["duplicates"]).unwrap(), ExitCode::NothingFound);

    fs::write(files.path().join("a.txt"), b"dup").unwrap();
    fs::write(files.path().join("b.txt"), b"dup").unwrap();
    assert_eq!(run(&db, &["scan", root]).unwrap(), ExitCode::Success);
    assert_eq!(run(&db, &["duplicates"]).unwrap(), ExitCode::Success);

    // Dry run first: nothing changes on disk
    assert_eq!(
        run(&db, &["delete-duplicates", "--keep", "first"]).unwrap(),
        ExitCode::Success
    );
    assert!(files.path().join("b.txt").exists());

    assert_eq!(
        run(&db, &["delete-duplicates", "--keep", "first", "--confirm"]).unwrap(),
        ExitCode::Success
    );
    assert!(files.path().join("a.txt").exists());
    assert!(!files.path().join("b.txt").exists());

    assert_eq!(run(&db, &["history"]).unwrap(), ExitCode::Success);
    // The deletion cannot be reversed
    assert!(run(&db, &["undo"]).is_err());
    assert_eq!(
        run(&db, &["delete-duplicates", "--confirm"]).unwrap(),
        ExitCode::NothingFound
    );
}

#[test]
fn test_undo_with_empty_history() {
    let state = tempdir().unwrap();
    let db = state.path().join("trail.db");
    assert_eq!(run(&db, &["undo"]).unwrap(), ExitCode::NothingFound);
    assert_eq!(run(&db, &["history"]).unwrap(), ExitCode::NothingFound);
}

#[test]
fn test_scan_of_missing_root_finds_nothing() {
    let state = tempdir().unwrap();
    let db = state.path().join("trail.db");
    let missing = state.path().join("does-not-exist");
    assert_eq!(
        run(&db, &["scan", missing.to_str().unwrap()]).unwrap(),
        ExitCode::NothingFound
    );
}

#[test]
fn test_config_init_and_explicit_file() {
    let state = tempdir().unwrap();
    let db = state.path().join("trail.db");
    let config = state.path().join("conf").join("dupetrail.toml");
    let config_arg = config.to_str().unwrap();

    assert_eq!(
        run(&db, &["config", "init", config_arg]).unwrap(),
        ExitCode::Success
    );
    assert!(config.is_file());
    assert!(run(&db, &["config", "init", config_arg]).is_err());
    assert_eq!(
        run(&db, &["config", "init", config_arg, "--force"]).unwrap(),
        ExitCode::Success
    );
    assert_eq!(
        run(&db, &["--config", config_arg, "config", "show"]).unwrap(),
        ExitCode::Success
    );

    let missing = state.path().join("missing.toml");
    assert!(run(&db, &["--config", missing.to_str().unwrap(), "history"]).is_err());
}

#[test]
fn test_audio_without_backend_is_an_error() {
    let state = tempdir().unwrap();
    let db = state.path().join("trail.db");
    let err = run(&db, &["similar", "audio"]).unwrap_err();
    assert!(err.to_string().contains("tags"));
}

#[test]
fn test_organize_rename_hash_and_undo() {
    let files = tempdir().unwrap();
    let sorted = tempdir().unwrap();
    let state = tempdir().unwrap();
    let db = state.path().join("trail.db");
    let (src, dest) = (files.path().to_str().unwrap(), sorted.path().to_str().unwrap());
    fs::write(files.path().join("a.png"), b"image").unwrap();
    fs::write(files.path().join("b.txt"), b"text").unwrap();

    assert_eq!(run(&db, &["hash", src, "--fast-only"]).unwrap(), ExitCode::Success);

    // Without --confirm nothing moves
    assert_eq!(
        run(&db, &["organize", src, dest, "--by", "extension"]).unwrap(),
        ExitCode::Success
    );
    assert!(files.path().join("a.png").exists());

    assert_eq!(
        run(&db, &["organize", src, dest, "--by", "extension", "--confirm"]).unwrap(),
        ExitCode::Success
    );
    let moved = sorted.path().join("png").join("a.png");
    assert!(moved.is_file());
    assert!(sorted.path().join("txt").join("b.txt").is_file());

    let png_dir = sorted.path().join("png");
    assert_eq!(
        run(
            &db,
            &["rename", png_dir.to_str().unwrap(), "-p", "cover.{ext}", "--confirm"]
        )
        .unwrap(),
        ExitCode::Success
    );
    assert!(png_dir.join("cover.png").is_file());

    assert_eq!(run(&db, &["undo"]).unwrap(), ExitCode::Success);
    assert!(moved.is_file());
    assert!(!png_dir.join("cover.png").exists());

    assert!(run(&db, &["organize", src, dest, "--date-format", "%Q"]).is_err());
}
