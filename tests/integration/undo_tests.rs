use dupetrail::actions::{UndoError, UndoOutcome};
use dupetrail::engine::{Engine, EngineConfig};
use dupetrail::error::EngineError;
use dupetrail::model::{OperationKind, OperationStatus};
use dupetrail::registry::Providers;
use dupetrail::store::Store;
use std::fs;
use std::sync::Arc;
use tempfile::tempdir;

fn engine() -> Engine {
    let providers = Arc::new(Providers::with_defaults().unwrap());
    Engine::with_store(
        EngineConfig::default(),
        providers,
        Store::open_in_memory().unwrap(),
    )
    .unwrap()
}

#[test]
fn test_nothing_to_undo() {
    let engine = engine();
    assert_eq!(engine.undo_last().unwrap(), UndoOutcome::NothingToUndo);
}

#[test]
fn test_move_then_undo_restores_file_and_record() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("report.pdf");
    let dest = dir.path().join("archive.pdf");
    fs::write(&source, b"quarterly numbers").unwrap();

    let engine = engine();
    engine.scan(&[dir.path().to_path_buf()], &[]).unwrap();
    let id = engine.store().file_by_path(&source).unwrap().unwrap().id;

    let outcome = engine.file_actions(false).move_file(&source, &dest).unwrap();
    assert!(outcome.performed);
    assert!(!source.exists());
    assert!(dest.exists());
    assert_eq!(engine.store().file_by_path(&dest).unwrap().unwrap().id, id);

    let undone = engine.undo_last().unwrap();
    match undone {
        UndoOutcome::Undone(op) => {
            assert_eq!(op.kind, OperationKind::Move);
            assert_eq!(op.source_path, source);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert!(source.exists());
    assert!(!dest.exists());
    assert_eq!(fs::read(&source).unwrap(), b"quarterly numbers");
    assert_eq!(engine.store().file_by_path(&source).unwrap().unwrap().id, id);
    assert!(engine.history(10).unwrap().is_empty());
}

#[test]
fn test_rename_then_undo() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("IMG_0001.png");
    fs::write(&source, b"pixels").unwrap();

    let engine = engine();
    let actions = engine.file_actions(false);
    actions.rename(&source, "holiday.png").unwrap();
    assert!(dir.path().join("holiday.png").exists());

    assert!(matches!(engine.undo_last().unwrap(), UndoOutcome::Undone(_)));
    assert!(source.exists());
    assert!(!dir.path().join("holiday.png").exists());
}

#[test]
fn test_copy_then_undo_removes_copy() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("a.txt");
    let copy = dir.path().join("b.txt");
    fs::write(&source, b"keep me").unwrap();

    let engine = engine();
    engine.file_actions(false).copy_file(&source, &copy).unwrap();
    assert_eq!(fs::read(&copy).unwrap(), b"keep me");

    engine.undo_last().unwrap();
    assert!(source.exists());
    assert!(!copy.exists());
}

#[test]
fn test_moves_undone_in_reverse_order() {
    let dir = tempdir().unwrap();
    let a = dir.path().join("a");
    let b = dir.path().join("b");
    let c = dir.path().join("c");
    fs::write(&a, b"x").unwrap();

    let engine = engine();
    let actions = engine.file_actions(false);
    actions.move_file(&a, &b).unwrap();
    actions.move_file(&b, &c).unwrap();

    engine.undo_last().unwrap();
    assert!(b.exists());
    engine.undo_last().unwrap();
    assert!(a.exists());
    assert_eq!(engine.undo_last().unwrap(), UndoOutcome::NothingToUndo);
}

#[test]
fn test_delete_is_not_reversible() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("gone.txt");
    fs::write(&path, b"bye").unwrap();

    let engine = engine();
    engine.file_actions(false).delete_file(&path, None).unwrap();
    let err = engine.undo_last().unwrap_err();
    assert!(matches!(
        err,
        EngineError::Undo(UndoError::NotReversible { .. })
    ));
    // The record stays so the history still shows it
    assert_eq!(engine.history(10).unwrap().len(), 1);
}

#[test]
fn test_failed_move_is_logged_then_discarded() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("missing");
    let dest = dir.path().join("dest");

    let engine = engine();
    assert!(engine.file_actions(false).move_file(&missing, &dest).is_err());
    let history = engine.history(10).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, OperationStatus::Failed);
    assert!(history[0].details.is_some());

    assert!(matches!(
        engine.undo_last().unwrap(),
        UndoOutcome::Discarded(_)
    ));
    assert!(engine.history(10).unwrap().is_empty());
}

#[test]
fn test_dry_run_touches_nothing() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("a");
    let dest = dir.path().join("b");
    fs::write(&source, b"x").unwrap();

    let engine = engine();
    let outcome = engine.file_actions(true).move_file(&source, &dest).unwrap();
    assert!(!outcome.performed);
    assert!(outcome.operation.id.is_none());
    assert!(source.exists());
    assert!(!dest.exists());
    assert!(engine.history(10).unwrap().is_empty());
}

#[test]
fn test_undo_refuses_when_source_reoccupied() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("a");
    let dest = dir.path().join("b");
    fs::write(&source, b"original").unwrap();

    let engine = engine();
    engine.file_actions(false).move_file(&source, &dest).unwrap();
    fs::write(&source, b"newcomer").unwrap();

    let err = engine.undo_last().unwrap_err();
    assert!(matches!(
        err,
        EngineError::Undo(UndoError::DestinationOccupied(_))
    ));
    assert_eq!(fs::read(&source).unwrap(), b"newcomer");
    assert!(dest.exists());
}
