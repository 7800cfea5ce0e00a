use chrono::{TimeZone, Utc};
use dupetrail::model::{DuplicateGroup, FileRecord, Hashes, Operation, OperationKind};
use dupetrail::store::{Store, SCHEMA_VERSION};
use std::path::PathBuf;
use tempfile::tempdir;

fn record(path: &str, size: u64) -> FileRecord {
    let mtime = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    FileRecord::new(PathBuf::from(path), size, mtime)
}

#[test]
fn test_file_db_round_trip() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("nested").join("store.db");

    let saved = {
        let store = Store::open(&db).unwrap();
        let saved = store
            .upsert_files(&[record("/data/a", 10), record("/data/b", 10)])
            .unwrap();
        store
            .save_hashes(&saved[0], &Hashes::fast_only("00000000000000aa").unwrap())
            .unwrap();
        let group = DuplicateGroup::new("00000000000000aa", 10, saved.clone()).unwrap();
        store.save_group(&group).unwrap();
        store
            .log_operation(&Operation::succeeded(
                OperationKind::Copy,
                PathBuf::from("/data/a"),
                Some(PathBuf::from("/data/c")),
            ))
            .unwrap();
        saved
    };

    let store = Store::open(&db).unwrap();
    assert_eq!(store.schema_version().unwrap(), SCHEMA_VERSION);
    assert_eq!(store.file_count().unwrap(), 2);

    let a = store.file_by_path(&PathBuf::from("/data/a")).unwrap().unwrap();
    assert_eq!(a, saved[0]);
    assert_eq!(
        store.hashes_for(a.id).unwrap().unwrap().fast,
        "00000000000000aa"
    );

    let groups = store.all_groups().unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].paths(), vec![PathBuf::from("/data/a"), PathBuf::from("/data/b")]);

    let ops = store.operations(5).unwrap();
    assert_eq!(ops.len(), 1);
    assert_eq!(ops[0].dest_path, Some(PathBuf::from("/data/c")));
}

#[test]
fn test_upsert_keeps_id_and_updates_size() {
    let store = Store::open_in_memory().unwrap();
    let first = store.upsert_file(&record("/x", 1)).unwrap();
    let second = store.upsert_file(&record("/x", 2)).unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(store.file_by_id(first.id).unwrap().unwrap().size, 2);
    assert_eq!(store.file_count().unwrap(), 1);
}
