//! A backend whose fast digest collides for every file must still produce
//! only content-identical groups once strong verification runs.

use dupetrail::engine::{Engine, EngineConfig};
use dupetrail::hasher::{strong_digest_bytes, ContentHasher, HashError};
use dupetrail::registry::Providers;
use dupetrail::store::Store;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;

struct CollidingHasher;

impl ContentHasher for CollidingHasher {
    fn name(&self) -> &str {
        "colliding"
    }

    fn fast_digest(&self, _path: &Path) -> Result<String, HashError> {
        Ok("00000000000000ff".to_string())
    }

    fn strong_digest(&self, path: &Path) -> Result<Option<String>, HashError> {
        let data = fs::read(path).map_err(|e| HashError::from_io(path, e))?;
        Ok(Some(strong_digest_bytes(&data)))
    }
}

fn engine(verify: bool) -> Engine {
    let providers = Providers::with_defaults().unwrap();
    providers
        .hashers
        .register("colliding", || Arc::new(CollidingHasher))
        .unwrap();
    let config = EngineConfig {
        hasher: "colliding".to_string(),
        verify_with_strong_hash: verify,
        ..EngineConfig::default()
    };
    Engine::with_store(config, Arc::new(providers), Store::open_in_memory().unwrap()).unwrap()
}

#[test]
fn test_fast_collision_split_by_strong_digest() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a"), b"AAAA").unwrap();
    fs::write(dir.path().join("b"), b"AAAA").unwrap();
    fs::write(dir.path().join("c"), b"CCCC").unwrap();

    let engine = engine(true);
    engine.scan(&[dir.path().to_path_buf()], &[]).unwrap();
    let report = engine.find_exact_duplicates().unwrap();

    assert_eq!(report.groups.len(), 1);
    let group = &report.groups[0];
    assert_eq!(group.len(), 2);
    assert!(!group.paths().contains(&dir.path().join("c")));
    assert_eq!(report.fast_collisions, 1);

    let first = &group.members()[0];
    let stored = engine.store().hashes_for(first.id).unwrap().unwrap();
    assert_eq!(
        stored.strong.as_deref(),
        Some(strong_digest_bytes(b"AAAA").as_str())
    );
}

#[test]
fn test_collision_accepted_without_verification() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a"), b"AAAA").unwrap();
    fs::write(dir.path().join("c"), b"CCCC").unwrap();

    let engine = engine(false);
    engine.scan(&[dir.path().to_path_buf()], &[]).unwrap();
    let report = engine.find_exact_duplicates().unwrap();

    assert_eq!(report.groups.len(), 1);
    assert_eq!(report.strong_verified, 0);
    let first = &report.groups[0].members()[0];
    let stored = engine.store().hashes_for(first.id).unwrap().unwrap();
    assert!(!stored.has_strong());
}

#[test]
fn test_unknown_hasher_name_is_rejected() {
    let config = EngineConfig {
        hasher: "sha1".to_string(),
        ..EngineConfig::default()
    };
    let providers = Arc::new(Providers::with_defaults().unwrap());
    let err = Engine::with_store(config, providers, Store::open_in_memory().unwrap())
        .err()
        .unwrap();
    let message = err.to_string();
    assert!(message.contains("sha1"));
    assert!(message.contains("streaming"));
}
