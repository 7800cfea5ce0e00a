use dupetrail::engine::{Engine, EngineConfig, NearKind, NearReport};
use dupetrail::registry::Providers;
use dupetrail::store::Store;
use image::{Rgb, RgbImage};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::tempdir;

/// Horizontal gradient; `rising` picks the direction, `offset` brightens.
fn gradient(path: &Path, rising: bool, offset: u8) {
    let img = RgbImage::from_fn(64, 64, |x, _| {
        let step = if rising { x } else { 63 - x } as u8;
        let v = step.saturating_mul(3).saturating_add(offset);
        Rgb([v, v, v])
    });
    img.save(path).unwrap();
}

fn engine(config: EngineConfig) -> Engine {
    let providers = Arc::new(Providers::with_defaults().unwrap());
    Engine::with_store(config, providers, Store::open_in_memory().unwrap()).unwrap()
}

fn photos() -> (tempfile::TempDir, PathBuf, PathBuf, PathBuf) {
    let dir = tempdir().unwrap();
    let original = dir.path().join("original.png");
    let brighter = dir.path().join("brighter.png");
    let mirrored = dir.path().join("mirrored.png");
    gradient(&original, true, 0);
    gradient(&brighter, true, 8);
    gradient(&mirrored, false, 0);
    (dir, original, brighter, mirrored)
}

#[test]
fn test_similar_images_grouped() {
    let (dir, original, brighter, mirrored) = photos();
    fs::write(dir.path().join("broken.png"), b"not a png").unwrap();

    let engine = engine(EngineConfig::default());
    engine.scan(&[dir.path().to_path_buf()], &[]).unwrap();

    let report = engine.find_near_duplicates(NearKind::Image).unwrap();
    let NearReport::Image {
        groups,
        examined,
        skipped,
    } = report
    else {
        panic!("expected an image report");
    };
    assert_eq!(examined, 4);
    assert_eq!(skipped, 1);
    assert_eq!(groups.len(), 1);

    let members: Vec<&PathBuf> = groups[0].members.iter().map(|(p, _)| p).collect();
    assert!(members.contains(&&original));
    assert!(members.contains(&&brighter));
    assert!(!members.contains(&&mirrored));
}

#[test]
fn test_similar_to_reference() {
    let (dir, original, brighter, _mirrored) = photos();

    let engine = engine(EngineConfig::default());
    engine.scan(&[dir.path().to_path_buf()], &[]).unwrap();

    let matches = engine.find_similar_images(&original, None).unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].path, brighter);
    assert!(matches[0].distance <= 10);

    // Everything is similar at the maximum threshold, nearest first
    let all = engine.find_similar_images(&original, Some(64)).unwrap();
    assert_eq!(all.len(), 2);
    assert!(all[0].distance <= all[1].distance);
}

#[test]
fn test_ahash_method_also_groups() {
    let (dir, original, brighter, _mirrored) = photos();

    let config = EngineConfig {
        perceptual: "ahash".to_string(),
        ..EngineConfig::default()
    };
    let engine = engine(config);
    engine.scan(&[dir.path().to_path_buf()], &[]).unwrap();

    let report = engine.find_near_duplicates(NearKind::Image).unwrap();
    assert_eq!(report.group_count(), 1);
    let NearReport::Image { groups, .. } = report else {
        panic!("expected an image report");
    };
    for (path, hash) in &groups[0].members {
        assert!(path == &original || path == &brighter);
        assert_eq!(hash.method, "ahash");
    }
}
