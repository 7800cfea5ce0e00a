//! Audio grouping with in-process stand-ins for the external backends.

use dupetrail::duplicates::AudioCompareOptions;
use dupetrail::engine::{Engine, EngineConfig, NearKind, NearReport};
use dupetrail::metadata::AudioMetadataProvider;
use dupetrail::model::{AudioFingerprint, AudioMetadata, AudioQualityAnalysis};
use dupetrail::registry::Providers;
use dupetrail::similarity::{AudioAnalyzer, AudioFingerprinter};
use dupetrail::store::Store;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::{tempdir, TempDir};

/// Tags keyed on the file stem: `<artist>--<title>--<seconds>`.
struct StemTags;

impl AudioMetadataProvider for StemTags {
    fn read(&self, path: &Path) -> Option<AudioMetadata> {
        let stem = path.file_stem()?.to_str()?;
        let mut parts = stem.split("--");
        let artist = parts.next()?.to_string();
        let title = parts.next()?.to_string();
        let seconds: u64 = parts.next()?.parse().ok()?;
        Some(AudioMetadata {
            artist: Some(artist),
            title: Some(title),
            duration_ms: seconds * 1000,
            ..AudioMetadata::default()
        })
    }
}

/// Fingerprint is the raw file content.
struct ContentBytes;

impl AudioFingerprinter for ContentBytes {
    fn algorithm(&self) -> &str {
        "bytes"
    }

    fn compute(&self, path: &Path) -> Option<AudioFingerprint> {
        fs::read(path).ok().map(|data| AudioFingerprint::new(data, "bytes", 0))
    }
}

/// Rates lossless files above lossy ones.
struct ExtensionRating;

impl AudioAnalyzer for ExtensionRating {
    fn can_handle(&self, _path: &Path) -> bool {
        true
    }

    fn analyze(&self, path: &Path) -> Option<AudioQualityAnalysis> {
        let rating = match path.extension()?.to_str()? {
            "flac" => 9.0,
            _ => 3.0,
        };
        Some(AudioQualityAnalysis {
            rating,
            ..AudioQualityAnalysis::default()
        })
    }
}

fn providers() -> Providers {
    let providers = Providers::with_defaults().unwrap();
    providers
        .audio_metadata
        .register("tags", || Arc::new(StemTags))
        .unwrap();
    providers
        .fingerprinters
        .register("bytes", || Arc::new(ContentBytes))
        .unwrap();
    providers
        .audio_analyzers
        .register("rating", || Arc::new(ExtensionRating))
        .unwrap();
    providers
}

fn library() -> TempDir {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("Band--Anthem--200.mp3"), b"lossy encode").unwrap();
    fs::write(dir.path().join("band--anthem--201.flac"), b"lossless bits").unwrap();
    fs::write(dir.path().join("Someone--Ballad--200.mp3"), b"different song").unwrap();
    fs::write(dir.path().join("cover.jpg"), b"not audio").unwrap();
    dir
}

fn engine(config: EngineConfig) -> Engine {
    Engine::with_store(
        config,
        Arc::new(providers()),
        Store::open_in_memory().unwrap(),
    )
    .unwrap()
}

fn audio_groups(report: NearReport) -> Vec<dupetrail::model::AudioDuplicateGroup> {
    match report {
        NearReport::Audio { groups, .. } => groups,
        NearReport::Image { .. } => panic!("expected an audio report"),
    }
}

#[test]
fn test_tag_match_groups_same_recording() {
    let dir = library();
    let config = EngineConfig {
        audio_analyzer: "rating".to_string(),
        ..EngineConfig::default()
    };
    let engine = engine(config);
    engine.scan(&[dir.path().to_path_buf()], &[]).unwrap();

    let report = engine
        .find_near_duplicates(NearKind::Audio(AudioCompareOptions::default()))
        .unwrap();
    let NearReport::Audio {
        groups,
        examined,
        skipped,
    } = report
    else {
        panic!("expected an audio report");
    };
    assert_eq!(examined, 3);
    assert_eq!(skipped, 0);
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].len(), 2);
    assert!((groups[0].tag_score - 1.0).abs() < 1e-9);
    assert_eq!(
        groups[0].best_quality().path,
        dir.path().join("band--anthem--201.flac")
    );
}

#[test]
fn test_duration_gate_separates_matching_tags() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("Band--Anthem--200.mp3"), b"a").unwrap();
    fs::write(dir.path().join("Band--Anthem--320.mp3"), b"b").unwrap();

    let engine = engine(EngineConfig::default());
    engine.scan(&[dir.path().to_path_buf()], &[]).unwrap();
    let groups = audio_groups(
        engine
            .find_near_duplicates(NearKind::Audio(AudioCompareOptions::default()))
            .unwrap(),
    );
    assert!(groups.is_empty());
}

#[test]
fn test_precise_fingerprint_only() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("A--One--100.mp3"), b"identical audio").unwrap();
    fs::write(dir.path().join("B--Two--100.mp3"), b"identical audio").unwrap();
    fs::write(dir.path().join("C--One--100.mp3"), b"other recording").unwrap();

    let config = EngineConfig {
        precise_fingerprinter: "bytes".to_string(),
        ..EngineConfig::default()
    };
    let engine = engine(config);
    engine.scan(&[dir.path().to_path_buf()], &[]).unwrap();

    let groups = audio_groups(
        engine
            .find_near_duplicates(NearKind::Audio(AudioCompareOptions::precise_only()))
            .unwrap(),
    );
    assert_eq!(groups.len(), 1);
    let paths: Vec<_> = groups[0].members().iter().map(|m| m.path.clone()).collect();
    assert_eq!(
        paths,
        vec![
            dir.path().join("A--One--100.mp3"),
            dir.path().join("B--Two--100.mp3")
        ]
    );
    assert!((groups[0].precise_score - 1.0).abs() < 1e-9);
}

#[test]
fn test_invalid_threshold_rejected() {
    let engine = engine(EngineConfig::default());
    let options = AudioCompareOptions {
        tag_threshold: 2.0,
        ..AudioCompareOptions::default()
    };
    assert!(engine.find_near_duplicates(NearKind::Audio(options)).is_err());
}
