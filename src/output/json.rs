//! JSON Lines output.
//!
//! Every line is a standalone object carrying a `"type"`:
//!
//! ```json
//! {"fast_hash":"4f5d...","files":["/a.txt","/b.txt"],"id":1,"size":12,"type":"group","wasted":12}
//! {"candidates":3,"groups":1,"hashed":3,"interrupted":false,"type":"summary","wasted_space":12}
//! ```

use std::io::{self, Write};
use std::path::Path;

use serde::Serialize;
use serde_json::{json, Value};

use crate::actions::{BatchReport, DeletePlan, DeleteReport, UndoOutcome};
use crate::duplicates::SimilarMatch;
use crate::engine::{ExactReport, HashReport, NearReport, ScanReport};
use crate::model::Operation;

/// Write `value` as one line tagged with `kind`.
fn line<W: Write, T: Serialize>(w: &mut W, kind: &str, value: &T) -> io::Result<()> {
    let value = match serde_json::to_value(value)? {
        Value::Object(mut map) => {
            map.insert("type".to_string(), Value::from(kind));
            Value::Object(map)
        }
        other => json!({ "type": kind, "value": other }),
    };
    serde_json::to_writer(&mut *w, &value)?;
    writeln!(w)
}

fn error_lines<W: Write>(w: &mut W, errors: &[(std::path::PathBuf, String)]) -> io::Result<()> {
    for (path, message) in errors {
        line(w, "error", &json!({ "path": path, "message": message }))?;
    }
    Ok(())
}

pub fn scan_report<W: Write>(w: &mut W, report: &ScanReport) -> io::Result<()> {
    error_lines(w, &report.errors)?;
    line(
        w,
        "scan_summary",
        &json!({
            "files": report.files,
            "directories": report.directories,
            "bytes": report.bytes,
            "errors": report.errors.len(),
            "transactions": report.transactions,
            "interrupted": report.interrupted,
        }),
    )
}

pub fn exact_report<W: Write>(w: &mut W, report: &ExactReport) -> io::Result<()> {
    for group in &report.groups {
        line(
            w,
            "group",
            &json!({
                "id": group.id,
                "fast_hash": group.fast_hash,
                "size": group.size,
                "files": group.paths(),
                "wasted": group.wasted_space(),
            }),
        )?;
    }
    error_lines(w, &report.failures)?;
    line(
        w,
        "summary",
        &json!({
            "groups": report.groups.len(),
            "files": report.files,
            "candidates": report.candidates,
            "hashed": report.hashed,
            "cache_hits": report.cache_hits,
            "strong_verified": report.strong_verified,
            "fast_collisions": report.fast_collisions,
            "wasted_space": report.wasted_space(),
            "interrupted": report.interrupted,
        }),
    )
}

pub fn near_report<W: Write>(w: &mut W, report: &NearReport) -> io::Result<()> {
    let (kind, examined, skipped) = match report {
        NearReport::Image {
            groups,
            examined,
            skipped,
        } => {
            for group in groups {
                let members: Vec<Value> = group
                    .members
                    .iter()
                    .map(|(path, hash)| json!({ "path": path, "hash": hash.to_hex() }))
                    .collect();
                line(
                    w,
                    "image_group",
                    &json!({ "members": members, "max_distance": group.max_distance }),
                )?;
            }
            ("image", examined, skipped)
        }
        NearReport::Audio {
            groups,
            examined,
            skipped,
        } => {
            for group in groups {
                let best = group.best_quality();
                let members: Vec<Value> = group
                    .members()
                    .iter()
                    .map(|m| {
                        json!({
                            "path": m.path,
                            "title": m.metadata.title,
                            "artist": m.metadata.artist,
                            "duration_ms": m.metadata.duration_ms,
                            "rating": m.analysis.as_ref().map(|a| a.rating),
                            "best": std::ptr::eq(m, best),
                        })
                    })
                    .collect();
                line(
                    w,
                    "audio_group",
                    &json!({
                        "members": members,
                        "tag_score": group.tag_score,
                        "content_score": group.content_score,
                        "precise_score": group.precise_score,
                    }),
                )?;
            }
            ("audio", examined, skipped)
        }
    };
    line(
        w,
        "near_summary",
        &json!({
            "kind": kind,
            "groups": report.group_count(),
            "examined": examined,
            "skipped": skipped,
        }),
    )
}

pub fn similar_matches<W: Write>(
    w: &mut W,
    reference: &Path,
    matches: &[SimilarMatch],
) -> io::Result<()> {
    for m in matches {
        line(
            w,
            "similar",
            &json!({
                "reference": reference,
                "path": m.path,
                "distance": m.distance,
                "hash": m.hash.to_hex(),
            }),
        )?;
    }
    Ok(())
}

pub fn delete_report<W: Write>(w: &mut W, plan: &DeletePlan, report: &DeleteReport) -> io::Result<()> {
    for entry in &report.entries {
        line(w, "delete", entry)?;
    }
    line(
        w,
        "delete_summary",
        &json!({
            "strategy": plan.strategy,
            "deleted": report.deleted,
            "failed": report.failed,
            "would_delete": report.would_delete,
            "bytes_freed": report.bytes_freed,
        }),
    )
}

pub fn batch_report<W: Write>(w: &mut W, verb: &str, report: &BatchReport) -> io::Result<()> {
    for entry in &report.entries {
        line(w, "action", entry)?;
    }
    line(
        w,
        "action_summary",
        &json!({
            "action": verb,
            "done": report.done,
            "planned": report.planned,
            "unchanged": report.unchanged,
            "failed": report.failed,
        }),
    )
}

pub fn hash_report<W: Write>(w: &mut W, report: &HashReport) -> io::Result<()> {
    error_lines(w, &report.failures)?;
    for (path, hashes) in &report.hashed {
        line(
            w,
            "hash",
            &json!({ "path": path, "fast": hashes.fast, "strong": hashes.strong }),
        )?;
    }
    Ok(())
}

pub fn undo<W: Write>(w: &mut W, outcome: &UndoOutcome) -> io::Result<()> {
    let status = match outcome {
        UndoOutcome::NothingToUndo => "nothing_to_undo",
        UndoOutcome::Undone(_) => "undone",
        UndoOutcome::Discarded(_) => "discarded",
    };
    line(
        w,
        "undo",
        &json!({ "outcome": status, "operation": outcome.operation() }),
    )
}

pub fn history<W: Write>(w: &mut W, operations: &[Operation]) -> io::Result<()> {
    for operation in operations {
        line(w, "operation", operation)?;
    }
    Ok(())
}
