//! Human-readable text output.

use std::io::{self, Write};
use std::path::Path;

use bytesize::ByteSize;

use crate::actions::{BatchReport, BatchStatus, DeletePlan, DeleteReport, DeleteStatus, UndoOutcome};
use crate::duplicates::SimilarMatch;
use crate::engine::{ExactReport, HashReport, NearReport, ScanReport};
use crate::model::Operation;

fn errors<W: Write>(w: &mut W, errors: &[(std::path::PathBuf, String)]) -> io::Result<()> {
    for (path, message) in errors {
        writeln!(w, "warning: {}: {}", path.display(), message)?;
    }
    Ok(())
}

pub fn scan_report<W: Write>(w: &mut W, report: &ScanReport) -> io::Result<()> {
    errors(w, &report.errors)?;
    writeln!(
        w,
        "Scanned {} files in {} directories ({}), {} errors{}",
        report.files,
        report.directories,
        ByteSize(report.bytes),
        report.errors.len(),
        if report.interrupted { " [interrupted]" } else { "" }
    )
}

pub fn exact_report<W: Write>(w: &mut W, report: &ExactReport) -> io::Result<()> {
    for (i, group) in report.groups.iter().enumerate() {
        writeln!(
            w,
            "Group {} ({} files, {} each, hash {})",
            i + 1,
            group.len(),
            ByteSize(group.size),
            group.fast_hash
        )?;
        for file in group.members() {
            writeln!(w, "  {}", file.path.display())?;
        }
        writeln!(w)?;
    }
    errors(w, &report.failures)?;

    if report.groups.is_empty() {
        writeln!(w, "No duplicates found among {} files", report.files)?;
    } else {
        let files: usize = report.groups.iter().map(|g| g.len()).sum();
        writeln!(
            w,
            "Found {} duplicate groups ({} files), {} reclaimable",
            report.groups.len(),
            files,
            ByteSize(report.wasted_space())
        )?;
    }
    writeln!(
        w,
        "Hashed {} files ({} cached, {} verified, {} fast-digest collisions){}",
        report.hashed,
        report.cache_hits,
        report.strong_verified,
        report.fast_collisions,
        if report.interrupted { " [interrupted]" } else { "" }
    )
}

pub fn near_report<W: Write>(w: &mut W, report: &NearReport) -> io::Result<()> {
    match report {
        NearReport::Image {
            groups,
            examined,
            skipped,
        } => {
            for (i, group) in groups.iter().enumerate() {
                writeln!(
                    w,
                    "Similar images {} (max distance {})",
                    i + 1,
                    group.max_distance
                )?;
                for (path, hash) in &group.members {
                    writeln!(w, "  {}  {}", hash.to_hex(), path.display())?;
                }
                writeln!(w)?;
            }
            writeln!(
                w,
                "{} similar image groups among {} images ({} undecodable)",
                groups.len(),
                examined,
                skipped
            )
        }
        NearReport::Audio {
            groups,
            examined,
            skipped,
        } => {
            for (i, group) in groups.iter().enumerate() {
                writeln!(
                    w,
                    "Audio group {} (tags {:.2}, content {:.2}, precise {:.2})",
                    i + 1,
                    group.tag_score,
                    group.content_score,
                    group.precise_score
                )?;
                let best = group.best_quality();
                for member in group.members() {
                    let marker = if std::ptr::eq(member, best) { '*' } else { ' ' };
                    let title = member.metadata.title.as_deref().unwrap_or("?");
                    let artist = member.metadata.artist.as_deref().unwrap_or("?");
                    writeln!(
                        w,
                        " {marker} {} ({artist} - {title})",
                        member.path.display()
                    )?;
                }
                writeln!(w)?;
            }
            writeln!(
                w,
                "{} audio duplicate groups among {} files ({} without tags)",
                groups.len(),
                examined,
                skipped
            )
        }
    }
}

pub fn similar_matches<W: Write>(
    w: &mut W,
    reference: &Path,
    matches: &[SimilarMatch],
) -> io::Result<()> {
    if matches.is_empty() {
        return writeln!(w, "No images similar to {}", reference.display());
    }
    writeln!(w, "Images similar to {}:", reference.display())?;
    for m in matches {
        writeln!(w, "  {:>2}  {}", m.distance, m.path.display())?;
    }
    Ok(())
}

pub fn delete_report<W: Write>(w: &mut W, plan: &DeletePlan, report: &DeleteReport) -> io::Result<()> {
    if plan.is_empty() {
        return writeln!(w, "Nothing to delete");
    }
    for entry in &report.entries {
        match &entry.status {
            DeleteStatus::Deleted => writeln!(w, "deleted       {}", entry.path.display())?,
            DeleteStatus::WouldDelete => writeln!(
                w,
                "would delete  {} (keeping {})",
                entry.path.display(),
                entry.keep.display()
            )?,
            DeleteStatus::Failed(reason) => {
                writeln!(w, "failed        {}: {}", entry.path.display(), reason)?;
            }
        }
    }
    if report.would_delete > 0 {
        writeln!(
            w,
            "Keeping the {} copy would free {}",
            plan.strategy,
            ByteSize(plan.reclaimable())
        )?;
    }
    writeln!(w, "{}", report.summary())
}

pub fn batch_report<W: Write>(w: &mut W, verb: &str, report: &BatchReport) -> io::Result<()> {
    for entry in &report.entries {
        match &entry.status {
            BatchStatus::Done => writeln!(
                w,
                "{:<7} {} -> {}",
                entry.kind.as_str(),
                entry.source.display(),
                entry.dest.display()
            )?,
            BatchStatus::Planned => writeln!(
                w,
                "would {verb} {} -> {}",
                entry.source.display(),
                entry.dest.display()
            )?,
            BatchStatus::Unchanged => {}
            BatchStatus::Failed(reason) => {
                writeln!(w, "failed  {}: {}", entry.source.display(), reason)?;
            }
        }
    }
    writeln!(w, "{}", report.summary(verb))
}

pub fn hash_report<W: Write>(w: &mut W, report: &HashReport) -> io::Result<()> {
    errors(w, &report.failures)?;
    for (path, hashes) in &report.hashed {
        writeln!(
            w,
            "{}  {}  {}",
            hashes.fast,
            hashes.strong.as_deref().unwrap_or("-"),
            path.display()
        )?;
    }
    Ok(())
}

pub fn undo<W: Write>(w: &mut W, outcome: &UndoOutcome) -> io::Result<()> {
    match outcome {
        UndoOutcome::NothingToUndo => writeln!(w, "Nothing to undo"),
        UndoOutcome::Undone(op) => writeln!(w, "Undid {}", describe(op)),
        UndoOutcome::Discarded(op) => {
            writeln!(w, "Removed failed {} from the history", describe(op))
        }
    }
}

fn describe(op: &Operation) -> String {
    match op.dest_path {
        Some(ref dest) => format!(
            "{} {} -> {}",
            op.kind,
            op.source_path.display(),
            dest.display()
        ),
        None => format!("{} {}", op.kind, op.source_path.display()),
    }
}

pub fn history<W: Write>(w: &mut W, operations: &[Operation]) -> io::Result<()> {
    if operations.is_empty() {
        return writeln!(w, "No operations recorded");
    }
    for op in operations {
        let id = op.id.map_or_else(|| "-".to_string(), |id| id.to_string());
        write!(
            w,
            "#{id:<5} {} {:<7} {}",
            op.timestamp.format("%Y-%m-%d %H:%M:%S"),
            op.status.as_str(),
            describe(op)
        )?;
        match op.details {
            Some(ref details) => writeln!(w, "  ({details})")?,
            None => writeln!(w)?,
        }
    }
    Ok(())
}
