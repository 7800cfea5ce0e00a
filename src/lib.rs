//! DupeTrail - duplicate file detection with a reversible operation log
//!
//! Files under one or more roots are recorded in a SQLite store, grouped by
//! content (XXH64 pre-filter, BLAKE3 confirmation) or by similarity
//! (perceptual image hashes, audio tags and fingerprints), and reduced to
//! one copy with every rename, move, copy and delete logged for undo.

pub mod actions;
pub mod cli;
pub mod config;
pub mod duplicates;
pub mod engine;
pub mod enumerate;
pub mod error;
pub mod hasher;
pub mod logging;
pub mod metadata;
pub mod model;
pub mod output;
pub mod progress;
pub mod registry;
pub mod signal;
pub mod similarity;
pub mod store;

use std::io::{self, IsTerminal};
use std::sync::Arc;

use anyhow::Context;

use cli::{Cli, Commands, ConfigAction, ConfigArgs, SimilarKind};
use engine::{Engine, NearKind};
use error::ExitCode;
use output::{Output, OutputFormat};
use registry::Providers;

/// Run one CLI invocation and return the exit code it should produce.
///
/// # Errors
///
/// Returns an error if configuration, the store or a command fails as a
/// whole. Per-file failures are reported in the output and reflected in
/// the exit code instead.
pub fn run_app(cli: Cli) -> anyhow::Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet);

    if let Commands::Config(ConfigArgs {
        action: ConfigAction::Init { ref path, force },
    }) = cli.command
    {
        let written = config::write_default(path.as_deref().or(cli.config.as_deref()), force)?;
        if !cli.quiet {
            println!("Wrote {}", written.display());
        }
        return Ok(ExitCode::Success);
    }

    let mut config =
        config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    cli.apply_overrides(&mut config);

    if let Commands::Config(_) = cli.command {
        print!("{}", config::to_toml(&config)?);
        return Ok(ExitCode::Success);
    }

    let handler = signal::install_handler()?;
    let providers = Arc::new(Providers::with_defaults()?);
    let audio_defaults = config.audio;
    let mut engine = Engine::open(config, providers)
        .context("Failed to open the store")?
        .with_shutdown_flag(handler.get_flag());
    if !cli.quiet && cli.output == OutputFormat::Text && io::stderr().is_terminal() {
        engine = engine.with_progress_callback(Arc::new(progress::Progress::new(cli.quiet)));
    }

    let stdout = io::stdout();
    let mut out = Output::new(cli.output, stdout.lock());

    let code = match cli.command {
        Commands::Scan(ref args) => {
            let report = engine.scan(&args.paths, &args.extensions)?;
            out.scan_report(&report)?;
            ExitCode::from_counts(report.files, report.errors.len(), report.interrupted)
        }
        Commands::Duplicates(_) => {
            let report = engine.find_exact_duplicates()?;
            out.exact_report(&report)?;
            ExitCode::from_counts(report.groups.len(), report.failures.len(), report.interrupted)
        }
        Commands::Similar(ref args) => match args.kind {
            SimilarKind::Image(ref image) => match image.reference {
                Some(ref reference) => {
                    let matches = engine.find_similar_images(reference, image.threshold)?;
                    out.similar_matches(reference, &matches)?;
                    ExitCode::from_counts(matches.len(), 0, false)
                }
                None => {
                    let report = engine.find_near_duplicates(NearKind::Image)?;
                    out.near_report(&report)?;
                    ExitCode::from_counts(report.group_count(), 0, false)
                }
            },
            SimilarKind::Audio(ref audio) => {
                let options = audio.options(audio_defaults).map_err(anyhow::Error::msg)?;
                let report = engine.find_near_duplicates(NearKind::Audio(options))?;
                out.near_report(&report)?;
                ExitCode::from_counts(report.group_count(), 0, false)
            }
        },
        Commands::DeleteDuplicates(ref args) => {
            let plan = engine.plan_deletions(args.keep)?;
            let report = engine.execute_delete_plan(&plan, args.confirm)?;
            out.delete_report(&plan, &report)?;
            let done = if args.confirm {
                report.deleted
            } else {
                report.would_delete
            };
            ExitCode::from_counts(done, report.failed, false)
        }
        Commands::Rename(ref args) => {
            let report =
                engine.rename_files(&args.paths, &args.extensions, &args.pattern, args.confirm)?;
            out.batch_report("rename", &report)?;
            ExitCode::from_counts(report.succeeded(), report.failed, false)
        }
        Commands::Organize(ref args) => {
            let rule = actions::OrganizeRule::new(args.by, args.date_format.as_str())?;
            let (transfer, verb) = if args.copy {
                (actions::Transfer::Copy, "copy")
            } else {
                (actions::Transfer::Move, "move")
            };
            let report = engine.organize_files(
                std::slice::from_ref(&args.source),
                &args.extensions,
                &args.dest,
                &rule,
                transfer,
                args.confirm,
            )?;
            out.batch_report(verb, &report)?;
            ExitCode::from_counts(report.succeeded(), report.failed, false)
        }
        Commands::Hash(ref args) => {
            let report = engine.hash_paths(&args.paths, &args.extensions, args.fast_only);
            out.hash_report(&report)?;
            ExitCode::from_counts(report.hashed.len(), report.failures.len(), false)
        }
        Commands::Undo => {
            let outcome = engine.undo_last()?;
            out.undo(&outcome)?;
            match outcome {
                actions::UndoOutcome::NothingToUndo => ExitCode::NothingFound,
                _ => ExitCode::Success,
            }
        }
        Commands::History(ref args) => {
            let operations = engine.history(args.limit)?;
            out.history(&operations)?;
            ExitCode::from_counts(operations.len(), 0, false)
        }
        Commands::Config(_) => ExitCode::Success,
    };

    if handler.is_shutdown_requested() {
        log::warn!("Interrupted");
        return Ok(ExitCode::Interrupted);
    }
    Ok(code)
}
