//! Logging setup for the dupetrail binary.
//!
//! The library only emits records through the `log` facade; the binary owns
//! the `env_logger` backend. The level comes from, in priority order:
//!
//! 1. `RUST_LOG` (if set)
//! 2. `--quiet` (errors only) or `--verbose` (`-v` debug, `-vv` trace)
//! 3. Default: info
//!
//! Debug builds prefix records with a timestamp, and with the module path
//! from `-v` upwards. Release builds print level and message only.
//!
//! ```rust,no_run
//! use dupetrail::logging::init_logging;
//!
//! init_logging(1, false);
//! log::debug!("visible");
//! ```

use env_logger::Builder;
use log::LevelFilter;
use std::env;
use std::io::Write;

/// Crates whose records are capped at `warn` unless tracing.
const NOISY_DEPENDENCIES: &[&str] = &["walkdir", "image", "rusqlite"];

/// Initialize logging once at startup.
///
/// A second call is a no-op (the first logger stays installed).
pub fn init_logging(verbose: u8, quiet: bool) {
    let mut builder = Builder::new();
    let from_env = env::var("RUST_LOG").ok();

    let level = if let Some(ref filters) = from_env {
        builder.parse_filters(filters);
        None
    } else {
        let level = determine_level(verbose, quiet);
        builder.filter_level(level);
        if level < LevelFilter::Trace {
            for module in NOISY_DEPENDENCIES {
                builder.filter_module(module, level.min(LevelFilter::Warn));
            }
        }
        Some(level)
    };

    configure_format(&mut builder, verbose);
    if builder.try_init().is_err() {
        return;
    }

    match level {
        Some(level) => log::debug!("Logging initialized at level {:?}", level),
        None => log::debug!("Logging initialized from RUST_LOG={:?}", from_env),
    }
}

/// Level selected by the CLI flags; `quiet` wins over `verbose`.
fn determine_level(verbose: u8, quiet: bool) -> LevelFilter {
    match (quiet, verbose) {
        (true, _) => LevelFilter::Error,
        (false, 0) => LevelFilter::Info,
        (false, 1) => LevelFilter::Debug,
        (false, _) => LevelFilter::Trace,
    }
}

fn configure_format(builder: &mut Builder, verbose: u8) {
    #[cfg(debug_assertions)]
    {
        builder.format(move |buf, record| {
            let level = record.level();
            let style = buf.default_level_style(level);
            let timestamp = buf.timestamp_seconds();
            if verbose >= 1 {
                writeln!(
                    buf,
                    "{timestamp} {style}{:<5}{style:#} [{}] {}",
                    level,
                    record.module_path().unwrap_or("unknown"),
                    record.args()
                )
            } else {
                writeln!(buf, "{timestamp} {style}{:<5}{style:#} {}", level, record.args())
            }
        });
    }

    #[cfg(not(debug_assertions))]
    {
        let _ = verbose;
        builder.format(|buf, record| {
            let level = record.level();
            let style = buf.default_level_style(level);
            writeln!(buf, "{style}{:<5}{style:#} {}", level, record.args())
        });
    }
}
