//! Layered configuration.
//!
//! Settings are merged with `figment`, later layers winning:
//!
//! 1. Built-in defaults ([`EngineConfig::default`])
//! 2. A TOML file: `--config <path>` or `config.toml` in the platform
//!    config directory (e.g. `~/.config/dupetrail/`)
//! 3. `DUPETRAIL_*` environment variables, with `__` separating nested keys
//!    (`DUPETRAIL_AUDIO__TAG_THRESHOLD=0.9`)
//!
//! `dupetrail config init` writes the defaults as TOML.

use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::engine::EngineConfig;
use crate::error::InvalidArgument;

/// Prefix of the environment layer.
pub const ENV_PREFIX: &str = "DUPETRAIL_";

const CONFIG_FILE: &str = "config.toml";
const DATABASE_FILE: &str = "dupetrail.db";

#[derive(Debug, Error)]
pub enum ConfigError {
    /// A layer could not be parsed or has the wrong shape.
    #[error("Invalid configuration: {0}")]
    Parse(#[from] Box<figment::Error>),

    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Configuration file already exists: {0} (use --force to overwrite)")]
    AlreadyExists(PathBuf),

    #[error("Could not determine the configuration directory")]
    NoConfigDir,

    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("I/O error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Invalid(#[from] InvalidArgument),
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("org", "dupetrail", "dupetrail")
}

/// `config.toml` in the platform config directory.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE))
}

/// Database in the platform data directory, or the working directory.
#[must_use]
pub fn default_database_path() -> PathBuf {
    project_dirs().map_or_else(
        || PathBuf::from(DATABASE_FILE),
        |dirs| dirs.data_dir().join(DATABASE_FILE),
    )
}

/// The merged provider stack for `explicit` (or the default file).
///
/// # Errors
///
/// Returns [`ConfigError::NotFound`] if an explicit file does not exist.
/// A missing default file is not an error.
pub fn figment(explicit: Option<&Path>) -> Result<Figment, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(EngineConfig::default()));
    match explicit {
        Some(path) => {
            if !path.is_file() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            figment = figment.merge(Toml::file(path));
        }
        None => {
            if let Some(path) = default_config_path() {
                log::trace!("Looking for configuration at {}", path.display());
                figment = figment.merge(Toml::file(path));
            }
        }
    }
    Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
}

/// Load and validate the configuration.
///
/// # Errors
///
/// Returns [`ConfigError`] if a layer is malformed or a value is invalid.
pub fn load(explicit: Option<&Path>) -> Result<EngineConfig, ConfigError> {
    extract(&figment(explicit)?)
}

/// Extract and validate an [`EngineConfig`] from any figment.
///
/// # Errors
///
/// Same as [`load`].
pub fn extract(figment: &Figment) -> Result<EngineConfig, ConfigError> {
    let config: EngineConfig = figment.extract().map_err(Box::new)?;
    config.validate()?;
    log::debug!(
        "Configuration loaded: database={}, hasher={}",
        config.database.display(),
        config.hasher
    );
    Ok(config)
}

/// Render a configuration as TOML.
///
/// # Errors
///
/// Returns [`ConfigError::Serialize`] if serialization fails.
pub fn to_toml(config: &EngineConfig) -> Result<String, ConfigError> {
    Ok(toml::to_string_pretty(config)?)
}

/// Write the default configuration to `path` (or the default location).
///
/// # Errors
///
/// Returns [`ConfigError::AlreadyExists`] unless `force` is set, or an I/O
/// error if the file cannot be written.
pub fn write_default(path: Option<&Path>, force: bool) -> Result<PathBuf, ConfigError> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => default_config_path().ok_or(ConfigError::NoConfigDir)?,
    };
    if path.exists() && !force {
        return Err(ConfigError::AlreadyExists(path));
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let content = to_toml(&EngineConfig::default())?;
    fs::write(&path, content).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    log::info!("Wrote default configuration to {}", path.display());
    Ok(path)
}
