//! Application configuration management.
//!
//! Settings are layered with `figment`, lowest priority first:
//!
//! 1. built-in defaults ([`Config::default`])
//! 2. a TOML file (`--config`, or `config.toml` in the platform config dir)
//! 3. `MEDIADEDUPE_*` environment variables
//! 4. command-line overrides ([`ConfigOverrides`])
//!
//! The resulting [`Config`] is passed explicitly to the scanner and resolver;
//! there is no process-wide configuration state.

use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::actions::delete::DeletionMode;
use crate::canon::audio::DEFAULT_DECODER;
use crate::canon::MediaKind;
use crate::scanner::orchestrator::DEFAULT_WORKERS;
use crate::scanner::FileTypes;

/// Prefix for environment variable overrides.
pub const ENV_PREFIX: &str = "MEDIADEDUPE_";

/// File name of the default configuration file.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A layer could not be parsed or merged.
    #[error("invalid configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    /// An explicitly requested config file does not exist.
    #[error("config file not found: {0}")]
    MissingFile(PathBuf),

    /// Scanning is enabled but there is nothing to scan.
    #[error("no search paths configured (add one with --path or --reference)")]
    NoSearchPaths,

    /// The worker pool needs at least one thread.
    #[error("workers must be at least 1")]
    InvalidWorkers,

    /// The extension allow-list is empty.
    #[error("supported_file_types is empty; nothing would be scanned")]
    EmptyFileTypes,

    /// No platform data directory to place the default database in.
    #[error("cannot determine a data directory; set `database` explicitly")]
    NoDataDir,

    /// The config file could not be written.
    #[error("cannot write {path}: {source}")]
    Write {
        /// Destination file
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The config could not be rendered as TOML.
    #[error("cannot serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(e: figment::Error) -> Self {
        Self::Load(Box::new(e))
    }
}

/// A directory to scan and its role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchPath {
    /// Directory to walk
    pub path: PathBuf,
    /// Whether files found here are authoritative copies
    #[serde(default)]
    pub is_reference: bool,
}

impl SearchPath {
    /// A non-reference search path.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            is_reference: false,
        }
    }

    /// A reference search path.
    pub fn reference(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            is_reference: true,
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Media domain to process.
    pub media: MediaKind,
    /// Record store location. Defaults to `<data dir>/<media>.db`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<PathBuf>,
    /// Extension allow-list. Defaults to the media domain's list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supported_file_types: Option<Vec<String>>,
    /// Scan before resolving. When false, resolve existing records only.
    pub should_scan_files: bool,
    /// Delete duplicates. When false, only report them.
    pub should_delete_files: bool,
    /// How duplicates are deleted.
    pub deletion_mode: DeletionMode,
    /// Size of the canonicalization worker pool.
    pub workers: usize,
    /// External audio decoder.
    pub decoder: PathBuf,
    /// Where scratch files go. Defaults to the system temp dir.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scratch_dir: Option<PathBuf>,
    /// Directories to scan, in order. Earlier entries win for nested paths.
    pub search_paths: Vec<SearchPath>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            media: MediaKind::default(),
            database: None,
            supported_file_types: None,
            should_scan_files: true,
            should_delete_files: false,
            deletion_mode: DeletionMode::default(),
            workers: DEFAULT_WORKERS,
            decoder: PathBuf::from(DEFAULT_DECODER),
            scratch_dir: None,
            search_paths: Vec::new(),
        }
    }
}

/// Values given on the command line. Unset fields leave lower layers alone.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media: Option<MediaKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supported_file_types: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub should_scan_files: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub should_delete_files: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deletion_mode: Option<DeletionMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decoder: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_paths: Option<Vec<SearchPath>>,
}

impl Config {
    /// Load configuration from every layer.
    ///
    /// `config_file` must exist when given. Without it, the default config
    /// file is used if present.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if a layer is malformed or the requested
    /// file is missing. The result is not validated; see [`Config::validate`].
    pub fn load(
        config_file: Option<&Path>,
        overrides: &ConfigOverrides,
    ) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));

        match config_file {
            Some(path) => {
                if !path.is_file() {
                    return Err(ConfigError::MissingFile(path.to_path_buf()));
                }
                log::debug!("Loading config from {}", path.display());
                figment = figment.merge(Toml::file(path));
            }
            None => {
                if let Some(path) = Self::default_config_path().filter(|p| p.is_file()) {
                    log::debug!("Loading config from {}", path.display());
                    figment = figment.merge(Toml::file(path));
                }
            }
        }

        let config: Config = figment
            .merge(Env::prefixed(ENV_PREFIX))
            .merge(Serialized::globals(overrides))
            .extract()?;
        Ok(config)
    }

    /// Check that the configuration can drive a run.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::InvalidWorkers);
        }
        if self.file_types().is_empty() {
            return Err(ConfigError::EmptyFileTypes);
        }
        if self.should_scan_files && self.search_paths.is_empty() {
            return Err(ConfigError::NoSearchPaths);
        }
        Ok(())
    }

    /// The effective extension allow-list.
    #[must_use]
    pub fn file_types(&self) -> FileTypes {
        match self.supported_file_types {
            Some(ref types) => FileTypes::new(types),
            None => FileTypes::new(self.media.default_file_types()),
        }
    }

    /// The effective record store location.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoDataDir`] if no path is configured and the
    /// platform has no data directory.
    pub fn database_path(&self) -> Result<PathBuf, ConfigError> {
        if let Some(ref path) = self.database {
            return Ok(path.clone());
        }
        let dirs = project_dirs().ok_or(ConfigError::NoDataDir)?;
        Ok(dirs.data_dir().join(format!("{}.db", self.media)))
    }

    /// Default platform-specific configuration file path.
    #[must_use]
    pub fn default_config_path() -> Option<PathBuf> {
        project_dirs().map(|d| d.config_dir().join(CONFIG_FILE_NAME))
    }

    /// Render as TOML.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Serialize`] if rendering fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Write a starter config file with example search paths.
    ///
    /// Refuses to overwrite an existing file unless `force` is set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Write`] if the file exists or cannot be written.
    pub fn write_template(path: &Path, force: bool) -> Result<(), ConfigError> {
        if path.exists() && !force {
            return Err(ConfigError::Write {
                path: path.to_path_buf(),
                source: std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    "file exists (use --force to overwrite)",
                ),
            });
        }

        let template = Config {
            search_paths: vec![
                SearchPath::reference("/path/to/library"),
                SearchPath::new("/path/to/downloads"),
            ],
            ..Config::default()
        };
        let body = format!(
            "# mediadedupe configuration\n\
             # Files in reference search paths are never deleted.\n\
             # Set should_delete_files = true to remove non-reference duplicates.\n\n{}",
            template.to_toml()?
        );

        let write = || -> std::io::Result<()> {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, body)
        };
        write().map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })?;

        log::info!("Wrote config template to {}", path.display());
        Ok(())
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "mediadedupe", "mediadedupe")
}
