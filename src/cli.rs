//! Command-line interface definitions.
//!
//! # Example
//!
//! ```bash
//! # Scan a library and a download folder, report duplicates (dry run)
//! mediadedupe run --media audio --reference ~/Music --path ~/Downloads
//!
//! # Same, but delete the duplicates in ~/Downloads to the trash
//! mediadedupe run --media audio --reference ~/Music --path ~/Downloads --delete --trash
//!
//! # Resolve against existing records only, as JSON
//! mediadedupe report --media image --output json
//!
//! # Write a starter config file
//! mediadedupe init-config
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::actions::delete::DeletionMode;
use crate::canon::MediaKind;
use crate::config::{ConfigOverrides, SearchPath};
use crate::output::OutputFormat;

/// Find and remove media files whose decoded content is identical.
///
/// Files are compared by the fingerprint of their decoded samples or pixels,
/// so copies that differ only in tags or container are still duplicates.
/// Files under reference directories are never deleted.
#[derive(Debug, Parser)]
#[command(name = "mediadedupe")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Print fatal errors as JSON on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Scan search paths, then resolve duplicates
    Run(RunArgs),
    /// Scan search paths without resolving
    Scan(ScanArgs),
    /// Resolve against existing records without scanning or deleting
    Report(ReportArgs),
    /// Remove every record from the store
    Clear(StoreArgs),
    /// Write a starter config file
    InitConfig(InitConfigArgs),
}

/// Options selecting configuration and the record store.
#[derive(Debug, Clone, Default, Args)]
pub struct StoreArgs {
    /// Config file (default: config.toml in the platform config dir)
    #[arg(short, long, value_name = "FILE", env = "MEDIADEDUPE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Record store database file
    #[arg(long, value_name = "FILE")]
    pub database: Option<PathBuf>,

    /// Media domain: audio or image
    #[arg(short, long, value_name = "KIND")]
    pub media: Option<MediaKind>,
}

impl StoreArgs {
    /// Command-line layer of the configuration, for commands that never scan.
    #[must_use]
    pub fn overrides(&self) -> ConfigOverrides {
        let mut overrides = ConfigOverrides::default();
        self.apply(&mut overrides);
        overrides.should_scan_files = Some(false);
        overrides
    }

    fn apply(&self, overrides: &mut ConfigOverrides) {
        overrides.media = self.media;
        overrides.database.clone_from(&self.database);
    }
}

/// Options describing what to scan.
#[derive(Debug, Clone, Default, Args)]
pub struct TargetArgs {
    /// Reference directory; files here are never deleted (repeatable)
    #[arg(short, long = "reference", value_name = "DIR")]
    pub references: Vec<PathBuf>,

    /// Non-reference directory; duplicates here may be deleted (repeatable)
    #[arg(short, long = "path", value_name = "DIR")]
    pub paths: Vec<PathBuf>,

    /// File extension to scan, replacing the media default (repeatable)
    #[arg(short = 't', long = "type", value_name = "EXT")]
    pub types: Vec<String>,

    /// Number of files canonicalized concurrently
    #[arg(short, long, value_name = "N")]
    pub workers: Option<usize>,

    /// External audio decoder program
    #[arg(long, value_name = "PROGRAM")]
    pub decoder: Option<PathBuf>,
}

impl TargetArgs {
    /// Search paths given on the command line, references first.
    #[must_use]
    pub fn search_paths(&self) -> Vec<SearchPath> {
        self.references
            .iter()
            .map(SearchPath::reference)
            .chain(self.paths.iter().map(SearchPath::new))
            .collect()
    }

    fn apply(&self, overrides: &mut ConfigOverrides) {
        let search_paths = self.search_paths();
        if !search_paths.is_empty() {
            overrides.search_paths = Some(search_paths);
        }
        if !self.types.is_empty() {
            overrides.supported_file_types = Some(self.types.clone());
        }
        overrides.workers = self.workers;
        overrides.decoder.clone_from(&self.decoder);
    }
}

/// Arguments for the run subcommand.
#[derive(Debug, Clone, Default, Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[command(flatten)]
    pub targets: TargetArgs,

    /// Skip scanning; resolve against existing records only
    #[arg(long)]
    pub no_scan: bool,

    /// Delete non-reference duplicates instead of only reporting them
    #[arg(long)]
    pub delete: bool,

    /// Move deleted files to the system trash instead of unlinking them
    #[arg(long)]
    pub trash: bool,

    /// Report format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,
}

impl RunArgs {
    /// Command-line layer of the configuration.
    #[must_use]
    pub fn overrides(&self) -> ConfigOverrides {
        let mut overrides = ConfigOverrides::default();
        self.store.apply(&mut overrides);
        self.targets.apply(&mut overrides);
        if self.no_scan {
            overrides.should_scan_files = Some(false);
        }
        if self.delete {
            overrides.should_delete_files = Some(true);
        }
        if self.trash {
            overrides.deletion_mode = Some(DeletionMode::Trash);
        }
        overrides
    }
}

/// Arguments for the scan subcommand.
#[derive(Debug, Clone, Default, Args)]
pub struct ScanArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[command(flatten)]
    pub targets: TargetArgs,

    /// Report format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,
}

impl ScanArgs {
    /// Command-line layer of the configuration.
    #[must_use]
    pub fn overrides(&self) -> ConfigOverrides {
        let mut overrides = ConfigOverrides::default();
        self.store.apply(&mut overrides);
        self.targets.apply(&mut overrides);
        overrides.should_scan_files = Some(true);
        overrides
    }
}

/// Arguments for the report subcommand.
#[derive(Debug, Clone, Default, Args)]
pub struct ReportArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Report format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,
}

impl ReportArgs {
    /// Command-line layer of the configuration. Never scans or deletes.
    #[must_use]
    pub fn overrides(&self) -> ConfigOverrides {
        let mut overrides = ConfigOverrides::default();
        self.store.apply(&mut overrides);
        overrides.should_scan_files = Some(false);
        overrides.should_delete_files = Some(false);
        overrides
    }
}

/// Arguments for the init-config subcommand.
#[derive(Debug, Clone, Args)]
pub struct InitConfigArgs {
    /// Destination (default: config.toml in the platform config dir)
    #[arg(value_name = "FILE")]
    pub path: Option<PathBuf>,

    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}
