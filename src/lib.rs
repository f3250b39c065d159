//! mediadedupe - content-based media duplicate resolver
//!
//! Files are reduced to a canonical form (decoded PCM samples for audio,
//! decoded pixels for images), fingerprinted with SHA-256 and recorded in a
//! SQLite store. Non-reference files whose fingerprint matches a reference
//! file are reported or deleted; identical reference files are reported.

pub mod actions;
pub mod canon;
pub mod cli;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod logging;
pub mod output;
pub mod progress;
pub mod resolver;
pub mod scanner;
pub mod signal;
pub mod store;

use std::io::Write;
use std::sync::Arc;

use anyhow::Context;
use log::info;

use crate::canon::{AudioCanonicalizer, MediaKind};
use crate::cli::{Cli, Commands, InitConfigArgs, StoreArgs};
use crate::config::{Config, ConfigError, ConfigOverrides};
use crate::error::{EngineError, ExitCode};
use crate::output::{OutputFormat, Report};
use crate::progress::Progress;
use crate::resolver::{ResolveOptions, Resolver};
use crate::scanner::{ScanConfig, ScanSummary, Scanner};
use crate::signal::ShutdownHandler;
use crate::store::SqliteStore;

/// Run one command and return the exit code it should end with.
///
/// The report goes to stdout. Per-file problems show up in the report and
/// the exit code; only fatal problems are returned as errors.
///
/// # Errors
///
/// Returns an error wrapping [`EngineError`] for invalid configuration, an
/// unusable record store or search path, a missing decoder, or interruption.
pub fn run_app(cli: Cli) -> anyhow::Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Run(args) => run(
            &args.store,
            &args.overrides(),
            args.output,
            cli.quiet,
            true,
        ),
        Commands::Scan(args) => run(
            &args.store,
            &args.overrides(),
            args.output,
            cli.quiet,
            false,
        ),
        Commands::Report(args) => run(
            &args.store,
            &args.overrides(),
            args.output,
            cli.quiet,
            true,
        ),
        Commands::Clear(args) => clear(&args, cli.quiet),
        Commands::InitConfig(args) => init_config(&args, cli.quiet),
    }
}

fn load_config(store_args: &StoreArgs, overrides: &ConfigOverrides) -> Result<Config, EngineError> {
    let config = Config::load(store_args.config.as_deref(), overrides)?;
    config.validate()?;
    Ok(config)
}

fn open_store(config: &Config) -> Result<SqliteStore, EngineError> {
    let path = config.database_path()?;
    let store = SqliteStore::open(&path)?;
    info!("Using record store {}", path.display());
    Ok(store)
}

fn run(
    store_args: &StoreArgs,
    overrides: &ConfigOverrides,
    format: OutputFormat,
    quiet: bool,
    resolve: bool,
) -> anyhow::Result<ExitCode> {
    let config = load_config(store_args, overrides)?;
    let store = open_store(&config)?;
    let shutdown = signal::install_handler();

    let scan = if config.should_scan_files {
        let hide_progress = quiet || format != OutputFormat::Text;
        Some(scan_search_paths(&store, &config, &shutdown, hide_progress)?)
    } else {
        None
    };

    let scan_interrupted = scan.as_ref().is_some_and(|s| s.interrupted);
    let resolution = if resolve && !scan_interrupted {
        let options = if config.should_delete_files {
            ResolveOptions::deleting(config.deletion_mode)
        } else {
            ResolveOptions::dry_run()
        }
        .with_shutdown_flag(shutdown.get_flag());
        let resolution = Resolver::new(&store, options)
            .resolve()
            .map_err(EngineError::Store)?;
        Some(resolution)
    } else {
        None
    };

    let report = Report::new(
        scan.as_ref(),
        resolution.as_ref(),
        config.should_delete_files,
    );
    if !(quiet && format == OutputFormat::Text) {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        report
            .write(format, &mut out)
            .context("failed to write report")?;
        out.flush().context("failed to write report")?;
    }

    let code = report.exit_code();
    if code == ExitCode::Interrupted {
        return Err(EngineError::Interrupted.into());
    }
    Ok(code)
}

fn scan_search_paths(
    store: &SqliteStore,
    config: &Config,
    shutdown: &ShutdownHandler,
    hide_progress: bool,
) -> Result<ScanSummary, EngineError> {
    if config.media == MediaKind::Audio
        && !AudioCanonicalizer::new(&config.decoder, None).decoder_available()
    {
        return Err(EngineError::DecoderUnavailable(
            config.decoder.display().to_string(),
        ));
    }

    let canonicalizer = canon::for_kind(config.media, &config.decoder, config.scratch_dir.clone());
    let scan_config = ScanConfig::new(config.search_paths.clone(), config.file_types())
        .with_workers(config.workers)
        .with_shutdown_flag(shutdown.get_flag())
        .with_progress_callback(Arc::new(Progress::new(hide_progress)));

    info!(
        "Scanning {} search path(s) for {} files",
        config.search_paths.len(),
        config.media
    );
    let summary = Scanner::new(store, canonicalizer.as_ref(), scan_config).scan()?;
    Ok(summary)
}

fn clear(args: &StoreArgs, quiet: bool) -> anyhow::Result<ExitCode> {
    let config = load_config(args, &args.overrides())?;
    let store = open_store(&config)?;
    let removed = store.clear().map_err(EngineError::Store)?;
    if !quiet {
        println!("Removed {} record(s)", removed);
    }
    Ok(ExitCode::Success)
}

fn init_config(args: &InitConfigArgs, quiet: bool) -> anyhow::Result<ExitCode> {
    let path = args
        .path
        .clone()
        .or_else(Config::default_config_path)
        .ok_or(EngineError::Config(ConfigError::NoDataDir))?;
    Config::write_template(&path, args.force).map_err(EngineError::Config)?;
    if !quiet {
        println!("Wrote {}", path.display());
    }
    Ok(ExitCode::Success)
}
