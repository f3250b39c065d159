//! Scan orchestration: walk search paths and record a fingerprint for every
//! candidate file not yet in the store.
//!
//! # Overview
//!
//! Search paths are processed in the order they are configured. Within one
//! path the candidates are collected first and then fanned out over a bounded
//! rayon pool; each unit of work is independent:
//!
//! 1. skip the file if the store already has a record for its path
//! 2. canonicalize it into a scratch file
//! 3. stream the canonical content through the fingerprinter
//! 4. upsert the record with the search path's reference flag
//!
//! A failure in any step is logged with the file path, collected in the
//! [`ScanSummary`] and the scan moves on. Because the reference flag is fixed
//! by the first search path that records a file, nested or overlapping search
//! paths resolve to the one listed first.
//!
//! Search paths are canonicalized before walking, so a root given through
//! `..` or a symlink records the same paths as its real location and cannot
//! record a reference file a second time under another name.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::prelude::*;

use super::{FileTypes, ScanError, Walker};
use crate::canon::Canonicalizer;
use crate::config::SearchPath;
use crate::fingerprint::{fingerprint_reader, Fingerprint};
use crate::progress::ProgressCallback;
use crate::store::RecordStore;

/// Default number of concurrent units of work.
pub const DEFAULT_WORKERS: usize = 4;

/// Configuration for a scan run.
#[derive(Clone)]
pub struct ScanConfig {
    /// Directories to scan, in order
    pub search_paths: Vec<SearchPath>,
    /// Extension allow-list
    pub file_types: FileTypes,
    /// Size of the worker pool
    pub workers: usize,
    /// Optional shutdown flag for graceful termination
    pub shutdown_flag: Option<Arc<AtomicBool>>,
    /// Optional progress callback
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for ScanConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanConfig")
            .field("search_paths", &self.search_paths)
            .field("file_types", &self.file_types)
            .field("workers", &self.workers)
            .field("shutdown_flag", &self.shutdown_flag.is_some())
            .field("progress_callback", &self.progress_callback.is_some())
            .finish()
    }
}

impl ScanConfig {
    /// Create a configuration with the default worker count.
    #[must_use]
    pub fn new(search_paths: Vec<SearchPath>, file_types: FileTypes) -> Self {
        Self {
            search_paths,
            file_types,
            workers: DEFAULT_WORKERS,
            shutdown_flag: None,
            progress_callback: None,
        }
    }

    /// Set the worker count (at least 1).
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Set the shutdown flag.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }
}

/// What happened to one candidate file.
#[derive(Debug)]
enum Outcome {
    Recorded(Fingerprint),
    AlreadyRecorded,
    Failed(ScanError),
    Interrupted,
}

/// Statistics and failures from a scan run.
#[derive(Debug, Default)]
pub struct ScanSummary {
    /// Files that matched the allow-list
    pub candidates: usize,
    /// Candidates skipped because the store already had them
    pub already_recorded: usize,
    /// Candidates newly fingerprinted and recorded
    pub recorded: usize,
    /// Per-file failures, in search path order
    pub failures: Vec<ScanError>,
    /// Whether the scan stopped early on a shutdown request
    pub interrupted: bool,
    /// Wall-clock time of the scan
    pub duration: Duration,
}

impl ScanSummary {
    /// Whether any file failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Paths of the files that failed.
    pub fn failed_paths(&self) -> impl Iterator<Item = &Path> {
        self.failures.iter().map(ScanError::path)
    }
}

/// Drives candidates through canonicalization, fingerprinting and the store.
pub struct Scanner<'a, S: RecordStore> {
    store: &'a S,
    canonicalizer: &'a dyn Canonicalizer,
    config: ScanConfig,
}

impl<'a, S: RecordStore> Scanner<'a, S> {
    /// Create a scanner writing to `store`.
    #[must_use]
    pub fn new(store: &'a S, canonicalizer: &'a dyn Canonicalizer, config: ScanConfig) -> Self {
        Self {
            store,
            canonicalizer,
            config,
        }
    }

    /// Run the scan over every configured search path.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::NotFound`] or [`ScanError::NotADirectory`] if a
    /// search path is unusable. This is checked for every path before any
    /// file is touched. All per-file problems land in
    /// [`ScanSummary::failures`] instead.
    pub fn scan(&self) -> Result<ScanSummary, ScanError> {
        let start = Instant::now();
        let mut summary = ScanSummary::default();

        let walkers = self
            .config
            .search_paths
            .iter()
            .map(|sp| -> Result<_, ScanError> {
                Walker::new(&sp.path, self.config.file_types.clone()).validate_root()?;
                let root = std::fs::canonicalize(&sp.path).map_err(|source| ScanError::Io {
                    path: sp.path.clone(),
                    source,
                })?;
                log::debug!("Search path {} resolves to {}", sp.path.display(), root.display());
                let walker = Walker::new(&root, self.config.file_types.clone());
                let walker = match self.config.shutdown_flag {
                    Some(ref flag) => walker.with_shutdown_flag(Arc::clone(flag)),
                    None => walker,
                };
                Ok((sp, walker))
            })
            .collect::<Result<Vec<_>, ScanError>>()?;

        let pool = match rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.workers.max(1))
            .thread_name(|i| format!("mediadedupe-scan-{}", i))
            .build()
        {
            Ok(pool) => Some(pool),
            Err(e) => {
                log::warn!("Failed to create scan thread pool, using global pool: {}", e);
                None
            }
        };

        for (search_path, walker) in walkers {
            if self.config.is_shutdown_requested() {
                summary.interrupted = true;
                break;
            }

            let mut candidates = Vec::new();
            for entry in walker.walk() {
                match entry {
                    Ok(path) => candidates.push(path),
                    Err(e) => summary.failures.push(e),
                }
            }
            summary.candidates += candidates.len();

            log::info!(
                "Scanning {} ({} candidates, {})",
                search_path.path.display(),
                candidates.len(),
                if search_path.is_reference {
                    "reference"
                } else {
                    "non-reference"
                }
            );

            let phase = format!("scan {}", search_path.path.display());
            if let Some(ref callback) = self.config.progress_callback {
                callback.on_phase_start(&phase, candidates.len());
            }

            let outcomes = match pool {
                Some(ref pool) => pool.install(|| self.process_all(&candidates, search_path)),
                None => self.process_all(&candidates, search_path),
            };

            if let Some(ref callback) = self.config.progress_callback {
                callback.on_phase_end(&phase);
            }

            for (path, outcome) in candidates.iter().zip(outcomes) {
                match outcome {
                    Outcome::Recorded(fingerprint) => {
                        log::debug!("Recorded {} ({})", path.display(), fingerprint);
                        summary.recorded += 1;
                    }
                    Outcome::AlreadyRecorded => summary.already_recorded += 1,
                    Outcome::Failed(e) => {
                        log::error!("Skipping {}: {}", path.display(), e);
                        summary.failures.push(e);
                    }
                    Outcome::Interrupted => summary.interrupted = true,
                }
            }
        }

        if self.config.is_shutdown_requested() {
            summary.interrupted = true;
        }
        summary.duration = start.elapsed();

        log::info!(
            "Scan complete: {} candidates, {} recorded, {} already recorded, {} failed{}",
            summary.candidates,
            summary.recorded,
            summary.already_recorded,
            summary.failures.len(),
            if summary.interrupted { " (interrupted)" } else { "" }
        );

        Ok(summary)
    }

    fn process_all(&self, candidates: &[PathBuf], search_path: &SearchPath) -> Vec<Outcome> {
        let done = AtomicUsize::new(0);
        candidates
            .par_iter()
            .map(|path| {
                if self.config.is_shutdown_requested() {
                    return Outcome::Interrupted;
                }
                let outcome = self.process(path, search_path.is_reference);
                let current = done.fetch_add(1, Ordering::Relaxed) + 1;
                if let Some(ref callback) = self.config.progress_callback {
                    callback.on_progress(current, path.to_string_lossy().as_ref());
                }
                outcome
            })
            .collect()
    }

    /// One unit of work. Nothing is written unless every step succeeds.
    fn process(&self, path: &Path, is_reference: bool) -> Outcome {
        match self.store.exists(path) {
            Ok(true) => {
                log::trace!("Already recorded: {}", path.display());
                return Outcome::AlreadyRecorded;
            }
            Ok(false) => {}
            Err(source) => {
                return Outcome::Failed(ScanError::Store {
                    path: path.to_path_buf(),
                    source,
                })
            }
        }

        log::info!("{}", path.display());

        let content = match self.canonicalizer.canonicalize(path) {
            Ok(content) => content,
            Err(e) => return Outcome::Failed(e.into()),
        };

        let fingerprint = match fingerprint_reader(content) {
            Ok(fp) => fp,
            Err(source) => {
                return Outcome::Failed(ScanError::Fingerprint {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        match self.store.upsert(path, &fingerprint, is_reference) {
            Ok(()) => Outcome::Recorded(fingerprint),
            Err(source) => Outcome::Failed(ScanError::Store {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}
