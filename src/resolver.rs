//! Duplicate resolution over the record store.
//!
//! # Overview
//!
//! Resolution runs two passes, both driven off the reference records:
//!
//! * **Pass A**: every non-reference record sharing a fingerprint with a
//!   reference record is a duplicate. In dry-run mode it is reported; with
//!   deletion enabled its record is removed first and then the file, if it is
//!   still there. All such duplicates are swept, not just the first.
//! * **Pass B**: every pair of distinct reference records sharing a
//!   fingerprint is reported as a collision. Nothing is deleted; both copies
//!   are authoritative and need a human decision.
//!
//! Reference records are never deleted, and groups without any reference
//! member are neither acted on nor reported. A non-reference record that
//! reaches the same file on disk as its reference (a hard link, or a path
//! recorded through a `..` or symlinked alias) is reported as aliased and
//! left alone, together with its record.
//!
//! A store error inside one group is logged and resolution moves on to the
//! next reference record. A failed file removal after its record is gone is
//! reported but never rolled back.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytesize::ByteSize;
use serde::Serialize;

use crate::actions::delete::{remove_file, same_file, DeletionMode, RemoveOutcome};
use crate::store::{MediaRecord, RecordStore, StoreError};

/// Options controlling resolution.
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    /// Delete duplicates instead of only reporting them
    pub delete: bool,
    /// How files are removed when `delete` is set
    pub deletion_mode: DeletionMode,
    /// Optional shutdown flag, checked between reference records
    pub shutdown_flag: Option<Arc<AtomicBool>>,
}

impl ResolveOptions {
    /// Report-only options.
    #[must_use]
    pub fn dry_run() -> Self {
        Self::default()
    }

    /// Options that delete duplicates using `mode`.
    #[must_use]
    pub fn deleting(mode: DeletionMode) -> Self {
        Self {
            delete: true,
            deletion_mode: mode,
            shutdown_flag: None,
        }
    }

    /// Set the shutdown flag.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }
}

/// A non-reference file that duplicates a reference file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicatePair {
    /// The non-reference copy
    pub duplicate: PathBuf,
    /// The reference copy it duplicates
    pub original: PathBuf,
}

/// A duplicate that was removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Removal {
    /// The removed copy
    pub path: PathBuf,
    /// The reference copy that was kept
    pub original: PathBuf,
    /// Bytes freed on disk (zero if the file was already gone)
    pub bytes: u64,
}

/// A duplicate whose record was removed but whose file could not be.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteFailure {
    /// The file that is still on disk
    pub path: PathBuf,
    /// The reference copy it duplicates
    pub original: PathBuf,
    /// Why removal failed
    pub error: String,
}

/// Two reference files with the same canonical content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferenceCollision {
    /// The reference record being visited
    pub first: PathBuf,
    /// The other reference record with the same fingerprint
    pub second: PathBuf,
}

/// Everything a resolution run found or did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Resolution {
    /// Duplicates that would be removed (dry run only)
    pub deletable: Vec<DuplicatePair>,
    /// Duplicates that were removed
    pub removed: Vec<Removal>,
    /// Removals whose file deletion failed
    pub delete_failures: Vec<DeleteFailure>,
    /// Reference collisions, once per ordered pair
    pub reference_collisions: Vec<ReferenceCollision>,
    /// Non-reference records that are the reference file itself
    pub aliased: Vec<DuplicatePair>,
    /// Reference records whose group could not be processed
    pub group_failures: usize,
    /// Whether resolution stopped early on a shutdown request
    pub interrupted: bool,
}

/// Counts derived from a [`Resolution`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResolutionSummary {
    /// Number of reportable duplicates (dry run)
    pub deletable: usize,
    /// Number of removed duplicates
    pub removed: usize,
    /// Bytes freed by removals
    pub bytes_freed: u64,
    /// Number of failed file removals
    pub delete_failures: usize,
    /// Number of reference collision pairs
    pub reference_collisions: usize,
    /// Number of records skipped as aliases of their reference
    pub aliased: usize,
    /// Number of groups skipped because of store errors
    pub group_failures: usize,
}

impl Resolution {
    /// Aggregate counts.
    #[must_use]
    pub fn summary(&self) -> ResolutionSummary {
        ResolutionSummary {
            deletable: self.deletable.len(),
            removed: self.removed.len(),
            bytes_freed: self.bytes_freed(),
            delete_failures: self.delete_failures.len(),
            reference_collisions: self.reference_collisions.len(),
            aliased: self.aliased.len(),
            group_failures: self.group_failures,
        }
    }

    /// Total bytes freed by removals.
    #[must_use]
    pub fn bytes_freed(&self) -> u64 {
        self.removed.iter().map(|r| r.bytes).sum()
    }

    /// Bytes freed as a human-readable string.
    #[must_use]
    pub fn bytes_freed_display(&self) -> String {
        ByteSize(self.bytes_freed()).to_string()
    }

    /// Whether any duplicate or collision was found.
    #[must_use]
    pub fn found_anything(&self) -> bool {
        !(self.deletable.is_empty()
            && self.removed.is_empty()
            && self.delete_failures.is_empty()
            && self.reference_collisions.is_empty())
    }

    /// Whether some part of the run did not complete.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.delete_failures.is_empty() || self.group_failures > 0
    }
}

/// Applies the deletion policy and collects collision reports.
pub struct Resolver<'a, S: RecordStore> {
    store: &'a S,
    options: ResolveOptions,
}

impl<'a, S: RecordStore> Resolver<'a, S> {
    /// Create a resolver over `store`.
    #[must_use]
    pub fn new(store: &'a S, options: ResolveOptions) -> Self {
        Self { store, options }
    }

    /// Run Pass A then Pass B.
    ///
    /// Must only run once scanning has finished, so both passes see the final
    /// state of the store.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the reference records cannot be listed at
    /// all. Errors within a single group are logged and counted instead.
    pub fn resolve(&self) -> Result<Resolution, StoreError> {
        let mut resolution = Resolution::default();

        log::info!(
            "Resolving duplicates ({})",
            if self.options.delete {
                format!("deleting, {}", self.options.deletion_mode)
            } else {
                "dry run".to_string()
            }
        );

        self.sweep_non_reference(&mut resolution)?;
        if !resolution.interrupted {
            self.report_reference_collisions(&mut resolution)?;
        }
        if self.options.is_shutdown_requested() {
            resolution.interrupted = true;
        }

        let summary = resolution.summary();
        log::info!(
            "Resolution complete: {} deletable, {} removed ({}), {} failed, {} reference collisions",
            summary.deletable,
            summary.removed,
            resolution.bytes_freed_display(),
            summary.delete_failures,
            summary.reference_collisions
        );

        Ok(resolution)
    }

    /// Pass A.
    fn sweep_non_reference(&self, resolution: &mut Resolution) -> Result<(), StoreError> {
        for reference in self.store.iter_with(true) {
            if self.options.is_shutdown_requested() {
                log::debug!("Pass A: Shutdown requested, stopping");
                resolution.interrupted = true;
                break;
            }
            let reference = reference?;

            let duplicates = match self.store.find_by_fingerprint(&reference.fingerprint, false) {
                Ok(d) => d,
                Err(e) => {
                    log::error!(
                        "Skipping duplicates of {}: {}",
                        reference.path.display(),
                        e
                    );
                    resolution.group_failures += 1;
                    continue;
                }
            };

            for duplicate in duplicates {
                if same_file(&duplicate.path, &reference.path) {
                    log::warn!(
                        "Not a duplicate: {} is the same file as reference {}",
                        duplicate.path.display(),
                        reference.path.display()
                    );
                    resolution.aliased.push(DuplicatePair {
                        duplicate: duplicate.path,
                        original: reference.path.clone(),
                    });
                    continue;
                }
                if self.options.delete {
                    self.remove(&reference, duplicate, resolution);
                } else {
                    log::info!(
                        "Deletable: {} duplicates {}",
                        duplicate.path.display(),
                        reference.path.display()
                    );
                    resolution.deletable.push(DuplicatePair {
                        duplicate: duplicate.path,
                        original: reference.path.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// One logical removal: the record first, then the file.
    fn remove(&self, reference: &MediaRecord, duplicate: MediaRecord, resolution: &mut Resolution) {
        debug_assert!(!duplicate.is_reference);

        match self.store.delete(&duplicate.path) {
            Ok(true) => {}
            Ok(false) => {
                log::debug!("Record already gone: {}", duplicate.path.display());
                return;
            }
            Err(e) => {
                log::error!("Cannot remove record for {}: {}", duplicate.path.display(), e);
                resolution.group_failures += 1;
                return;
            }
        }

        match remove_file(&duplicate.path, self.options.deletion_mode) {
            Ok(outcome) => {
                if outcome == RemoveOutcome::AlreadyAbsent {
                    log::info!(
                        "Removed {} (file was already gone; duplicate of {})",
                        duplicate.path.display(),
                        reference.path.display()
                    );
                } else {
                    log::info!(
                        "Removed {} (duplicate of {})",
                        duplicate.path.display(),
                        reference.path.display()
                    );
                }
                resolution.removed.push(Removal {
                    path: duplicate.path,
                    original: reference.path.clone(),
                    bytes: outcome.bytes(),
                });
            }
            Err(e) => {
                log::error!(
                    "Record removed but file kept {}: {}",
                    duplicate.path.display(),
                    e
                );
                resolution.delete_failures.push(DeleteFailure {
                    path: duplicate.path,
                    original: reference.path.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    /// Pass B.
    fn report_reference_collisions(&self, resolution: &mut Resolution) -> Result<(), StoreError> {
        for reference in self.store.iter_with(true) {
            if self.options.is_shutdown_requested() {
                log::debug!("Pass B: Shutdown requested, stopping");
                resolution.interrupted = true;
                break;
            }
            let reference = reference?;

            let others = match self.store.find_by_fingerprint(&reference.fingerprint, true) {
                Ok(o) => o,
                Err(e) => {
                    log::error!(
                        "Skipping collision check for {}: {}",
                        reference.path.display(),
                        e
                    );
                    resolution.group_failures += 1;
                    continue;
                }
            };

            for other in others.into_iter().filter(|o| o.id != reference.id) {
                log::warn!(
                    "Duplicate reference: {} == {}",
                    reference.path.display(),
                    other.path.display()
                );
                resolution.reference_collisions.push(ReferenceCollision {
                    first: reference.path.clone(),
                    second: other.path,
                });
            }
        }
        Ok(())
    }
}
