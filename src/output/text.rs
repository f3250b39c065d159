//! Plain text report.

use std::io::Write;

use bytesize::ByteSize;

use super::{OutputError, Report};

/// Human-readable report.
pub struct TextOutput<'a> {
    report: Report<'a>,
}

impl<'a> TextOutput<'a> {
    /// Create a text formatter.
    #[must_use]
    pub fn new(report: Report<'a>) -> Self {
        Self { report }
    }

    /// Write the report.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<(), OutputError> {
        if let Some(scan) = self.report.scan {
            writeln!(
                w,
                "Scanned {} candidate(s) in {:.1}s: {} new, {} already recorded, {} failed{}",
                scan.candidates,
                scan.duration.as_secs_f64(),
                scan.recorded,
                scan.already_recorded,
                scan.failures.len(),
                if scan.interrupted { " (interrupted)" } else { "" }
            )?;
            for failure in &scan.failures {
                writeln!(w, "  skipped {}: {}", failure.path().display(), failure)?;
            }
        }

        let Some(resolution) = self.report.resolution else {
            return Ok(());
        };
        if self.report.scan.is_some() {
            writeln!(w)?;
        }

        for pair in &resolution.deletable {
            writeln!(
                w,
                "You can delete {} - it's a duplicate of {}",
                pair.duplicate.display(),
                pair.original.display()
            )?;
        }
        for removal in &resolution.removed {
            writeln!(
                w,
                "Removed {} ({}) - duplicate of {}",
                removal.path.display(),
                ByteSize(removal.bytes),
                removal.original.display()
            )?;
        }
        for failure in &resolution.delete_failures {
            writeln!(
                w,
                "Failed to delete {}: {}",
                failure.path.display(),
                failure.error
            )?;
        }
        for pair in &resolution.aliased {
            writeln!(
                w,
                "Kept {} - same file as reference {}",
                pair.duplicate.display(),
                pair.original.display()
            )?;
        }

        writeln!(w)?;
        writeln!(w, "Duplicate References")?;
        writeln!(w, "--------------------")?;
        if resolution.reference_collisions.is_empty() {
            writeln!(w, "(none)")?;
        }
        for collision in &resolution.reference_collisions {
            writeln!(
                w,
                "{} == {}",
                collision.first.display(),
                collision.second.display()
            )?;
        }

        let summary = resolution.summary();
        writeln!(w)?;
        if self.report.delete_enabled {
            writeln!(
                w,
                "Removed {} duplicate(s), freed {}, {} failure(s), {} reference collision(s)",
                summary.removed,
                ByteSize(summary.bytes_freed),
                summary.delete_failures,
                summary.reference_collisions
            )?;
        } else {
            writeln!(
                w,
                "{} deletable duplicate(s), {} reference collision(s) (dry run; enable deletion to remove)",
                summary.deletable, summary.reference_collisions
            )?;
        }
        if summary.group_failures > 0 {
            writeln!(
                w,
                "{} group(s) skipped because of store errors",
                summary.group_failures
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{DuplicatePair, ReferenceCollision, Removal, Resolution};
    use std::path::PathBuf;

    fn render(report: Report<'_>) -> String {
        let mut out = Vec::new();
        TextOutput::new(report).write_to(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_dry_run_text() {
        let resolution = Resolution {
            deletable: vec![DuplicatePair {
                duplicate: PathBuf::from("/dl/b.mp3"),
                original: PathBuf::from("/lib/a.flac"),
            }],
            reference_collisions: vec![ReferenceCollision {
                first: PathBuf::from("/lib/x.png"),
                second: PathBuf::from("/lib/y.bmp"),
            }],
            ..Resolution::default()
        };
        let text = render(Report::new(None, Some(&resolution), false));
        assert!(text.contains("You can delete /dl/b.mp3 - it's a duplicate of /lib/a.flac"));
        assert!(text.contains("Duplicate References"));
        assert!(text.contains("/lib/x.png == /lib/y.bmp"));
        assert!(text.contains("1 deletable duplicate(s), 1 reference collision(s)"));
    }

    #[test]
    fn test_delete_text() {
        let resolution = Resolution {
            removed: vec![Removal {
                path: PathBuf::from("/dl/b.mp3"),
                original: PathBuf::from("/lib/a.flac"),
                bytes: 2048,
            }],
            ..Resolution::default()
        };
        let text = render(Report::new(None, Some(&resolution), true));
        assert!(text.contains("Removed /dl/b.mp3"));
        assert!(text.contains("(none)"));
        assert!(text.contains("Removed 1 duplicate(s)"));
    }

    #[test]
    fn test_aliased_text() {
        let resolution = Resolution {
            aliased: vec![DuplicatePair {
                duplicate: PathBuf::from("/lib/../lib/a.flac"),
                original: PathBuf::from("/lib/a.flac"),
            }],
            ..Resolution::default()
        };
        let text = render(Report::new(None, Some(&resolution), true));
        assert!(text.contains("Kept /lib/../lib/a.flac - same file as reference /lib/a.flac"));
        assert!(text.contains("Removed 0 duplicate(s)"));
    }

    #[test]
    fn test_scan_only_text() {
        let scan = crate::scanner::ScanSummary {
            candidates: 2,
            recorded: 2,
            ..Default::default()
        };
        let text = render(Report::new(Some(&scan), None, false));
        assert!(text.starts_with("Scanned 2 candidate(s)"));
        assert!(!text.contains("Duplicate References"));
    }
}
