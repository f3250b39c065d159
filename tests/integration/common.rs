//! Shared fixtures for integration tests.

use std::fs;
use std::path::{Path, PathBuf};

use mediadedupe::canon::{CanonicalContent, CanonicalizeError, Canonicalizer, MediaKind};
use mediadedupe::config::SearchPath;
use mediadedupe::scanner::{FileTypes, ScanConfig, ScanSummary, Scanner};
use mediadedupe::store::SqliteStore;

/// Test canonicalizer for `.mp3`/`.flac` fixtures.
///
/// A fixture is `<tags>\n<samples>`; only the samples are canonical, so two
/// files differing only in their first line are duplicates. Files starting
/// with `BAD` are rejected as unsupported.
pub struct TagStripper;

impl Canonicalizer for TagStripper {
    fn kind(&self) -> MediaKind {
        MediaKind::Audio
    }

    fn canonicalize(&self, path: &Path) -> Result<CanonicalContent, CanonicalizeError> {
        let bytes = fs::read(path).map_err(|source| CanonicalizeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if bytes.starts_with(b"BAD") {
            return Err(CanonicalizeError::UnsupportedInput {
                path: path.to_path_buf(),
                reason: "unrecognized header".to_string(),
            });
        }
        let samples = match bytes.iter().position(|&b| b == b'\n') {
            Some(i) => &bytes[i + 1..],
            None => &bytes[..],
        };
        CanonicalContent::from_bytes(samples, None).map_err(|source| CanonicalizeError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Write a `<tags>\n<samples>` fixture and return its canonical path, the
/// form the scanner records.
pub fn write_track(dir: &Path, name: &str, tags: &str, samples: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, format!("{}\n{}", tags, samples)).unwrap();
    fs::canonicalize(&path).unwrap()
}

/// Scan `search_paths` into `store` with the tag-stripping canonicalizer.
pub fn scan_tracks(store: &SqliteStore, search_paths: Vec<SearchPath>) -> ScanSummary {
    let config = ScanConfig::new(search_paths, FileTypes::new(["mp3", "flac"])).with_workers(2);
    Scanner::new(store, &TagStripper, config).scan().unwrap()
}

/// Write a small opaque RGB test image; the format follows the extension.
pub fn write_image(path: &Path, seed: u8) {
    let img = image::RgbImage::from_fn(8, 6, |x, y| {
        image::Rgb([
            seed.wrapping_add(x as u8 * 20),
            seed.wrapping_add(y as u8 * 30),
            seed ^ 0x5a,
        ])
    });
    img.save(path).unwrap();
}
