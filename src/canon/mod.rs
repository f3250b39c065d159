//! Canonicalization of media files into container-independent bytes.
//!
//! Two files that differ only in tags (ID3, EXIF) or in lossless container
//! (FLAC vs WAV, BMP vs PNG) must produce the same canonical bytes. Each media
//! domain has its own backend behind the [`Canonicalizer`] trait:
//!
//! * [`image`]: native decode to a fixed RGBA16 raster
//! * [`audio`]: external decoder producing raw signed 16-bit PCM
//!
//! # Scratch files
//!
//! Canonical content is written to a uniquely named scratch file and handed
//! back as a [`CanonicalContent`] reader. The scratch file is removed when the
//! reader is dropped, whether the caller finished reading, failed halfway, or
//! the backend itself returned an error before the content was produced.
//!
//! # Example
//!
//! ```no_run
//! use mediadedupe::canon::{Canonicalizer, ImageCanonicalizer};
//! use mediadedupe::fingerprint::fingerprint_reader;
//! use std::path::Path;
//!
//! let canon = ImageCanonicalizer::new(None);
//! let content = canon.canonicalize(Path::new("photo.png")).unwrap();
//! let fp = fingerprint_reader(content).unwrap();
//! println!("{}", fp);
//! ```

pub mod audio;
pub mod image;

use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;

pub use self::audio::AudioCanonicalizer;
pub use self::image::ImageCanonicalizer;

/// Prefix for every scratch file, so leftovers from a killed process are recognizable.
const SCRATCH_PREFIX: &str = "mediadedupe-";

/// Media domain handled by a canonicalizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Audio files, canonicalized to raw PCM samples.
    Audio,
    /// Still images, canonicalized to an uncompressed raster.
    #[default]
    Image,
}

impl MediaKind {
    /// Default extension allow-list for this domain (upper case).
    #[must_use]
    pub fn default_file_types(self) -> Vec<String> {
        let types: &[&str] = match self {
            Self::Audio => &["FLAC", "MP3"],
            Self::Image => &["JPEG", "JPG", "PNG", "BMP", "TIF", "TIFF"],
        };
        types.iter().map(|t| (*t).to_string()).collect()
    }

    /// Lowercase name, also used as the default database file stem.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Image => "image",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "audio" => Ok(Self::Audio),
            "image" => Ok(Self::Image),
            other => Err(format!("unknown media kind '{}'", other)),
        }
    }
}

/// Errors produced while canonicalizing a single file.
///
/// All variants are per-file: the scan logs them and moves on.
#[derive(Debug, Error)]
pub enum CanonicalizeError {
    /// The decoder could not parse the file.
    #[error("unsupported input {path}: {reason}")]
    UnsupportedInput {
        /// File that was rejected
        path: PathBuf,
        /// Decoder's explanation
        reason: String,
    },

    /// The decoder crashed or produced no usable output.
    #[error("decode failed for {path}: {reason}")]
    DecodeFailure {
        /// File being decoded
        path: PathBuf,
        /// What went wrong
        reason: String,
    },

    /// Reading the source or writing the scratch file failed.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

impl CanonicalizeError {
    /// Path of the file that failed.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::UnsupportedInput { path, .. }
            | Self::DecodeFailure { path, .. }
            | Self::Io { path, .. } => path,
        }
    }
}

/// Converts one media file into canonical content bytes.
///
/// Implementations must be safe to call from many worker threads at once;
/// every call gets its own [`ScratchFile`].
pub trait Canonicalizer: Send + Sync {
    /// Domain this canonicalizer handles.
    fn kind(&self) -> MediaKind;

    /// Produce the canonical content of `path`.
    ///
    /// # Errors
    ///
    /// Returns a [`CanonicalizeError`] describing why this file was skipped.
    fn canonicalize(&self, path: &Path) -> Result<CanonicalContent, CanonicalizeError>;
}

/// A uniquely named scratch file that is deleted on drop.
#[derive(Debug)]
pub struct ScratchFile {
    file: NamedTempFile,
}

impl ScratchFile {
    /// Create an empty scratch file in `dir`, or the system temp dir when `None`.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the file cannot be created.
    pub fn create(dir: Option<&Path>) -> io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(SCRATCH_PREFIX).suffix(".canon");
        let file = match dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        Ok(Self { file })
    }

    /// Location of the scratch file, for handing to external decoders.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Buffered writer over the scratch file.
    pub fn writer(&mut self) -> BufWriter<&mut File> {
        BufWriter::new(self.file.as_file_mut())
    }

    /// Reopen the scratch file for reading from the start.
    ///
    /// The returned content keeps ownership of the scratch file, so it is
    /// removed once the content is dropped.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the file cannot be reopened.
    pub fn into_content(self) -> io::Result<CanonicalContent> {
        let reader = self.file.reopen()?;
        let len = reader.metadata()?.len();
        Ok(CanonicalContent {
            reader: BufReader::new(reader),
            len,
            scratch: self,
        })
    }
}

/// Canonical bytes of one media file, readable once.
#[derive(Debug)]
pub struct CanonicalContent {
    reader: BufReader<File>,
    len: u64,
    // Dropped last: removes the file after the reader is closed.
    scratch: ScratchFile,
}

impl CanonicalContent {
    /// Build content from bytes already in memory.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the scratch file cannot be written.
    pub fn from_bytes(bytes: &[u8], scratch_dir: Option<&Path>) -> io::Result<Self> {
        let mut scratch = ScratchFile::create(scratch_dir)?;
        {
            let mut writer = scratch.writer();
            writer.write_all(bytes)?;
            writer.flush()?;
        }
        scratch.into_content()
    }

    /// Number of canonical bytes.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.len
    }

    /// True when the decoder produced nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Path of the backing scratch file.
    #[must_use]
    pub fn scratch_path(&self) -> &Path {
        self.scratch.path()
    }
}

impl Read for CanonicalContent {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

/// Build the canonicalizer for a media domain.
///
/// `decoder` is the external program used for audio (ignored for images);
/// `scratch_dir` is where scratch files go (system temp dir when `None`).
#[must_use]
pub fn for_kind(
    kind: MediaKind,
    decoder: &Path,
    scratch_dir: Option<PathBuf>,
) -> Box<dyn Canonicalizer> {
    match kind {
        MediaKind::Audio => Box::new(AudioCanonicalizer::new(decoder, scratch_dir)),
        MediaKind::Image => Box::new(ImageCanonicalizer::new(scratch_dir)),
    }
}
