//! Native image canonicalization.
//!
//! Decodes any format the `image` crate understands and writes a fixed raster:
//!
//! ```text
//! b"MDIMG1" | width: u32 LE | height: u32 LE | RGBA pixels, 16-bit channels, LE
//! ```
//!
//! Every source is widened to RGBA16, so an 8-bit PNG and the same pixels
//! stored as BMP or TIFF produce identical bytes, while EXIF, ICC chunks,
//! compression settings and the container itself never reach the output.
//! The dimensions are part of the header so two images with the same pixel
//! stream but different shapes stay distinct.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use ::image::{GenericImageView, ImageError, ImageReader};

use super::{CanonicalContent, CanonicalizeError, Canonicalizer, MediaKind, ScratchFile};

/// Magic bytes at the start of every canonical raster.
pub const RASTER_MAGIC: &[u8; 6] = b"MDIMG1";

/// Samples converted per write.
const SAMPLES_PER_WRITE: usize = 8 * 1024;

/// Canonicalizer for still images.
#[derive(Debug, Clone, Default)]
pub struct ImageCanonicalizer {
    scratch_dir: Option<PathBuf>,
}

impl ImageCanonicalizer {
    /// Create an image canonicalizer writing scratch files to `scratch_dir`.
    #[must_use]
    pub fn new(scratch_dir: Option<PathBuf>) -> Self {
        Self { scratch_dir }
    }

    fn decode(&self, path: &Path) -> Result<::image::DynamicImage, CanonicalizeError> {
        let reader = ImageReader::open(path).map_err(|e| CanonicalizeError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        // Sniff the content rather than trusting the extension.
        let reader = reader
            .with_guessed_format()
            .map_err(|e| CanonicalizeError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;

        reader.decode().map_err(|e| map_image_error(path, e))
    }
}

fn map_image_error(path: &Path, err: ImageError) -> CanonicalizeError {
    match err {
        ImageError::IoError(source) => CanonicalizeError::Io {
            path: path.to_path_buf(),
            source,
        },
        ImageError::Unsupported(e) => CanonicalizeError::UnsupportedInput {
            path: path.to_path_buf(),
            reason: e.to_string(),
        },
        ImageError::Decoding(e) => CanonicalizeError::UnsupportedInput {
            path: path.to_path_buf(),
            reason: e.to_string(),
        },
        other => CanonicalizeError::DecodeFailure {
            path: path.to_path_buf(),
            reason: other.to_string(),
        },
    }
}

/// Write the canonical raster for a decoded image.
fn write_raster<W: Write>(img: &::image::DynamicImage, out: &mut W) -> io::Result<()> {
    let rgba = img.to_rgba16();
    out.write_all(RASTER_MAGIC)?;
    out.write_all(&rgba.width().to_le_bytes())?;
    out.write_all(&rgba.height().to_le_bytes())?;

    let mut bytes = Vec::with_capacity(SAMPLES_PER_WRITE * 2);
    for chunk in rgba.as_raw().chunks(SAMPLES_PER_WRITE) {
        bytes.clear();
        for sample in chunk {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
        out.write_all(&bytes)?;
    }
    Ok(())
}

impl Canonicalizer for ImageCanonicalizer {
    fn kind(&self) -> MediaKind {
        MediaKind::Image
    }

    fn canonicalize(&self, path: &Path) -> Result<CanonicalContent, CanonicalizeError> {
        let img = self.decode(path)?;
        let (width, height) = img.dimensions();
        log::trace!(
            "Decoded {} ({}x{}, {:?})",
            path.display(),
            width,
            height,
            img.color()
        );

        let io_err = |source| CanonicalizeError::Io {
            path: path.to_path_buf(),
            source,
        };

        let mut scratch = ScratchFile::create(self.scratch_dir.as_deref()).map_err(io_err)?;
        {
            let mut writer = scratch.writer();
            write_raster(&img, &mut writer).map_err(io_err)?;
            writer.flush().map_err(io_err)?;
        }
        scratch.into_content().map_err(io_err)
    }
}
