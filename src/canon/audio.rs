//! Audio canonicalization through an external decoder.
//!
//! The decoder (ffmpeg by default) is asked to drop every metadata block and
//! any attached picture stream, then write the decoded samples as raw signed
//! 16-bit little-endian PCM with no container header:
//!
//! ```text
//! ffmpeg -nostdin -v error -y -i <src> -map_metadata -1 -vn
//!        -ar 44100 -ac 2 -f s16le -acodec pcm_s16le <scratch>
//! ```
//!
//! A WAV header is avoided on purpose: it would carry LIST/INFO chunks and the
//! encoder's name, which is exactly the kind of byte that must not leak into
//! the fingerprint.
//!
//! Headerless PCM does not say how to play the samples back, so the output is
//! always resampled to [`CANONICAL_SAMPLE_RATE`] and mixed to
//! [`CANONICAL_CHANNELS`]. Two files holding the same sample bytes under
//! different rate or channel headers then fingerprint differently.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use super::{CanonicalContent, CanonicalizeError, Canonicalizer, MediaKind, ScratchFile};

/// Default decoder binary, looked up on `PATH`.
pub const DEFAULT_DECODER: &str = "ffmpeg";

/// Sample rate of canonical PCM, in Hz.
pub const CANONICAL_SAMPLE_RATE: u32 = 44_100;

/// Channel count of canonical PCM.
pub const CANONICAL_CHANNELS: u8 = 2;

/// Messages ffmpeg prints when the input is not a parseable media file.
const INVALID_DATA_MARKERS: [&str; 2] = ["Invalid data found", "could not find codec parameters"];

/// Canonicalizer for audio files backed by an external decoder process.
#[derive(Debug, Clone)]
pub struct AudioCanonicalizer {
    decoder: PathBuf,
    scratch_dir: Option<PathBuf>,
}

impl Default for AudioCanonicalizer {
    fn default() -> Self {
        Self::new(Path::new(DEFAULT_DECODER), None)
    }
}

impl AudioCanonicalizer {
    /// Create an audio canonicalizer using `decoder` as the ffmpeg binary.
    #[must_use]
    pub fn new(decoder: &Path, scratch_dir: Option<PathBuf>) -> Self {
        Self {
            decoder: decoder.to_path_buf(),
            scratch_dir,
        }
    }

    /// The decoder binary this canonicalizer invokes.
    #[must_use]
    pub fn decoder(&self) -> &Path {
        &self.decoder
    }

    /// Whether the decoder can be started at all.
    #[must_use]
    pub fn decoder_available(&self) -> bool {
        Command::new(&self.decoder)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok_and(|s| s.success())
    }

    fn command(&self, source: &Path, output: &Path) -> Command {
        let mut cmd = Command::new(&self.decoder);
        cmd.arg("-nostdin")
            .args(["-v", "error", "-y", "-i"])
            .arg(source)
            .args(["-map_metadata", "-1", "-vn"])
            .arg("-ar")
            .arg(CANONICAL_SAMPLE_RATE.to_string())
            .arg("-ac")
            .arg(CANONICAL_CHANNELS.to_string())
            .args(["-f", "s16le", "-acodec", "pcm_s16le"])
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        cmd
    }
}

impl Canonicalizer for AudioCanonicalizer {
    fn kind(&self) -> MediaKind {
        MediaKind::Audio
    }

    fn canonicalize(&self, path: &Path) -> Result<CanonicalContent, CanonicalizeError> {
        let io_err = |source| CanonicalizeError::Io {
            path: path.to_path_buf(),
            source,
        };

        if !path.is_file() {
            return Err(io_err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "source file does not exist",
            )));
        }

        let scratch = ScratchFile::create(self.scratch_dir.as_deref()).map_err(io_err)?;
        let mut cmd = self.command(path, scratch.path());
        log::trace!("Running {:?}", cmd);

        let output = cmd.output().map_err(|e| CanonicalizeError::DecodeFailure {
            path: path.to_path_buf(),
            reason: format!("failed to start {}: {}", self.decoder.display(), e),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = stderr.lines().last().unwrap_or("").trim().to_string();
            let reason = if reason.is_empty() {
                format!("decoder exited with {}", output.status)
            } else {
                reason
            };

            return Err(if INVALID_DATA_MARKERS.iter().any(|m| stderr.contains(m)) {
                CanonicalizeError::UnsupportedInput {
                    path: path.to_path_buf(),
                    reason,
                }
            } else {
                CanonicalizeError::DecodeFailure {
                    path: path.to_path_buf(),
                    reason,
                }
            });
        }

        let content = scratch.into_content().map_err(io_err)?;
        if content.is_empty() {
            return Err(CanonicalizeError::DecodeFailure {
                path: path.to_path_buf(),
                reason: "decoder produced no samples".to_string(),
            });
        }
        Ok(content)
    }
}
