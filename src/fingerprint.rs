//! SHA-256 content fingerprints.
//!
//! # Overview
//!
//! A [`Fingerprint`] is the digest of a file's canonical content, never of the
//! file itself. It is computed by streaming the canonical bytes through
//! SHA-256 in fixed-size chunks, so memory use does not grow with file size.
//!
//! The hex form (64 lowercase characters) is what the record store persists.
//!
//! # Example
//!
//! ```
//! use mediadedupe::fingerprint::{fingerprint_reader, Fingerprint};
//!
//! let fp = fingerprint_reader(&b"canonical samples"[..]).unwrap();
//! assert_eq!(fp.to_hex().len(), 64);
//! assert_eq!(Fingerprint::from_hex(&fp.to_hex()).unwrap(), fp);
//! ```

use std::fmt;
use std::io::{self, Read};

use sha2::{Digest, Sha256};
use thiserror::Error;

/// Size of each read when streaming canonical content (64KB).
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Length of a digest in bytes.
pub const FINGERPRINT_LEN: usize = 32;

/// Length of the hex-encoded digest.
pub const FINGERPRINT_HEX_LEN: usize = FINGERPRINT_LEN * 2;

/// Errors produced while computing or parsing fingerprints.
#[derive(Debug, Error)]
pub enum FingerprintError {
    /// Reading the canonical content failed.
    #[error("failed to read canonical content: {0}")]
    Io(#[from] io::Error),

    /// A hex digest had the wrong number of characters.
    #[error("fingerprint must be {FINGERPRINT_HEX_LEN} hex characters, got {0}")]
    InvalidLength(usize),

    /// A hex digest contained a non-hex character.
    #[error("fingerprint contains non-hex character {0:?}")]
    InvalidHex(char),
}

/// A 256-bit content digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint([u8; FINGERPRINT_LEN]);

impl Fingerprint {
    /// Wrap raw digest bytes.
    #[must_use]
    pub fn from_bytes(bytes: [u8; FINGERPRINT_LEN]) -> Self {
        Self(bytes)
    }

    /// Raw digest bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; FINGERPRINT_LEN] {
        &self.0
    }

    /// Lowercase hex encoding, always [`FINGERPRINT_HEX_LEN`] characters.
    #[must_use]
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// Parse a hex digest.
    ///
    /// Accepts upper or lower case. Anything other than exactly
    /// [`FINGERPRINT_HEX_LEN`] hex characters is rejected, so a truncated or
    /// padded digest can never be stored or compared.
    ///
    /// # Errors
    ///
    /// Returns [`FingerprintError::InvalidLength`] or [`FingerprintError::InvalidHex`].
    pub fn from_hex(hex: &str) -> Result<Self, FingerprintError> {
        let chars: Vec<char> = hex.chars().collect();
        if chars.len() != FINGERPRINT_HEX_LEN {
            return Err(FingerprintError::InvalidLength(chars.len()));
        }

        let mut bytes = [0u8; FINGERPRINT_LEN];
        for (i, pair) in chars.chunks(2).enumerate() {
            let hi = hex_value(pair[0])?;
            let lo = hex_value(pair[1])?;
            bytes[i] = (hi << 4) | lo;
        }
        Ok(Self(bytes))
    }
}

fn hex_value(c: char) -> Result<u8, FingerprintError> {
    c.to_digit(16)
        .map(|d| d as u8)
        .ok_or(FingerprintError::InvalidHex(c))
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.to_hex())
    }
}

impl std::str::FromStr for Fingerprint {
    type Err = FingerprintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

/// Stream `reader` through SHA-256 and return its fingerprint.
///
/// Reads in [`CHUNK_SIZE`] chunks. Interrupted reads are retried; any other
/// I/O error aborts the digest.
///
/// # Errors
///
/// Returns [`FingerprintError::Io`] if reading fails.
pub fn fingerprint_reader<R: Read>(mut reader: R) -> Result<Fingerprint, FingerprintError> {
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];

    loop {
        let n = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        hasher.update(&buffer[..n]);
    }

    Ok(Fingerprint(hasher.finalize().into()))
}

/// Fingerprint an in-memory byte slice.
#[must_use]
pub fn fingerprint_bytes(bytes: &[u8]) -> Fingerprint {
    Fingerprint(Sha256::digest(bytes).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    // SHA-256("abc")
    const ABC_HEX: &str = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";

    #[test]
    fn test_known_digest() {
        let fp = fingerprint_reader(&b"abc"[..]).unwrap();
        assert_eq!(fp.to_hex(), ABC_HEX);
    }

    #[test]
    fn test_reader_matches_bytes_across_chunk_boundary() {
        let data: Vec<u8> = (0..(CHUNK_SIZE * 3 + 17)).map(|i| (i % 251) as u8).collect();
        let streamed = fingerprint_reader(data.as_slice()).unwrap();
        assert_eq!(streamed, fingerprint_bytes(&data));
    }

    #[test]
    fn test_empty_input() {
        let fp = fingerprint_reader(std::io::empty()).unwrap();
        assert_eq!(
            fp.to_hex(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_from_hex_accepts_uppercase() {
        let fp = Fingerprint::from_hex(&ABC_HEX.to_uppercase()).unwrap();
        assert_eq!(fp.to_hex(), ABC_HEX);
    }

    #[test]
    fn test_from_hex_rejects_wrong_length() {
        let err = Fingerprint::from_hex(&ABC_HEX[..63]).unwrap_err();
        assert!(matches!(err, FingerprintError::InvalidLength(63)));

        let err = Fingerprint::from_hex("").unwrap_err();
        assert!(matches!(err, FingerprintError::InvalidLength(0)));
    }

    #[test]
    fn test_from_hex_rejects_non_hex() {
        let bad = format!("{}g", &ABC_HEX[..63]);
        let err = Fingerprint::from_hex(&bad).unwrap_err();
        assert!(matches!(err, FingerprintError::InvalidHex('g')));
    }

    #[test]
    fn test_display_is_hex() {
        let fp = fingerprint_bytes(b"abc");
        assert_eq!(fp.to_string(), ABC_HEX);
        assert_eq!(ABC_HEX.parse::<Fingerprint>().unwrap(), fp);
    }

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "boom"))
        }
    }

    #[test]
    fn test_reader_error_propagates() {
        let err = fingerprint_reader(FailingReader).unwrap_err();
        assert!(matches!(err, FingerprintError::Io(_)));
    }
}
