//! File integrity verification against a known digest.
//!
//! [`digest_file`] streams a file through a SHA-2 hasher in bounded chunks and
//! returns the lowercase hex digest. [`validate`] wraps it and fails closed:
//! any read or hashing failure is reported as "invalid" and never escapes.
//!
//! # Example
//!
//! ```no_run
//! use updater_core::checksum::{ChecksumAlgorithm, digest_file, validate};
//! use std::path::Path;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let hex = digest_file(Path::new("client.zip"), ChecksumAlgorithm::Sha512)?;
//! assert!(validate(Path::new("client.zip"), &hex.to_uppercase()));
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha512};
use thiserror::Error;
use tracing::{debug, instrument, warn};

/// Read buffer used while hashing.
pub const HASH_BUFFER_SIZE: usize = 64 * 1024;

/// Supported digest algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumAlgorithm {
    /// SHA-256, 64 hex characters.
    Sha256,
    /// SHA-512, 128 hex characters.
    #[default]
    Sha512,
}

impl ChecksumAlgorithm {
    /// Length of the hex encoding of this algorithm's digest.
    #[must_use]
    pub const fn hex_len(self) -> usize {
        match self {
            Self::Sha256 => 64,
            Self::Sha512 => 128,
        }
    }

    /// Infers the algorithm from the length of a hex digest.
    #[must_use]
    pub fn from_hex_len(len: usize) -> Option<Self> {
        match len {
            64 => Some(Self::Sha256),
            128 => Some(Self::Sha512),
            _ => None,
        }
    }

    /// Stable lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Sha512 => "sha512",
        }
    }
}

impl fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChecksumAlgorithm {
    type Err = ChecksumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "").as_str() {
            "sha256" => Ok(Self::Sha256),
            "sha512" => Ok(Self::Sha512),
            _ => Err(ChecksumError::UnknownAlgorithm {
                name: s.to_string(),
            }),
        }
    }
}

/// Errors raised while computing a digest.
#[derive(Debug, Error)]
pub enum ChecksumError {
    /// The file could not be opened or read.
    #[error("IO error hashing {path}: {source}")]
    Io {
        /// File being hashed.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The algorithm name is not one of the supported digests.
    #[error("unknown checksum algorithm: {name}")]
    UnknownAlgorithm {
        /// Name as supplied by the caller.
        name: String,
    },
}

impl ChecksumError {
    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// A computed digest. Pure value: compares by algorithm and hex text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecksumResult {
    /// Algorithm that produced the digest.
    pub algorithm: ChecksumAlgorithm,
    /// Lowercase hex digest.
    pub hex: String,
}

impl ChecksumResult {
    /// Compares against an expected hex digest, ignoring ASCII case and
    /// surrounding whitespace.
    #[must_use]
    pub fn matches(&self, expected_hex: &str) -> bool {
        let expected = expected_hex.trim();
        expected.len() == self.hex.len() && expected.eq_ignore_ascii_case(&self.hex)
    }
}

impl fmt::Display for ChecksumResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.hex)
    }
}

/// A digest supplied by the caller for a package it expects to receive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedChecksum {
    /// Algorithm the digest was produced with.
    pub algorithm: ChecksumAlgorithm,
    /// Hex digest, any case.
    pub hex: String,
}

impl ExpectedChecksum {
    /// Creates an expected checksum for an explicit algorithm.
    pub fn new(algorithm: ChecksumAlgorithm, hex: impl Into<String>) -> Self {
        Self {
            algorithm,
            hex: hex.into(),
        }
    }

    /// Expected SHA-512 digest.
    pub fn sha512(hex: impl Into<String>) -> Self {
        Self::new(ChecksumAlgorithm::Sha512, hex)
    }

    /// Expected SHA-256 digest.
    pub fn sha256(hex: impl Into<String>) -> Self {
        Self::new(ChecksumAlgorithm::Sha256, hex)
    }

    /// Infers the algorithm from the digest length, defaulting to SHA-512.
    pub fn infer(hex: impl Into<String>) -> Self {
        let hex = hex.into();
        let algorithm =
            ChecksumAlgorithm::from_hex_len(hex.trim().len()).unwrap_or(ChecksumAlgorithm::Sha512);
        Self { algorithm, hex }
    }
}

enum Hasher {
    Sha256(Sha256),
    Sha512(Sha512),
}

impl Hasher {
    fn new(algorithm: ChecksumAlgorithm) -> Self {
        match algorithm {
            ChecksumAlgorithm::Sha256 => Self::Sha256(Sha256::new()),
            ChecksumAlgorithm::Sha512 => Self::Sha512(Sha512::new()),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            Self::Sha256(h) => h.update(data),
            Self::Sha512(h) => h.update(data),
        }
    }

    fn finalize_hex(self) -> String {
        match self {
            Self::Sha256(h) => hex::encode(h.finalize()),
            Self::Sha512(h) => hex::encode(h.finalize()),
        }
    }
}

/// Computes the lowercase hex digest of a file, reading it in bounded chunks.
///
/// # Errors
///
/// Returns [`ChecksumError::Io`] if the file cannot be opened or read.
#[instrument(skip(path), fields(path = %path.display(), %algorithm))]
pub fn digest_file(path: &Path, algorithm: ChecksumAlgorithm) -> Result<String, ChecksumError> {
    let mut file = File::open(path).map_err(|e| ChecksumError::io(path, e))?;
    let mut hasher = Hasher::new(algorithm);
    let mut buffer = vec![0u8; HASH_BUFFER_SIZE];
    let mut total: u64 = 0;

    loop {
        let read = match file.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(ChecksumError::io(path, e)),
        };
        hasher.update(&buffer[..read]);
        total += read as u64;
    }

    let hex = hasher.finalize_hex();
    debug!(bytes = total, "digest computed");
    Ok(hex)
}

/// Computes a file digest wrapped in a [`ChecksumResult`].
///
/// # Errors
///
/// Same as [`digest_file`].
pub fn checksum_file(
    path: &Path,
    algorithm: ChecksumAlgorithm,
) -> Result<ChecksumResult, ChecksumError> {
    Ok(ChecksumResult {
        algorithm,
        hex: digest_file(path, algorithm)?,
    })
}

/// Digest of an in-memory payload.
#[must_use]
pub fn digest_bytes(algorithm: ChecksumAlgorithm, bytes: &[u8]) -> String {
    let mut hasher = Hasher::new(algorithm);
    hasher.update(bytes);
    hasher.finalize_hex()
}

/// Validates a file against an expected SHA-512 digest.
///
/// Fails closed: a missing or unreadable file yields `false`.
#[must_use]
pub fn validate(path: &Path, expected_hex: &str) -> bool {
    validate_with(path, &ExpectedChecksum::sha512(expected_hex))
}

/// Validates a file against an expected digest of any supported algorithm.
///
/// Fails closed: a missing or unreadable file yields `false`.
#[must_use]
pub fn validate_with(path: &Path, expected: &ExpectedChecksum) -> bool {
    match checksum_file(path, expected.algorithm) {
        Ok(actual) => {
            let valid = actual.matches(&expected.hex);
            if !valid {
                debug!(path = %path.display(), actual = %actual.hex, "checksum mismatch");
            }
            valid
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "file invalid: checksum could not be computed");
            false
        }
    }
}
