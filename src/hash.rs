//! Digest selection and the hash/compare processor
//!
//! The expected digest decides the algorithm: its hex length is unique for
//! each of the supported digests, so listings and command lines never have
//! to name the algorithm explicitly.

use std::fmt::{self, Write as _};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};
use tracing::trace;

use crate::error::ScanError;
use crate::item::WorkItem;
use crate::results::{Outcome, ScanResult};
use crate::traits::Processor;

const READ_CHUNK: usize = 64 * 1024;

pub const UNKNOWN_HASH_TYPE: &str = "unknown hash type";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    Md5,
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithm {
    pub const ALL: [HashAlgorithm; 5] = [
        Self::Md5,
        Self::Sha1,
        Self::Sha256,
        Self::Sha384,
        Self::Sha512,
    ];

    /// Pick the algorithm whose hex output has `len` characters.
    pub fn from_hex_len(len: usize) -> Option<Self> {
        Self::ALL.into_iter().find(|alg| alg.hex_len() == len)
    }

    pub fn hex_len(self) -> usize {
        match self {
            Self::Md5    => 32,
            Self::Sha1   => 40,
            Self::Sha256 => 64,
            Self::Sha384 => 96,
            Self::Sha512 => 128,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Md5    => "md5",
            Self::Sha1   => "sha1",
            Self::Sha256 => "sha256",
            Self::Sha384 => "sha384",
            Self::Sha512 => "sha512",
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// True if `s` is hex and as long as some supported digest.
pub fn looks_like_digest(s: &str) -> bool {
    HashAlgorithm::from_hex_len(s.len()).is_some() && s.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Stream the file at `path` through `alg` and return lowercase hex.
pub fn digest_file(path: &Path, alg: HashAlgorithm) -> io::Result<String> {
    let file = File::open(path)?;
    digest_reader(file, alg)
}

pub fn digest_reader(reader: impl Read, alg: HashAlgorithm) -> io::Result<String> {
    match alg {
        HashAlgorithm::Md5    => stream::<Md5>(reader),
        HashAlgorithm::Sha1   => stream::<Sha1>(reader),
        HashAlgorithm::Sha256 => stream::<Sha256>(reader),
        HashAlgorithm::Sha384 => stream::<Sha384>(reader),
        HashAlgorithm::Sha512 => stream::<Sha512>(reader),
    }
}

fn stream<D: Digest>(mut reader: impl Read) -> io::Result<String> {
    let mut hasher = D::new();
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => hasher.update(&buf[..n]),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(to_hex(&hasher.finalize()))
}

fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}

/// Compare an expected digest against a computed one, ignoring case.
///
/// An expected value whose length matches no supported digest is an error,
/// never a silent mismatch.
pub fn match_or_no_match(expected: &str, actual: &str) -> Outcome {
    if HashAlgorithm::from_hex_len(expected.len()).is_none() {
        return Outcome::Error(UNKNOWN_HASH_TYPE.to_string());
    }
    if expected.eq_ignore_ascii_case(actual) {
        Outcome::Matched
    } else {
        Outcome::NotMatched
    }
}

// ---------------------------------------------------------------------------
// HashCompare
// ---------------------------------------------------------------------------

/// Hashes each file and compares it with an expected digest.
///
/// The digest carried by the item wins; otherwise the one given at
/// construction is used. Always emits exactly one result per item.
#[derive(Debug, Clone, Default)]
pub struct HashCompare {
    expected: Option<String>,
}

impl HashCompare {
    /// Compare every file against `expected`.
    pub fn new(expected: &str) -> Result<Self, ScanError> {
        let expected = expected.trim();
        if HashAlgorithm::from_hex_len(expected.len()).is_none() {
            return Err(ScanError::UnknownHashType(expected.len()));
        }
        if !expected.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ScanError::InvalidConfig(format!("{expected:?} is not a hex digest")));
        }
        Ok(Self {
            expected: Some(expected.to_string()),
        })
    }

    /// Compare each file against the digest its work item carries.
    pub fn per_item() -> Self {
        Self::default()
    }

    pub fn algorithm(&self) -> Option<HashAlgorithm> {
        self.expected
            .as_deref()
            .and_then(|e| HashAlgorithm::from_hex_len(e.len()))
    }

    fn compare(&self, item: &WorkItem) -> ScanResult {
        let expected = match item.expected_digest().or(self.expected.as_deref()) {
            Some(e) => e,
            None    => return ScanResult::error(&item.path, "no expected digest"),
        };
        let alg = match HashAlgorithm::from_hex_len(expected.len()) {
            Some(a) => a,
            None    => return ScanResult::error(&item.path, UNKNOWN_HASH_TYPE),
        };

        match digest_file(&item.path, alg) {
            Ok(actual) => {
                trace!(path = %item.path.display(), %alg, %actual, "hashed");
                ScanResult::new(&item.path, match_or_no_match(expected, &actual), alg.name())
            }
            Err(e) => ScanResult::error(&item.path, e.to_string()),
        }
    }
}

impl Processor for HashCompare {
    fn process(&self, item: WorkItem) -> Vec<ScanResult> {
        vec![self.compare(&item)]
    }
}
