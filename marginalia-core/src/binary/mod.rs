//! Compiled artifact format
//!
//! Cached programs are stored as a fixed header followed by the
//! `bincode`-encoded [`Program`]:
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ Header (96 bytes)                            │
//! │   magic, format version, transform version,  │
//! │   flags, source digest, severity fingerprint,│
//! │   runtime tag digest, body length            │
//! ├──────────────────────────────────────────────┤
//! │ Program (bincode)                            │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! An artifact is only reused when every key component matches; anything
//! else is treated as a cache miss by the loader.

mod header;

pub use header::{ArtifactHeader, FORMAT_VERSION, HEADER_SIZE, MAGIC};

use crate::runtime::Program;
use crate::transform::TRANSFORM_VERSION;
use crate::{RUNTIME_IMPL, RUNTIME_VERSION};
use marginalia_log::SeverityTable;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Artifact file extension
pub const ARTIFACT_EXTENSION: &str = "mgc";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArtifactError {
    #[error("artifact too short ({0} bytes)")]
    TooShort(usize),
    #[error("invalid magic {0:?}")]
    InvalidMagic([u8; 4]),
    #[error("stale artifact: {0} changed")]
    Stale(&'static str),
    #[error("artifact body truncated (expected {expected} bytes, found {found})")]
    Truncated { expected: u64, found: u64 },
    #[error("artifact codec error: {0}")]
    Codec(String),
}

fn sha256(bytes: &[u8]) -> [u8; 32] {
    let digest = Sha256::digest(bytes);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

fn prefix16(digest: [u8; 32]) -> [u8; 16] {
    let mut out = [0u8; 16];
    out.copy_from_slice(&digest[..16]);
    out
}

/// Stable digest of a severity table's contents
///
/// Part of the cache key: the set of marker symbols decides which comments
/// the transform rewrites.
pub fn severity_fingerprint(severities: &SeverityTable) -> [u8; 16] {
    prefix16(sha256(severities.canonical().as_bytes()))
}

/// `<runtime impl>-<runtime version>-t<transform version>`
pub fn cache_tag() -> String {
    format!("{}-{}-t{}", RUNTIME_IMPL, RUNTIME_VERSION, TRANSFORM_VERSION)
}

/// Everything a cached artifact depends on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    pub source_digest: [u8; 32],
    pub severity_fingerprint: [u8; 16],
    pub runtime_digest: [u8; 16],
    pub transform_version: u16,
}

impl CacheKey {
    /// Key for `source` transformed against `severities` by this runtime
    pub fn new(source: &str, severities: &SeverityTable) -> Self {
        Self {
            source_digest: sha256(source.as_bytes()),
            severity_fingerprint: severity_fingerprint(severities),
            runtime_digest: prefix16(sha256(cache_tag().as_bytes())),
            transform_version: TRANSFORM_VERSION,
        }
    }

    /// Hex form of the source digest, for diagnostics
    pub fn source_hex(&self) -> String {
        hex::encode(self.source_digest)
    }

    /// File name of the artifact for a module under this runtime
    pub fn file_name(module: &str) -> String {
        format!("{}.{}.{}", module, cache_tag(), ARTIFACT_EXTENSION)
    }
}

/// Serialize a program behind a header for `key`
pub fn encode_artifact(key: &CacheKey, program: &Program) -> Result<Vec<u8>, ArtifactError> {
    let body = bincode::serialize(program).map_err(|e| ArtifactError::Codec(e.to_string()))?;
    let header = ArtifactHeader::new(key, body.len() as u64);
    let mut bytes = Vec::with_capacity(HEADER_SIZE + body.len());
    bytes.extend_from_slice(&header.to_bytes());
    bytes.extend_from_slice(&body);
    Ok(bytes)
}

/// Decode an artifact, rejecting it unless it was built under `key`
pub fn decode_artifact(bytes: &[u8], key: &CacheKey) -> Result<Program, ArtifactError> {
    let header = ArtifactHeader::from_bytes(bytes)?;
    header.validate(key)?;
    let body = &bytes[HEADER_SIZE..];
    if body.len() as u64 != header.body_len {
        return Err(ArtifactError::Truncated {
            expected: header.body_len,
            found: body.len() as u64,
        });
    }
    bincode::deserialize(body).map_err(|e| ArtifactError::Codec(e.to_string()))
}
