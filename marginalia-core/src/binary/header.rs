//! Artifact header
//!
//! 96-byte fixed-size header in front of every cached program.

use super::{ArtifactError, CacheKey};

/// Header magic: "MRGN"
pub const MAGIC: [u8; 4] = [b'M', b'R', b'G', b'N'];

/// Current artifact format version
pub const FORMAT_VERSION: u16 = 1;

/// Header size: 96 bytes
pub const HEADER_SIZE: usize = 96;

/// Artifact header (96 bytes)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactHeader {
    /// Magic (4 bytes): "MRGN"
    pub magic: [u8; 4],
    /// Format version (2 bytes)
    pub format_version: u16,
    /// Transform version (2 bytes)
    pub transform_version: u16,
    /// Flags (4 bytes), currently unused
    pub flags: u32,
    /// SHA-256 of the raw source text (32 bytes)
    pub source_digest: [u8; 32],
    /// Severity table fingerprint (16 bytes)
    pub severity_fingerprint: [u8; 16],
    /// Runtime tag digest (16 bytes)
    pub runtime_digest: [u8; 16],
    /// Length of the encoded program that follows (8 bytes)
    pub body_len: u64,
    /// Reserved (12 bytes)
    pub reserved: [u8; 12],
}

impl ArtifactHeader {
    /// Header for a program built under `key`
    pub fn new(key: &CacheKey, body_len: u64) -> Self {
        Self {
            magic: MAGIC,
            format_version: FORMAT_VERSION,
            transform_version: key.transform_version,
            flags: 0,
            source_digest: key.source_digest,
            severity_fingerprint: key.severity_fingerprint,
            runtime_digest: key.runtime_digest,
            body_len,
            reserved: [0; 12],
        }
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        let mut offset = 0;

        // Magic & versions (8 bytes)
        bytes[offset..offset + 4].copy_from_slice(&self.magic);
        offset += 4;
        bytes[offset..offset + 2].copy_from_slice(&self.format_version.to_le_bytes());
        offset += 2;
        bytes[offset..offset + 2].copy_from_slice(&self.transform_version.to_le_bytes());
        offset += 2;

        // Flags (4 bytes)
        bytes[offset..offset + 4].copy_from_slice(&self.flags.to_le_bytes());
        offset += 4;

        // Key digests (64 bytes)
        bytes[offset..offset + 32].copy_from_slice(&self.source_digest);
        offset += 32;
        bytes[offset..offset + 16].copy_from_slice(&self.severity_fingerprint);
        offset += 16;
        bytes[offset..offset + 16].copy_from_slice(&self.runtime_digest);
        offset += 16;

        // Body (8 bytes)
        bytes[offset..offset + 8].copy_from_slice(&self.body_len.to_le_bytes());
        offset += 8;

        bytes[offset..offset + 12].copy_from_slice(&self.reserved);

        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ArtifactError> {
        if bytes.len() < HEADER_SIZE {
            return Err(ArtifactError::TooShort(bytes.len()));
        }

        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[0..4]);
        if magic != MAGIC {
            return Err(ArtifactError::InvalidMagic(magic));
        }

        let format_version = u16::from_le_bytes([bytes[4], bytes[5]]);
        let transform_version = u16::from_le_bytes([bytes[6], bytes[7]]);
        let flags = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);

        let mut source_digest = [0u8; 32];
        source_digest.copy_from_slice(&bytes[12..44]);
        let mut severity_fingerprint = [0u8; 16];
        severity_fingerprint.copy_from_slice(&bytes[44..60]);
        let mut runtime_digest = [0u8; 16];
        runtime_digest.copy_from_slice(&bytes[60..76]);

        let mut len = [0u8; 8];
        len.copy_from_slice(&bytes[76..84]);
        let body_len = u64::from_le_bytes(len);

        let mut reserved = [0u8; 12];
        reserved.copy_from_slice(&bytes[84..96]);

        Ok(Self {
            magic,
            format_version,
            transform_version,
            flags,
            source_digest,
            severity_fingerprint,
            runtime_digest,
            body_len,
            reserved,
        })
    }

    /// Check every key component; the first mismatch is reported
    pub fn validate(&self, key: &CacheKey) -> Result<(), ArtifactError> {
        if self.format_version != FORMAT_VERSION {
            return Err(ArtifactError::Stale("format version"));
        }
        if self.transform_version != key.transform_version {
            return Err(ArtifactError::Stale("transform version"));
        }
        if self.runtime_digest != key.runtime_digest {
            return Err(ArtifactError::Stale("runtime tag"));
        }
        if self.source_digest != key.source_digest {
            return Err(ArtifactError::Stale("source digest"));
        }
        if self.severity_fingerprint != key.severity_fingerprint {
            return Err(ArtifactError::Stale("severity table"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marginalia_log::SeverityTable;

    fn key() -> CacheKey {
        CacheKey::new("var x = 1;", &SeverityTable::default())
    }

    #[test]
    fn test_header_size() {
        let header = ArtifactHeader::new(&key(), 10);
        assert_eq!(header.to_bytes().len(), HEADER_SIZE);
    }

    #[test]
    fn test_header_roundtrip() {
        let header = ArtifactHeader::new(&key(), 1234);
        let parsed = ArtifactHeader::from_bytes(&header.to_bytes()).unwrap();
        assert_eq!(parsed, header);
        assert_eq!(&parsed.to_bytes()[0..4], b"MRGN");
    }

    #[test]
    fn test_rejects_bad_magic() {
        let mut bytes = ArtifactHeader::new(&key(), 0).to_bytes();
        bytes[0] = b'X';
        assert!(matches!(
            ArtifactHeader::from_bytes(&bytes),
            Err(ArtifactError::InvalidMagic(_))
        ));
        assert!(matches!(
            ArtifactHeader::from_bytes(&bytes[..10]),
            Err(ArtifactError::TooShort(10))
        ));
    }

    #[test]
    fn test_validate_reports_first_mismatch() {
        let header = ArtifactHeader::new(&key(), 0);
        assert!(header.validate(&key()).is_ok());

        let other_source = CacheKey::new("var x = 2;", &SeverityTable::default());
        assert_eq!(
            header.validate(&other_source),
            Err(ArtifactError::Stale("source digest"))
        );

        let mut table = SeverityTable::default();
        table.define("~", 5, "TRACE").unwrap();
        let other_table = CacheKey::new("var x = 1;", &table);
        assert_eq!(
            header.validate(&other_table),
            Err(ArtifactError::Stale("severity table"))
        );

        let mut old = header.clone();
        old.transform_version = 0;
        assert_eq!(old.validate(&key()), Err(ArtifactError::Stale("transform version")));
    }
}
