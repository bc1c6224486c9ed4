//! Key encoding and decoding for storage layer.
//!
//! - Postings: `post:{id:020}` so lexicographic order is insertion order
//! - URL index: `url:{canonical_url}`
//! - Runs: `run:{started_ms:013}:{ulid}` so reverse iteration is newest-first

use ulid::Ulid;

use harvest_types::PostingId;

use crate::error::StorageError;

/// Key for posting rows
/// Format: post:{id:020}
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostingKey {
    pub id: PostingId,
}

impl PostingKey {
    pub fn new(id: PostingId) -> Self {
        Self { id }
    }

    /// Encode key to bytes for storage
    pub fn to_bytes(&self) -> Vec<u8> {
        // Zero-pad to 20 digits (u64::MAX width) for lexicographic sorting
        format!("post:{:020}", self.id).into_bytes()
    }

    /// Decode key from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StorageError> {
        let s = std::str::from_utf8(bytes)
            .map_err(|e| StorageError::Key(format!("Invalid UTF-8: {}", e)))?;

        let digits = s
            .strip_prefix("post:")
            .ok_or_else(|| StorageError::Key(format!("Invalid posting key format: {}", s)))?;

        let id: PostingId = digits
            .parse()
            .map_err(|e| StorageError::Key(format!("Invalid posting id: {}", e)))?;

        Ok(Self { id })
    }
}

/// Key for the canonical URL index
/// Format: url:{canonical_url}
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlKey<'a> {
    pub url: &'a str,
}

impl<'a> UrlKey<'a> {
    pub fn new(url: &'a str) -> Self {
        Self { url }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        format!("url:{}", self.url).into_bytes()
    }
}

/// Encode a posting id as an index value.
pub fn encode_id(id: PostingId) -> [u8; 8] {
    id.to_be_bytes()
}

/// Decode an index value back into a posting id.
pub fn decode_id(bytes: &[u8]) -> Result<PostingId, StorageError> {
    let arr: [u8; 8] = bytes
        .try_into()
        .map_err(|_| StorageError::Key(format!("Invalid id length: {}", bytes.len())))?;
    Ok(PostingId::from_be_bytes(arr))
}

/// Key for ingestion run records
/// Format: run:{started_ms:013}:{ulid}
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunKey {
    /// Run start in milliseconds
    pub started_ms: i64,
    /// Unique per record, so several sources of one run never collide
    pub ulid: Ulid,
}

impl RunKey {
    /// Create a new run key with a fresh ULID
    pub fn new(started_ms: i64) -> Self {
        Self {
            started_ms,
            ulid: Ulid::new(),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        format!("run:{:013}:{}", self.started_ms, self.ulid).into_bytes()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StorageError> {
        let s = std::str::from_utf8(bytes)
            .map_err(|e| StorageError::Key(format!("Invalid UTF-8: {}", e)))?;

        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 3 || parts[0] != "run" {
            return Err(StorageError::Key(format!("Invalid run key format: {}", s)));
        }

        let started_ms: i64 = parts[1]
            .parse()
            .map_err(|e| StorageError::Key(format!("Invalid timestamp: {}", e)))?;
        let ulid: Ulid = parts[2]
            .parse()
            .map_err(|e| StorageError::Key(format!("Invalid ULID: {}", e)))?;

        Ok(Self { started_ms, ulid })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_posting_key_roundtrip() {
        let key = PostingKey::new(12345);
        let decoded = PostingKey::from_bytes(&key.to_bytes()).unwrap();
        assert_eq!(decoded.id, 12345);
    }

    #[test]
    fn test_posting_key_lexicographic_order() {
        assert!(PostingKey::new(9).to_bytes() < PostingKey::new(10).to_bytes());
        assert!(PostingKey::new(999).to_bytes() < PostingKey::new(1000).to_bytes());
    }

    #[test]
    fn test_posting_key_rejects_other_prefix() {
        assert!(PostingKey::from_bytes(b"run:1:x").is_err());
    }

    #[test]
    fn test_url_key_keeps_colons() {
        let key = UrlKey::new("https://example.com:8443/jobs/1");
        assert_eq!(key.to_bytes(), b"url:https://example.com:8443/jobs/1".to_vec());
    }

    #[test]
    fn test_id_codec() {
        assert_eq!(decode_id(&encode_id(77)).unwrap(), 77);
        assert!(decode_id(&[1, 2, 3]).is_err());
    }

    #[test]
    fn test_run_key_roundtrip_and_order() {
        let key = RunKey::new(1_706_540_400_000);
        let decoded = RunKey::from_bytes(&key.to_bytes()).unwrap();
        assert_eq!(decoded, key);

        let later = RunKey::new(1_706_540_400_001);
        assert!(key.to_bytes() < later.to_bytes());
    }
}
