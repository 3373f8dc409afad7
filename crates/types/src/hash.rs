//! Content-addressing hash type using Blake3.

use crate::codec::{ByteReader, ByteWriter, CodecError, Decodable, Encodable};
use std::fmt;

/// A 32-byte Blake3 content hash.
///
/// Blocks, headers, transactions, and assets are all addressed by the hash
/// of their serialized form. Deterministic, ordered, and usable as a map key.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hash([u8; 32]);

impl Hash {
    /// Size of a hash in bytes.
    pub const BYTES: usize = 32;

    /// Zero hash (all bytes 0x00). Used as the genesis previous-hash.
    pub const ZERO: Self = Self([0u8; 32]);

    /// Hash a byte slice.
    pub fn digest(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Hash the concatenation of multiple byte slices.
    pub fn digest_parts(parts: &[&[u8]]) -> Self {
        let mut hasher = blake3::Hasher::new();
        for part in parts {
            hasher.update(part);
        }
        Self(*hasher.finalize().as_bytes())
    }

    /// Wrap raw digest bytes without hashing.
    pub const fn from_raw(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Wrap raw digest bytes from a slice.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CodecError> {
        let arr: [u8; 32] = bytes.try_into().map_err(|_| CodecError::Invalid {
            what: "hash",
            detail: format!("expected 32 bytes, got {}", bytes.len()),
        })?;
        Ok(Self(arr))
    }

    /// Parse from a 64-character hex string.
    pub fn from_hex(hex_str: &str) -> Result<Self, CodecError> {
        if hex_str.len() != 64 {
            return Err(CodecError::Invalid {
                what: "hash hex",
                detail: format!("expected 64 chars, got {}", hex_str.len()),
            });
        }
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(hex_str, &mut bytes).map_err(|e| CodecError::Invalid {
            what: "hash hex",
            detail: e.to_string(),
        })?;
        Ok(Self(bytes))
    }

    /// Hex representation.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Whether this is the zero hash.
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }
}

impl Encodable for Hash {
    fn encode(&self, w: &mut ByteWriter) {
        w.write_bytes(&self.0);
    }
}

impl Decodable for Hash {
    fn decode(r: &mut ByteReader<'_>) -> Result<Self, CodecError> {
        let bytes = r.read_exact(Self::BYTES)?;
        Self::from_slice(bytes)
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = self.to_hex();
        write!(f, "Hash({}..{})", &hex[..8], &hex[56..])
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Compute a binary merkle root over a list of hashes.
///
/// Sibling pairs are combined with Blake3 at each level; an odd trailing
/// hash is promoted unchanged. Returns `Hash::ZERO` for an empty list.
pub fn compute_merkle_root(hashes: &[Hash]) -> Hash {
    if hashes.is_empty() {
        return Hash::ZERO;
    }

    let mut level: Vec<Hash> = hashes.to_vec();
    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        for chunk in level.chunks(2) {
            let combined = if chunk.len() == 2 {
                Hash::digest_parts(&[chunk[0].as_bytes(), chunk[1].as_bytes()])
            } else {
                // Odd node promotes up unchanged
                chunk[0]
            };
            next.push(combined);
        }
        level = next;
    }
    level[0]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_deterministic() {
        assert_eq!(Hash::digest(b"abc"), Hash::digest(b"abc"));
        assert_ne!(Hash::digest(b"abc"), Hash::digest(b"abd"));
    }

    #[test]
    fn test_hex_roundtrip() {
        let h = Hash::digest(b"round trip");
        let parsed = Hash::from_hex(&h.to_hex()).unwrap();
        assert_eq!(h, parsed);
    }

    #[test]
    fn test_codec_roundtrip() {
        let h = Hash::digest(b"codec");
        let bytes = h.to_vec();
        assert_eq!(bytes.len(), Hash::BYTES);
        assert_eq!(Hash::from_bytes(&bytes).unwrap(), h);
    }

    #[test]
    fn test_merkle_root_empty_and_single() {
        assert_eq!(compute_merkle_root(&[]), Hash::ZERO);
        let h = Hash::digest(b"only");
        assert_eq!(compute_merkle_root(&[h]), h);
    }

    #[test]
    fn test_merkle_root_order_matters() {
        let a = Hash::digest(b"a");
        let b = Hash::digest(b"b");
        assert_ne!(compute_merkle_root(&[a, b]), compute_merkle_root(&[b, a]));
    }

    #[test]
    fn test_merkle_root_odd_count() {
        let h: Vec<Hash> = (0u8..3).map(|i| Hash::digest(&[i])).collect();
        let left = Hash::digest_parts(&[h[0].as_bytes(), h[1].as_bytes()]);
        let expected = Hash::digest_parts(&[left.as_bytes(), h[2].as_bytes()]);
        assert_eq!(compute_merkle_root(&h), expected);
    }
}
