//! Account addresses.

use crate::codec::{ByteReader, ByteWriter, CodecError, Decodable, Encodable};
use crate::hash::Hash;
use std::fmt;

/// A 20-byte account address derived from an owner's verification program.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; 20]);

impl Address {
    /// Size of an address in bytes.
    pub const BYTES: usize = 20;

    /// Zero address.
    pub const ZERO: Self = Self([0u8; 20]);

    /// Wrap raw address bytes.
    pub const fn from_raw(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Derive an address from a verification program: the first 20 bytes of
    /// the program's content hash.
    pub fn from_program(program: &[u8]) -> Self {
        let digest = Hash::digest(program);
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&digest.as_bytes()[..20]);
        Self(bytes)
    }

    /// Wrap raw address bytes from a slice.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CodecError> {
        let arr: [u8; 20] = bytes.try_into().map_err(|_| CodecError::Invalid {
            what: "address",
            detail: format!("expected 20 bytes, got {}", bytes.len()),
        })?;
        Ok(Self(arr))
    }

    /// Parse from a 40-character hex string.
    pub fn from_hex(hex_str: &str) -> Result<Self, CodecError> {
        if hex_str.len() != 40 {
            return Err(CodecError::Invalid {
                what: "address hex",
                detail: format!("expected 40 chars, got {}", hex_str.len()),
            });
        }
        let mut bytes = [0u8; 20];
        hex::decode_to_slice(hex_str, &mut bytes).map_err(|e| CodecError::Invalid {
            what: "address hex",
            detail: e.to_string(),
        })?;
        Ok(Self(bytes))
    }

    /// Hex representation.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Address bytes.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl Encodable for Address {
    fn encode(&self, w: &mut ByteWriter) {
        w.write_bytes(&self.0);
    }
}

impl Decodable for Address {
    fn decode(r: &mut ByteReader<'_>) -> Result<Self, CodecError> {
        let bytes = r.read_exact(Self::BYTES)?;
        Self::from_slice(bytes)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = self.to_hex();
        write!(f, "Address({}..{})", &hex[..6], &hex[34..])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_program_deterministic() {
        let a = Address::from_program(b"verification program");
        let b = Address::from_program(b"verification program");
        assert_eq!(a, b);
        assert_ne!(a, Address::from_program(b"other program"));
    }

    #[test]
    fn test_hex_roundtrip() {
        let addr = Address::from_program(b"hex");
        assert_eq!(Address::from_hex(&addr.to_hex()).unwrap(), addr);
    }

    #[test]
    fn test_codec_roundtrip() {
        let addr = Address::from_program(b"codec");
        assert_eq!(Address::from_bytes(&addr.to_vec()).unwrap(), addr);
    }
}
