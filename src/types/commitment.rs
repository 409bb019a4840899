//! 32-byte commitments over SSZ-encoded preimages.

use std::fmt;

use sha2::{Digest, Sha256};
use ssz_rs::prelude::*;

use crate::error::MarketError;

/// SHA-256 digest standing in for a stored listing or order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Commitment(pub [u8; 32]);

impl Commitment {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// First 8 hex characters, for log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

/// SSZ-serialize `value` and hash the bytes.
pub fn hash_ssz<T: SimpleSerialize>(value: &T) -> Result<Commitment, MarketError> {
    let bytes = ssz_rs::serialize(value).map_err(|e| MarketError::Encoding(format!("{:?}", e)))?;
    Ok(Commitment(Sha256::digest(&bytes).into()))
}

/// Pack a raw digest into the SSZ vector used inside preimages.
pub(crate) fn digest_vector(digest: &[u8; 32]) -> Result<Vector<u8, 32>, MarketError> {
    ssz_rs::deserialize::<Vector<u8, 32>>(digest).map_err(|e| MarketError::Encoding(format!("{:?}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq, Default, SimpleSerialize)]
    struct Pair {
        a: u64,
        b: u8,
    }

    #[test]
    fn test_hash_is_deterministic() {
        let first = hash_ssz(&Pair { a: 7, b: 1 }).unwrap();
        let second = hash_ssz(&Pair { a: 7, b: 1 }).unwrap();
        assert_eq!(first, second);
        assert_ne!(first, hash_ssz(&Pair { a: 7, b: 2 }).unwrap());
    }

    #[test]
    fn test_hash_matches_manual_encoding() {
        // 8 LE bytes for `a`, then one byte for `b`.
        let mut bytes = 7u64.to_le_bytes().to_vec();
        bytes.push(1);
        let expected: [u8; 32] = Sha256::digest(&bytes).into();
        assert_eq!(hash_ssz(&Pair { a: 7, b: 1 }).unwrap().0, expected);
    }

    #[test]
    fn test_display() {
        let commitment = Commitment([0xab; 32]);
        assert_eq!(commitment.short(), "abababab");
        assert!(commitment.to_string().starts_with("0xabab"));
        assert_eq!(commitment.to_hex().len(), 64);
    }

    #[test]
    fn test_digest_vector() {
        let vector = digest_vector(&[3u8; 32]).unwrap();
        assert_eq!(vector.len(), 32);
        assert!(vector.iter().all(|b| *b == 3));
    }
}
