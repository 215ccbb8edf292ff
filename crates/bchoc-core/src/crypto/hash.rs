//! SHA-256 hashing and chain-link primitives.

use sha2::Sha256;
use thiserror::Error;

/// Size of a block digest in bytes.
pub const DIGEST_SIZE: usize = 32;

/// A 32-byte block digest.
pub type Digest = [u8; DIGEST_SIZE];

/// The all-zero previous digest carried by the genesis block.
pub const GENESIS_PREV_DIGEST: Digest = [0u8; DIGEST_SIZE];

/// A block's stored previous digest does not name its predecessor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("chain link broken: expected {}, found {}", hex::encode(expected), hex::encode(found))]
pub struct LinkError {
    /// Digest of the preceding block's stored bytes.
    pub expected: Digest,
    /// Previous digest recorded in the block itself.
    pub found: Digest,
}

/// Hasher for encoded ledger records.
pub struct BlockHasher;

impl BlockHasher {
    /// Hashes the canonical encoding of a record.
    ///
    /// The digest is taken over the exact bytes stored on disk, so callers
    /// holding raw records hash them directly instead of re-encoding.
    #[must_use]
    pub fn hash_record(record: &[u8]) -> Digest {
        use sha2::Digest as _;

        let mut hasher = Sha256::new();
        hasher.update(record);
        hasher.finalize().into()
    }

    /// Checks that `stored_prev` names the block whose digest is
    /// `predecessor`.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError`] if the digests differ.
    pub fn verify_link(stored_prev: &Digest, predecessor: &Digest) -> Result<(), LinkError> {
        if stored_prev != predecessor {
            return Err(LinkError {
                expected: *predecessor,
                found: *stored_prev,
            });
        }
        Ok(())
    }
}

/// Lowercase hex rendering of a digest.
#[must_use]
pub fn digest_hex(digest: &Digest) -> String {
    hex::encode(digest)
}

/// First eight bytes of a digest in hex, for log fields.
#[must_use]
pub fn short_hex(digest: &Digest) -> String {
    hex::encode(&digest[..8])
}

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_hash_record_is_deterministic() {
        let a = BlockHasher::hash_record(b"record bytes");
        let b = BlockHasher::hash_record(b"record bytes");
        let c = BlockHasher::hash_record(b"other bytes");

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_hash_record_known_vector() {
        // SHA-256("abc")
        let digest = BlockHasher::hash_record(b"abc");
        assert_eq!(
            digest_hex(&digest),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_verify_link() {
        let prev = BlockHasher::hash_record(b"genesis");
        BlockHasher::verify_link(&prev, &prev).unwrap();

        let err = BlockHasher::verify_link(&GENESIS_PREV_DIGEST, &prev).unwrap_err();
        assert_eq!(err.expected, prev);
        assert_eq!(err.found, GENESIS_PREV_DIGEST);
        assert!(err.to_string().contains(&digest_hex(&prev)));
    }

    #[test]
    fn test_short_hex() {
        let digest = [0xabu8; DIGEST_SIZE];
        assert_eq!(short_hex(&digest), "abababababababab");
    }
}
