//! Digest primitives for the custody chain.
//!
//! Every block is linked to its predecessor by the SHA-256 digest of the
//! predecessor's canonical on-disk encoding. The genesis block links to the
//! all-zero sentinel [`GENESIS_PREV_DIGEST`].

mod hash;

pub use hash::{
    BlockHasher, DIGEST_SIZE, Digest, GENESIS_PREV_DIGEST, LinkError, digest_hex, short_hex,
};
