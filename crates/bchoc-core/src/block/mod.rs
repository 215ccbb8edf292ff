//! Ledger blocks and their fixed-layout binary codec.
//!
//! A [`Block`] is one custody action. It is always encodable: the bounded
//! text types reject values that would not survive the fixed-width slots,
//! so `decode(encode(b)) == b` holds for every value that can be built.
//!
//! # Record layout
//!
//! | Bytes     | Field          | Encoding                                 |
//! |-----------|----------------|------------------------------------------|
//! | 0..32     | `prev_digest`  | raw SHA-256, all-zero for genesis        |
//! | 32..40    | `timestamp`    | `f64` little-endian, whole Unix seconds  |
//! | 40..56    | `case_id`      | UTF-8, zero-padded                       |
//! | 56..60    | `evidence_id`  | `u32` little-endian                      |
//! | 60..72    | `state`        | ASCII tag, zero-padded                   |
//! | 72..92    | `handler`      | UTF-8, zero-padded                       |
//! | 92..112   | `organization` | UTF-8, zero-padded                       |
//! | 112..116  | `data_length`  | `u32` little-endian, at most 255         |
//! | 116..371  | `data`         | UTF-8, zero-padded payload slot          |

mod codec;
mod state;


use std::fmt;

use chrono::{DateTime, SubsecRound, Utc};

pub use codec::{
    CASE_ID_LEN, HANDLER_LEN, MAX_DATA_LEN, ORGANIZATION_LEN, RECORD_LEN, STATE_LEN, decode,
    digest, digest_record, encode, prev_digest_of,
};
pub use state::{EvidenceState, RemovalReason};

use crate::crypto::{Digest, GENESIS_PREV_DIGEST};
use crate::error::CustodyError;

/// Identifier of one evidence item; `0` is reserved for genesis.
pub type EvidenceId = u32;

/// Declared payload length of the genesis block.
pub const GENESIS_DATA_LENGTH: u32 = 14;

/// Payload text of the genesis block.
pub const GENESIS_DATA: &str = "Initial block";

/// UTF-8 text bounded to an `N`-byte zero-padded slot.
///
/// Values never exceed `N` bytes. Values built with [`BoundedText::new`]
/// never contain NUL, which would be indistinguishable from trailing padding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BoundedText<const N: usize>(String);

/// Case identifier (16-byte slot).
pub type CaseId = BoundedText<CASE_ID_LEN>;

/// Name of the person performing an action (20-byte slot).
pub type Handler = BoundedText<HANDLER_LEN>;

/// Organization, or owner for removals (20-byte slot).
pub type Organization = BoundedText<ORGANIZATION_LEN>;

impl<const N: usize> BoundedText<N> {
    /// Validates `value` for an `N`-byte slot.
    ///
    /// # Errors
    ///
    /// Returns [`CustodyError::Validation`] if the value is longer than `N`
    /// bytes or contains NUL.
    pub fn new(field: &'static str, value: impl Into<String>) -> Result<Self, CustodyError> {
        let value = value.into();
        if value.len() > N {
            return Err(CustodyError::Validation {
                field,
                reason: format!("{:?} is {} bytes, limit is {N}", value, value.len()),
            });
        }
        if value.contains('\0') {
            return Err(CustodyError::Validation {
                field,
                reason: "must not contain NUL".to_string(),
            });
        }
        Ok(Self(value))
    }

    /// The empty value, encoded as an all-zero slot.
    #[must_use]
    pub const fn empty() -> Self {
        Self(String::new())
    }

    /// Wraps text recovered by the decoder, which has already stripped
    /// padding and checked UTF-8 and width.
    pub(crate) const fn from_decoded(value: String) -> Self {
        Self(value)
    }

    /// The text itself.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the value is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<const N: usize> fmt::Display for BoundedText<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<const N: usize> AsRef<str> for BoundedText<N> {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Trailing free-text note with its declared length.
///
/// The declared length may exceed the text's byte length; the gap is zero
/// bytes in the slot. The genesis block relies on this: it declares 14
/// bytes for the 13-byte note `"Initial block"`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Payload {
    length: u32,
    text: String,
}

impl Payload {
    /// A payload whose declared length is exactly its byte length.
    ///
    /// # Errors
    ///
    /// Returns [`CustodyError::Validation`] if the text exceeds
    /// [`MAX_DATA_LEN`] bytes or contains NUL.
    pub fn new(text: impl Into<String>) -> Result<Self, CustodyError> {
        let text = text.into();
        let length = u32::try_from(text.len()).unwrap_or(u32::MAX);
        Self::with_length(text, length)
    }

    /// A payload with an explicit declared length.
    ///
    /// # Errors
    ///
    /// Returns [`CustodyError::Validation`] if `length` exceeds
    /// [`MAX_DATA_LEN`], the text is longer than `length`, or the text
    /// contains NUL.
    pub fn with_length(text: impl Into<String>, length: u32) -> Result<Self, CustodyError> {
        let text = text.into();
        if length as usize > MAX_DATA_LEN {
            return Err(CustodyError::Validation {
                field: "data",
                reason: format!("declared length {length} exceeds the {MAX_DATA_LEN}-byte limit"),
            });
        }
        if text.len() > length as usize {
            return Err(CustodyError::Validation {
                field: "data",
                reason: format!("{} bytes of text exceed declared length {length}", text.len()),
            });
        }
        if text.contains('\0') {
            return Err(CustodyError::Validation {
                field: "data",
                reason: "must not contain NUL".to_string(),
            });
        }
        Ok(Self { length, text })
    }

    /// The empty payload carried by every non-genesis block.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            length: 0,
            text: String::new(),
        }
    }

    /// The genesis note.
    #[must_use]
    pub fn genesis() -> Self {
        Self {
            length: GENESIS_DATA_LENGTH,
            text: GENESIS_DATA.to_string(),
        }
    }

    pub(crate) const fn from_decoded(length: u32, text: String) -> Self {
        Self { length, text }
    }

    /// Declared length (`data_length` on disk).
    #[must_use]
    pub const fn declared_len(&self) -> u32 {
        self.length
    }

    /// The note text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }
}

/// One ledger entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Digest of the preceding block's encoding, or all zero for genesis.
    pub prev_digest: Digest,
    /// When the action was recorded, whole seconds.
    pub timestamp: DateTime<Utc>,
    /// Case the item belongs to; empty for genesis.
    pub case_id: CaseId,
    /// Item identifier; `0` for genesis.
    pub evidence_id: EvidenceId,
    /// Lifecycle tag.
    pub state: EvidenceState,
    /// Who performed the action.
    pub handler: Handler,
    /// Organization context, or owner for removals.
    pub organization: Organization,
    /// Trailing note; empty for all but genesis.
    pub data: Payload,
}

impl Block {
    /// Builds the genesis block for a new ledger.
    #[must_use]
    pub fn genesis(timestamp: DateTime<Utc>) -> Self {
        Self {
            prev_digest: GENESIS_PREV_DIGEST,
            timestamp: timestamp.trunc_subsecs(0),
            case_id: CaseId::empty(),
            evidence_id: 0,
            state: EvidenceState::Initial,
            handler: Handler::empty(),
            organization: Organization::empty(),
            data: Payload::genesis(),
        }
    }

    /// Builds a custody action block with an empty payload.
    ///
    /// The timestamp is truncated to whole seconds, the precision the record
    /// layout keeps.
    #[must_use]
    pub fn action(
        prev_digest: Digest,
        timestamp: DateTime<Utc>,
        case_id: CaseId,
        evidence_id: EvidenceId,
        state: EvidenceState,
        handler: Handler,
        organization: Organization,
    ) -> Self {
        Self {
            prev_digest,
            timestamp: timestamp.trunc_subsecs(0),
            case_id,
            evidence_id,
            state,
            handler,
            organization,
            data: Payload::empty(),
        }
    }

    /// Whether every field matches the genesis invariants (any timestamp).
    #[must_use]
    pub fn is_genesis(&self) -> bool {
        self.prev_digest == GENESIS_PREV_DIGEST
            && self.case_id.is_empty()
            && self.evidence_id == 0
            && self.state == EvidenceState::Initial
            && self.handler.is_empty()
            && self.organization.is_empty()
            && self.data.declared_len() == GENESIS_DATA_LENGTH
            && self.data.text() == GENESIS_DATA
    }

    /// Canonical fixed-size encoding.
    #[must_use]
    pub fn encode(&self) -> [u8; RECORD_LEN] {
        encode(self)
    }

    /// SHA-256 of the canonical encoding.
    #[must_use]
    pub fn digest(&self) -> Digest {
        digest(self)
    }
}
