//! Error types for ledger operations.

use std::path::PathBuf;

use thiserror::Error;

use crate::block::{EvidenceId, EvidenceState};
use crate::config::ConfigError;
use crate::crypto::{Digest, digest_hex};
use crate::custody::Action;
use crate::verify::ViolationKind;

/// A stored record could not be decoded.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum FormatError {
    /// A record buffer had the wrong size.
    #[error("record is {actual} bytes, expected {expected}")]
    RecordLength {
        /// Required record size.
        expected: usize,
        /// Size that was supplied.
        actual: usize,
    },

    /// The ledger file ends in a partial record.
    #[error("ledger ends with {trailing} bytes after record {records}, not a whole record")]
    TrailingBytes {
        /// Number of whole records before the partial one.
        records: u64,
        /// Size of the partial record.
        trailing: u64,
    },

    /// A text slot holds bytes that are not UTF-8.
    #[error("field {field} is not valid UTF-8")]
    InvalidUtf8 {
        /// The offending field.
        field: &'static str,
    },

    /// The state slot holds an unrecognized tag.
    #[error("unknown state tag {tag:?}")]
    UnknownState {
        /// The tag as stored.
        tag: String,
    },

    /// The declared payload length exceeds the slot.
    #[error("data length {length} exceeds the {max}-byte payload slot")]
    DataLength {
        /// Declared length.
        length: u32,
        /// Slot capacity.
        max: usize,
    },

    /// The payload slot has non-zero bytes past the declared length.
    #[error("payload slot has data past declared length {length}")]
    PayloadPadding {
        /// Declared length.
        length: u32,
    },

    /// The timestamp is not a representable whole second.
    #[error("invalid timestamp {value}")]
    Timestamp {
        /// Raw stored value.
        value: f64,
    },
}

/// Errors returned by the store, the custody state machine and the verifier.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CustodyError {
    /// Malformed or truncated record.
    #[error("malformed ledger: {0}")]
    Format(#[from] FormatError),

    /// I/O error on the ledger file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The ledger file has not been created yet.
    #[error("ledger not found at {}; run init first", path.display())]
    NotInitialized {
        /// Path that was looked up.
        path: PathBuf,
    },

    /// The ledger holds no blocks.
    #[error("ledger is empty")]
    EmptyStore,

    /// The evidence item has no history.
    #[error("evidence item {evidence_id} not found")]
    NotFound {
        /// The item that was looked up.
        evidence_id: EvidenceId,
    },

    /// The evidence item was already added.
    #[error("evidence item {evidence_id} already exists")]
    DuplicateEvidence {
        /// The duplicate item.
        evidence_id: EvidenceId,
    },

    /// The action is not allowed from the item's current state.
    #[error("cannot {action} evidence item {evidence_id}: it is {current}")]
    IllegalTransition {
        /// The item acted on.
        evidence_id: EvidenceId,
        /// Its current state.
        current: EvidenceState,
        /// The rejected action.
        action: Action,
    },

    /// A required field is missing or does not fit the record layout.
    #[error("invalid {field}: {reason}")]
    Validation {
        /// Field that failed validation.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// The chain failed verification.
    #[error("chain integrity violation at block {}: {kind}", digest_hex(digest))]
    ChainIntegrity {
        /// What was violated.
        kind: ViolationKind,
        /// Digest of the offending block.
        digest: Digest,
    },

    /// The configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl CustodyError {
    /// Shorthand for a missing required field.
    pub(crate) fn missing(field: &'static str) -> Self {
        Self::Validation {
            field,
            reason: "must not be empty".to_string(),
        }
    }
}
