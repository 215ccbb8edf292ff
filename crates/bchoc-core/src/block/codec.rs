//! Positional encoder/decoder for the fixed-size block record.

// Timestamps are whole seconds well inside the f64 integer range; chrono
// rejects anything out of range after the cast back.
#![allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]

use std::ops::Range;

use chrono::DateTime;

use super::{Block, BoundedText, EvidenceState, Payload};
use crate::crypto::{BlockHasher, DIGEST_SIZE, Digest};
use crate::error::FormatError;

/// Width of the case id slot.
pub const CASE_ID_LEN: usize = 16;
/// Width of the state tag slot.
pub const STATE_LEN: usize = 12;
/// Width of the handler slot.
pub const HANDLER_LEN: usize = 20;
/// Width of the organization slot.
pub const ORGANIZATION_LEN: usize = 20;
/// Capacity of the trailing payload slot.
pub const MAX_DATA_LEN: usize = 255;

const PREV_DIGEST: Range<usize> = 0..DIGEST_SIZE;
const TIMESTAMP: Range<usize> = PREV_DIGEST.end..PREV_DIGEST.end + 8;
const CASE_ID: Range<usize> = TIMESTAMP.end..TIMESTAMP.end + CASE_ID_LEN;
const EVIDENCE_ID: Range<usize> = CASE_ID.end..CASE_ID.end + 4;
const STATE: Range<usize> = EVIDENCE_ID.end..EVIDENCE_ID.end + STATE_LEN;
const HANDLER: Range<usize> = STATE.end..STATE.end + HANDLER_LEN;
const ORGANIZATION: Range<usize> = HANDLER.end..HANDLER.end + ORGANIZATION_LEN;
const DATA_LENGTH: Range<usize> = ORGANIZATION.end..ORGANIZATION.end + 4;
const DATA: Range<usize> = DATA_LENGTH.end..DATA_LENGTH.end + MAX_DATA_LEN;

/// Size of one encoded block.
pub const RECORD_LEN: usize = DATA.end;

/// Encodes `block` into its canonical record.
#[must_use]
pub fn encode(block: &Block) -> [u8; RECORD_LEN] {
    let mut out = [0u8; RECORD_LEN];
    out[PREV_DIGEST].copy_from_slice(&block.prev_digest);
    out[TIMESTAMP].copy_from_slice(&(block.timestamp.timestamp() as f64).to_le_bytes());
    put_text(&mut out[CASE_ID], block.case_id.as_str());
    out[EVIDENCE_ID].copy_from_slice(&block.evidence_id.to_le_bytes());
    put_text(&mut out[STATE], block.state.as_tag());
    put_text(&mut out[HANDLER], block.handler.as_str());
    put_text(&mut out[ORGANIZATION], block.organization.as_str());
    out[DATA_LENGTH].copy_from_slice(&block.data.declared_len().to_le_bytes());
    put_text(&mut out[DATA], block.data.text());
    out
}

/// Decodes one record.
///
/// # Errors
///
/// Returns [`FormatError`] if `bytes` is not exactly [`RECORD_LEN`] long or
/// any field is malformed.
pub fn decode(bytes: &[u8]) -> Result<Block, FormatError> {
    if bytes.len() != RECORD_LEN {
        return Err(FormatError::RecordLength {
            expected: RECORD_LEN,
            actual: bytes.len(),
        });
    }

    let seconds = f64::from_le_bytes(array(&bytes[TIMESTAMP]));
    // -0.0 would decode to the epoch but re-encode as +0.0.
    if !seconds.is_finite()
        || seconds.fract() != 0.0
        || seconds.to_bits() == (-0.0f64).to_bits()
    {
        return Err(FormatError::Timestamp { value: seconds });
    }
    let timestamp = DateTime::from_timestamp(seconds as i64, 0)
        .ok_or(FormatError::Timestamp { value: seconds })?;

    let tag = take_text("state", &bytes[STATE])?;
    let state = EvidenceState::from_tag(&tag).ok_or(FormatError::UnknownState { tag })?;

    let length = u32::from_le_bytes(array(&bytes[DATA_LENGTH]));
    let declared = length as usize;
    if declared > MAX_DATA_LEN {
        return Err(FormatError::DataLength {
            length,
            max: MAX_DATA_LEN,
        });
    }
    let slot = &bytes[DATA];
    if slot[declared..].iter().any(|&b| b != 0) {
        return Err(FormatError::PayloadPadding { length });
    }
    let text = take_text("data", &slot[..declared])?;

    Ok(Block {
        prev_digest: prev_digest_of(bytes),
        timestamp,
        case_id: BoundedText::from_decoded(take_text("case_id", &bytes[CASE_ID])?),
        evidence_id: u32::from_le_bytes(array(&bytes[EVIDENCE_ID])),
        state,
        handler: BoundedText::from_decoded(take_text("handler", &bytes[HANDLER])?),
        organization: BoundedText::from_decoded(take_text("organization", &bytes[ORGANIZATION])?),
        data: Payload::from_decoded(length, text),
    })
}

/// SHA-256 of the canonical encoding of `block`.
#[must_use]
pub fn digest(block: &Block) -> Digest {
    BlockHasher::hash_record(&encode(block))
}

/// SHA-256 of a raw stored record, without decoding it.
#[must_use]
pub fn digest_record(record: &[u8; RECORD_LEN]) -> Digest {
    BlockHasher::hash_record(record)
}

/// Reads the previous-digest field of a raw record.
///
/// Works on records that do not decode, so linkage can still be checked.
///
/// # Panics
///
/// Panics if `record` is shorter than the digest field.
#[must_use]
pub fn prev_digest_of(record: &[u8]) -> Digest {
    array(&record[PREV_DIGEST])
}

fn put_text(slot: &mut [u8], text: &str) {
    slot[..text.len()].copy_from_slice(text.as_bytes());
}

fn take_text(field: &'static str, slot: &[u8]) -> Result<String, FormatError> {
    let end = slot.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    String::from_utf8(slot[..end].to_vec()).map_err(|_| FormatError::InvalidUtf8 { field })
}

fn array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(bytes);
    out
}
