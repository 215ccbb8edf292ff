//! Whole-chain verification.
//!
//! The verifier replays raw records in store order and stops at the first
//! violation. It hashes the bytes as stored rather than a re-encoding, so a
//! record that no longer decodes still links (or fails to link) exactly as
//! written.
//!
//! Checks per block, in order:
//!
//! 1. the record decodes (an unknown state tag is reported later),
//! 2. block 0 has the genesis shape,
//! 3. no earlier block used the same `prev_digest`,
//! 4. `prev_digest` is the digest of the preceding record,
//! 5. the state tag is known,
//! 6. a non-genesis block carries neither id `0` nor `INITIAL`,
//! 7. removals name an owner,
//! 8. an item never changes case,
//! 9. the item's transition is allowed by [`transition`].
//!
//! A chain without an external head anchor cannot reveal edits to the
//! final block's non-link fields; every other single-byte change is caught
//! by linkage or one of the checks above.


use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

use crate::block::{self, CaseId, EvidenceId, EvidenceState};
use crate::crypto::{BlockHasher, Digest, short_hex};
use crate::custody::{Action, CustodyProjection, TransitionError, transition};
use crate::error::{CustodyError, FormatError};
use crate::store::{ChainStore, Record};

/// Why a block failed verification.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum ViolationKind {
    /// The record does not decode.
    #[error("malformed record: {0}")]
    MalformedRecord(FormatError),

    /// Block 0 is not a genesis block.
    #[error("bad genesis block")]
    BadGenesis,

    /// Another block already links to the same predecessor.
    #[error("duplicate parent: block {first} already links to {}", short_hex(parent))]
    DuplicateParent {
        /// The shared `prev_digest`.
        parent: Digest,
        /// Index of the block that used it first.
        first: u64,
    },

    /// `prev_digest` is not the digest of the preceding record.
    #[error("broken link: expected parent {}, found {}", short_hex(expected), short_hex(found))]
    BrokenLink {
        /// Digest of the preceding record.
        expected: Digest,
        /// `prev_digest` as stored.
        found: Digest,
    },

    /// The state slot holds an unrecognized tag.
    #[error("invalid state tag {tag:?}")]
    InvalidStateTag {
        /// The tag as stored.
        tag: String,
    },

    /// A non-genesis block uses evidence id 0 or the `INITIAL` state.
    #[error("non-genesis block uses the genesis id or state")]
    ReservedGenesisMarker,

    /// A removal block has no owner.
    #[error("removal of item {evidence_id} without owner")]
    RemovalWithoutOwner {
        /// The removed item.
        evidence_id: EvidenceId,
    },

    /// An item appears under a different case than it was added to.
    #[error("item {evidence_id} moved from case {expected:?} to {found:?}")]
    CaseMismatch {
        /// The item.
        evidence_id: EvidenceId,
        /// Case it was added under.
        expected: CaseId,
        /// Case on the offending block.
        found: CaseId,
    },

    /// Check-in of an item that is already checked in.
    #[error("item {evidence_id} checked in twice")]
    DoubleCheckIn {
        /// The item.
        evidence_id: EvidenceId,
    },

    /// Check-out of an item that is already checked out.
    #[error("item {evidence_id} checked out twice")]
    DoubleCheckOut {
        /// The item.
        evidence_id: EvidenceId,
    },

    /// Removal of an item that was already removed.
    #[error("item {evidence_id} removed twice")]
    DoubleRemoval {
        /// The item.
        evidence_id: EvidenceId,
    },

    /// Check-in or check-out of a removed item.
    #[error("item {evidence_id} acted on after removal ({state})")]
    ActionAfterRemoval {
        /// The item.
        evidence_id: EvidenceId,
        /// Its terminal state.
        state: EvidenceState,
    },

    /// Removal of an item with no prior history.
    #[error("item {evidence_id} removed before being added")]
    RemovedBeforeAdded {
        /// The item.
        evidence_id: EvidenceId,
    },

    /// Check-out of an item with no prior history.
    #[error("item {evidence_id} checked out before being added")]
    ActionBeforeAdded {
        /// The item.
        evidence_id: EvidenceId,
    },

    /// Removal of a checked-out item.
    #[error("item {evidence_id} removed while checked out")]
    RemovedWhileCheckedOut {
        /// The item.
        evidence_id: EvidenceId,
    },
}

/// The first violation found.
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    /// Record index of the offending block.
    pub index: u64,
    /// Digest of the offending record as stored.
    pub digest: Digest,
    /// What was violated.
    pub kind: ViolationKind,
}

/// Counts surfaced for a valid chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainSummary {
    /// Blocks including genesis.
    pub blocks: u64,
    /// Distinct case ids.
    pub cases: usize,
    /// Distinct evidence items.
    pub items: usize,
}

/// Verdict of a verification run.
#[derive(Debug, Clone, PartialEq)]
pub enum VerifyOutcome {
    /// Every block passed.
    Valid(ChainSummary),
    /// The chain is invalid at the given block.
    Invalid(Violation),
}

/// Result of [`verify`].
#[derive(Debug, Clone, PartialEq)]
pub struct VerifyReport {
    /// Records examined, including the offending one.
    pub transactions: u64,
    /// The verdict.
    pub outcome: VerifyOutcome,
}

impl VerifyReport {
    /// Whether the chain verified.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        matches!(self.outcome, VerifyOutcome::Valid(_))
    }

    /// The violation, if any.
    #[must_use]
    pub const fn violation(&self) -> Option<&Violation> {
        match &self.outcome {
            VerifyOutcome::Valid(_) => None,
            VerifyOutcome::Invalid(violation) => Some(violation),
        }
    }

    /// Converts an invalid report into [`CustodyError::ChainIntegrity`].
    ///
    /// # Errors
    ///
    /// Returns the violation as an error if the chain is invalid.
    pub fn into_result(self) -> Result<ChainSummary, CustodyError> {
        match self.outcome {
            VerifyOutcome::Valid(summary) => Ok(summary),
            VerifyOutcome::Invalid(Violation { kind, digest, .. }) => {
                Err(CustodyError::ChainIntegrity { kind, digest })
            },
        }
    }
}

impl fmt::Display for VerifyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            VerifyOutcome::Valid(summary) => write!(
                f,
                "valid: {} blocks, {} cases, {} items",
                summary.blocks, summary.cases, summary.items
            ),
            VerifyOutcome::Invalid(violation) => write!(
                f,
                "invalid at block {} ({}): {}",
                violation.index,
                short_hex(&violation.digest),
                violation.kind
            ),
        }
    }
}

/// Verifies the chain stored in `store`.
///
/// # Errors
///
/// Returns [`CustodyError::NotInitialized`] for a missing file,
/// [`CustodyError::EmptyStore`] for an empty one, and any I/O error or torn
/// trailing record. Violations are reported in the [`VerifyReport`].
pub fn verify(store: &ChainStore) -> Result<VerifyReport, CustodyError> {
    verify_records(store.records()?)
}

/// Verifies a sequence of raw records, as [`verify`] does for a store.
///
/// # Errors
///
/// Returns the first error yielded by `records`, or
/// [`CustodyError::EmptyStore`] if it yields nothing.
pub fn verify_records<I>(records: I) -> Result<VerifyReport, CustodyError>
where
    I: IntoIterator<Item = Result<Record, CustodyError>>,
{
    let mut verifier = Verifier::default();
    for record in records {
        let record = record?;
        if let Err(kind) = verifier.check(&record) {
            let violation = Violation {
                index: verifier.index,
                digest: block::digest_record(&record),
                kind,
            };
            tracing::warn!(
                index = violation.index,
                digest = %short_hex(&violation.digest),
                violation = %violation.kind,
                "chain verification failed"
            );
            return Ok(VerifyReport {
                transactions: verifier.index + 1,
                outcome: VerifyOutcome::Invalid(violation),
            });
        }
        verifier.index += 1;
    }

    if verifier.index == 0 {
        return Err(CustodyError::EmptyStore);
    }
    let summary = ChainSummary {
        blocks: verifier.index,
        cases: verifier.items.cases().len(),
        items: verifier.items.len(),
    };
    tracing::debug!(blocks = summary.blocks, "chain verified");
    Ok(VerifyReport {
        transactions: verifier.index,
        outcome: VerifyOutcome::Valid(summary),
    })
}

#[derive(Debug, Default)]
struct Verifier {
    index: u64,
    previous: Option<Digest>,
    parents: HashMap<Digest, u64>,
    items: CustodyProjection,
}

impl Verifier {
    fn check(&mut self, record: &Record) -> Result<(), ViolationKind> {
        let decoded = match block::decode(record) {
            Ok(block) => Ok(block),
            Err(FormatError::UnknownState { tag }) => Err(tag),
            Err(err) => return Err(ViolationKind::MalformedRecord(err)),
        };

        let digest = block::digest_record(record);
        let parent = block::prev_digest_of(record);
        let previous = self.previous.replace(digest);

        let Some(previous) = previous else {
            return match decoded {
                Ok(block) if block.is_genesis() => {
                    self.parents.insert(parent, self.index);
                    Ok(())
                },
                _ => Err(ViolationKind::BadGenesis),
            };
        };

        if let Some(&first) = self.parents.get(&parent) {
            return Err(ViolationKind::DuplicateParent { parent, first });
        }
        self.parents.insert(parent, self.index);

        BlockHasher::verify_link(&parent, &previous).map_err(|err| ViolationKind::BrokenLink {
            expected: err.expected,
            found: err.found,
        })?;

        let block = decoded.map_err(|tag| ViolationKind::InvalidStateTag { tag })?;
        let evidence_id = block.evidence_id;

        if evidence_id == 0 || block.state == EvidenceState::Initial {
            return Err(ViolationKind::ReservedGenesisMarker);
        }
        if block.state.is_terminal() && block.organization.is_empty() {
            return Err(ViolationKind::RemovalWithoutOwner { evidence_id });
        }

        let current = self.items.item(evidence_id);
        if let Some(item) = current {
            if item.case_id != block.case_id {
                return Err(ViolationKind::CaseMismatch {
                    evidence_id,
                    expected: item.case_id.clone(),
                    found: block.case_id,
                });
            }
        }

        let current = current.map(|item| item.state);
        let action = Action::recorded_by(block.state, current.is_some())
            .ok_or(ViolationKind::ReservedGenesisMarker)?;
        transition(current, action)
            .map_err(|err| illegal_transition(err, evidence_id, current, action))?;

        self.items.apply(&block);
        Ok(())
    }
}

fn illegal_transition(
    err: TransitionError,
    evidence_id: EvidenceId,
    current: Option<EvidenceState>,
    action: Action,
) -> ViolationKind {
    match err {
        TransitionError::NotFound if matches!(action, Action::Remove(_)) => {
            ViolationKind::RemovedBeforeAdded { evidence_id }
        },
        TransitionError::NotFound => ViolationKind::ActionBeforeAdded { evidence_id },
        TransitionError::AlreadyAdded | TransitionError::AlreadyCheckedIn => {
            ViolationKind::DoubleCheckIn { evidence_id }
        },
        TransitionError::AlreadyCheckedOut => ViolationKind::DoubleCheckOut { evidence_id },
        TransitionError::NotCheckedIn => ViolationKind::RemovedWhileCheckedOut { evidence_id },
        TransitionError::AlreadyRemoved => ViolationKind::DoubleRemoval { evidence_id },
        TransitionError::AfterRemoval => ViolationKind::ActionAfterRemoval {
            evidence_id,
            state: current.unwrap_or(EvidenceState::Initial),
        },
        TransitionError::Reserved => ViolationKind::ReservedGenesisMarker,
    }
}
