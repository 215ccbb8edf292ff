//! The custody transition table.
//!
//! Both the state machine and the verifier go through [`transition`], so a
//! chain the state machine can build is exactly a chain the verifier
//! accepts.

use std::fmt;

use crate::block::{EvidenceId, EvidenceState, RemovalReason};
use crate::error::CustodyError;

/// A custody action requested on an evidence item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// First check-in of a new item.
    Add,
    /// Take a checked-in item out.
    CheckOut,
    /// Return a checked-out item.
    CheckIn,
    /// Take a checked-in item out of custody for good.
    Remove(RemovalReason),
}

impl Action {
    /// The action a stored block with `state` records, given whether the
    /// item already had history when the block was written.
    ///
    /// Returns `None` for `INITIAL`, which records no action.
    #[must_use]
    pub const fn recorded_by(state: EvidenceState, has_history: bool) -> Option<Self> {
        match state {
            EvidenceState::Initial => None,
            EvidenceState::CheckedIn if has_history => Some(Self::CheckIn),
            EvidenceState::CheckedIn => Some(Self::Add),
            EvidenceState::CheckedOut => Some(Self::CheckOut),
            EvidenceState::Disposed => Some(Self::Remove(RemovalReason::Disposed)),
            EvidenceState::Destroyed => Some(Self::Remove(RemovalReason::Destroyed)),
            EvidenceState::Released => Some(Self::Remove(RemovalReason::Released)),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add => f.write_str("add"),
            Self::CheckOut => f.write_str("check out"),
            Self::CheckIn => f.write_str("check in"),
            Self::Remove(_) => f.write_str("remove"),
        }
    }
}

/// Why [`transition`] refused an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionError {
    /// `Add` on an item that already has history.
    AlreadyAdded,
    /// Any other action on an item with no history.
    NotFound,
    /// `CheckIn` on a checked-in item.
    AlreadyCheckedIn,
    /// `CheckOut` on a checked-out item.
    AlreadyCheckedOut,
    /// `Remove` on a checked-out item.
    NotCheckedIn,
    /// `CheckOut` or `CheckIn` on a removed item.
    AfterRemoval,
    /// `Remove` on a removed item.
    AlreadyRemoved,
    /// The item is tagged `INITIAL`, which only genesis may carry.
    Reserved,
}

/// Applies `action` to an item whose current state is `current` (`None` if
/// the item has no history) and returns the resulting state.
///
/// | current \ action | Add | CheckOut | CheckIn | Remove(r) |
/// |---|---|---|---|---|
/// | absent | CHECKEDIN | NotFound | NotFound | NotFound |
/// | CHECKEDIN | AlreadyAdded | CHECKEDOUT | AlreadyCheckedIn | r |
/// | CHECKEDOUT | AlreadyAdded | AlreadyCheckedOut | CHECKEDIN | NotCheckedIn |
/// | terminal | AlreadyAdded | AfterRemoval | AfterRemoval | AlreadyRemoved |
///
/// # Errors
///
/// Returns the [`TransitionError`] for every disallowed cell.
pub const fn transition(
    current: Option<EvidenceState>,
    action: Action,
) -> Result<EvidenceState, TransitionError> {
    use EvidenceState::{CheckedIn, CheckedOut, Destroyed, Disposed, Initial, Released};

    match (current, action) {
        (Some(Initial), _) => Err(TransitionError::Reserved),
        (None, Action::Add) => Ok(CheckedIn),
        (None, _) => Err(TransitionError::NotFound),
        (Some(_), Action::Add) => Err(TransitionError::AlreadyAdded),

        (Some(CheckedIn), Action::CheckOut) => Ok(CheckedOut),
        (Some(CheckedIn), Action::CheckIn) => Err(TransitionError::AlreadyCheckedIn),
        (Some(CheckedIn), Action::Remove(reason)) => Ok(reason.state()),

        (Some(CheckedOut), Action::CheckIn) => Ok(CheckedIn),
        (Some(CheckedOut), Action::CheckOut) => Err(TransitionError::AlreadyCheckedOut),
        (Some(CheckedOut), Action::Remove(_)) => Err(TransitionError::NotCheckedIn),

        (Some(Disposed | Destroyed | Released), Action::Remove(_)) => {
            Err(TransitionError::AlreadyRemoved)
        },
        (Some(Disposed | Destroyed | Released), Action::CheckOut | Action::CheckIn) => {
            Err(TransitionError::AfterRemoval)
        },
    }
}

impl TransitionError {
    /// Converts a refusal into the error reported to callers.
    #[must_use]
    pub fn into_custody_error(
        self,
        evidence_id: EvidenceId,
        current: Option<EvidenceState>,
        action: Action,
    ) -> CustodyError {
        match (self, current) {
            (Self::NotFound, _) | (_, None) => CustodyError::NotFound { evidence_id },
            (Self::AlreadyAdded, Some(_)) => CustodyError::DuplicateEvidence { evidence_id },
            (_, Some(current)) => CustodyError::IllegalTransition {
                evidence_id,
                current,
                action,
            },
        }
    }
}
