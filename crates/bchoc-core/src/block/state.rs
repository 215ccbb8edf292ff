//! Lifecycle tags carried in the `state` slot of every block.

use std::fmt;
use std::str::FromStr;

use crate::error::CustodyError;

/// Lifecycle tag of a block.
///
/// The on-disk form is the upper-case tag returned by [`Self::as_tag`],
/// zero-padded to the 12-byte state slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EvidenceState {
    /// Genesis marker; never legal on any other block.
    Initial,
    /// Item is in custody storage.
    CheckedIn,
    /// Item has been taken out by a handler.
    CheckedOut,
    /// Item was disposed of (terminal).
    Disposed,
    /// Item was destroyed (terminal).
    Destroyed,
    /// Item was released to its lawful owner (terminal).
    Released,
}

impl EvidenceState {
    /// Every recognized state, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::Initial,
        Self::CheckedIn,
        Self::CheckedOut,
        Self::Disposed,
        Self::Destroyed,
        Self::Released,
    ];

    /// The canonical tag written to disk.
    #[must_use]
    pub const fn as_tag(self) -> &'static str {
        match self {
            Self::Initial => "INITIAL",
            Self::CheckedIn => "CHECKEDIN",
            Self::CheckedOut => "CHECKEDOUT",
            Self::Disposed => "DISPOSED",
            Self::Destroyed => "DESTROYED",
            Self::Released => "RELEASED",
        }
    }

    /// Parses an exact on-disk tag.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|state| state.as_tag() == tag)
    }

    /// Whether no further transition is allowed out of this state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Disposed | Self::Destroyed | Self::Released)
    }
}

impl fmt::Display for EvidenceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

/// Why an item leaves custody.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemovalReason {
    /// Disposed of.
    Disposed,
    /// Destroyed.
    Destroyed,
    /// Released to an owner; an owner must be named.
    Released,
}

impl RemovalReason {
    /// The terminal state recorded for this reason.
    #[must_use]
    pub const fn state(self) -> EvidenceState {
        match self {
            Self::Disposed => EvidenceState::Disposed,
            Self::Destroyed => EvidenceState::Destroyed,
            Self::Released => EvidenceState::Released,
        }
    }
}

impl fmt::Display for RemovalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.state().as_tag())
    }
}

impl FromStr for RemovalReason {
    type Err = CustodyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DISPOSED" => Ok(Self::Disposed),
            "DESTROYED" => Ok(Self::Destroyed),
            "RELEASED" => Ok(Self::Released),
            other => Err(CustodyError::Validation {
                field: "reason",
                reason: format!(
                    "unknown removal reason {other:?} (expected DISPOSED, DESTROYED or RELEASED)"
                ),
            }),
        }
    }
}
