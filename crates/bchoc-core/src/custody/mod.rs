//! Evidence custody state machine.
//!
//! [`Custody`] is the only writer that produces new action blocks. Each
//! operation runs inside [`ChainStore::transaction`]: it replays the chain
//! into a [`CustodyProjection`], checks the requested [`Action`] against the
//! [`transition`] table, and only then appends. A refused operation leaves
//! the file untouched.
//!
//! ```rust,no_run
//! use bchoc_core::block::RemovalReason;
//! use bchoc_core::custody::Custody;
//! use bchoc_core::store::ChainStore;
//!
//! # fn example() -> Result<(), bchoc_core::CustodyError> {
//! let custody = Custody::new(ChainStore::new("./bchoc"));
//! custody.init()?;
//! custody.add("C-1", &[7, 8], "alice", "lab")?;
//! custody.checkout(7, "bob", "lab")?;
//! custody.checkin(7, "bob", "lab")?;
//! custody.remove(7, RemovalReason::Disposed, None)?;
//! # Ok(())
//! # }
//! ```

mod clock;
mod projection;
mod transition;

#[cfg(test)]
mod tests;

use std::collections::HashSet;
use std::sync::Arc;

pub use clock::{Clock, FixedClock, SystemClock};
pub use projection::{CustodyProjection, ItemStatus};
pub use transition::{Action, TransitionError, transition};

use crate::block::{
    Block, CaseId, EvidenceId, EvidenceState, Handler, Organization, RemovalReason,
};
use crate::crypto::Digest;
use crate::error::CustodyError;
use crate::store::{ChainStore, ChainWriter, InitOutcome};
use crate::verify::{self, VerifyReport};

/// What a successful custody operation appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    /// Record index of the new block.
    pub index: u64,
    /// Digest of the new block.
    pub digest: Digest,
    /// The block itself.
    pub block: Block,
}

/// Selection for [`Custody::history`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryFilter {
    /// Only blocks of this case.
    pub case_id: Option<String>,
    /// Only blocks of this item.
    pub evidence_id: Option<EvidenceId>,
    /// Keep only the most recent `limit` matches; `0` means no limit.
    pub limit: Option<usize>,
    /// Newest first.
    pub reverse: bool,
}

impl HistoryFilter {
    fn matches(&self, block: &Block) -> bool {
        self.case_id
            .as_deref()
            .is_none_or(|case_id| block.case_id.as_str() == case_id)
            && self.evidence_id.is_none_or(|id| block.evidence_id == id)
    }
}

/// Custody operations and queries over one ledger.
#[derive(Debug, Clone)]
pub struct Custody {
    store: ChainStore,
    clock: Arc<dyn Clock>,
}

impl Custody {
    /// Custody over `store`, stamping blocks with the system clock.
    #[must_use]
    pub fn new(store: ChainStore) -> Self {
        Self::with_clock(store, SystemClock)
    }

    /// Custody over `store` with an injected clock.
    #[must_use]
    pub fn with_clock(store: ChainStore, clock: impl Clock + 'static) -> Self {
        Self {
            store,
            clock: Arc::new(clock),
        }
    }

    /// The underlying store.
    #[must_use]
    pub const fn store(&self) -> &ChainStore {
        &self.store
    }

    /// Creates the ledger with its genesis block if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or written.
    pub fn init(&self) -> Result<InitOutcome, CustodyError> {
        self.store.init(self.clock.now())
    }

    /// Adds new evidence items to `case_id`, one `CHECKEDIN` block per id.
    ///
    /// Every id is validated before any block is written.
    ///
    /// # Errors
    ///
    /// - [`CustodyError::Validation`] if `case_id` is empty, no ids are
    ///   given, an id is `0`, or a text field does not fit its slot.
    /// - [`CustodyError::DuplicateEvidence`] if an id already has history or
    ///   appears twice in `evidence_ids`.
    pub fn add(
        &self,
        case_id: &str,
        evidence_ids: &[EvidenceId],
        handler: &str,
        organization: &str,
    ) -> Result<Vec<Receipt>, CustodyError> {
        if case_id.is_empty() {
            return Err(CustodyError::missing("case_id"));
        }
        let case_id = CaseId::new("case_id", case_id)?;
        let handler = Handler::new("handler", handler)?;
        let organization = Organization::new("organization", organization)?;

        if evidence_ids.is_empty() {
            return Err(CustodyError::missing("evidence_id"));
        }
        let mut seen = HashSet::with_capacity(evidence_ids.len());
        for &evidence_id in evidence_ids {
            if evidence_id == 0 {
                return Err(CustodyError::Validation {
                    field: "evidence_id",
                    reason: "0 is reserved for the genesis block".to_string(),
                });
            }
            if !seen.insert(evidence_id) {
                return Err(CustodyError::DuplicateEvidence { evidence_id });
            }
        }

        self.store.transaction(|chain| {
            let projection = replay(chain);
            for &evidence_id in evidence_ids {
                let current = projection.state(evidence_id);
                transition(current, Action::Add)
                    .map_err(|e| e.into_custody_error(evidence_id, current, Action::Add))?;
            }

            let timestamp = self.clock.now();
            let mut receipts = Vec::with_capacity(evidence_ids.len());
            for &evidence_id in evidence_ids {
                let block = Block::action(
                    chain.tip_digest()?,
                    timestamp,
                    case_id.clone(),
                    evidence_id,
                    EvidenceState::CheckedIn,
                    handler.clone(),
                    organization.clone(),
                );
                receipts.push(commit(chain, block)?);
            }
            tracing::info!(
                case_id = %case_id,
                count = receipts.len(),
                handler = %handler,
                "added evidence"
            );
            Ok(receipts)
        })
    }

    /// Checks out a checked-in item.
    ///
    /// # Errors
    ///
    /// Returns [`CustodyError::NotFound`] for an unknown item and
    /// [`CustodyError::IllegalTransition`] unless the item is `CHECKEDIN`.
    pub fn checkout(
        &self,
        evidence_id: EvidenceId,
        handler: &str,
        organization: &str,
    ) -> Result<Receipt, CustodyError> {
        let handler = Handler::new("handler", handler)?;
        let organization = Organization::new("organization", organization)?;
        self.record(evidence_id, Action::CheckOut, |_| Ok((handler, organization)))
    }

    /// Checks a checked-out item back in.
    ///
    /// # Errors
    ///
    /// Returns [`CustodyError::NotFound`] for an unknown item and
    /// [`CustodyError::IllegalTransition`] unless the item is `CHECKEDOUT`.
    pub fn checkin(
        &self,
        evidence_id: EvidenceId,
        handler: &str,
        organization: &str,
    ) -> Result<Receipt, CustodyError> {
        let handler = Handler::new("handler", handler)?;
        let organization = Organization::new("organization", organization)?;
        self.record(evidence_id, Action::CheckIn, |_| Ok((handler, organization)))
    }

    /// Removes a checked-in item from custody for good.
    ///
    /// The block carries the item's last handler. `owner` goes in the
    /// organization slot; when it is omitted for a disposal or destruction
    /// the item's last organization is used instead.
    ///
    /// # Errors
    ///
    /// - [`CustodyError::Validation`] if `reason` is `RELEASED` and no owner
    ///   is given, or no owner can be determined at all.
    /// - [`CustodyError::NotFound`] for an unknown item.
    /// - [`CustodyError::IllegalTransition`] unless the item is `CHECKEDIN`.
    pub fn remove(
        &self,
        evidence_id: EvidenceId,
        reason: RemovalReason,
        owner: Option<&str>,
    ) -> Result<Receipt, CustodyError> {
        let owner = owner
            .filter(|owner| !owner.is_empty())
            .map(|owner| Organization::new("owner", owner))
            .transpose()?;
        if reason == RemovalReason::Released && owner.is_none() {
            return Err(CustodyError::Validation {
                field: "owner",
                reason: "required when releasing evidence".to_string(),
            });
        }

        self.record(evidence_id, Action::Remove(reason), |item| {
            let owner = match owner {
                Some(owner) => owner,
                None if !item.organization.is_empty() => item.organization.clone(),
                None => {
                    return Err(CustodyError::Validation {
                        field: "owner",
                        reason: format!("item {evidence_id} has no organization to record"),
                    });
                },
            };
            Ok((item.handler.clone(), owner))
        })
    }

    /// Current status of one item, or `None` if it has no history.
    ///
    /// # Errors
    ///
    /// Returns any error from reading the chain.
    pub fn item(&self, evidence_id: EvidenceId) -> Result<Option<ItemStatus>, CustodyError> {
        Ok(self.project()?.item(evidence_id).cloned())
    }

    /// Distinct case ids on the chain, sorted.
    ///
    /// # Errors
    ///
    /// Returns any error from reading the chain.
    pub fn list_cases(&self) -> Result<Vec<CaseId>, CustodyError> {
        Ok(self.project()?.cases())
    }

    /// Items of `case_id` in first-seen order with their current state.
    ///
    /// # Errors
    ///
    /// Returns any error from reading the chain.
    pub fn list_items(&self, case_id: &str) -> Result<Vec<ItemStatus>, CustodyError> {
        Ok(self.project()?.items_in_case(case_id).cloned().collect())
    }

    /// Non-genesis blocks matching `filter`, oldest first unless
    /// `filter.reverse` is set.
    ///
    /// # Errors
    ///
    /// Returns any error from reading the chain.
    pub fn history(&self, filter: &HistoryFilter) -> Result<Vec<Block>, CustodyError> {
        let mut blocks = Vec::new();
        for block in self.store.iter()?.skip(1) {
            let block = block?;
            if filter.matches(&block) {
                blocks.push(block);
            }
        }
        if let Some(limit) = filter.limit.filter(|&n| n > 0) {
            let excess = blocks.len().saturating_sub(limit);
            blocks.drain(..excess);
        }
        if filter.reverse {
            blocks.reverse();
        }
        Ok(blocks)
    }

    /// Verifies the whole chain.
    ///
    /// # Errors
    ///
    /// See [`verify::verify`].
    pub fn verify(&self) -> Result<VerifyReport, CustodyError> {
        verify::verify(&self.store)
    }

    fn project(&self) -> Result<CustodyProjection, CustodyError> {
        let mut projection = CustodyProjection::default();
        for block in self.store.iter()? {
            projection.apply(&block?);
        }
        Ok(projection)
    }

    fn record<F>(
        &self,
        evidence_id: EvidenceId,
        action: Action,
        fields: F,
    ) -> Result<Receipt, CustodyError>
    where
        F: FnOnce(&ItemStatus) -> Result<(Handler, Organization), CustodyError>,
    {
        self.store.transaction(|chain| {
            let projection = replay(chain);
            let current = projection.state(evidence_id);
            let next = transition(current, action)
                .map_err(|e| e.into_custody_error(evidence_id, current, action))?;
            let item = projection
                .item(evidence_id)
                .ok_or(CustodyError::NotFound { evidence_id })?;
            let (handler, organization) = fields(item)?;

            let block = Block::action(
                chain.tip_digest()?,
                self.clock.now(),
                item.case_id.clone(),
                evidence_id,
                next,
                handler,
                organization,
            );
            let receipt = commit(chain, block)?;
            tracing::info!(evidence_id, action = %action, state = %next, "recorded custody action");
            Ok(receipt)
        })
    }
}

fn replay(chain: &ChainWriter<'_>) -> CustodyProjection {
    let projection = CustodyProjection::replay(chain.blocks());
    tracing::debug!(
        blocks = chain.blocks().len(),
        items = projection.len(),
        "replayed chain"
    );
    projection
}

fn commit(chain: &mut ChainWriter<'_>, block: Block) -> Result<Receipt, CustodyError> {
    let digest = block.digest();
    let index = chain.append(block.clone())?;
    Ok(Receipt {
        index,
        digest,
        block,
    })
}
