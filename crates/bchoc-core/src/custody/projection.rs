//! Per-item custody state replayed from the chain.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};

use crate::block::{Block, CaseId, EvidenceId, EvidenceState, Handler, Organization};

/// Latest known facts about one evidence item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemStatus {
    /// The item.
    pub evidence_id: EvidenceId,
    /// Case it was added under.
    pub case_id: CaseId,
    /// State after its latest block.
    pub state: EvidenceState,
    /// Handler on its latest block.
    pub handler: Handler,
    /// Organization (or owner) on its latest block.
    pub organization: Organization,
    /// Timestamp of its latest block.
    pub updated_at: DateTime<Utc>,
    /// Number of blocks recorded for it.
    pub actions: usize,
}

/// Projection of the chain onto per-item status.
///
/// Built by a linear replay and never persisted. Genesis is skipped and
/// legality is not checked here; that is the verifier's job.
#[derive(Debug, Clone, Default)]
pub struct CustodyProjection {
    items: HashMap<EvidenceId, ItemStatus>,
    order: Vec<EvidenceId>,
}

impl CustodyProjection {
    /// Replays `blocks` from the start.
    #[must_use]
    pub fn replay<'a>(blocks: impl IntoIterator<Item = &'a Block>) -> Self {
        let mut projection = Self::default();
        for block in blocks {
            projection.apply(block);
        }
        projection
    }

    /// Folds one block into the projection.
    pub fn apply(&mut self, block: &Block) {
        if block.state == EvidenceState::Initial {
            return;
        }
        match self.items.get_mut(&block.evidence_id) {
            Some(item) => {
                item.state = block.state;
                item.handler = block.handler.clone();
                item.organization = block.organization.clone();
                item.updated_at = block.timestamp;
                item.actions += 1;
            },
            None => {
                self.order.push(block.evidence_id);
                self.items.insert(
                    block.evidence_id,
                    ItemStatus {
                        evidence_id: block.evidence_id,
                        case_id: block.case_id.clone(),
                        state: block.state,
                        handler: block.handler.clone(),
                        organization: block.organization.clone(),
                        updated_at: block.timestamp,
                        actions: 1,
                    },
                );
            },
        }
    }

    /// Status of `evidence_id`, or `None` if it has no history.
    #[must_use]
    pub fn item(&self, evidence_id: EvidenceId) -> Option<&ItemStatus> {
        self.items.get(&evidence_id)
    }

    /// Current state of `evidence_id`, or `None` if it has no history.
    #[must_use]
    pub fn state(&self, evidence_id: EvidenceId) -> Option<EvidenceState> {
        self.item(evidence_id).map(|item| item.state)
    }

    /// Every item in first-seen order.
    pub fn items(&self) -> impl Iterator<Item = &ItemStatus> {
        self.order.iter().filter_map(|id| self.items.get(id))
    }

    /// Items added under `case_id`, in first-seen order.
    pub fn items_in_case<'a>(&'a self, case_id: &'a str) -> impl Iterator<Item = &'a ItemStatus> {
        self.items().filter(move |item| item.case_id.as_str() == case_id)
    }

    /// Distinct case ids, sorted.
    #[must_use]
    pub fn cases(&self) -> Vec<CaseId> {
        self.items
            .values()
            .map(|item| item.case_id.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Number of distinct items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether no item has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
