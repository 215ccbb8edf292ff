//! Tests for the custody state machine and queries.

use tempfile::TempDir;

use super::*;

const NOW: i64 = 1_700_000_000;

/// Helper to create an initialized ledger with a frozen clock.
fn temp_custody() -> (Custody, TempDir) {
    let dir = TempDir::new().expect("failed to create temp dir");
    let store = ChainStore::new(dir.path().join("ledger")).with_fsync(false);
    let custody = Custody::with_clock(store, FixedClock::from_unix(NOW));
    custody.init().expect("failed to init ledger");
    (custody, dir)
}

fn block_count(custody: &Custody) -> u64 {
    custody.store().len().expect("failed to count blocks")
}

#[test]
fn test_add_appends_one_block_per_item() {
    let (custody, _dir) = temp_custody();

    let receipts = custody.add("C1", &[1001, 1002], "H", "O").unwrap();
    assert_eq!(receipts.len(), 2);
    assert_eq!(receipts[0].index, 1);
    assert_eq!(receipts[1].index, 2);
    for receipt in &receipts {
        assert_eq!(receipt.block.state, EvidenceState::CheckedIn);
        assert_eq!(receipt.block.case_id.as_str(), "C1");
        assert_eq!(receipt.block.timestamp.timestamp(), NOW);
        assert_eq!(receipt.digest, receipt.block.digest());
    }
    assert_eq!(receipts[1].block.prev_digest, receipts[0].digest);
    assert_eq!(custody.store().last().unwrap().digest(), receipts[1].digest);
}

#[test]
fn test_add_rejects_known_item() {
    let (custody, _dir) = temp_custody();
    custody.add("C1", &[1001], "H", "O").unwrap();

    let err = custody.add("C1", &[1001], "H", "O").unwrap_err();
    assert!(matches!(err, CustodyError::DuplicateEvidence { evidence_id: 1001 }));
    assert_eq!(block_count(&custody), 2);
}

#[test]
fn test_add_validates_whole_batch_first() {
    let (custody, _dir) = temp_custody();
    custody.add("C1", &[5], "H", "O").unwrap();

    let err = custody.add("C1", &[6, 7, 5], "H", "O").unwrap_err();
    assert!(matches!(err, CustodyError::DuplicateEvidence { evidence_id: 5 }));
    assert_eq!(block_count(&custody), 2);
    assert!(custody.item(6).unwrap().is_none());

    let err = custody.add("C1", &[8, 9, 8], "H", "O").unwrap_err();
    assert!(matches!(err, CustodyError::DuplicateEvidence { evidence_id: 8 }));
    assert_eq!(block_count(&custody), 2);
}

#[test]
fn test_add_validation_errors() {
    let (custody, _dir) = temp_custody();

    for (case_id, ids, field) in [
        ("", &[1][..], "case_id"),
        ("C1", &[][..], "evidence_id"),
        ("C1", &[3, 0][..], "evidence_id"),
        ("a-case-id-that-is-too-long", &[1][..], "case_id"),
    ] {
        let err = custody.add(case_id, ids, "H", "O").unwrap_err();
        assert!(
            matches!(err, CustodyError::Validation { field: f, .. } if f == field),
            "{case_id:?} {ids:?}: {err}"
        );
    }
    assert_eq!(block_count(&custody), 1);
}

#[test]
fn test_checkout_checkin_cycle() {
    let (custody, _dir) = temp_custody();
    custody.add("C1", &[1001], "H", "O").unwrap();

    let out = custody.checkout(1001, "H2", "O2").unwrap();
    assert_eq!(out.block.state, EvidenceState::CheckedOut);
    assert_eq!(out.block.case_id.as_str(), "C1");
    assert_eq!(out.block.handler.as_str(), "H2");

    let err = custody.checkout(1001, "H2", "O2").unwrap_err();
    assert!(matches!(
        err,
        CustodyError::IllegalTransition {
            evidence_id: 1001,
            current: EvidenceState::CheckedOut,
            action: Action::CheckOut,
        }
    ));

    let back = custody.checkin(1001, "H3", "O").unwrap();
    assert_eq!(back.block.state, EvidenceState::CheckedIn);
    assert!(matches!(
        custody.checkin(1001, "H3", "O"),
        Err(CustodyError::IllegalTransition { .. })
    ));
    assert_eq!(block_count(&custody), 4);
}

#[test]
fn test_unknown_item_is_not_found() {
    let (custody, _dir) = temp_custody();
    assert!(matches!(
        custody.checkout(42, "H", "O"),
        Err(CustodyError::NotFound { evidence_id: 42 })
    ));
    assert!(matches!(
        custody.checkin(42, "H", "O"),
        Err(CustodyError::NotFound { evidence_id: 42 })
    ));
    assert!(matches!(
        custody.remove(42, RemovalReason::Disposed, Some("Owner")),
        Err(CustodyError::NotFound { evidence_id: 42 })
    ));
    assert_eq!(block_count(&custody), 1);
}

#[test]
fn test_release_requires_owner() {
    let (custody, _dir) = temp_custody();
    custody.add("C1", &[1001], "H", "O").unwrap();

    for owner in [None, Some("")] {
        let err = custody.remove(1001, RemovalReason::Released, owner).unwrap_err();
        assert!(matches!(err, CustodyError::Validation { field: "owner", .. }));
    }
    assert_eq!(block_count(&custody), 2);

    let receipt = custody.remove(1001, RemovalReason::Released, Some("Org")).unwrap();
    assert_eq!(receipt.block.state, EvidenceState::Released);
    assert_eq!(receipt.block.organization.as_str(), "Org");
    assert_eq!(receipt.block.handler.as_str(), "H");
}

#[test]
fn test_disposal_defaults_owner_to_last_organization() {
    let (custody, _dir) = temp_custody();
    custody.add("C1", &[1, 2], "H", "County Lab").unwrap();
    custody.checkout(1, "H2", "State Lab").unwrap();
    custody.checkin(1, "H2", "State Lab").unwrap();

    let receipt = custody.remove(1, RemovalReason::Disposed, None).unwrap();
    assert_eq!(receipt.block.organization.as_str(), "State Lab");
    assert_eq!(receipt.block.handler.as_str(), "H2");

    let receipt = custody.remove(2, RemovalReason::Destroyed, Some("Incinerator")).unwrap();
    assert_eq!(receipt.block.organization.as_str(), "Incinerator");
}

#[test]
fn test_disposal_without_any_owner_fails() {
    let (custody, _dir) = temp_custody();
    custody.add("C1", &[1], "H", "").unwrap();

    let err = custody.remove(1, RemovalReason::Disposed, None).unwrap_err();
    assert!(matches!(err, CustodyError::Validation { field: "owner", .. }));
    assert_eq!(block_count(&custody), 2);
}

#[test]
fn test_remove_requires_checked_in() {
    let (custody, _dir) = temp_custody();
    custody.add("C1", &[1], "H", "O").unwrap();
    custody.checkout(1, "H", "O").unwrap();

    let err = custody.remove(1, RemovalReason::Disposed, Some("O")).unwrap_err();
    assert!(matches!(
        err,
        CustodyError::IllegalTransition {
            current: EvidenceState::CheckedOut,
            ..
        }
    ));
}

#[test]
fn test_removed_items_are_frozen() {
    let (custody, _dir) = temp_custody();
    custody.add("C1", &[1], "H", "O").unwrap();
    custody.remove(1, RemovalReason::Destroyed, None).unwrap();
    let count = block_count(&custody);

    assert!(matches!(
        custody.checkout(1, "H", "O"),
        Err(CustodyError::IllegalTransition { .. })
    ));
    assert!(matches!(
        custody.checkin(1, "H", "O"),
        Err(CustodyError::IllegalTransition { .. })
    ));
    assert!(matches!(
        custody.remove(1, RemovalReason::Released, Some("O")),
        Err(CustodyError::IllegalTransition { .. })
    ));
    assert!(matches!(
        custody.add("C1", &[1], "H", "O"),
        Err(CustodyError::DuplicateEvidence { evidence_id: 1 })
    ));
    assert_eq!(block_count(&custody), count);
}

#[test]
fn test_operations_on_missing_ledger() {
    let dir = TempDir::new().unwrap();
    let custody = Custody::new(ChainStore::new(dir.path().join("absent")));
    assert!(matches!(
        custody.add("C1", &[1], "H", "O"),
        Err(CustodyError::NotInitialized { .. })
    ));
    assert!(matches!(
        custody.list_cases(),
        Err(CustodyError::NotInitialized { .. })
    ));
}

// ============================================================================
// Queries
// ============================================================================

#[test]
fn test_list_cases_sorted_and_distinct() {
    let (custody, _dir) = temp_custody();
    assert!(custody.list_cases().unwrap().is_empty());

    custody.add("zeta", &[1], "H", "O").unwrap();
    custody.add("alpha", &[2, 3], "H", "O").unwrap();
    custody.add("zeta", &[4], "H", "O").unwrap();

    let cases: Vec<_> = custody
        .list_cases()
        .unwrap()
        .iter()
        .map(|c| c.as_str().to_string())
        .collect();
    assert_eq!(cases, ["alpha", "zeta"]);
}

#[test]
fn test_list_items_first_seen_order_with_state() {
    let (custody, _dir) = temp_custody();
    custody.add("C1", &[30, 10], "H", "O").unwrap();
    custody.add("C2", &[99], "H", "O").unwrap();
    custody.add("C1", &[20], "H", "O").unwrap();
    custody.checkout(10, "H", "O").unwrap();

    let items = custody.list_items("C1").unwrap();
    let summary: Vec<_> = items.iter().map(|i| (i.evidence_id, i.state)).collect();
    assert_eq!(
        summary,
        [
            (30, EvidenceState::CheckedIn),
            (10, EvidenceState::CheckedOut),
            (20, EvidenceState::CheckedIn),
        ]
    );
    assert_eq!(items[1].actions, 2);
    assert!(custody.list_items("nope").unwrap().is_empty());
}

#[test]
fn test_history_filters() {
    let (custody, _dir) = temp_custody();
    custody.add("C1", &[1, 2], "H", "O").unwrap();
    custody.add("C2", &[3], "H", "O").unwrap();
    custody.checkout(1, "H", "O").unwrap();
    custody.checkin(1, "H", "O").unwrap();

    let all = custody.history(&HistoryFilter::default()).unwrap();
    assert_eq!(all.len(), 5);
    assert!(all.iter().all(|b| !b.is_genesis()));

    let item: Vec<_> = custody
        .history(&HistoryFilter {
            evidence_id: Some(1),
            ..HistoryFilter::default()
        })
        .unwrap()
        .iter()
        .map(|b| b.state)
        .collect();
    assert_eq!(
        item,
        [
            EvidenceState::CheckedIn,
            EvidenceState::CheckedOut,
            EvidenceState::CheckedIn
        ]
    );

    let case = custody
        .history(&HistoryFilter {
            case_id: Some("C2".to_string()),
            ..HistoryFilter::default()
        })
        .unwrap();
    assert_eq!(case.len(), 1);
    assert_eq!(case[0].evidence_id, 3);

    let latest = custody
        .history(&HistoryFilter {
            limit: Some(2),
            ..HistoryFilter::default()
        })
        .unwrap();
    assert_eq!(latest, all[3..]);

    let newest_first = custody
        .history(&HistoryFilter {
            limit: Some(2),
            reverse: true,
            ..HistoryFilter::default()
        })
        .unwrap();
    assert_eq!(newest_first, [all[4].clone(), all[3].clone()]);

    let unlimited = custody
        .history(&HistoryFilter {
            limit: Some(0),
            ..HistoryFilter::default()
        })
        .unwrap();
    assert_eq!(unlimited, all);
}

#[test]
fn test_legal_operations_verify() {
    let (custody, _dir) = temp_custody();
    custody.add("C1", &[1, 2, 3], "H", "O").unwrap();
    custody.checkout(1, "H2", "O").unwrap();
    custody.checkin(1, "H2", "O").unwrap();
    custody.remove(1, RemovalReason::Disposed, None).unwrap();
    custody.remove(2, RemovalReason::Released, Some("Owner")).unwrap();
    custody.add("C2", &[4], "H", "O").unwrap();

    let report = custody.verify().unwrap();
    assert_eq!(report.transactions, 9);
    let summary = report.into_result().unwrap();
    assert_eq!(summary.cases, 2);
    assert_eq!(summary.items, 4);
}

#[test]
fn test_projection_replay() {
    let (custody, _dir) = temp_custody();
    custody.add("C1", &[1], "H", "O").unwrap();
    custody.checkout(1, "H2", "O2").unwrap();

    let blocks = custody.store().blocks().unwrap();
    let projection = CustodyProjection::replay(&blocks);
    assert_eq!(projection.len(), 1);
    let item = projection.item(1).unwrap();
    assert_eq!(item.state, EvidenceState::CheckedOut);
    assert_eq!(item.handler.as_str(), "H2");
    assert_eq!(item.case_id.as_str(), "C1");
    assert_eq!(projection.state(2), None);
}
