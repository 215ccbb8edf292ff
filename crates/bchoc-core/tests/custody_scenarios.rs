//! End-to-end custody scenarios against a real ledger file.
//!
//! Each test walks one evidence item through the state machine and then
//! checks both the returned errors and what the verifier makes of the
//! resulting chain.

use std::fs::OpenOptions;
use std::io::Write;

use bchoc_core::custody::FixedClock;
use bchoc_core::{
    Block, ChainStore, Custody, CustodyError, EvidenceState, FormatError, InitOutcome,
    RemovalReason, VerifyOutcome, ViolationKind,
};
use tempfile::TempDir;

fn temp_custody() -> (Custody, TempDir) {
    let dir = TempDir::new().expect("failed to create temp dir");
    let store = ChainStore::new(dir.path().join("bchoc")).with_fsync(false);
    (
        Custody::with_clock(store, FixedClock::from_unix(1_700_000_000)),
        dir,
    )
}

#[test]
fn test_init_on_empty_storage_verifies() {
    let (custody, _dir) = temp_custody();
    assert_eq!(custody.init().unwrap(), InitOutcome::Created);
    assert_eq!(custody.init().unwrap(), InitOutcome::AlreadyInitialized);
    assert_eq!(custody.store().len().unwrap(), 1);

    let report = custody.verify().unwrap();
    assert!(report.is_valid());
    assert_eq!(report.transactions, 1);
}

#[test]
fn test_full_item_lifecycle() {
    let (custody, _dir) = temp_custody();
    custody.init().unwrap();

    // Add, then a duplicate add.
    let added = custody.add("C1", &[1001], "H", "O").unwrap();
    assert_eq!(added[0].block.state, EvidenceState::CheckedIn);
    assert!(matches!(
        custody.add("C1", &[1001], "H", "O"),
        Err(CustodyError::DuplicateEvidence { evidence_id: 1001 })
    ));

    // Check out, then a second check-out.
    let out = custody.checkout(1001, "H2", "O").unwrap();
    assert_eq!(out.block.state, EvidenceState::CheckedOut);
    assert!(matches!(
        custody.checkout(1001, "H2", "O"),
        Err(CustodyError::IllegalTransition { .. })
    ));

    // Check back in; four blocks verify.
    custody.checkin(1001, "H2", "O").unwrap();
    let report = custody.verify().unwrap();
    assert!(report.is_valid());
    assert_eq!(report.transactions, 4);

    // Release needs an owner, and is final.
    assert!(matches!(
        custody.remove(1001, RemovalReason::Released, Some("")),
        Err(CustodyError::Validation { field: "owner", .. })
    ));
    let released = custody
        .remove(1001, RemovalReason::Released, Some("Org"))
        .unwrap();
    assert_eq!(released.block.state, EvidenceState::Released);
    assert!(matches!(
        custody.checkout(1001, "H2", "O"),
        Err(CustodyError::IllegalTransition {
            current: EvidenceState::Released,
            ..
        })
    ));

    let report = custody.verify().unwrap();
    assert!(report.is_valid());
    assert_eq!(report.transactions, 5);
}

#[test]
fn test_duplicate_parent_is_reported() {
    let (custody, _dir) = temp_custody();
    custody.init().unwrap();
    custody.add("C1", &[1, 2], "H", "O").unwrap();

    let blocks = custody.store().blocks().unwrap();
    let mut forged = blocks[2].clone();
    forged.evidence_id = 3;
    let index = custody.store().append(&forged).unwrap();
    assert_eq!(index, 3);

    let report = custody.verify().unwrap();
    let VerifyOutcome::Invalid(violation) = &report.outcome else {
        panic!("forged chain verified: {report}");
    };
    assert_eq!(violation.index, 3);
    assert_eq!(violation.digest, forged.digest());
    assert!(matches!(violation.kind, ViolationKind::DuplicateParent { first: 2, .. }));

    let err = report.into_result().unwrap_err();
    assert!(err.to_string().contains("duplicate parent"));
}

#[test]
fn test_appended_block_with_stale_parent_breaks_link() {
    let (custody, _dir) = temp_custody();
    custody.init().unwrap();
    custody.add("C1", &[1], "H", "O").unwrap();

    let mut stale = custody.store().last().unwrap();
    stale.prev_digest = [9; 32];
    stale.evidence_id = 2;
    custody.store().append(&stale).unwrap();

    let report = custody.verify().unwrap();
    let violation = report.violation().unwrap();
    assert!(matches!(violation.kind, ViolationKind::BrokenLink { .. }));
    assert_eq!(violation.index, 2);
    assert_eq!(violation.digest, stale.digest());
}

#[test]
fn test_torn_tail_is_an_error_not_a_violation() {
    let (custody, _dir) = temp_custody();
    custody.init().unwrap();
    custody.add("C1", &[1], "H", "O").unwrap();

    let mut file = OpenOptions::new()
        .append(true)
        .open(custody.store().path())
        .unwrap();
    file.write_all(&[0u8; 100]).unwrap();
    drop(file);

    assert!(matches!(
        custody.verify(),
        Err(CustodyError::Format(FormatError::TrailingBytes {
            records: 2,
            trailing: 100
        }))
    ));
}

#[test]
fn test_verify_missing_and_empty_ledgers() {
    let (custody, dir) = temp_custody();
    assert!(matches!(
        custody.verify(),
        Err(CustodyError::NotInitialized { .. })
    ));

    std::fs::write(dir.path().join("bchoc"), b"").unwrap();
    assert!(matches!(custody.verify(), Err(CustodyError::EmptyStore)));
}

#[test]
fn test_chain_written_by_two_handles_stays_linked() {
    let (custody, _dir) = temp_custody();
    custody.init().unwrap();
    let other = Custody::new(custody.store().clone());

    custody.add("C1", &[1], "H", "O").unwrap();
    other.add("C1", &[2], "H", "O").unwrap();
    custody.checkout(2, "H", "O").unwrap();
    other.checkout(1, "H", "O").unwrap();

    let blocks: Vec<Block> = custody.store().blocks().unwrap();
    for pair in blocks.windows(2) {
        assert_eq!(pair[1].prev_digest, pair[0].digest());
    }
    assert!(custody.verify().unwrap().is_valid());
}
