//! Commands that append custody actions.
//!
//! Each command prints a short confirmation naming the case, the item, its
//! new state and the time of the action.

use anyhow::{Context, Result};
use bchoc_core::{Custody, EvidenceId, InitOutcome, Receipt, RemovalReason};

use super::format_time;

/// Create the ledger if it does not exist.
pub fn init(custody: &Custody) -> Result<()> {
    let outcome = custody.init().context("failed to initialize ledger")?;
    match outcome {
        InitOutcome::Created => println!("Blockchain file not found. Created INITIAL block."),
        InitOutcome::AlreadyInitialized => println!("Blockchain file found with INITIAL block."),
    }
    Ok(())
}

/// Add items to a case.
pub fn add(
    custody: &Custody,
    case_id: &str,
    item_ids: &[EvidenceId],
    handler: &str,
    organization: &str,
) -> Result<()> {
    let receipts = custody.add(case_id, item_ids, handler, organization)?;
    println!("Case: {case_id}");
    for receipt in &receipts {
        println!("Added item: {}", receipt.block.evidence_id);
        print_status(receipt);
    }
    Ok(())
}

/// Check out an item.
pub fn checkout(
    custody: &Custody,
    item_id: EvidenceId,
    handler: &str,
    organization: &str,
) -> Result<()> {
    let receipt = custody.checkout(item_id, handler, organization)?;
    println!("Case: {}", receipt.block.case_id);
    println!("Checked out item: {item_id}");
    print_status(&receipt);
    Ok(())
}

/// Check an item back in.
pub fn checkin(
    custody: &Custody,
    item_id: EvidenceId,
    handler: &str,
    organization: &str,
) -> Result<()> {
    let receipt = custody.checkin(item_id, handler, organization)?;
    println!("Case: {}", receipt.block.case_id);
    println!("Checked in item: {item_id}");
    print_status(&receipt);
    Ok(())
}

/// Remove an item from custody.
pub fn remove(
    custody: &Custody,
    item_id: EvidenceId,
    reason: RemovalReason,
    owner: Option<&str>,
) -> Result<()> {
    let receipt = custody.remove(item_id, reason, owner)?;
    println!("Case: {}", receipt.block.case_id);
    println!("Removed item: {item_id}");
    println!("  Status: {}", receipt.block.state);
    println!("  Owner info: {}", receipt.block.organization);
    println!("  Time of action: {}", format_time(&receipt.block.timestamp));
    Ok(())
}

fn print_status(receipt: &Receipt) {
    println!("  Status: {}", receipt.block.state);
    println!("  Time of action: {}", format_time(&receipt.block.timestamp));
}
