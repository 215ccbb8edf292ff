//! `bchoc verify`.

use anyhow::{Context, Result};
use bchoc_core::crypto::digest_hex;
use bchoc_core::{Custody, VerifyOutcome};

/// Verify the chain and print the verdict.
///
/// Returns whether the chain is clean.
pub fn run(custody: &Custody) -> Result<bool> {
    let report = custody.verify().context("failed to read ledger")?;
    println!("Transactions in blockchain: {}", report.transactions);

    match &report.outcome {
        VerifyOutcome::Valid(summary) => {
            println!("Cases in blockchain: {}", summary.cases);
            println!("Items in blockchain: {}", summary.items);
            println!("State of blockchain: CLEAN");
            tracing::info!(
                blocks = summary.blocks,
                cases = summary.cases,
                items = summary.items,
                "chain verified"
            );
            Ok(true)
        },
        VerifyOutcome::Invalid(violation) => {
            println!("State of blockchain: ERROR");
            println!("Bad block: {}", digest_hex(&violation.digest));
            println!("{}", violation.kind);
            Ok(false)
        },
    }
}
