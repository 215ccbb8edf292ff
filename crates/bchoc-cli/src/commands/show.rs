//! Read-only queries.

use anyhow::Result;
use bchoc_core::{Custody, EvidenceId, HistoryFilter};

use super::format_time;

/// Print every case id, one per line.
pub fn cases(custody: &Custody) -> Result<()> {
    for case_id in custody.list_cases()? {
        println!("{case_id}");
    }
    Ok(())
}

/// Print the items of a case with their current state.
pub fn items(custody: &Custody, case_id: &str) -> Result<()> {
    for item in custody.list_items(case_id)? {
        println!("{} {}", item.evidence_id, item.state);
    }
    Ok(())
}

/// Print custody actions, oldest first unless `reverse`.
pub fn history(
    custody: &Custody,
    case_id: Option<String>,
    item_id: Option<EvidenceId>,
    num_entries: Option<usize>,
    reverse: bool,
) -> Result<()> {
    let filter = HistoryFilter {
        case_id,
        evidence_id: item_id,
        limit: num_entries,
        reverse,
    };
    for block in custody.history(&filter)? {
        println!("Case: {}", block.case_id);
        println!("Item: {}", block.evidence_id);
        println!("Action: {}", block.state);
        println!("Time: {}", format_time(&block.timestamp));
        println!();
    }
    Ok(())
}
