//! # bchoc-core
//!
//! Hash-chained chain-of-custody ledger for evidence items.
//!
//! Every custody action (adding an item to a case, checking it out, checking
//! it back in, removing it for good) is one fixed-size binary record appended
//! to a single file. Each record carries the SHA-256 digest of the record
//! before it, so any edit to history breaks the chain.
//!
//! ## Layers
//!
//! - [`block`]: the record type and its positional codec
//! - [`store`]: the append-only, file-locked ledger file
//! - [`custody`]: the per-item state machine that builds new blocks
//! - [`verify`]: whole-chain integrity and legality checks
//! - [`config`]: TOML configuration and ledger path resolution
//!
//! ## Example
//!
//! ```rust,no_run
//! use bchoc_core::{ChainStore, Custody};
//!
//! # fn example() -> Result<(), bchoc_core::CustodyError> {
//! let custody = Custody::new(ChainStore::new("./bchoc"));
//! custody.init()?;
//! custody.add("2024-001", &[1001], "alice", "county-lab")?;
//! custody.checkout(1001, "bob", "county-lab")?;
//!
//! let report = custody.verify()?;
//! assert!(report.is_valid());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod block;
pub mod config;
pub mod crypto;
pub mod custody;
pub mod error;
pub mod store;
pub mod verify;

pub use block::{Block, CaseId, EvidenceId, EvidenceState, Handler, Organization, RemovalReason};
pub use config::{BchocConfig, ConfigError, LedgerConfig};
pub use custody::{Custody, HistoryFilter, ItemStatus, Receipt};
pub use error::{CustodyError, FormatError};
pub use store::{ChainStore, InitOutcome};
pub use verify::{ChainSummary, VerifyOutcome, VerifyReport, Violation, ViolationKind};
