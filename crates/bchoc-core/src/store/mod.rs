//! Append-only file store for custody blocks.
//!
//! The backing file is a bare sequence of [`RECORD_LEN`]-byte records with
//! no header or footer; record 0 is always the genesis block.
//!
//! # Locking
//!
//! Every write holds an exclusive `flock` for its duration and every
//! full-chain read holds a shared one, so a reader never observes a
//! half-written record from another process. Each append is a single
//! `write_all` of one whole record on an append-mode handle, followed by
//! `fsync` unless disabled.
//!
//! # Example
//!
//! ```rust,no_run
//! use bchoc_core::store::ChainStore;
//!
//! # fn example() -> Result<(), bchoc_core::CustodyError> {
//! let store = ChainStore::open_or_init("/var/lib/bchoc/ledger")?;
//! for block in store.iter()? {
//!     let block = block?;
//!     println!("{} {}", block.evidence_id, block.state);
//! }
//! # Ok(())
//! # }
//! ```


use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use fs2::FileExt;

use crate::block::{self, Block, RECORD_LEN};
use crate::config::LedgerConfig;
use crate::crypto::{Digest, short_hex};
use crate::error::{CustodyError, FormatError};

/// Raw bytes of one stored record.
pub type Record = [u8; RECORD_LEN];

const RECORD_LEN_U64: u64 = RECORD_LEN as u64;

/// Result of [`ChainStore::init`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    /// The file was created and the genesis block written.
    Created,
    /// The file already held blocks; nothing was written.
    AlreadyInitialized,
}

/// Handle to a ledger file.
///
/// Construction does no I/O; every operation opens, locks and closes the
/// file itself, so a `ChainStore` can be held across process lifetimes of
/// other writers.
#[derive(Debug, Clone)]
pub struct ChainStore {
    path: PathBuf,
    fsync: bool,
}

impl ChainStore {
    /// Binds a store to `path`. Appends are fsynced.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            fsync: true,
        }
    }

    /// Binds a store using a resolved ledger configuration.
    #[must_use]
    pub fn from_config(config: &LedgerConfig) -> Self {
        Self {
            path: config.path.clone(),
            fsync: config.fsync,
        }
    }

    /// Opens the store at `path`, creating it with a genesis block if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created, locked or written.
    pub fn open_or_init(path: impl Into<PathBuf>) -> Result<Self, CustodyError> {
        let store = Self::new(path);
        store.init(Utc::now())?;
        Ok(store)
    }

    /// Enables or disables `fsync` after each append.
    #[must_use]
    pub const fn with_fsync(mut self, fsync: bool) -> Self {
        self.fsync = fsync;
        self
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the backing file has been initialized, i.e. holds at least
    /// one whole record. A zero-length file does not count.
    #[must_use]
    pub fn exists(&self) -> bool {
        fs::metadata(&self.path).is_ok_and(|m| m.is_file() && m.len() >= RECORD_LEN_U64)
    }

    /// Creates the ledger with a genesis block stamped `timestamp`.
    ///
    /// Idempotent: a file that already holds data is left untouched. An
    /// existing zero-length file is treated as uninitialized.
    ///
    /// # Errors
    ///
    /// Returns an error if the file or its parent directory cannot be
    /// created, locked or written.
    pub fn init(&self, timestamp: DateTime<Utc>) -> Result<InitOutcome, CustodyError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)?;
        file.lock_exclusive()?;

        if file.metadata()?.len() > 0 {
            tracing::debug!(path = %self.path.display(), "ledger already initialized");
            return Ok(InitOutcome::AlreadyInitialized);
        }

        let genesis = Block::genesis(timestamp);
        self.write_record(&file, &genesis.encode())?;
        tracing::info!(
            path = %self.path.display(),
            digest = %short_hex(&genesis.digest()),
            "created ledger with genesis block"
        );
        Ok(InitOutcome::Created)
    }

    /// Appends one block and returns its record index.
    ///
    /// The block is written exactly as given; linking it to the current tip
    /// is the caller's job (see [`Self::transaction`]).
    ///
    /// # Errors
    ///
    /// Returns [`CustodyError::NotInitialized`] if the file does not exist,
    /// [`FormatError::TrailingBytes`] if it ends in a partial record, or an
    /// I/O error.
    pub fn append(&self, block: &Block) -> Result<u64, CustodyError> {
        let file = self.open_locked_for_write()?;
        let records = whole_records(file.metadata()?.len())?;
        self.write_record(&file, &block.encode())?;
        tracing::debug!(
            index = records,
            evidence_id = block.evidence_id,
            state = %block.state,
            "appended block"
        );
        Ok(records)
    }

    /// Runs `f` with exclusive access to the chain.
    ///
    /// The whole chain is decoded under an exclusive lock before `f` runs,
    /// and the lock is held until `f` returns, so the tip that `f` links to
    /// is still the tip when its blocks are appended.
    ///
    /// # Errors
    ///
    /// Returns any error from opening, locking or decoding the chain, or
    /// from `f`.
    pub fn transaction<T, F>(&self, f: F) -> Result<T, CustodyError>
    where
        F: FnOnce(&mut ChainWriter<'_>) -> Result<T, CustodyError>,
    {
        let file = self.open_locked_for_write()?;
        let len = file.metadata()?.len();
        let count = whole_records(len)?;

        let mut blocks = Vec::with_capacity(usize::try_from(count).unwrap_or(0));
        let mut reader = BufReader::new(&file);
        let mut record = [0u8; RECORD_LEN];
        for _ in 0..count {
            reader.read_exact(&mut record)?;
            blocks.push(block::decode(&record)?);
        }
        drop(reader);

        let mut writer = ChainWriter {
            store: self,
            file,
            blocks,
        };
        f(&mut writer)
    }

    /// Lazily iterates decoded blocks from the start of the file.
    ///
    /// A shared lock is held until the iterator is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`CustodyError::NotInitialized`] if the file does not exist.
    pub fn iter(&self) -> Result<BlockIter, CustodyError> {
        Ok(BlockIter {
            records: self.records()?,
        })
    }

    /// Lazily iterates raw records from the start of the file.
    ///
    /// # Errors
    ///
    /// Returns [`CustodyError::NotInitialized`] if the file does not exist.
    pub fn records(&self) -> Result<RecordIter, CustodyError> {
        let file = self.open_locked_for_read()?;
        let remaining = file.metadata()?.len();
        Ok(RecordIter {
            reader: BufReader::new(file),
            index: 0,
            remaining,
            failed: false,
        })
    }

    /// Reads every block into memory.
    ///
    /// # Errors
    ///
    /// Returns the first read or decode error.
    pub fn blocks(&self) -> Result<Vec<Block>, CustodyError> {
        self.iter()?.collect()
    }

    /// The most recently appended block.
    ///
    /// # Errors
    ///
    /// Returns [`CustodyError::EmptyStore`] if the file holds no records.
    pub fn last(&self) -> Result<Block, CustodyError> {
        let mut file = self.open_locked_for_read()?;
        let count = whole_records(file.metadata()?.len())?;
        if count == 0 {
            return Err(CustodyError::EmptyStore);
        }
        file.seek(SeekFrom::Start((count - 1) * RECORD_LEN_U64))?;
        let mut record = [0u8; RECORD_LEN];
        file.read_exact(&mut record)?;
        Ok(block::decode(&record)?)
    }

    /// Number of whole records in the file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or ends in a partial record.
    pub fn len(&self) -> Result<u64, CustodyError> {
        let file = self.open_locked_for_read()?;
        whole_records(file.metadata()?.len())
    }

    /// Whether the file holds no records.
    ///
    /// # Errors
    ///
    /// Same as [`Self::len`].
    pub fn is_empty(&self) -> Result<bool, CustodyError> {
        Ok(self.len()? == 0)
    }

    fn open_locked_for_read(&self) -> Result<File, CustodyError> {
        let file = File::open(&self.path).map_err(|e| self.not_initialized(e))?;
        file.lock_shared()?;
        Ok(file)
    }

    fn open_locked_for_write(&self) -> Result<File, CustodyError> {
        let file = OpenOptions::new()
            .read(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.not_initialized(e))?;
        file.lock_exclusive()?;
        Ok(file)
    }

    fn not_initialized(&self, err: std::io::Error) -> CustodyError {
        if err.kind() == std::io::ErrorKind::NotFound {
            CustodyError::NotInitialized {
                path: self.path.clone(),
            }
        } else {
            CustodyError::Io(err)
        }
    }

    fn write_record(&self, mut file: &File, record: &Record) -> Result<(), CustodyError> {
        file.write_all(record)?;
        if self.fsync {
            file.sync_all()?;
        }
        Ok(())
    }
}

/// Exclusive view of the chain inside [`ChainStore::transaction`].
#[derive(Debug)]
pub struct ChainWriter<'a> {
    store: &'a ChainStore,
    file: File,
    blocks: Vec<Block>,
}

impl ChainWriter<'_> {
    /// Every block in the chain, including any appended in this
    /// transaction.
    #[must_use]
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Digest of the current last block, which the next block must link to.
    ///
    /// # Errors
    ///
    /// Returns [`CustodyError::EmptyStore`] if the chain has no blocks.
    pub fn tip_digest(&self) -> Result<Digest, CustodyError> {
        self.blocks
            .last()
            .map(Block::digest)
            .ok_or(CustodyError::EmptyStore)
    }

    /// Appends `block` and returns its record index.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the write or fsync fails.
    pub fn append(&mut self, block: Block) -> Result<u64, CustodyError> {
        self.store.write_record(&self.file, &block.encode())?;
        let index = self.blocks.len() as u64;
        tracing::debug!(
            index,
            evidence_id = block.evidence_id,
            state = %block.state,
            digest = %short_hex(&block.digest()),
            "appended block"
        );
        self.blocks.push(block);
        Ok(index)
    }
}

/// Lazy iterator over raw records; see [`ChainStore::records`].
///
/// Finite and not restartable. Yields [`FormatError::TrailingBytes`] once
/// and then stops if the file ends in a partial record.
#[derive(Debug)]
pub struct RecordIter {
    reader: BufReader<File>,
    index: u64,
    remaining: u64,
    failed: bool,
}

impl Iterator for RecordIter {
    type Item = Result<Record, CustodyError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.remaining == 0 {
            return None;
        }
        if self.remaining < RECORD_LEN_U64 {
            self.failed = true;
            return Some(Err(FormatError::TrailingBytes {
                records: self.index,
                trailing: self.remaining,
            }
            .into()));
        }

        let mut record = [0u8; RECORD_LEN];
        if let Err(err) = self.reader.read_exact(&mut record) {
            self.failed = true;
            return Some(Err(err.into()));
        }
        self.index += 1;
        self.remaining -= RECORD_LEN_U64;
        Some(Ok(record))
    }
}

/// Lazy iterator over decoded blocks; see [`ChainStore::iter`].
#[derive(Debug)]
pub struct BlockIter {
    records: RecordIter,
}

impl Iterator for BlockIter {
    type Item = Result<Block, CustodyError>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = self.records.next()?;
        Some(record.and_then(|r| block::decode(&r).map_err(CustodyError::from)))
    }
}

fn whole_records(len: u64) -> Result<u64, CustodyError> {
    let trailing = len % RECORD_LEN_U64;
    if trailing != 0 {
        return Err(FormatError::TrailingBytes {
            records: len / RECORD_LEN_U64,
            trailing,
        }
        .into());
    }
    Ok(len / RECORD_LEN_U64)
}
