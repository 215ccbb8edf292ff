//! Time sources for block timestamps.

use std::fmt;

use chrono::{DateTime, SubsecRound, Utc};

/// Source of the timestamps stamped on new blocks.
///
/// Production code uses [`SystemClock`]; tests inject [`FixedClock`] so the
/// encoded bytes, and hence every digest, are reproducible.
pub trait Clock: Send + Sync + fmt::Debug {
    /// The current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock UTC time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that always returns the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    timestamp: DateTime<Utc>,
}

impl FixedClock {
    /// A clock frozen at `timestamp`, truncated to whole seconds.
    #[must_use]
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp: timestamp.trunc_subsecs(0),
        }
    }

    /// A clock frozen at `secs` seconds after the Unix epoch.
    ///
    /// Out-of-range values clamp to the epoch.
    #[must_use]
    pub fn from_unix(secs: i64) -> Self {
        Self::new(DateTime::from_timestamp(secs, 0).unwrap_or_default())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.timestamp
    }
}
