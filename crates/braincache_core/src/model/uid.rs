//! Process-unique entity identifiers.
//!
//! # Responsibility
//! - Hand out monotonically increasing 64-bit identifiers.
//! - Keep generated identifiers above every identifier read from disk.
//!
//! # Invariants
//! - A `Uid` returned by `Uid::next()` is never returned again in this process.
//! - The counter is seeded once from wall-clock seconds, so identifiers keep
//!   increasing across restarts.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

static LAST_ISSUED: Lazy<AtomicI64> = Lazy::new(|| AtomicI64::new(wall_clock_seed()));

/// Stable identifier for folders and files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Uid(i64);

impl Uid {
    /// Wraps a raw identifier, e.g. one read from a record file name.
    pub const fn from_raw(value: i64) -> Self {
        Self(value)
    }

    /// Issues the next process-unique identifier.
    pub fn next() -> Self {
        Self(LAST_ISSUED.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Registers an identifier that already exists (decoded from disk), so
    /// `next()` never issues it again.
    pub fn observe(uid: Uid) {
        LAST_ISSUED.fetch_max(uid.0, Ordering::SeqCst);
    }

    pub const fn get(self) -> i64 {
        self.0
    }
}

impl Display for Uid {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn wall_clock_seed() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX / 2))
        .unwrap_or(0)
}
