//! Persistent key-value storage backing the record store.
//!
//! The store writes each collection as one JSON document under a fixed key,
//! the same layout the dashboard has always used:
//!
//! | key              | content                                 |
//! |------------------|-----------------------------------------|
//! | `challenges`     | array of challenges                     |
//! | `payouts`        | array of payouts                        |
//! | `balanceHistory` | object, challenge id → balance entries  |
//! | `rEntries`       | array of R-entries                      |
//! | `githubToken`    | sync access token (raw string)          |
//! | `gistId`         | remote document id (raw string)         |
//! | `timerStartDate` | RFC 3339 timestamp (raw string)         |

mod file;
mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

use crate::error::Result;
use tracing::warn;

pub const CHALLENGES_KEY: &str = "challenges";
pub const PAYOUTS_KEY: &str = "payouts";
pub const BALANCE_HISTORY_KEY: &str = "balanceHistory";
pub const R_ENTRIES_KEY: &str = "rEntries";
pub const SYNC_TOKEN_KEY: &str = "githubToken";
pub const REMOTE_ID_KEY: &str = "gistId";
pub const TIMER_START_KEY: &str = "timerStartDate";

/// String-keyed storage with string values.
pub trait KeyValueStorage: Send {
    /// Read the value stored under `key`.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write or overwrite the value under `key`.
    fn set(&mut self, key: &str, value: &str) -> Result<()>;

    /// Remove `key`. Removing a missing key is not an error.
    fn remove(&mut self, key: &str) -> Result<()>;

    /// Write several keys so that either all of them or none change.
    ///
    /// The default writes one key at a time and restores the earlier keys
    /// when a later write fails.
    fn set_many(&mut self, entries: &[(&str, String)]) -> Result<()> {
        let mut previous = Vec::with_capacity(entries.len());
        for (key, _) in entries {
            previous.push((*key, self.get(key)?));
        }

        for (written, (key, value)) in entries.iter().enumerate() {
            if let Err(e) = self.set(key, value) {
                for (key, before) in previous[..written].iter().rev() {
                    let restored = match before {
                        Some(value) => self.set(key, value),
                        None => self.remove(key),
                    };
                    if let Err(restore_err) = restored {
                        warn!(key, error = %restore_err, "failed to restore key");
                    }
                }
                return Err(e);
            }
        }
        Ok(())
    }
}

impl<S: KeyValueStorage + ?Sized> KeyValueStorage for Box<S> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        (**self).remove(key)
    }

    fn set_many(&mut self, entries: &[(&str, String)]) -> Result<()> {
        (**self).set_many(entries)
    }
}
