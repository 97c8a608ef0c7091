//! Elapsed time since the user's timer start.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Elapsed {
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
}

/// Time from `start` to `now`; zero when `start` lies in the future.
pub fn elapsed_since(start: DateTime<Utc>, now: DateTime<Utc>) -> Elapsed {
    let total = (now - start).num_seconds().max(0);
    Elapsed {
        days: total / 86_400,
        hours: (total % 86_400) / 3_600,
        minutes: (total % 3_600) / 60,
        seconds: total % 60,
    }
}
