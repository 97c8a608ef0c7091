//! Core record types for the tracker.
//!
//! Field names serialize in camelCase so that data written by earlier
//! versions of the dashboard loads unchanged.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identifier of a challenge, payout or R-entry.
///
/// Derived from the creation time in milliseconds and kept as a string,
/// which is how it appears in storage and export files.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl RecordId {
    /// Id for a record created at the given Unix time in milliseconds.
    pub fn from_millis(millis: i64) -> Self {
        RecordId(millis.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordId({})", self.0)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        RecordId(s.to_string())
    }
}

/// Lifecycle of a challenge account.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChallengeStatus {
    #[default]
    Active,
    Passed,
    Funded,
    Failed,
}

impl ChallengeStatus {
    /// Passed and funded both count as a completed challenge.
    pub fn is_completed(self) -> bool {
        matches!(self, ChallengeStatus::Passed | ChallengeStatus::Funded)
    }
}

/// A tracked trading account.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Challenge {
    pub id: RecordId,
    pub name: String,
    #[serde(default)]
    pub provider: String,
    pub initial_balance: f64,
    pub current_balance: f64,
    pub status: ChallengeStatus,
    pub start_date: NaiveDate,
    pub created_at: DateTime<Utc>,

    /// Set once at creation; the account was already funded and is not an
    /// evaluation to complete.
    #[serde(default)]
    pub started_as_funded: bool,

    #[serde(default)]
    pub has_scaling: bool,

    /// Balance growth in percent required for capital scaling.
    #[serde(default)]
    pub scaling_target: Option<f64>,
}

/// A dated balance observation for a challenge.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BalanceEntry {
    pub date: NaiveDate,
    pub balance: f64,
    #[serde(default)]
    pub notes: String,
    /// Missing on entries written by early versions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl BalanceEntry {
    /// Key used to address this entry for deletion.
    pub fn key(&self) -> EntryKey {
        match self.timestamp {
            Some(ts) => EntryKey::Timestamp(ts),
            None => EntryKey::Date(self.date),
        }
    }
}

/// Balance entries per challenge, each sequence ascending by date.
pub type BalanceHistory = BTreeMap<RecordId, Vec<BalanceEntry>>;

/// Addresses a balance entry: its timestamp, or its date when it has none.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntryKey {
    Timestamp(DateTime<Utc>),
    Date(NaiveDate),
}

/// A realized cash withdrawal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payout {
    pub id: RecordId,
    pub amount: f64,
    pub date: NaiveDate,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub notes: String,
    pub created_at: DateTime<Utc>,
}

/// A trade outcome expressed as a multiple of initial risk.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct REntry {
    pub id: RecordId,
    /// Signed R-multiple.
    pub value: f64,
    pub date: NaiveDate,
    #[serde(default)]
    pub notes: String,
    pub timestamp: DateTime<Utc>,
}

/// Input for creating or editing a challenge.
#[derive(Clone, Debug)]
pub struct ChallengeInput {
    pub name: String,
    pub provider: String,
    pub initial_balance: f64,
    pub current_balance: f64,
    pub status: ChallengeStatus,
    pub start_date: NaiveDate,
    pub has_scaling: bool,
    pub scaling_target: Option<f64>,
}

impl ChallengeInput {
    /// New active challenge whose current balance equals its initial balance.
    pub fn new(name: impl Into<String>, initial_balance: f64, start_date: NaiveDate) -> Self {
        Self {
            name: name.into(),
            provider: String::new(),
            initial_balance,
            current_balance: initial_balance,
            status: ChallengeStatus::Active,
            start_date,
            has_scaling: false,
            scaling_target: None,
        }
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }

    pub fn with_current_balance(mut self, balance: f64) -> Self {
        self.current_balance = balance;
        self
    }

    pub fn with_status(mut self, status: ChallengeStatus) -> Self {
        self.status = status;
        self
    }

    /// Enable capital scaling with a growth target in percent.
    pub fn with_scaling(mut self, target_percent: f64) -> Self {
        self.has_scaling = true;
        self.scaling_target = Some(target_percent);
        self
    }
}

/// Input for recording a balance.
#[derive(Clone, Debug)]
pub struct BalanceEntryInput {
    pub date: NaiveDate,
    pub balance: f64,
    pub notes: String,
}

impl BalanceEntryInput {
    pub fn new(date: NaiveDate, balance: f64) -> Self {
        Self {
            date,
            balance,
            notes: String::new(),
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }
}

/// Input for creating or editing a payout.
#[derive(Clone, Debug)]
pub struct PayoutInput {
    pub amount: f64,
    pub date: NaiveDate,
    pub source: String,
    pub notes: String,
}

impl PayoutInput {
    pub fn new(amount: f64, date: NaiveDate) -> Self {
        Self {
            amount,
            date,
            source: String::new(),
            notes: String::new(),
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }
}

/// Input for recording an R-multiple.
#[derive(Clone, Debug)]
pub struct REntryInput {
    pub value: f64,
    pub date: NaiveDate,
    pub notes: String,
}

impl REntryInput {
    pub fn new(value: f64, date: NaiveDate) -> Self {
        Self {
            value,
            date,
            notes: String::new(),
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }
}
