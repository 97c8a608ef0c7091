//! Whole-store documents for file export/import and cloud sync.

use crate::error::{Result, StoreError};
use crate::types::{BalanceHistory, Challenge, Payout, REntry};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Format version written into every document.
pub const SNAPSHOT_VERSION: &str = "1.0";

/// The four collections plus timer setting, as one JSON document.
///
/// `challenges`, `payouts` and `balanceHistory` are required when parsing;
/// everything else defaults to empty.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub challenges: Vec<Challenge>,
    pub payouts: Vec<Payout>,
    pub balance_history: BalanceHistory,
    #[serde(default)]
    pub r_entries: Vec<REntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timer_start_date: Option<DateTime<Utc>>,
    /// Set on file exports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_date: Option<DateTime<Utc>>,
    /// Set on documents pushed to the sync service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_date: Option<DateTime<Utc>>,
    #[serde(default = "default_version")]
    pub version: String,
}

fn default_version() -> String {
    SNAPSHOT_VERSION.to_string()
}

impl Snapshot {
    /// Parse and validate a document.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| StoreError::InvalidImport(e.to_string()))
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// When the document was written, whichever stamp it carries.
    pub fn written_at(&self) -> Option<DateTime<Utc>> {
        self.sync_date.or(self.export_date)
    }

    /// Record counts for confirmation prompts.
    pub fn summary(&self) -> SnapshotSummary {
        SnapshotSummary {
            challenges: self.challenges.len(),
            payouts: self.payouts.len(),
            balance_entries: self.balance_history.values().map(Vec::len).sum(),
            r_entries: self.r_entries.len(),
            written_at: self.written_at(),
        }
    }
}

/// What a document holds, shown before it overwrites local data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotSummary {
    pub challenges: usize,
    pub payouts: usize,
    pub balance_entries: usize,
    pub r_entries: usize,
    pub written_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_required_collection() {
        let raw = json!({
            "challenges": [],
            "payouts": [],
            "version": "1.0"
        })
        .to_string();

        let err = Snapshot::from_json(&raw).unwrap_err();
        match err {
            StoreError::InvalidImport(message) => assert!(message.contains("balanceHistory")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_optional_fields_default() {
        let raw = json!({
            "challenges": [],
            "payouts": [],
            "balanceHistory": {},
            "exportDate": "2024-04-01T12:00:00Z"
        })
        .to_string();

        let snapshot = Snapshot::from_json(&raw).unwrap();
        assert!(snapshot.r_entries.is_empty());
        assert!(snapshot.timer_start_date.is_none());
        assert_eq!(snapshot.version, SNAPSHOT_VERSION);
        assert!(snapshot.written_at().is_some());
    }

    #[test]
    fn test_not_json() {
        assert!(matches!(
            Snapshot::from_json("not a backup"),
            Err(StoreError::InvalidImport(_))
        ));
    }

    #[test]
    fn test_summary_counts_entries() {
        let raw = json!({
            "challenges": [],
            "payouts": [],
            "balanceHistory": {
                "1": [
                    {"date": "2024-01-01", "balance": 1000.0, "notes": "Initial balance"},
                    {"date": "2024-01-02", "balance": 1010.0, "notes": ""}
                ],
                "2": [
                    {"date": "2024-01-01", "balance": 500.0, "notes": ""}
                ]
            },
            "syncDate": "2024-04-01T12:00:00Z"
        })
        .to_string();

        let summary = Snapshot::from_json(&raw).unwrap().summary();
        assert_eq!(summary.balance_entries, 3);
        assert_eq!(summary.challenges, 0);
    }
}
