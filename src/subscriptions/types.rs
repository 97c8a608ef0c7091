//! Subscription types for store change notifications.

use crate::metrics::DashboardMetrics;
use crate::types::RecordId;
use serde::{Deserialize, Serialize};

/// Configuration for a subscription.
#[derive(Clone, Debug)]
pub struct SubscriptionConfig {
    /// Max buffered events before dropping subscriber.
    /// Default: 256
    pub buffer_size: usize,

    /// Filter criteria.
    pub filter: SubscriptionFilter,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            buffer_size: 256,
            filter: SubscriptionFilter::default(),
        }
    }
}

/// The part of the store a change touched.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Challenges,
    BalanceHistory,
    Payouts,
    REntries,
    Settings,
}

/// Filter criteria for subscriptions.
#[derive(Clone, Debug, Default)]
pub struct SubscriptionFilter {
    /// Collections of interest (None = everything).
    pub collections: Option<Vec<Collection>>,
}

impl SubscriptionFilter {
    /// Subscribe to every change.
    pub fn all() -> Self {
        Self::default()
    }

    /// Subscribe to changes touching any of the given collections.
    pub fn collections(collections: Vec<Collection>) -> Self {
        Self {
            collections: Some(collections),
        }
    }

    pub(crate) fn matches(&self, change: &Change) -> bool {
        match &self.collections {
            None => true,
            Some(wanted) => change
                .collections()
                .iter()
                .any(|touched| wanted.contains(touched)),
        }
    }
}

/// A committed mutation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Change {
    ChallengeAdded { id: RecordId },
    ChallengeUpdated { id: RecordId },
    ChallengeDeleted { id: RecordId },
    BalanceRecorded { challenge_id: RecordId },
    BalanceEntryDeleted { challenge_id: RecordId },
    PayoutAdded { id: RecordId },
    PayoutUpdated { id: RecordId },
    PayoutDeleted { id: RecordId },
    REntryAdded { id: RecordId },
    REntryDeleted { id: RecordId },
    TimerChanged,
    /// All collections were replaced by an import or a pull.
    Replaced,
}

impl Change {
    /// Collections the change wrote.
    pub fn collections(&self) -> &'static [Collection] {
        use Collection::*;
        match self {
            Change::ChallengeAdded { .. }
            | Change::ChallengeUpdated { .. }
            | Change::ChallengeDeleted { .. }
            | Change::BalanceRecorded { .. }
            | Change::BalanceEntryDeleted { .. } => &[Challenges, BalanceHistory],
            Change::PayoutAdded { .. } | Change::PayoutUpdated { .. } | Change::PayoutDeleted { .. } => {
                &[Payouts]
            }
            Change::REntryAdded { .. } | Change::REntryDeleted { .. } => &[REntries],
            Change::TimerChanged => &[Settings],
            Change::Replaced => &[Challenges, BalanceHistory, Payouts, REntries, Settings],
        }
    }
}

/// Events emitted by subscriptions.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreEvent {
    /// Metrics as of subscription time.
    Snapshot { metrics: Box<DashboardMetrics> },

    /// A mutation was persisted; metrics are recomputed after it.
    Changed {
        change: Change,
        metrics: Box<DashboardMetrics>,
    },

    /// Subscription was dropped.
    Dropped { reason: DropReason },
}

/// Why a subscription was dropped.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Send buffer overflowed (slow consumer).
    BufferOverflow,
    /// Explicitly unsubscribed.
    Unsubscribed,
}

/// Unique identifier for a subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Handle to manage a subscription.
pub struct SubscriptionHandle {
    pub id: SubscriptionId,
    /// Channel to receive events.
    pub receiver: crossbeam_channel::Receiver<StoreEvent>,
}

impl SubscriptionHandle {
    /// Receive the next event (blocking).
    pub fn recv(&self) -> Result<StoreEvent, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> Result<StoreEvent, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> Result<StoreEvent, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }
}
