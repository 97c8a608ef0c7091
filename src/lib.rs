//! # Trading Goal Tracker
//!
//! A local record store for prop-firm trading progress: evaluation
//! challenges and their balance history, withdrawn payouts, and R-multiple
//! outcomes, with dashboard metrics recomputed after every change and a
//! manual whole-store backup to a gist.
//!
//! ## Core Concepts
//!
//! - **Store**: Owns the four collections and mirrors them to storage on every mutation
//! - **Metrics**: Goal progress, success rate, cumulative series, scaling progress
//! - **Snapshot**: Whole-store JSON document for export, import and sync
//! - **Sync**: Push/pull of that document, last write wins
//!
//! ## Example
//!
//! ```ignore
//! use trading_goal_tracker::{ChallengeInput, PayoutInput, Store, StoreConfig};
//!
//! let mut store = Store::open_or_create(StoreConfig {
//!     path: "./tracker-data".into(),
//!     ..Default::default()
//! })?;
//!
//! let id = store.add_challenge(ChallengeInput::new("Phase 1", 100_000.0, today))?;
//! store.add_payout(PayoutInput::new(2_500.0, today).with_source("FTMO"))?;
//!
//! println!("{:.1}% of goal", store.metrics().payout_goal.percent);
//! ```

pub mod error;
pub mod metrics;
pub mod snapshot;
pub mod storage;
pub mod store;
pub mod subscriptions;
pub mod sync;
pub mod types;

// Re-exports
pub use error::{Result, StoreError, SyncError, SyncResult};
pub use metrics::{
    ChallengePerformance, DashboardMetrics, GoalProgress, MetricsConfig, ScalingProgress,
    SeriesLabel, SeriesPoint, UnrealizedProfitPolicy,
};
pub use snapshot::{Snapshot, SnapshotSummary, SNAPSHOT_VERSION};
pub use storage::{FileStorage, KeyValueStorage, MemoryStorage};
pub use store::{Store, StoreConfig};
pub use subscriptions::{
    Change, Collection, DropReason, StoreEvent, SubscriptionConfig, SubscriptionFilter,
    SubscriptionHandle, SubscriptionId, SubscriptionManager,
};
pub use sync::{GistApi, HttpGistApi, PullPreview, PushOutcome, SyncClient, SyncConfig};
pub use types::*;
