//! Change notifications for store observers.
//!
//! Every committed mutation is followed by a full metrics recomputation and
//! a [`StoreEvent::Changed`] carrying both the change and the new metrics.
//! Presentation layers subscribe here instead of polling the store.
//!
//! Subscriptions support:
//! - Filtering by collection
//! - An initial metrics snapshot on subscribe
//! - Bounded buffers with slow-subscriber dropping
//!
//! # Example
//!
//! ```ignore
//! let handle = store.subscribe(SubscriptionConfig {
//!     filter: SubscriptionFilter::collections(vec![Collection::Payouts]),
//!     ..Default::default()
//! });
//!
//! loop {
//!     match handle.recv() {
//!         Ok(StoreEvent::Snapshot { metrics }) => render(&metrics),
//!         Ok(StoreEvent::Changed { metrics, .. }) => render(&metrics),
//!         Ok(StoreEvent::Dropped { .. }) | Err(_) => break,
//!     }
//! }
//! ```

mod manager;
mod types;

pub use manager::SubscriptionManager;
pub use types::{
    Change, Collection, DropReason, StoreEvent, SubscriptionConfig, SubscriptionFilter,
    SubscriptionHandle, SubscriptionId,
};
