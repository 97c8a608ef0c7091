//! Error handling and edge case tests.

use chrono::NaiveDate;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use trading_goal_tracker::{
    BalanceEntryInput, ChallengeInput, EntryKey, KeyValueStorage, MemoryStorage, MetricsConfig,
    PayoutInput, REntryInput, RecordId, Store, StoreConfig, StoreError,
};

fn test_store(dir: &TempDir) -> Store {
    Store::open_or_create(StoreConfig {
        path: dir.path().join("store"),
        ..Default::default()
    })
    .unwrap()
}

fn date(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
}

/// Memory storage whose writes can be switched off.
struct FlakyStorage {
    inner: MemoryStorage,
    fail_writes: Arc<AtomicBool>,
}

impl KeyValueStorage for FlakyStorage {
    fn get(&self, key: &str) -> trading_goal_tracker::Result<Option<String>> {
        self.inner.get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> trading_goal_tracker::Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::other("disk full")));
        }
        self.inner.set(key, value)
    }

    fn remove(&mut self, key: &str) -> trading_goal_tracker::Result<()> {
        self.inner.remove(key)
    }
}

fn flaky_store() -> (Store, Arc<AtomicBool>) {
    let fail_writes = Arc::new(AtomicBool::new(false));
    let storage = FlakyStorage {
        inner: MemoryStorage::new(),
        fail_writes: Arc::clone(&fail_writes),
    };
    let store = Store::with_storage(storage, MetricsConfig::default()).unwrap();
    (store, fail_writes)
}

/// Storage over a shared map, so a second store can reopen what the first
/// one wrote. Writes to `failing_key` fail while the flag is set.
struct SharedStorage {
    entries: Arc<Mutex<HashMap<String, String>>>,
    failing_key: &'static str,
    fail: Arc<AtomicBool>,
}

impl KeyValueStorage for SharedStorage {
    fn get(&self, key: &str) -> trading_goal_tracker::Result<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> trading_goal_tracker::Result<()> {
        if key == self.failing_key && self.fail.load(Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::other("disk full")));
        }
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> trading_goal_tracker::Result<()> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

// --- Missing Records ---

#[test]
fn test_mutations_on_missing_ids_are_noops() {
    let mut store = Store::in_memory(MetricsConfig::default());
    let ghost = RecordId::from("1700000000000");

    assert!(!store
        .update_challenge(&ghost, ChallengeInput::new("x", 1.0, date(1)))
        .unwrap());
    assert!(!store.delete_challenge(&ghost).unwrap());
    assert!(!store
        .record_balance(&ghost, BalanceEntryInput::new(date(1), 1.0))
        .unwrap());
    assert!(!store
        .delete_balance_entry(&ghost, EntryKey::Date(date(1)))
        .unwrap());
    assert!(!store
        .update_payout(&ghost, PayoutInput::new(1.0, date(1)))
        .unwrap());
    assert!(!store.delete_payout(&ghost).unwrap());
    assert!(!store.delete_r_entry(&ghost).unwrap());

    assert!(store.challenges().is_empty());
    assert!(store.all_balance_history().is_empty());
}

// --- Persistence Failures ---

#[test]
fn test_failed_persist_leaves_memory_unchanged() {
    let (mut store, fail_writes) = flaky_store();
    let id = store
        .add_challenge(ChallengeInput::new("Phase 1", 5_000.0, date(1)))
        .unwrap();
    store.add_payout(PayoutInput::new(100.0, date(2))).unwrap();
    let before = store.snapshot();
    let metrics_before = store.metrics().clone();

    fail_writes.store(true, Ordering::SeqCst);

    assert!(store
        .record_balance(&id, BalanceEntryInput::new(date(3), 5_500.0))
        .is_err());
    assert!(store.add_payout(PayoutInput::new(50.0, date(3))).is_err());
    assert!(store.add_r_entry(REntryInput::new(1.0, date(3))).is_err());
    assert!(store.delete_challenge(&id).is_err());
    assert!(store
        .import_json(r#"{"challenges":[],"payouts":[],"balanceHistory":{}}"#)
        .is_err());

    assert_eq!(store.snapshot(), before);
    assert_eq!(store.metrics(), &metrics_before);

    fail_writes.store(false, Ordering::SeqCst);
    assert!(store
        .record_balance(&id, BalanceEntryInput::new(date(3), 5_500.0))
        .unwrap());
}

#[test]
fn test_partial_write_failure_leaves_disk_consistent() {
    let entries = Arc::new(Mutex::new(HashMap::new()));
    let fail = Arc::new(AtomicBool::new(false));
    let shared = || SharedStorage {
        entries: Arc::clone(&entries),
        failing_key: "balanceHistory",
        fail: Arc::clone(&fail),
    };

    let mut store = Store::with_storage(shared(), MetricsConfig::default()).unwrap();
    let id = store
        .add_challenge(ChallengeInput::new("Phase 1", 1_000.0, date(1)))
        .unwrap();

    // challenges is written before balanceHistory and must be rolled back
    fail.store(true, Ordering::SeqCst);
    assert!(store
        .record_balance(&id, BalanceEntryInput::new(date(5), 1_500.0))
        .is_err());
    fail.store(false, Ordering::SeqCst);

    let reopened = Store::with_storage(shared(), MetricsConfig::default()).unwrap();
    let challenge = reopened.challenge(&id).unwrap();
    let history = reopened.balance_history(&id);
    assert_eq!(challenge.current_balance, 1_000.0);
    assert_eq!(history.len(), 1);
    assert_eq!(challenge.current_balance, history.last().unwrap().balance);
}

// --- Import Validation ---

#[test]
fn test_invalid_import_changes_nothing() {
    let mut store = Store::in_memory(MetricsConfig::default());
    store.add_payout(PayoutInput::new(250.0, date(1))).unwrap();
    let before = store.snapshot();

    for bad in [
        "",
        "[]",
        "{\"challenges\": []}",
        "{\"challenges\": [], \"payouts\": {}, \"balanceHistory\": {}}",
        "{\"challenges\": [{\"id\": 1}], \"payouts\": [], \"balanceHistory\": {}}",
    ] {
        let result = store.import_json(bad);
        assert!(
            matches!(result, Err(StoreError::InvalidImport(_))),
            "accepted {bad:?}"
        );
    }

    assert_eq!(store.snapshot(), before);
}

// --- Storage Errors ---

#[test]
fn test_open_missing_without_create() {
    let dir = TempDir::new().unwrap();
    let result = Store::open_or_create(StoreConfig {
        path: dir.path().join("absent"),
        create_if_missing: false,
        ..Default::default()
    });
    assert!(matches!(result, Err(StoreError::NotInitialized)));
}

#[test]
fn test_second_open_is_locked() {
    let dir = TempDir::new().unwrap();
    let _store = test_store(&dir);

    let second = Store::open_or_create(StoreConfig {
        path: dir.path().join("store"),
        ..Default::default()
    });
    assert!(matches!(second, Err(StoreError::Locked)));
}

#[test]
fn test_corrupt_collection_is_reported() {
    let dir = TempDir::new().unwrap();
    {
        let mut store = test_store(&dir);
        store.add_payout(PayoutInput::new(1.0, date(1))).unwrap();
    }
    std::fs::write(dir.path().join("store").join("payouts.json"), "{not json").unwrap();

    let result = Store::open_or_create(StoreConfig {
        path: dir.path().join("store"),
        ..Default::default()
    });
    match result {
        Err(StoreError::Deserialization { key, .. }) => assert_eq!(key, "payouts"),
        Err(other) => panic!("unexpected error: {other:?}"),
        Ok(_) => panic!("corrupt store opened"),
    }
}

#[test]
fn test_bad_manifest() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store");
    {
        test_store(&dir);
    }
    std::fs::write(path.join("MANIFEST"), b"NOPE\x01").unwrap();

    let result = Store::open_or_create(StoreConfig {
        path,
        ..Default::default()
    });
    assert!(matches!(result, Err(StoreError::InvalidFormat(_))));
}

#[test]
fn test_non_finite_amounts_are_rejected() {
    let dir = TempDir::new().unwrap();
    let mut store = test_store(&dir);
    let id = store
        .add_challenge(ChallengeInput::new("Phase 1", 5_000.0, date(1)))
        .unwrap();

    assert!(matches!(
        store.add_payout(PayoutInput::new(f64::NAN, date(2))),
        Err(StoreError::InvalidValue { field: "amount", .. })
    ));
    assert!(matches!(
        store.add_r_entry(REntryInput::new(f64::INFINITY, date(2))),
        Err(StoreError::InvalidValue { field: "value", .. })
    ));
    assert!(matches!(
        store.record_balance(&id, BalanceEntryInput::new(date(2), f64::NEG_INFINITY)),
        Err(StoreError::InvalidValue { field: "balance", .. })
    ));
    assert!(matches!(
        store.add_challenge(ChallengeInput::new("Phase 2", f64::NAN, date(1))),
        Err(StoreError::InvalidValue { field: "initialBalance", .. })
    ));
    assert!(matches!(
        store.update_challenge(
            &id,
            ChallengeInput::new("Phase 1", 5_000.0, date(1)).with_scaling(f64::INFINITY)
        ),
        Err(StoreError::InvalidValue { field: "scalingTarget", .. })
    ));

    assert!(store.payouts().is_empty());
    assert!(store.r_entries().is_empty());
    assert_eq!(store.challenges().len(), 1);

    drop(store);
    let reopened = test_store(&dir);
    assert_eq!(reopened.challenge(&id).unwrap().current_balance, 5_000.0);
}

// --- Degenerate Values ---

#[test]
fn test_zero_initial_balance() {
    let mut store = Store::in_memory(MetricsConfig::default());
    let id = store
        .add_challenge(ChallengeInput::new("Empty", 0.0, date(1)).with_current_balance(100.0))
        .unwrap();

    let perf = store.performance(&id).unwrap();
    assert_eq!(perf.profit, 100.0);
    assert_eq!(perf.profit_percent, 0.0);
}

#[test]
fn test_zero_goal() {
    let mut store = Store::in_memory(MetricsConfig {
        payout_goal: 0.0,
        ..Default::default()
    });
    store.add_payout(PayoutInput::new(500.0, date(1))).unwrap();

    let goal = store.metrics().payout_goal;
    assert_eq!(goal.percent, 0.0);
    assert_eq!(goal.bar_percent, 0.0);
    assert_eq!(goal.remaining, -500.0);
}
