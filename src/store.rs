//! Main Store struct tying all components together.

use crate::error::{Result, StoreError};
use crate::metrics::{
    balance_timeline, elapsed_since, BalanceTimeline, ChallengePerformance, DashboardMetrics,
    Elapsed, MetricsConfig,
};
use crate::snapshot::{Snapshot, SnapshotSummary, SNAPSHOT_VERSION};
use crate::storage::{
    FileStorage, KeyValueStorage, MemoryStorage, BALANCE_HISTORY_KEY, CHALLENGES_KEY,
    PAYOUTS_KEY, REMOTE_ID_KEY, R_ENTRIES_KEY, SYNC_TOKEN_KEY, TIMER_START_KEY,
};
use crate::subscriptions::{
    Change, SubscriptionConfig, SubscriptionHandle, SubscriptionId, SubscriptionManager,
};
use crate::types::{
    BalanceEntry, BalanceEntryInput, BalanceHistory, Challenge, ChallengeInput, ChallengeStatus,
    EntryKey, Payout, PayoutInput, REntry, REntryInput, RecordId,
};
use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use std::path::PathBuf;
use tracing::{debug, info};

/// Store configuration.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Directory holding the persisted collections.
    pub path: PathBuf,

    /// Whether to create the store if it doesn't exist.
    pub create_if_missing: bool,

    /// Goals and policies for derived metrics.
    pub metrics: MetricsConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./tracker-data"),
            create_if_missing: true,
            metrics: MetricsConfig::default(),
        }
    }
}

/// The four persisted collections.
#[derive(Clone, Debug, Default, PartialEq)]
struct Collections {
    challenges: Vec<Challenge>,
    payouts: Vec<Payout>,
    balance_history: BalanceHistory,
    r_entries: Vec<REntry>,
}

impl Collections {
    fn id_in_use(&self, id: &RecordId) -> bool {
        self.challenges.iter().any(|c| &c.id == id)
            || self.payouts.iter().any(|p| &p.id == id)
            || self.r_entries.iter().any(|r| &r.id == id)
    }

    fn challenge_index(&self, id: &RecordId) -> Option<usize> {
        self.challenges.iter().position(|c| &c.id == id)
    }

    /// Restore ordering and balance invariants on data from outside.
    fn normalize(&mut self) {
        for entries in self.balance_history.values_mut() {
            entries.sort_by_key(|e| e.date);
        }
        for challenge in &mut self.challenges {
            if let Some(latest) = self
                .balance_history
                .get(&challenge.id)
                .and_then(|entries| entries.last())
            {
                challenge.current_balance = latest.balance;
            }
        }
        sort_payouts(&mut self.payouts);
    }

    /// Reject values JSON cannot represent.
    fn ensure_finite(&self) -> Result<()> {
        for challenge in &self.challenges {
            ensure_finite("initialBalance", challenge.initial_balance)?;
            ensure_finite("currentBalance", challenge.current_balance)?;
        }
        for payout in &self.payouts {
            ensure_finite("amount", payout.amount)?;
        }
        for entry in self.balance_history.values().flatten() {
            ensure_finite("balance", entry.balance)?;
        }
        for entry in &self.r_entries {
            ensure_finite("value", entry.value)?;
        }
        Ok(())
    }
}

/// Payouts are kept newest first.
fn sort_payouts(payouts: &mut [Payout]) {
    payouts.sort_by(|a, b| b.date.cmp(&a.date));
}

/// A timestamp not yet used by any entry in `history`.
fn fresh_timestamp(history: &[BalanceEntry], from: DateTime<Utc>) -> DateTime<Utc> {
    let mut ts = from;
    while history.iter().any(|e| e.timestamp == Some(ts)) {
        ts += Duration::microseconds(1);
    }
    ts
}

/// Append an entry, keep the sequence ordered and return the latest balance.
fn insert_entry(history: &mut Vec<BalanceEntry>, entry: BalanceEntry) -> f64 {
    let balance = entry.balance;
    history.push(entry);
    history.sort_by_key(|e| e.date);
    history.last().map_or(balance, |e| e.balance)
}

/// The record store.
///
/// Owns the challenges, payouts, balance history and R-entries, mirrors
/// them to storage after every mutation, recomputes the dashboard metrics,
/// and notifies subscribers.
///
/// Mutations take `&mut self`: each one runs to completion before the next.
/// Edits and deletes addressing a missing record return `Ok(false)` and
/// change nothing.
pub struct Store {
    /// Metrics configuration.
    config: MetricsConfig,

    /// Persistent backing storage.
    storage: Box<dyn KeyValueStorage>,

    /// Committed collections.
    data: Collections,

    /// User-configurable timer start.
    timer_start: Option<DateTime<Utc>>,

    /// Metrics for `data`, recomputed on each commit.
    metrics: DashboardMetrics,

    /// Change observers.
    subscriptions: SubscriptionManager,

    /// Last id handed out, in milliseconds.
    last_issued_id: i64,
}

impl Store {
    /// Open an existing store or create a new one on disk.
    pub fn open_or_create(config: StoreConfig) -> Result<Self> {
        let storage = FileStorage::open_or_create(&config.path, config.create_if_missing)?;
        Self::with_storage(storage, config.metrics)
    }

    /// Load a store from arbitrary storage.
    pub fn with_storage(
        storage: impl KeyValueStorage + 'static,
        config: MetricsConfig,
    ) -> Result<Self> {
        let data = Collections {
            challenges: load_json(&storage, CHALLENGES_KEY)?.unwrap_or_default(),
            payouts: load_json(&storage, PAYOUTS_KEY)?.unwrap_or_default(),
            balance_history: load_json(&storage, BALANCE_HISTORY_KEY)?.unwrap_or_default(),
            r_entries: load_json(&storage, R_ENTRIES_KEY)?.unwrap_or_default(),
        };
        let timer_start = match storage.get(TIMER_START_KEY)? {
            Some(raw) => Some(parse_timestamp(TIMER_START_KEY, &raw)?),
            None => None,
        };

        info!(
            challenges = data.challenges.len(),
            payouts = data.payouts.len(),
            r_entries = data.r_entries.len(),
            "store loaded"
        );

        Ok(Self::from_parts(Box::new(storage), data, timer_start, config))
    }

    /// Empty store backed by memory only.
    pub fn in_memory(config: MetricsConfig) -> Self {
        Self::from_parts(
            Box::new(MemoryStorage::new()),
            Collections::default(),
            None,
            config,
        )
    }

    fn from_parts(
        storage: Box<dyn KeyValueStorage>,
        data: Collections,
        timer_start: Option<DateTime<Utc>>,
        config: MetricsConfig,
    ) -> Self {
        let metrics =
            DashboardMetrics::compute(&data.challenges, &data.payouts, &data.r_entries, &config);
        Self {
            config,
            storage,
            data,
            timer_start,
            metrics,
            subscriptions: SubscriptionManager::new(),
            last_issued_id: 0,
        }
    }

    // --- Queries ---

    pub fn challenges(&self) -> &[Challenge] {
        &self.data.challenges
    }

    pub fn challenge(&self, id: &RecordId) -> Option<&Challenge> {
        self.data.challenges.iter().find(|c| &c.id == id)
    }

    /// Balance entries of a challenge, ascending by date.
    pub fn balance_history(&self, challenge_id: &RecordId) -> &[BalanceEntry] {
        self.data
            .balance_history
            .get(challenge_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn all_balance_history(&self) -> &BalanceHistory {
        &self.data.balance_history
    }

    /// Payouts, newest first.
    pub fn payouts(&self) -> &[Payout] {
        &self.data.payouts
    }

    pub fn r_entries(&self) -> &[REntry] {
        &self.data.r_entries
    }

    pub fn timer_start(&self) -> Option<DateTime<Utc>> {
        self.timer_start
    }

    /// Time since the timer start, if one is set.
    pub fn elapsed(&self, now: DateTime<Utc>) -> Option<Elapsed> {
        self.timer_start.map(|start| elapsed_since(start, now))
    }

    /// Metrics as of the last committed mutation.
    pub fn metrics(&self) -> &DashboardMetrics {
        &self.metrics
    }

    pub fn metrics_config(&self) -> &MetricsConfig {
        &self.config
    }

    pub fn performance(&self, challenge_id: &RecordId) -> Option<ChallengePerformance> {
        self.challenge(challenge_id).map(ChallengePerformance::of)
    }

    pub fn balance_timeline(&self) -> BalanceTimeline {
        balance_timeline(&self.data.challenges, &self.data.balance_history)
    }

    // --- Challenge Operations ---

    /// Create a challenge and seed its balance history.
    ///
    /// The history starts with the initial balance on the start date; a
    /// differing current balance is recorded as a second entry dated today,
    /// or on the start date when that lies in the future.
    pub fn add_challenge(&mut self, input: ChallengeInput) -> Result<RecordId> {
        input.validate()?;
        let id = self.next_id();
        let now = Utc::now();

        let mut history = vec![BalanceEntry {
            date: input.start_date,
            balance: input.initial_balance,
            notes: "Initial balance".to_string(),
            timestamp: Some(now),
        }];
        let mut current_balance = input.initial_balance;
        if input.current_balance != input.initial_balance {
            current_balance = insert_entry(
                &mut history,
                BalanceEntry {
                    date: now.date_naive().max(input.start_date),
                    balance: input.current_balance,
                    notes: "Current balance".to_string(),
                    timestamp: Some(now + Duration::milliseconds(1)),
                },
            );
        }

        let challenge = Challenge {
            id: id.clone(),
            name: input.name,
            provider: input.provider,
            initial_balance: input.initial_balance,
            current_balance,
            status: input.status,
            start_date: input.start_date,
            created_at: now,
            started_as_funded: input.status == ChallengeStatus::Funded,
            has_scaling: input.has_scaling,
            scaling_target: input.scaling_target,
        };

        let mut next = self.data.clone();
        next.challenges.push(challenge);
        next.balance_history.insert(id.clone(), history);

        self.commit(next, Change::ChallengeAdded { id: id.clone() })?;
        Ok(id)
    }

    /// Edit a challenge.
    ///
    /// `id`, `createdAt` and `startedAsFunded` are kept. A changed current
    /// balance is recorded as a balance entry dated today, and the current
    /// balance is then taken from the latest entry.
    pub fn update_challenge(&mut self, id: &RecordId, input: ChallengeInput) -> Result<bool> {
        input.validate()?;
        let Some(index) = self.data.challenge_index(id) else {
            return Ok(false);
        };

        let mut next = self.data.clone();
        let challenge = &mut next.challenges[index];
        let balance_changed = input.current_balance != challenge.current_balance;

        challenge.name = input.name;
        challenge.provider = input.provider;
        challenge.initial_balance = input.initial_balance;
        challenge.status = input.status;
        challenge.start_date = input.start_date;
        challenge.has_scaling = input.has_scaling;
        challenge.scaling_target = input.scaling_target;

        if balance_changed {
            let history = next.balance_history.entry(id.clone()).or_default();
            let now = Utc::now();
            let entry = BalanceEntry {
                date: now.date_naive(),
                balance: input.current_balance,
                notes: "Balance adjusted".to_string(),
                timestamp: Some(fresh_timestamp(history, now)),
            };
            challenge.current_balance = insert_entry(history, entry);
        }

        self.commit(next, Change::ChallengeUpdated { id: id.clone() })?;
        Ok(true)
    }

    /// Delete a challenge together with its balance history.
    pub fn delete_challenge(&mut self, id: &RecordId) -> Result<bool> {
        let Some(index) = self.data.challenge_index(id) else {
            return Ok(false);
        };

        let mut next = self.data.clone();
        next.challenges.remove(index);
        next.balance_history.remove(id);

        self.commit(next, Change::ChallengeDeleted { id: id.clone() })?;
        Ok(true)
    }

    // --- Balance Operations ---

    /// Record a balance for a challenge.
    ///
    /// The current balance follows the chronologically latest entry, so a
    /// backdated entry leaves it unchanged.
    pub fn record_balance(
        &mut self,
        challenge_id: &RecordId,
        input: BalanceEntryInput,
    ) -> Result<bool> {
        ensure_finite("balance", input.balance)?;
        let Some(index) = self.data.challenge_index(challenge_id) else {
            return Ok(false);
        };

        let mut next = self.data.clone();
        let history = next
            .balance_history
            .entry(challenge_id.clone())
            .or_default();
        let entry = BalanceEntry {
            date: input.date,
            balance: input.balance,
            notes: input.notes,
            timestamp: Some(fresh_timestamp(history, Utc::now())),
        };
        next.challenges[index].current_balance = insert_entry(history, entry);

        self.commit(
            next,
            Change::BalanceRecorded {
                challenge_id: challenge_id.clone(),
            },
        )?;
        Ok(true)
    }

    /// Delete the balance entries addressed by `key`.
    ///
    /// The current balance is re-derived from the latest remaining entry,
    /// or reverts to the initial balance once no entries remain.
    pub fn delete_balance_entry(&mut self, challenge_id: &RecordId, key: EntryKey) -> Result<bool> {
        let Some(index) = self.data.challenge_index(challenge_id) else {
            return Ok(false);
        };
        let Some(history) = self.data.balance_history.get(challenge_id) else {
            return Ok(false);
        };
        if !history.iter().any(|e| e.key() == key) {
            return Ok(false);
        }

        let mut next = self.data.clone();
        let history = next
            .balance_history
            .entry(challenge_id.clone())
            .or_default();
        history.retain(|e| e.key() != key);

        let challenge = &mut next.challenges[index];
        challenge.current_balance = history
            .last()
            .map_or(challenge.initial_balance, |e| e.balance);

        self.commit(
            next,
            Change::BalanceEntryDeleted {
                challenge_id: challenge_id.clone(),
            },
        )?;
        Ok(true)
    }

    // --- Payout Operations ---

    pub fn add_payout(&mut self, input: PayoutInput) -> Result<RecordId> {
        ensure_finite("amount", input.amount)?;
        let id = self.next_id();
        let payout = Payout {
            id: id.clone(),
            amount: input.amount,
            date: input.date,
            source: input.source,
            notes: input.notes,
            created_at: Utc::now(),
        };

        let mut next = self.data.clone();
        next.payouts.push(payout);
        sort_payouts(&mut next.payouts);

        self.commit(next, Change::PayoutAdded { id: id.clone() })?;
        Ok(id)
    }

    /// Edit a payout, keeping its id and creation time.
    pub fn update_payout(&mut self, id: &RecordId, input: PayoutInput) -> Result<bool> {
        ensure_finite("amount", input.amount)?;
        let Some(index) = self.data.payouts.iter().position(|p| &p.id == id) else {
            return Ok(false);
        };

        let mut next = self.data.clone();
        let payout = &mut next.payouts[index];
        payout.amount = input.amount;
        payout.date = input.date;
        payout.source = input.source;
        payout.notes = input.notes;
        sort_payouts(&mut next.payouts);

        self.commit(next, Change::PayoutUpdated { id: id.clone() })?;
        Ok(true)
    }

    pub fn delete_payout(&mut self, id: &RecordId) -> Result<bool> {
        let Some(index) = self.data.payouts.iter().position(|p| &p.id == id) else {
            return Ok(false);
        };

        let mut next = self.data.clone();
        next.payouts.remove(index);

        self.commit(next, Change::PayoutDeleted { id: id.clone() })?;
        Ok(true)
    }

    // --- R-Entry Operations ---

    pub fn add_r_entry(&mut self, input: REntryInput) -> Result<RecordId> {
        ensure_finite("value", input.value)?;
        let id = self.next_id();
        let entry = REntry {
            id: id.clone(),
            value: input.value,
            date: input.date,
            notes: input.notes,
            timestamp: Utc::now(),
        };

        let mut next = self.data.clone();
        next.r_entries.push(entry);

        self.commit(next, Change::REntryAdded { id: id.clone() })?;
        Ok(id)
    }

    pub fn delete_r_entry(&mut self, id: &RecordId) -> Result<bool> {
        let Some(index) = self.data.r_entries.iter().position(|r| &r.id == id) else {
            return Ok(false);
        };

        let mut next = self.data.clone();
        next.r_entries.remove(index);

        self.commit(next, Change::REntryDeleted { id: id.clone() })?;
        Ok(true)
    }

    // --- Timer ---

    /// Set or clear the timer start.
    pub fn set_timer_start(&mut self, start: Option<DateTime<Utc>>) -> Result<()> {
        match start {
            Some(ts) => self.storage.set(TIMER_START_KEY, &ts.to_rfc3339())?,
            None => self.storage.remove(TIMER_START_KEY)?,
        }
        self.timer_start = start;
        self.refresh(Change::TimerChanged);
        Ok(())
    }

    // --- Export / Import ---

    /// Current contents as a document without a write stamp.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            challenges: self.data.challenges.clone(),
            payouts: self.data.payouts.clone(),
            balance_history: self.data.balance_history.clone(),
            r_entries: self.data.r_entries.clone(),
            timer_start_date: self.timer_start,
            export_date: None,
            sync_date: None,
            version: SNAPSHOT_VERSION.to_string(),
        }
    }

    /// Record counts of the local data.
    pub fn summary(&self) -> SnapshotSummary {
        self.snapshot().summary()
    }

    /// Document for a file export, stamped with the export time.
    pub fn export(&self) -> Snapshot {
        Snapshot {
            export_date: Some(Utc::now()),
            ..self.snapshot()
        }
    }

    pub fn export_json(&self) -> Result<String> {
        let json = self.export().to_json_pretty()?;
        info!(bytes = json.len(), "store exported");
        Ok(json)
    }

    /// Replace all four collections with the document's contents.
    ///
    /// The timer start is replaced only when the document carries one.
    pub fn import(&mut self, snapshot: Snapshot) -> Result<()> {
        let mut next = Collections {
            challenges: snapshot.challenges,
            payouts: snapshot.payouts,
            balance_history: snapshot.balance_history,
            r_entries: snapshot.r_entries,
        };
        next.normalize();
        next.ensure_finite()?;

        Self::persist(self.storage.as_mut(), &next, snapshot.timer_start_date)?;
        if let Some(ts) = snapshot.timer_start_date {
            self.timer_start = Some(ts);
        }
        self.data = next;

        info!(
            challenges = self.data.challenges.len(),
            payouts = self.data.payouts.len(),
            r_entries = self.data.r_entries.len(),
            "store replaced from document"
        );
        self.refresh(Change::Replaced);
        Ok(())
    }

    /// Validate and import a JSON document. Invalid documents change nothing.
    pub fn import_json(&mut self, json: &str) -> Result<()> {
        let snapshot = Snapshot::from_json(json)?;
        self.import(snapshot)
    }

    // --- Sync Identity ---

    pub fn sync_token(&self) -> Result<Option<String>> {
        self.storage.get(SYNC_TOKEN_KEY)
    }

    pub fn set_sync_token(&mut self, token: &str) -> Result<()> {
        self.storage.set(SYNC_TOKEN_KEY, token)
    }

    pub fn clear_sync_token(&mut self) -> Result<()> {
        self.storage.remove(SYNC_TOKEN_KEY)
    }

    /// Id of the remote backup document, once known.
    pub fn remote_id(&self) -> Result<Option<String>> {
        self.storage.get(REMOTE_ID_KEY)
    }

    pub fn set_remote_id(&mut self, id: &str) -> Result<()> {
        self.storage.set(REMOTE_ID_KEY, id)
    }

    pub fn clear_remote_id(&mut self) -> Result<()> {
        self.storage.remove(REMOTE_ID_KEY)
    }

    // --- Subscriptions ---

    /// Subscribe to changes. The first event carries the current metrics.
    pub fn subscribe(&self, config: SubscriptionConfig) -> SubscriptionHandle {
        self.subscriptions.subscribe(config, &self.metrics)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.subscriptions.unsubscribe(id);
    }

    // --- Internal ---

    /// Millisecond timestamp id, bumped past anything already issued or stored.
    fn next_id(&mut self) -> RecordId {
        let mut millis = Utc::now().timestamp_millis().max(self.last_issued_id + 1);
        while self.data.id_in_use(&RecordId::from_millis(millis)) {
            millis += 1;
        }
        self.last_issued_id = millis;
        RecordId::from_millis(millis)
    }

    /// Persist `next` in full, then make it the committed state.
    fn commit(&mut self, next: Collections, change: Change) -> Result<()> {
        Self::persist(self.storage.as_mut(), &next, None)?;
        self.data = next;
        debug!(?change, "committed");
        self.refresh(change);
        Ok(())
    }

    /// Write all four collections, plus the timer start when given, as
    /// one batch.
    fn persist(
        storage: &mut dyn KeyValueStorage,
        data: &Collections,
        timer_start: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let mut entries = vec![
            (CHALLENGES_KEY, serde_json::to_string(&data.challenges)?),
            (PAYOUTS_KEY, serde_json::to_string(&data.payouts)?),
            (BALANCE_HISTORY_KEY, serde_json::to_string(&data.balance_history)?),
            (R_ENTRIES_KEY, serde_json::to_string(&data.r_entries)?),
        ];
        if let Some(ts) = timer_start {
            entries.push((TIMER_START_KEY, ts.to_rfc3339()));
        }
        storage.set_many(&entries)
    }

    /// Recompute metrics and notify subscribers.
    fn refresh(&mut self, change: Change) {
        self.metrics = DashboardMetrics::compute(
            &self.data.challenges,
            &self.data.payouts,
            &self.data.r_entries,
            &self.config,
        );
        self.subscriptions.broadcast_change(&change, &self.metrics);
    }
}

/// JSON has no NaN or infinity, so such values could not be loaded again.
fn ensure_finite(field: &'static str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(StoreError::InvalidValue { field, value })
    }
}

impl ChallengeInput {
    fn validate(&self) -> Result<()> {
        ensure_finite("initialBalance", self.initial_balance)?;
        ensure_finite("currentBalance", self.current_balance)?;
        if let Some(target) = self.scaling_target {
            ensure_finite("scalingTarget", target)?;
        }
        Ok(())
    }
}

fn load_json<T: DeserializeOwned>(storage: &dyn KeyValueStorage, key: &str) -> Result<Option<T>> {
    match storage.get(key)? {
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| StoreError::Deserialization {
                key: key.to_string(),
                message: e.to_string(),
            }),
        None => Ok(None),
    }
}

fn parse_timestamp(key: &str, raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| StoreError::Deserialization {
            key: key.to_string(),
            message: e.to_string(),
        })
}
