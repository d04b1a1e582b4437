#![forbid(unsafe_code)]

//! Session lifecycle and persistence.
//!
//! [`SessionStore`] owns the allocation ledger, the submission history (in
//! multi-user mode), and the storage backend. It is constructed once at
//! startup with [`SessionStore::open`] and handed to the scene by `&mut`.
//!
//! # Persistence
//!
//! State is written as one JSON document under a mode-specific key:
//!
//! ```json
//! {
//!   "budget": 32000000,
//!   "bucketAlloc": [8000000, 0, 0, 0, 0],
//!   "version": "0",
//!   "userHistory": [[1000000, 0, 0, 0, 0], {"bucketAmounts": [0, 0, 0, 0, 0], "postalCode": "94110"}]
//! }
//! ```
//!
//! `userHistory` is present only in multi-user mode. Records without
//! submitter details are written as plain arrays.
//!
//! Every mutation schedules a debounced write. The host polls
//! [`SessionStore::tick_at`] and calls [`SessionStore::flush`] on shutdown.
//!
//! # Failure Modes
//!
//! | Condition | Behavior |
//! |-----------|----------|
//! | Nothing stored | Fresh ledger |
//! | Unreadable or malformed document | Fresh ledger, `warn` log, [`Notice::StateDiscarded`] |
//! | Stored budget differs | Allocations rescaled, [`Notice::BudgetUpdated`] |
//! | Backend write fails | `SessionError::Storage`, in-memory state kept |

use std::fmt;
use std::time::{Duration, Instant};

use allot_core::config::{ConfigError, GameConfig};
use allot_core::money::Amount;
use serde::{Deserialize, Serialize};

use crate::allocation::{AllocationError, AllocationState, MigrationOutcome};
use crate::debounce::{DebounceConfig, PersistDebouncer};
use crate::state_persistence::{StorageBackend, StorageError};

/// Storage key used in single-user mode.
pub const SINGLE_USER_KEY: &str = "game-bucket-state";
/// Storage key used in multi-user mode.
pub const MULTI_USER_KEY: &str = "game-bucket-multiuser-state";

// ─────────────────────────────────────────────────────────────────────────────
// Mode
// ─────────────────────────────────────────────────────────────────────────────

/// Deployment mode, fixed for the lifetime of a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Mode {
    /// One participant; the endgame action is a screenshot.
    #[default]
    SingleUser,
    /// Shared kiosk; each participant submits and the ledger resets.
    MultiUser,
}

impl Mode {
    /// Key under which this mode's state is stored.
    #[must_use]
    pub const fn storage_key(self) -> &'static str {
        match self {
            Self::SingleUser => SINGLE_USER_KEY,
            Self::MultiUser => MULTI_USER_KEY,
        }
    }

    /// Whether submissions are recorded.
    #[must_use]
    pub const fn is_multi_user(self) -> bool {
        matches!(self, Self::MultiUser)
    }

    /// Stable name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SingleUser => "single-user",
            Self::MultiUser => "multi-user",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Records
// ─────────────────────────────────────────────────────────────────────────────

/// Optional details a participant may attach to a submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmitterMetadata {
    /// Free-text city or region.
    pub region: Option<String>,
    /// Postal code.
    pub postal_code: Option<String>,
}

impl SubmitterMetadata {
    /// Build metadata, treating blank strings as absent.
    #[must_use]
    pub fn new(region: Option<String>, postal_code: Option<String>) -> Self {
        Self {
            region: non_blank(region),
            postal_code: non_blank(postal_code),
        }
    }

    /// Whether neither field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.region.is_none() && self.postal_code.is_none()
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// One finalized allocation snapshot. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StoredRecord", into = "StoredRecord")]
pub struct SessionRecord {
    amounts: Vec<Amount>,
    metadata: SubmitterMetadata,
}

impl SessionRecord {
    /// Create a record.
    #[must_use]
    pub fn new(amounts: Vec<Amount>, metadata: SubmitterMetadata) -> Self {
        Self { amounts, metadata }
    }

    /// Bucket amounts at submission.
    #[must_use]
    pub fn amounts(&self) -> &[Amount] {
        &self.amounts
    }

    /// Submitter details.
    #[must_use]
    pub fn metadata(&self) -> &SubmitterMetadata {
        &self.metadata
    }

    /// Sum of the recorded amounts.
    #[must_use]
    pub fn total(&self) -> Amount {
        self.amounts
            .iter()
            .fold(0, |acc: Amount, &a| acc.saturating_add(a))
    }
}

/// Wire form of a record: a bare array, or an object when metadata exists.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum StoredRecord {
    Plain(Vec<Amount>),
    Annotated {
        #[serde(rename = "bucketAmounts")]
        bucket_amounts: Vec<Amount>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        region: Option<String>,
        #[serde(
            rename = "postalCode",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        postal_code: Option<String>,
    },
}

impl From<StoredRecord> for SessionRecord {
    fn from(stored: StoredRecord) -> Self {
        match stored {
            StoredRecord::Plain(amounts) => Self::new(amounts, SubmitterMetadata::default()),
            StoredRecord::Annotated {
                bucket_amounts,
                region,
                postal_code,
            } => Self::new(bucket_amounts, SubmitterMetadata::new(region, postal_code)),
        }
    }
}

impl From<SessionRecord> for StoredRecord {
    fn from(record: SessionRecord) -> Self {
        if record.metadata.is_empty() {
            Self::Plain(record.amounts)
        } else {
            Self::Annotated {
                bucket_amounts: record.amounts,
                region: record.metadata.region,
                postal_code: record.metadata.postal_code,
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Persisted document
// ─────────────────────────────────────────────────────────────────────────────

/// The JSON document written to storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    /// Budget the allocations were made against.
    pub budget: Amount,
    /// Per-bucket allocations.
    #[serde(rename = "bucketAlloc")]
    pub bucket_alloc: Vec<Amount>,
    /// Schema version.
    pub version: String,
    /// Submission history, multi-user only.
    #[serde(
        rename = "userHistory",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub user_history: Option<Vec<SessionRecord>>,
}

impl PersistedState {
    /// Serialize to compact JSON.
    pub fn to_json(&self) -> Result<String, StorageError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse from JSON.
    pub fn from_json(json: &str) -> Result<Self, StorageError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reasons this document cannot be restored under `config`.
    fn check(&self, config: &GameConfig) -> Result<(), String> {
        if self.budget == 0 {
            return Err("stored budget is zero".into());
        }
        if self.version != config.schema_version {
            return Err(format!(
                "schema version {:?} does not match {:?}",
                self.version, config.schema_version
            ));
        }
        let buckets = config.bucket_count();
        if self.bucket_alloc.len() != buckets {
            return Err(format!(
                "expected {buckets} buckets, found {}",
                self.bucket_alloc.len()
            ));
        }
        if let Some(history) = &self.user_history
            && let Some(pos) = history.iter().position(|r| r.amounts().len() != buckets)
        {
            return Err(format!("history record {pos} has the wrong bucket count"));
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Notices and errors
// ─────────────────────────────────────────────────────────────────────────────

/// Informational events for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// The configured budget changed since the state was saved; allocations
    /// were rescaled.
    BudgetUpdated {
        /// Budget the stored allocations were made against.
        previous_budget: Amount,
        /// Current budget.
        total_budget: Amount,
    },
    /// Stored state could not be used and was replaced with a fresh ledger.
    StateDiscarded {
        /// Why the stored state was rejected.
        reason: String,
    },
}

impl Notice {
    /// Whether the participant should be told. Discarded state is recovered
    /// silently and only logged.
    #[must_use]
    pub const fn is_user_facing(&self) -> bool {
        matches!(self, Self::BudgetUpdated { .. })
    }

    /// Text suitable for an alert.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::BudgetUpdated { .. } => {
                "The total budget has changed since your last visit. \
                 Your allocations have been adjusted to match."
                    .to_string()
            }
            Self::StateDiscarded { .. } => {
                "Saved progress could not be restored. Starting fresh.".to_string()
            }
        }
    }
}

/// Errors from session operations.
#[derive(Debug)]
pub enum SessionError {
    /// The operation is not available in the current mode.
    InvalidModeOperation {
        /// Operation name.
        operation: &'static str,
        /// Mode the store runs in.
        mode: Mode,
    },
    /// Ledger rejected the operation.
    Allocation(AllocationError),
    /// Configuration is unusable.
    Config(ConfigError),
    /// Backend failure while writing.
    Storage(StorageError),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidModeOperation { operation, mode } => {
                write!(f, "{operation} is not available in {mode} mode")
            }
            Self::Allocation(e) => write!(f, "allocation error: {e}"),
            Self::Config(e) => write!(f, "invalid configuration: {e}"),
            Self::Storage(e) => write!(f, "storage error: {e}"),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidModeOperation { .. } => None,
            Self::Allocation(e) => Some(e),
            Self::Config(e) => Some(e),
            Self::Storage(e) => Some(e),
        }
    }
}

impl From<AllocationError> for SessionError {
    fn from(e: AllocationError) -> Self {
        Self::Allocation(e)
    }
}

impl From<ConfigError> for SessionError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<StorageError> for SessionError {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SessionStore
// ─────────────────────────────────────────────────────────────────────────────

/// Owner of the ledger, history, and persistence for one process.
pub struct SessionStore {
    mode: Mode,
    state: AllocationState,
    history: Vec<SessionRecord>,
    pending_metadata: SubmitterMetadata,
    backend: Box<dyn StorageBackend>,
    debouncer: PersistDebouncer,
    notices: Vec<Notice>,
}

impl SessionStore {
    /// Create the store and restore any state saved under `mode`'s key.
    ///
    /// Fails only when `config` is invalid. Unusable stored state is
    /// discarded with a warning.
    pub fn open(
        config: &GameConfig,
        mode: Mode,
        backend: impl StorageBackend + 'static,
    ) -> Result<Self, SessionError> {
        config.validate()?;

        let mut store = Self {
            mode,
            state: AllocationState::new(
                config.total_budget,
                config.bucket_count(),
                config.schema_version.clone(),
            ),
            history: Vec::new(),
            pending_metadata: SubmitterMetadata::default(),
            backend: Box::new(backend),
            debouncer: PersistDebouncer::new(
                DebounceConfig::default().with_quiet_period(config.debounce),
            ),
            notices: Vec::new(),
        };
        store.hydrate(config);

        tracing::info!(
            mode = %mode,
            backend = store.backend.name(),
            budget = store.state.total_budget(),
            remaining = store.state.remaining_cash(),
            history = store.history.len(),
            "session store opened"
        );
        Ok(store)
    }

    fn hydrate(&mut self, config: &GameConfig) {
        let key = self.mode.storage_key();
        let raw = match self.backend.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return,
            Err(e) => {
                self.discard(key, format!("read failed: {e}"));
                return;
            }
        };

        let stored = match PersistedState::from_json(&raw) {
            Ok(stored) => stored,
            Err(e) => {
                self.discard(key, e.to_string());
                return;
            }
        };
        if let Err(reason) = stored.check(config) {
            self.discard(key, reason);
            return;
        }

        let outcome = self.state.migrate_from(stored.budget, &stored.bucket_alloc);
        if let MigrationOutcome::Rescaled {
            previous_budget, ..
        } = outcome
        {
            tracing::info!(
                previous_budget,
                total_budget = self.state.total_budget(),
                "budget changed since last save, allocations rescaled"
            );
            self.notices.push(Notice::BudgetUpdated {
                previous_budget,
                total_budget: self.state.total_budget(),
            });
            self.debouncer.schedule();
        }

        if self.mode.is_multi_user() {
            self.history = stored.user_history.unwrap_or_default();
        }
    }

    fn discard(&mut self, key: &str, reason: String) {
        tracing::warn!(key, reason = %reason, "discarding stored session state");
        self.notices.push(Notice::StateDiscarded { reason });
    }

    // ── Accessors ────────────────────────────────────────────────────────

    /// Deployment mode.
    #[must_use]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// The allocation ledger.
    #[must_use]
    pub fn allocation(&self) -> &AllocationState {
        &self.state
    }

    /// Budget not yet allocated.
    #[must_use]
    pub fn remaining_cash(&self) -> Amount {
        self.state.remaining_cash()
    }

    /// Recorded submissions in order. Always empty in single-user mode.
    #[must_use]
    pub fn all_history_records(&self) -> &[SessionRecord] {
        &self.history
    }

    /// Metadata waiting for the next submission.
    #[must_use]
    pub fn pending_metadata(&self) -> &SubmitterMetadata {
        &self.pending_metadata
    }

    /// Name of the storage backend.
    #[must_use]
    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Whether a debounced write is outstanding.
    #[must_use]
    pub fn has_pending_persist(&self) -> bool {
        self.debouncer.has_pending()
    }

    /// Drain notices raised since the last call.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// The document [`persist`](Self::persist) would write.
    #[must_use]
    pub fn snapshot(&self) -> PersistedState {
        PersistedState {
            budget: self.state.total_budget(),
            bucket_alloc: self.state.allocations().to_vec(),
            version: self.state.schema_version().to_string(),
            user_history: self.mode.is_multi_user().then(|| self.history.clone()),
        }
    }

    // ── Mutations ────────────────────────────────────────────────────────

    /// Set bucket `index`, clamped to what the budget allows.
    ///
    /// Returns the amount actually stored.
    pub fn set_bucket(&mut self, index: usize, amount: Amount) -> Result<Amount, SessionError> {
        let applied = self.state.set_bucket(index, amount)?;
        self.debouncer.schedule();
        Ok(applied)
    }

    /// Add `delta` to bucket `index`, clamped. Returns the new bucket amount.
    pub fn add_to_bucket(&mut self, index: usize, delta: Amount) -> Result<Amount, SessionError> {
        let applied = self.state.add_to_bucket(index, delta)?;
        self.debouncer.schedule();
        Ok(applied)
    }

    /// Attach submitter details to the in-progress session.
    ///
    /// Replaces any details attached earlier. Multi-user only.
    pub fn attach_metadata(
        &mut self,
        region: Option<String>,
        postal_code: Option<String>,
    ) -> Result<(), SessionError> {
        self.require_multi_user("attach_metadata")?;
        self.pending_metadata = SubmitterMetadata::new(region, postal_code);
        Ok(())
    }

    /// Record the current allocation and start a fresh session.
    ///
    /// Multi-user only; in single-user mode nothing changes.
    pub fn submit(&mut self) -> Result<&SessionRecord, SessionError> {
        self.require_multi_user("submit")?;

        let record = SessionRecord::new(
            self.state.allocations().to_vec(),
            std::mem::take(&mut self.pending_metadata),
        );
        tracing::info!(
            submission = self.history.len() + 1,
            total = record.total(),
            remaining = self.state.remaining_cash(),
            "session submitted"
        );
        self.history.push(record);
        self.state.reset_allocations();
        self.debouncer.schedule();

        let last = self.history.len() - 1;
        Ok(&self.history[last])
    }

    /// Reset the ledger without recording anything.
    pub fn cancel_session(&mut self) {
        self.state.reset_allocations();
        self.pending_metadata = SubmitterMetadata::default();
        self.debouncer.schedule();
        tracing::debug!(mode = %self.mode, "session cancelled");
    }

    /// Drop every recorded submission. Allocations are untouched.
    pub fn clear_history(&mut self) {
        let cleared = self.history.len();
        self.history.clear();
        self.debouncer.schedule();
        tracing::info!(cleared, "history cleared");
    }

    fn require_multi_user(&self, operation: &'static str) -> Result<(), SessionError> {
        if self.mode.is_multi_user() {
            Ok(())
        } else {
            tracing::warn!(operation, mode = %self.mode, "operation rejected");
            Err(SessionError::InvalidModeOperation {
                operation,
                mode: self.mode,
            })
        }
    }

    // ── Persistence ──────────────────────────────────────────────────────

    /// Write the current state immediately.
    pub fn persist(&mut self) -> Result<(), SessionError> {
        let json = self.snapshot().to_json()?;
        self.backend.set(self.mode.storage_key(), &json)?;
        tracing::debug!(
            key = self.mode.storage_key(),
            bytes = json.len(),
            "session state persisted"
        );
        Ok(())
    }

    /// Poll the debouncer at the current time.
    pub fn tick(&mut self) -> Result<bool, SessionError> {
        self.tick_at(Instant::now())
    }

    /// Poll the debouncer at `now`, writing if the quiet period has elapsed.
    ///
    /// Returns whether a write happened.
    ///
    /// A failed write stays pending and is retried by the next tick or
    /// [`flush`](Self::flush).
    pub fn tick_at(&mut self, now: Instant) -> Result<bool, SessionError> {
        if !self.debouncer.tick_at(now).is_flush() {
            return Ok(false);
        }
        self.persist_or_rearm(now)?;
        Ok(true)
    }

    /// Write now if a debounced write is outstanding.
    ///
    /// Returns whether a write happened. A failed write stays pending.
    pub fn flush(&mut self) -> Result<bool, SessionError> {
        if !self.debouncer.take_pending() {
            return Ok(false);
        }
        self.persist_or_rearm(Instant::now())?;
        Ok(true)
    }

    /// Time until a tick at `now` would write, `None` when nothing is pending.
    #[must_use]
    pub fn time_until_persist_at(&self, now: Instant) -> Option<Duration> {
        self.debouncer.time_until_flush_at(now)
    }

    fn persist_or_rearm(&mut self, now: Instant) -> Result<(), SessionError> {
        if let Err(e) = self.persist() {
            tracing::warn!(error = %e, key = self.mode.storage_key(), "save failed, will retry");
            self.debouncer.schedule_at(now);
            return Err(e);
        }
        Ok(())
    }
}

impl fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStore")
            .field("mode", &self.mode)
            .field("state", &self.state)
            .field("history", &self.history.len())
            .field("backend", &self.backend.name())
            .field("pending_persist", &self.debouncer.has_pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_persistence::MemoryStorage;
    use std::sync::Arc;
    use std::time::Duration;

    fn config() -> GameConfig {
        GameConfig::default().with_debounce(Duration::from_secs(60))
    }

    fn open(mode: Mode) -> (SessionStore, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        let store = SessionStore::open(&config(), mode, Arc::clone(&storage)).unwrap();
        (store, storage)
    }

    #[test]
    fn fresh_store_has_full_budget() {
        let (mut store, _) = open(Mode::SingleUser);
        assert_eq!(store.remaining_cash(), 32_000_000);
        assert!(store.all_history_records().is_empty());
        assert!(store.take_notices().is_empty());
        assert!(!store.has_pending_persist());
    }

    #[test]
    fn submit_in_single_user_is_rejected() {
        let (mut store, _) = open(Mode::SingleUser);
        store.set_bucket(0, 5_000_000).unwrap();
        let err = store.submit().unwrap_err();
        assert!(matches!(
            err,
            SessionError::InvalidModeOperation {
                operation: "submit",
                mode: Mode::SingleUser
            }
        ));
        assert_eq!(store.allocation().allocations()[0], 5_000_000);
        assert!(store.all_history_records().is_empty());
    }

    #[test]
    fn submit_records_and_resets() {
        let (mut store, _) = open(Mode::MultiUser);
        store.set_bucket(0, 10_000_000).unwrap();
        store.set_bucket(3, 22_000_000).unwrap();
        let before = store.allocation().allocations().to_vec();

        let record = store.submit().unwrap().clone();
        assert_eq!(record.amounts(), before.as_slice());
        assert_eq!(store.all_history_records().len(), 1);
        assert_eq!(store.remaining_cash(), 32_000_000);
    }

    #[test]
    fn metadata_rides_on_next_submit_only() {
        let (mut store, _) = open(Mode::MultiUser);
        store
            .attach_metadata(Some("Oakland".into()), Some(" 94612 ".into()))
            .unwrap();
        store.submit().unwrap();
        store.submit().unwrap();

        let history = store.all_history_records();
        assert_eq!(history[0].metadata().region.as_deref(), Some("Oakland"));
        assert_eq!(history[0].metadata().postal_code.as_deref(), Some("94612"));
        assert!(history[1].metadata().is_empty());
    }

    #[test]
    fn cancel_drops_metadata_and_allocations() {
        let (mut store, _) = open(Mode::MultiUser);
        store.set_bucket(1, 1_000_000).unwrap();
        store.attach_metadata(Some("x".into()), None).unwrap();
        store.cancel_session();
        assert_eq!(store.remaining_cash(), 32_000_000);
        assert!(store.pending_metadata().is_empty());
        assert!(store.all_history_records().is_empty());
    }

    #[test]
    fn clear_history_keeps_allocations() {
        let (mut store, _) = open(Mode::MultiUser);
        store.submit().unwrap();
        store.set_bucket(2, 3_000_000).unwrap();
        store.clear_history();
        assert!(store.all_history_records().is_empty());
        assert_eq!(store.allocation().allocations()[2], 3_000_000);
    }

    #[test]
    fn persist_writes_mode_key() {
        let (mut store, storage) = open(Mode::SingleUser);
        store.set_bucket(0, 8_000_000).unwrap();
        store.persist().unwrap();
        let raw = storage.get(SINGLE_USER_KEY).unwrap().unwrap();
        assert_eq!(
            raw,
            r#"{"budget":32000000,"bucketAlloc":[8000000,0,0,0,0],"version":"0"}"#
        );
        assert_eq!(storage.get(MULTI_USER_KEY).unwrap(), None);
    }

    #[test]
    fn record_wire_forms() {
        let plain = SessionRecord::new(vec![1, 2], SubmitterMetadata::default());
        assert_eq!(serde_json::to_string(&plain).unwrap(), "[1,2]");

        let tagged = SessionRecord::new(
            vec![3, 4],
            SubmitterMetadata::new(None, Some("10001".into())),
        );
        assert_eq!(
            serde_json::to_string(&tagged).unwrap(),
            r#"{"bucketAmounts":[3,4],"postalCode":"10001"}"#
        );

        let parsed: SessionRecord =
            serde_json::from_str(r#"{"bucketAmounts":[3,4],"postalCode":"10001"}"#).unwrap();
        assert_eq!(parsed, tagged);
    }

    #[test]
    fn budget_change_rescales_and_notifies() {
        let storage = Arc::new(MemoryStorage::with_entries([(
            SINGLE_USER_KEY,
            r#"{"budget":32000000,"bucketAlloc":[8000000,0,0,0,0],"version":"0"}"#,
        )]));
        let cfg = config().with_budget(16_000_000);
        let mut store = SessionStore::open(&cfg, Mode::SingleUser, storage).unwrap();
        assert_eq!(store.allocation().allocations(), &[4_000_000, 0, 0, 0, 0]);
        assert_eq!(
            store.take_notices(),
            vec![Notice::BudgetUpdated {
                previous_budget: 32_000_000,
                total_budget: 16_000_000
            }]
        );
        assert!(store.has_pending_persist());
    }

    #[test]
    fn corrupt_state_falls_back_to_defaults() {
        for raw in [
            "not json",
            r#"{"budget":32000000}"#,
            r#"{"budget":0,"bucketAlloc":[0,0,0,0,0],"version":"0"}"#,
            r#"{"budget":32000000,"bucketAlloc":[1,2,3],"version":"0"}"#,
            r#"{"budget":32000000,"bucketAlloc":[0,0,0,0,0],"version":"1"}"#,
        ] {
            let storage = MemoryStorage::with_entries([(SINGLE_USER_KEY, raw)]);
            let mut store = SessionStore::open(&config(), Mode::SingleUser, storage).unwrap();
            assert_eq!(store.remaining_cash(), 32_000_000, "input: {raw}");
            assert!(
                matches!(
                    store.take_notices().as_slice(),
                    [Notice::StateDiscarded { .. }]
                ),
                "input: {raw}"
            );
        }
    }

    #[test]
    fn single_user_ignores_stored_history() {
        let storage = MemoryStorage::with_entries([(
            SINGLE_USER_KEY,
            r#"{"budget":32000000,"bucketAlloc":[0,0,0,0,0],"version":"0","userHistory":[[1,0,0,0,0]]}"#,
        )]);
        let store = SessionStore::open(&config(), Mode::SingleUser, storage).unwrap();
        assert!(store.all_history_records().is_empty());
        assert_eq!(store.snapshot().user_history, None);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let err = SessionStore::open(
            &GameConfig::default().with_budget(0),
            Mode::SingleUser,
            MemoryStorage::new(),
        )
        .unwrap_err();
        assert!(matches!(err, SessionError::Config(ConfigError::ZeroBudget)));
    }

    #[test]
    fn flush_writes_only_when_pending() {
        let (mut store, storage) = open(Mode::SingleUser);
        assert!(!store.flush().unwrap());
        store.set_bucket(0, 1).unwrap();
        assert!(store.flush().unwrap());
        assert!(!store.flush().unwrap());
        assert_eq!(storage.write_count(), 1);
    }

    #[test]
    fn error_display() {
        let err = SessionError::InvalidModeOperation {
            operation: "submit",
            mode: Mode::SingleUser,
        };
        assert_eq!(err.to_string(), "submit is not available in single-user mode");
    }
}
