//! Session Persistence E2E Tests
//!
//! End-to-end validation of the session lifecycle across simulated restarts.
//!
//! # Running Tests
//!
//! ```sh
//! cargo test -p allot-runtime --test session_e2e
//! cargo test -p allot-runtime --test session_e2e --features state-persistence
//! ```
//!
//! # Invariants
//!
//! 1. **Round-trip integrity**: budget, allocations, version, and history survive a restart
//! 2. **Mode isolation**: single-user and multi-user state never share a key
//! 3. **Graceful degradation**: corrupt data falls back to a fresh ledger
//! 4. **Debounced writes**: a burst of mutations produces one write
//! 5. **Budget invariant**: `sum(allocations) <= budget` after every operation

#![cfg(test)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use allot_core::config::GameConfig;
use allot_runtime::session::{MULTI_USER_KEY, SINGLE_USER_KEY};
use allot_runtime::{
    MemoryStorage, Mode, Notice, PersistedState, SessionError, SessionStore, StorageBackend,
    StorageError, StorageResult, history_to_csv,
};
use proptest::prelude::*;

// ============================================================================
// Test Utilities
// ============================================================================

fn log_jsonl(event: &str, case: &str, passed: bool, details: &str) {
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    eprintln!(
        r#"{{"event":"{event}","case":"{case}","passed":{passed},"details":"{details}","timestamp":{timestamp}}}"#
    );
}

const QUIET: Duration = Duration::from_secs(30);

fn config() -> GameConfig {
    GameConfig::default().with_debounce(QUIET)
}

fn open(mode: Mode, storage: &Arc<MemoryStorage>) -> SessionStore {
    SessionStore::open(&config(), mode, Arc::clone(storage)).expect("open store")
}

// ============================================================================
// 1. Restart Cycle
// ============================================================================

#[test]
fn single_user_restart_restores_allocations() {
    let storage = Arc::new(MemoryStorage::new());
    {
        let mut store = open(Mode::SingleUser, &storage);
        store.set_bucket(0, 8_000_000).unwrap();
        store.set_bucket(4, 1_500_000).unwrap();
        assert!(store.flush().unwrap());
    }

    let restored = open(Mode::SingleUser, &storage);
    assert_eq!(
        restored.allocation().allocations(),
        &[8_000_000, 0, 0, 0, 1_500_000]
    );
    assert_eq!(restored.allocation().schema_version(), "0");
    assert_eq!(restored.remaining_cash(), 22_500_000);

    log_jsonl("restart", "single_user", true, "allocations restored");
}

#[test]
fn multi_user_restart_restores_history() {
    let storage = Arc::new(MemoryStorage::new());
    {
        let mut store = open(Mode::MultiUser, &storage);
        store.set_bucket(1, 32_000_000).unwrap();
        store
            .attach_metadata(Some("Richmond".into()), Some("94801".into()))
            .unwrap();
        store.submit().unwrap();
        store.set_bucket(2, 4_000_000).unwrap();
        store.submit().unwrap();
        store.set_bucket(3, 100_000).unwrap();
        store.flush().unwrap();
    }

    let restored = open(Mode::MultiUser, &storage);
    let history = restored.all_history_records();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].amounts(), &[0, 32_000_000, 0, 0, 0]);
    assert_eq!(history[0].metadata().region.as_deref(), Some("Richmond"));
    assert_eq!(history[1].amounts(), &[0, 0, 4_000_000, 0, 0]);
    assert!(history[1].metadata().is_empty());
    assert_eq!(restored.allocation().allocations()[3], 100_000);

    let csv = history_to_csv(history, &config().bucket_labels);
    assert_eq!(csv.lines().count(), 3);

    log_jsonl("restart", "multi_user", true, "history restored");
}

#[test]
fn persisted_document_shape() {
    let storage = Arc::new(MemoryStorage::new());
    let mut store = open(Mode::MultiUser, &storage);
    store.set_bucket(0, 1_000_000).unwrap();
    store.submit().unwrap();
    store.persist().unwrap();

    let raw = storage.get(MULTI_USER_KEY).unwrap().expect("written");
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(value["budget"], 32_000_000);
    assert_eq!(value["version"], "0");
    assert_eq!(value["bucketAlloc"], serde_json::json!([0, 0, 0, 0, 0]));
    assert_eq!(
        value["userHistory"],
        serde_json::json!([[1_000_000, 0, 0, 0, 0]])
    );

    let parsed = PersistedState::from_json(&raw).unwrap();
    assert_eq!(parsed, store.snapshot());
}

// ============================================================================
// 2. Mode Isolation
// ============================================================================

#[test]
fn modes_use_separate_keys() {
    let storage = Arc::new(MemoryStorage::new());
    {
        let mut single = open(Mode::SingleUser, &storage);
        single.set_bucket(0, 5_000_000).unwrap();
        single.flush().unwrap();
    }
    let multi = open(Mode::MultiUser, &storage);
    assert_eq!(multi.remaining_cash(), 32_000_000);
    assert!(storage.get(SINGLE_USER_KEY).unwrap().is_some());
    assert!(storage.get(MULTI_USER_KEY).unwrap().is_none());
}

#[test]
fn single_user_submit_leaves_storage_untouched() {
    let storage = Arc::new(MemoryStorage::new());
    let mut store = open(Mode::SingleUser, &storage);
    store.set_bucket(2, 2_000_000).unwrap();
    store.flush().unwrap();
    let before = storage.get(SINGLE_USER_KEY).unwrap();

    assert!(matches!(
        store.submit(),
        Err(SessionError::InvalidModeOperation { .. })
    ));
    assert!(!store.has_pending_persist());
    assert_eq!(storage.get(SINGLE_USER_KEY).unwrap(), before);
}

// ============================================================================
// 3. Graceful Degradation
// ============================================================================

#[test]
fn truncated_document_recovers() {
    let storage = Arc::new(MemoryStorage::with_entries([(
        SINGLE_USER_KEY,
        r#"{"budget":32000000,"bucketAl"#,
    )]));
    let mut store = open(Mode::SingleUser, &storage);
    assert_eq!(store.remaining_cash(), 32_000_000);
    assert!(matches!(
        store.take_notices().as_slice(),
        [Notice::StateDiscarded { .. }]
    ));

    // The next write replaces the garbage.
    store.set_bucket(0, 1).unwrap();
    store.flush().unwrap();
    let raw = storage.get(SINGLE_USER_KEY).unwrap().unwrap();
    assert!(PersistedState::from_json(&raw).is_ok());

    log_jsonl("degrade", "truncated", true, "fresh ledger");
}

#[test]
fn budget_increase_scales_up() {
    let storage = Arc::new(MemoryStorage::with_entries([(
        SINGLE_USER_KEY,
        r#"{"budget":16000000,"bucketAlloc":[4000000,333333,0,0,0],"version":"0"}"#,
    )]));
    let mut store = open(Mode::SingleUser, &storage);
    assert_eq!(
        store.allocation().allocations(),
        &[8_000_000, 666_666, 0, 0, 0]
    );
    assert_eq!(
        store.take_notices(),
        vec![Notice::BudgetUpdated {
            previous_budget: 16_000_000,
            total_budget: 32_000_000
        }]
    );

    // The migrated ledger is saved under the new budget.
    assert!(store.flush().unwrap());
    let saved = PersistedState::from_json(&storage.get(SINGLE_USER_KEY).unwrap().unwrap()).unwrap();
    assert_eq!(saved.budget, 32_000_000);
}

// ============================================================================
// 4. Debounced Writes
// ============================================================================

#[test]
fn burst_of_mutations_writes_once() {
    let storage = Arc::new(MemoryStorage::new());
    let mut store = open(Mode::SingleUser, &storage);

    for i in 0..20 {
        store.add_to_bucket(i % 5, 100_000).unwrap();
    }
    let start = Instant::now();
    assert!(!store.tick_at(start).unwrap());
    assert_eq!(storage.write_count(), 0);

    assert!(store.tick_at(start + QUIET + Duration::from_secs(1)).unwrap());
    assert_eq!(storage.write_count(), 1);

    assert!(!store.tick_at(start + QUIET * 3).unwrap());
    assert_eq!(storage.write_count(), 1);

    let saved = PersistedState::from_json(&storage.get(SINGLE_USER_KEY).unwrap().unwrap()).unwrap();
    assert_eq!(saved.bucket_alloc, vec![400_000; 5]);
}

#[test]
fn flush_without_changes_is_noop() {
    let storage = Arc::new(MemoryStorage::new());
    let mut store = open(Mode::MultiUser, &storage);
    assert!(!store.flush().unwrap());
    assert_eq!(storage.write_count(), 0);
}

/// Delegates to memory storage but rejects the first `fail_writes` writes.
struct FlakyStorage {
    inner: MemoryStorage,
    fail_writes: AtomicU32,
}

impl FlakyStorage {
    fn new(fail_writes: u32) -> Self {
        Self {
            inner: MemoryStorage::new(),
            fail_writes: AtomicU32::new(fail_writes),
        }
    }
}

impl StorageBackend for FlakyStorage {
    fn name(&self) -> &str {
        "flaky"
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let left = self.fail_writes.load(Ordering::SeqCst);
        if left > 0 {
            self.fail_writes.store(left - 1, Ordering::SeqCst);
            return Err(StorageError::Unavailable("disk full".into()));
        }
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.inner.remove(key)
    }
}

#[test]
fn failed_deferred_write_stays_pending_until_flush() {
    let storage = Arc::new(FlakyStorage::new(1));
    let mut store =
        SessionStore::open(&config(), Mode::MultiUser, Arc::clone(&storage)).expect("open store");

    store.set_bucket(2, 32_000_000).unwrap();
    store.submit().unwrap();

    let later = Instant::now() + QUIET + Duration::from_secs(1);
    let err = store.tick_at(later).unwrap_err();
    assert!(matches!(err, SessionError::Storage(_)));
    assert!(store.has_pending_persist());

    assert!(store.flush().unwrap());
    assert!(!store.has_pending_persist());
    let saved = PersistedState::from_json(&storage.get(MULTI_USER_KEY).unwrap().unwrap()).unwrap();
    assert_eq!(
        saved.user_history.map(|h| h.len()),
        Some(1),
        "submission survives a failed write"
    );

    log_jsonl("debounce", "failed_write_retried", true, "flush retried");
}

#[test]
fn failed_deferred_write_retries_on_next_quiet_period() {
    let storage = Arc::new(FlakyStorage::new(1));
    let mut store =
        SessionStore::open(&config(), Mode::SingleUser, Arc::clone(&storage)).expect("open store");

    store.set_bucket(0, 1_000_000).unwrap();
    let first = Instant::now() + QUIET + Duration::from_secs(1);
    assert!(store.tick_at(first).is_err());
    assert_eq!(store.time_until_persist_at(first), Some(QUIET));

    assert!(!store.tick_at(first + QUIET / 2).unwrap());
    assert!(store.tick_at(first + QUIET).unwrap());
    assert!(storage.get(SINGLE_USER_KEY).unwrap().is_some());
}

// ============================================================================
// 5. Budget Invariant
// ============================================================================

#[derive(Debug, Clone)]
enum Op {
    Set(usize, u64),
    Add(usize, u64),
    Submit,
    Cancel,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0usize..6, 0u64..40_000_000).prop_map(|(i, a)| Op::Set(i, a)),
        (0usize..6, 0u64..12_000_000).prop_map(|(i, a)| Op::Add(i, a)),
        Just(Op::Submit),
        Just(Op::Cancel),
    ]
}

proptest! {
    #[test]
    fn allocations_never_exceed_budget(ops in proptest::collection::vec(op_strategy(), 1..60)) {
        let storage = Arc::new(MemoryStorage::new());
        let mut store = open(Mode::MultiUser, &storage);
        let mut submissions = 0usize;

        for op in ops {
            match op {
                Op::Set(i, a) => { let _ = store.set_bucket(i, a); }
                Op::Add(i, a) => { let _ = store.add_to_bucket(i, a); }
                Op::Submit => {
                    let before = store.allocation().allocations().to_vec();
                    let record = store.submit().unwrap();
                    prop_assert_eq!(record.amounts(), before.as_slice());
                    submissions += 1;
                    prop_assert_eq!(store.remaining_cash(), 32_000_000);
                }
                Op::Cancel => store.cancel_session(),
            }
            let ledger = store.allocation();
            prop_assert!(ledger.allocated() <= ledger.total_budget());
            prop_assert_eq!(ledger.remaining_cash(), ledger.total_budget() - ledger.allocated());
        }
        prop_assert_eq!(store.all_history_records().len(), submissions);
    }
}

// ============================================================================
// 6. File Storage
// ============================================================================

#[cfg(feature = "state-persistence")]
mod file_backed {
    use super::*;
    use allot_runtime::FileStorage;
    use tempfile::TempDir;

    #[test]
    fn restart_through_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("kiosk").join("state.json");
        {
            let mut store =
                SessionStore::open(&config(), Mode::MultiUser, FileStorage::new(&path)).unwrap();
            store.set_bucket(0, 3_000_000).unwrap();
            store.submit().unwrap();
            store.flush().unwrap();
        }

        let store =
            SessionStore::open(&config(), Mode::MultiUser, FileStorage::new(&path)).unwrap();
        assert_eq!(store.all_history_records().len(), 1);
        assert_eq!(store.backend_name(), "FileStorage");

        log_jsonl("restart", "file_storage", true, "history restored from disk");
    }

    #[test]
    fn garbage_file_recovers() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("state.json");
        std::fs::write(&path, "{{{{").unwrap();

        let mut store =
            SessionStore::open(&config(), Mode::SingleUser, FileStorage::new(&path)).unwrap();
        assert_eq!(store.remaining_cash(), 32_000_000);
        store.set_bucket(1, 1_000_000).unwrap();
        assert!(store.flush().unwrap());
    }
}
