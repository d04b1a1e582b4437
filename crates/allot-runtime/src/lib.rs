#![forbid(unsafe_code)]

//! Allot Runtime
//!
//! Stateful half of Allot: the allocation ledger, the session store with
//! its persistence backends, history export, and the headless scene that
//! turns user intents into ledger changes.
//!
//! # Key Components
//!
//! - [`AllocationState`] - Budget plus per-bucket amounts, always within budget
//! - [`SessionStore`] - Mode, history, and debounced persistence
//! - [`StorageBackend`] - Key-value seam with [`MemoryStorage`] and (feature-gated) `FileStorage`
//! - [`PersistDebouncer`] - Cancel-and-restart write timer
//! - [`Scene`] - Widget placement and intent dispatch
//!
//! # How it fits in the system
//! `allot-core` supplies geometry, intents, and configuration;
//! `allot-layout` places buckets on the arc. A host (the kiosk binary, or a
//! graphical front end) owns one `SessionStore` and one `Scene`, feeds
//! intents to [`Scene::handle`], and polls [`SessionStore::tick`] from its
//! event loop.

pub mod allocation;
pub mod debounce;
pub mod export;
pub mod scene;
pub mod session;
pub mod state_persistence;

pub use allocation::{AllocationError, AllocationState, MigrationOutcome, SLIDER_STEP, slider_amount};
pub use debounce::{DebounceAction, DebounceConfig, DebounceStats, PersistDebouncer};
pub use export::{history_to_csv, history_to_json, screenshot_filename, timestamped_filename};
pub use scene::{
    CashStackState, EndgameKind, Placement, Scene, SceneError, SceneOutcome, Widget, WidgetId,
};
pub use session::{
    MULTI_USER_KEY, Mode, Notice, PersistedState, SINGLE_USER_KEY, SessionError, SessionRecord,
    SessionStore, SubmitterMetadata,
};
#[cfg(feature = "state-persistence")]
pub use state_persistence::FileStorage;
pub use state_persistence::{MemoryStorage, StorageBackend, StorageError, StorageResult};
