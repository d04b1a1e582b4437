#![forbid(unsafe_code)]

//! Allot kiosk host.
//!
//! Wires the CLI, logging, and a line-driven command loop around one
//! [`allot::SessionStore`] and one [`allot::Scene`].

pub mod app;
pub mod cli;
pub mod logging;

use allot::runtime::state_persistence::FileStorage;
use allot::{GameConfig, MemoryStorage, StorageBackend};

use cli::{Opts, StorageChoice};

/// Deployment configuration after applying CLI overrides.
#[must_use]
pub fn config_from(opts: &Opts) -> GameConfig {
    let mut config = GameConfig::default();
    if let Some(budget) = opts.budget {
        config = config.with_budget(budget);
    }
    if let Some(debounce) = opts.debounce {
        config = config.with_debounce(debounce);
    }
    config
}

/// Storage backend selected by `opts`.
#[must_use]
pub fn storage_from(opts: &Opts) -> Box<dyn StorageBackend> {
    match &opts.storage {
        StorageChoice::Default => Box::new(FileStorage::default_for_app("kiosk")),
        StorageChoice::File(path) => Box::new(FileStorage::new(path)),
        StorageChoice::Memory => Box::new(MemoryStorage::new()),
    }
}

/// Build the app described by `opts`.
pub fn build(opts: &Opts) -> allot::Result<app::KioskApp> {
    let storage = storage_from(opts);
    if !storage.is_available() {
        tracing::warn!(backend = storage.name(), "storage not writable, state may not be saved");
    }
    app::KioskApp::new(
        config_from(opts),
        opts.mode,
        opts.viewport,
        storage,
        opts.export_dir.clone(),
    )
}
