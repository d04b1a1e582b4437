#![forbid(unsafe_code)]

//! Allot public facade crate.
//!
//! Re-exports the types a host needs to run the budget allocation exercise
//! and unifies the per-crate errors into one [`Error`].

use std::fmt;

// --- Core re-exports -------------------------------------------------------

pub use allot_core::config::{ConfigError, GameConfig};
pub use allot_core::event::Intent;
pub use allot_core::geometry::{Bounds, Point, Size};
pub use allot_core::money::{Amount, Denomination, format_amount};

// --- Layout re-exports -----------------------------------------------------

pub use allot_layout::{ArcError, ArcLayout, ArcRequest, compute_arc_points};

// --- Runtime re-exports ----------------------------------------------------

#[cfg(feature = "state-persistence")]
pub use allot_runtime::FileStorage;
pub use allot_runtime::{
    AllocationError, AllocationState, MemoryStorage, Mode, Notice, Scene, SceneError,
    SceneOutcome, SessionError, SessionRecord, SessionStore, StorageBackend, StorageError, Widget,
};

// --- Errors ---------------------------------------------------------------

/// Top-level error type for Allot hosts.
#[derive(Debug)]
pub enum Error {
    /// I/O failure outside the storage layer (exports, terminal).
    Io(std::io::Error),
    /// Invalid deployment configuration.
    Config(ConfigError),
    /// Arc layout rejected its input.
    Layout(ArcError),
    /// Ledger rejected an operation.
    Allocation(AllocationError),
    /// Session operation failed.
    Session(SessionError),
    /// Storage backend failure.
    Storage(StorageError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "{err}"),
            Self::Config(err) => write!(f, "{err}"),
            Self::Layout(err) => write!(f, "{err}"),
            Self::Allocation(err) => write!(f, "{err}"),
            Self::Session(err) => write!(f, "{err}"),
            Self::Storage(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Config(err) => Some(err),
            Self::Layout(err) => Some(err),
            Self::Allocation(err) => Some(err),
            Self::Session(err) => Some(err),
            Self::Storage(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

impl From<ArcError> for Error {
    fn from(err: ArcError) -> Self {
        Self::Layout(err)
    }
}

impl From<AllocationError> for Error {
    fn from(err: AllocationError) -> Self {
        Self::Allocation(err)
    }
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        Self::Storage(err)
    }
}

impl From<SessionError> for Error {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Config(e) => Self::Config(e),
            SessionError::Allocation(e) => Self::Allocation(e),
            SessionError::Storage(e) => Self::Storage(e),
            other => Self::Session(other),
        }
    }
}

impl From<SceneError> for Error {
    fn from(err: SceneError) -> Self {
        match err {
            SceneError::Session(e) => e.into(),
            SceneError::Layout(e) => Self::Layout(e),
        }
    }
}

/// Standard result type for Allot APIs.
pub type Result<T> = std::result::Result<T, Error>;

// --- Prelude --------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        Amount, Error, GameConfig, Intent, MemoryStorage, Mode, Point, Result, Scene,
        SceneOutcome, SessionStore, Size, StorageBackend,
    };

    pub use crate::{core, layout, runtime};
}

pub use allot_core as core;
pub use allot_layout as layout;
pub use allot_runtime as runtime;
