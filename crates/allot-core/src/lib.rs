#![forbid(unsafe_code)]

//! Core: geometry, intents, money, and deployment configuration.

pub mod config;
pub mod event;
pub mod geometry;
pub mod money;

pub use config::{ConfigError, GameConfig};
pub use event::Intent;
pub use geometry::{Bounds, Point, Size};
pub use money::{Amount, Denomination, format_amount};
