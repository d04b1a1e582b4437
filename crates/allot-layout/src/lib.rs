#![forbid(unsafe_code)]

//! Layout for Allot scenes.
//!
//! - [`ArcRequest`] / [`ArcLayout`] - equal-chord placement on an elliptical arc
//! - [`compute_arc_points`] - positional shorthand returning only the points
//!
//! ```
//! use allot_layout::{ArcRequest, Size};
//!
//! let layout = ArcRequest::for_viewport(Size::new(1280.0, 720.0), 5)
//!     .solve()
//!     .expect("valid request");
//! assert_eq!(layout.points.len(), 5);
//! assert!(layout.converged);
//! ```

pub mod arc;

pub use allot_core::geometry::{Point, Size};
pub use arc::{ArcError, ArcLayout, ArcRequest, MAX_NUDGE, compute_arc_points};
