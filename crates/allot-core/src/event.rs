#![forbid(unsafe_code)]

//! Canonical user intents.
//!
//! The presentation layer translates raw input (pointer drags, button taps,
//! window resizes) into these intents and hands them to the scene. All
//! intents derive `Clone` and `PartialEq` for use in tests and scripted
//! replays.

use crate::geometry::Point;
use crate::money::Amount;

/// A discrete user intent.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    /// A bill was released at a scene position; the scene hit-tests buckets.
    DropCash {
        /// Value of the dropped bill.
        denomination: Amount,
        /// Release position in scene coordinates.
        at: Point,
    },

    /// A bill was dropped directly onto a known bucket.
    DropCashOnBucket {
        /// Value of the dropped bill.
        denomination: Amount,
        /// Target bucket index.
        bucket: usize,
    },

    /// A bucket slider was moved to `fraction` of its track.
    Slide {
        /// Bucket index.
        bucket: usize,
        /// Handle position along the track, `0.0..=1.0`.
        fraction: f64,
    },

    /// Submit the current allocation (multi-user mode).
    SubmitSession,

    /// Discard the current allocation without recording it.
    CancelSession,

    /// Drop every recorded submission.
    ClearHistory,

    /// Attach submitter details to the in-progress session.
    AttachMetadata {
        /// Free-text city or region.
        region: Option<String>,
        /// Postal code.
        postal_code: Option<String>,
    },

    /// Capture the current scene (single-user mode).
    Screenshot,

    /// The viewport changed size.
    Resize {
        /// New viewport width.
        width: f64,
        /// New viewport height.
        height: f64,
    },
}

impl Intent {
    /// Stable name used in logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::DropCash { .. } => "drop_cash",
            Self::DropCashOnBucket { .. } => "drop_cash_on_bucket",
            Self::Slide { .. } => "slide",
            Self::SubmitSession => "submit_session",
            Self::CancelSession => "cancel_session",
            Self::ClearHistory => "clear_history",
            Self::AttachMetadata { .. } => "attach_metadata",
            Self::Screenshot => "screenshot",
            Self::Resize { .. } => "resize",
        }
    }

    /// Whether handling this intent can change the allocation ledger.
    #[must_use]
    pub const fn mutates_allocation(&self) -> bool {
        matches!(
            self,
            Self::DropCash { .. }
                | Self::DropCashOnBucket { .. }
                | Self::Slide { .. }
                | Self::SubmitSession
                | Self::CancelSession
        )
    }
}
