#![forbid(unsafe_code)]

//! Headless scene model.
//!
//! The scene owns the placement and display state of every on-screen
//! element but no pixels. A renderer reads [`Scene::widgets`] after each
//! call to [`Scene::handle`] and draws whatever it likes.
//!
//! # Layout
//!
//! ```text
//!        ┌───────────────────────────────────────────────┐
//!        │ [cancel]                                      │
//!        │   $10M       $5M        $1M        $100K      │  cash stacks, y = 0.3·H
//!        │                  [endgame]                    │  (W/2, H/3)
//!        │                 $32,000,000                   │  remainder (W/2, H/2)
//!        │ (b0)                                    (b4)  │
//!        │      (b1)                          (b3)       │  buckets on an equal-chord
//!        │                    (b2)                       │  arc below the center
//!        └───────────────────────────────────────────────┘
//! ```
//!
//! Buckets sit on the lower half of an ellipse centered at `(W/2, H/3)`,
//! spaced by the arc solver so neighbouring buckets are equidistant.

use std::fmt;

use allot_core::config::GameConfig;
use allot_core::event::Intent;
use allot_core::geometry::{Bounds, Point, Size};
use allot_core::money::{Amount, Denomination, format_amount};
use allot_layout::{ArcError, ArcRequest};

use crate::allocation::{AllocationState, slider_amount};
use crate::export::screenshot_filename;
use crate::session::{Mode, SessionError, SessionStore};

/// Remainder text once the whole budget is placed.
pub const ALL_CASH_ALLOCATED: &str = "All cash allocated!";

/// Unscaled bucket footprint used for drop hit-testing.
pub const BUCKET_BASE_SIZE: Size = Size::new(180.0, 180.0);
/// Unscaled cash stack footprint.
pub const CASH_BASE_SIZE: Size = Size::new(160.0, 80.0);
/// Unscaled endgame button footprint.
pub const BUTTON_BASE_SIZE: Size = Size::new(100.0, 120.0);

const CANCEL_BUTTON_POSITION: Point = Point::new(280.0, 20.0);

// ─────────────────────────────────────────────────────────────────────────────
// Widgets
// ─────────────────────────────────────────────────────────────────────────────

/// Where a widget sits and how large it is drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    /// Anchor (center) of the widget in scene coordinates.
    pub position: Point,
    /// Uniform scale factor.
    pub scale: f64,
}

impl Placement {
    /// Create a placement.
    #[must_use]
    pub const fn new(position: Point, scale: f64) -> Self {
        Self { position, scale }
    }
}

impl Default for Placement {
    fn default() -> Self {
        Self::new(Point::ORIGIN, 1.0)
    }
}

/// How a cash stack is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CashStackState {
    /// Two or more bills fit in the remaining cash.
    Stack,
    /// Exactly one bill fits.
    Single,
    /// Nothing fits; the stack is hidden and cannot be dragged.
    Empty,
}

impl CashStackState {
    /// State for a stack of `value` bills given `remaining` cash.
    #[must_use]
    pub fn for_remaining(value: Amount, remaining: Amount) -> Self {
        if value == 0 {
            return Self::Empty;
        }
        match remaining / value {
            0 => Self::Empty,
            1 => Self::Single,
            _ => Self::Stack,
        }
    }
}

/// The action behind the endgame button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndgameKind {
    /// Save a picture of the finished plan (single-user).
    Screenshot,
    /// Record the plan and reset for the next participant (multi-user).
    Submit,
}

impl EndgameKind {
    /// Button caption.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Screenshot => "Screenshot",
            Self::Submit => "Submit",
        }
    }

    fn for_mode(mode: Mode) -> Self {
        match mode {
            Mode::SingleUser => Self::Screenshot,
            Mode::MultiUser => Self::Submit,
        }
    }
}

/// A budget bucket and its amount label.
#[derive(Debug, Clone, PartialEq)]
pub struct BucketWidget {
    /// Bucket index in the ledger.
    pub index: usize,
    /// Display label, may contain line breaks.
    pub label: String,
    /// Formatted amount currently in the bucket.
    pub amount_text: String,
    /// Current placement.
    pub placement: Placement,
}

/// A draggable stack of one denomination.
#[derive(Debug, Clone, PartialEq)]
pub struct CashStackWidget {
    /// Bill denomination.
    pub denomination: Denomination,
    /// How the stack is drawn.
    pub state: CashStackState,
    /// Current placement.
    pub placement: Placement,
}

/// Remaining-cash readout.
#[derive(Debug, Clone, PartialEq)]
pub struct RemainderWidget {
    /// Formatted remaining cash, or [`ALL_CASH_ALLOCATED`].
    pub text: String,
    /// Current placement.
    pub placement: Placement,
}

/// Button shown once every dollar is allocated.
#[derive(Debug, Clone, PartialEq)]
pub struct EndgameButton {
    /// Action performed on tap.
    pub kind: EndgameKind,
    /// Whether the button is shown.
    pub visible: bool,
    /// Current placement.
    pub placement: Placement,
}

/// Multi-user button that abandons the current session.
#[derive(Debug, Clone, PartialEq)]
pub struct CancelSessionButton {
    /// Current placement.
    pub placement: Placement,
}

/// Everything the scene can hold.
#[derive(Debug, Clone, PartialEq)]
pub enum Widget {
    /// See [`BucketWidget`].
    Bucket(BucketWidget),
    /// See [`CashStackWidget`].
    CashStack(CashStackWidget),
    /// See [`RemainderWidget`].
    Remainder(RemainderWidget),
    /// See [`EndgameButton`].
    Endgame(EndgameButton),
    /// See [`CancelSessionButton`].
    CancelSession(CancelSessionButton),
}

impl Widget {
    /// Current placement.
    #[must_use]
    pub fn placement(&self) -> Placement {
        match self {
            Self::Bucket(w) => w.placement,
            Self::CashStack(w) => w.placement,
            Self::Remainder(w) => w.placement,
            Self::Endgame(w) => w.placement,
            Self::CancelSession(w) => w.placement,
        }
    }

    /// Move and rescale.
    pub fn move_to(&mut self, placement: Placement) {
        match self {
            Self::Bucket(w) => w.placement = placement,
            Self::CashStack(w) => w.placement = placement,
            Self::Remainder(w) => w.placement = placement,
            Self::Endgame(w) => w.placement = placement,
            Self::CancelSession(w) => w.placement = placement,
        }
    }

    /// Refresh display state from the ledger.
    pub fn update(&mut self, ledger: &AllocationState) {
        let remaining = ledger.remaining_cash();
        match self {
            Self::Bucket(w) => {
                let amount = ledger.bucket(w.index).unwrap_or_default();
                w.amount_text = format_amount(amount);
            }
            Self::CashStack(w) => {
                w.state = CashStackState::for_remaining(w.denomination.value, remaining);
            }
            Self::Remainder(w) => w.text = remainder_text(remaining),
            Self::Endgame(w) => w.visible = remaining == 0,
            Self::CancelSession(_) => {}
        }
    }

    /// Screen-space footprint, if the widget takes part in hit-testing.
    #[must_use]
    pub fn bounds(&self) -> Option<Bounds> {
        let (base, placement) = match self {
            Self::Bucket(w) => (BUCKET_BASE_SIZE, w.placement),
            Self::CashStack(w) => (CASH_BASE_SIZE, w.placement),
            Self::Endgame(w) => (BUTTON_BASE_SIZE, w.placement),
            Self::Remainder(_) | Self::CancelSession(_) => return None,
        };
        Some(Bounds::centered_at(
            placement.position,
            base.scaled(placement.scale),
        ))
    }
}

/// Remainder readout for `remaining` cash.
#[must_use]
pub fn remainder_text(remaining: Amount) -> String {
    if remaining == 0 {
        ALL_CASH_ALLOCATED.to_string()
    } else {
        format_amount(remaining)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Outcomes and errors
// ─────────────────────────────────────────────────────────────────────────────

/// What handling an intent did.
#[derive(Debug, Clone, PartialEq)]
pub enum SceneOutcome {
    /// A bucket amount changed.
    Allocated {
        /// Bucket index.
        bucket: usize,
        /// New bucket amount.
        amount: Amount,
    },
    /// The intent had no effect (missed drop, unaffordable bill, early submit).
    Ignored {
        /// Short reason for logs.
        reason: &'static str,
    },
    /// A multi-user submission was recorded.
    Submitted {
        /// Number of recorded submissions.
        submissions: usize,
    },
    /// The in-progress session was discarded.
    SessionCancelled,
    /// History was cleared.
    HistoryCleared,
    /// Submitter details were attached.
    MetadataAttached,
    /// The host should capture the scene under this file name.
    ScreenshotRequested {
        /// Suggested download name.
        filename: String,
    },
    /// Widgets were laid out for a new viewport.
    Reflowed,
}

/// Errors from scene operations.
#[derive(Debug)]
pub enum SceneError {
    /// The session rejected the operation.
    Session(SessionError),
    /// Bucket placement failed.
    Layout(ArcError),
}

impl fmt::Display for SceneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Session(e) => write!(f, "{e}"),
            Self::Layout(e) => write!(f, "layout failed: {e}"),
        }
    }
}

impl std::error::Error for SceneError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Session(e) => Some(e),
            Self::Layout(e) => Some(e),
        }
    }
}

impl From<SessionError> for SceneError {
    fn from(e: SessionError) -> Self {
        Self::Session(e)
    }
}

impl From<ArcError> for SceneError {
    fn from(e: ArcError) -> Self {
        Self::Layout(e)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Scene
// ─────────────────────────────────────────────────────────────────────────────

/// Handle to an attached widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WidgetId(usize);

/// The game scene: widgets plus layout rules.
#[derive(Debug, Clone)]
pub struct Scene {
    viewport: Size,
    mode: Mode,
    arc_tolerance: f64,
    arc_max_iterations: usize,
    widgets: Vec<Widget>,
    last_arc_converged: bool,
}

impl Scene {
    /// Build the scene for `mode`, lay it out in `viewport`, and sync it to
    /// `ledger`.
    pub fn new(
        config: &GameConfig,
        mode: Mode,
        viewport: Size,
        ledger: &AllocationState,
    ) -> Result<Self, SceneError> {
        let mut scene = Self {
            viewport,
            mode,
            arc_tolerance: config.arc_tolerance,
            arc_max_iterations: config.arc_max_iterations,
            widgets: Vec::new(),
            last_arc_converged: true,
        };

        scene.attach(Widget::Remainder(RemainderWidget {
            text: String::new(),
            placement: Placement::default(),
        }));
        for (index, label) in config.bucket_labels.iter().enumerate() {
            scene.attach(Widget::Bucket(BucketWidget {
                index,
                label: label.clone(),
                amount_text: String::new(),
                placement: Placement::default(),
            }));
        }
        for denomination in &config.denominations {
            scene.attach(Widget::CashStack(CashStackWidget {
                denomination: denomination.clone(),
                state: CashStackState::Empty,
                placement: Placement::default(),
            }));
        }
        scene.attach(Widget::Endgame(EndgameButton {
            kind: EndgameKind::for_mode(mode),
            visible: false,
            placement: Placement::default(),
        }));
        if mode.is_multi_user() {
            scene.attach(Widget::CancelSession(CancelSessionButton {
                placement: Placement::default(),
            }));
        }

        scene.reflow(viewport)?;
        scene.update(ledger);
        Ok(scene)
    }

    /// Add a widget. It is positioned on the next reflow.
    pub fn attach(&mut self, widget: Widget) -> WidgetId {
        self.widgets.push(widget);
        WidgetId(self.widgets.len() - 1)
    }

    /// Widget by handle.
    #[must_use]
    pub fn widget(&self, id: WidgetId) -> Option<&Widget> {
        self.widgets.get(id.0)
    }

    /// All widgets in draw order.
    #[must_use]
    pub fn widgets(&self) -> &[Widget] {
        &self.widgets
    }

    /// Current viewport.
    #[must_use]
    pub fn viewport(&self) -> Size {
        self.viewport
    }

    /// Whether the last bucket arc met its tolerance.
    #[must_use]
    pub fn arc_converged(&self) -> bool {
        self.last_arc_converged
    }

    /// Bucket widgets in index order.
    pub fn buckets(&self) -> impl Iterator<Item = &BucketWidget> {
        self.widgets.iter().filter_map(|w| match w {
            Widget::Bucket(b) => Some(b),
            _ => None,
        })
    }

    /// Cash stack widgets in display order.
    pub fn cash_stacks(&self) -> impl Iterator<Item = &CashStackWidget> {
        self.widgets.iter().filter_map(|w| match w {
            Widget::CashStack(c) => Some(c),
            _ => None,
        })
    }

    /// Current remainder readout.
    #[must_use]
    pub fn remainder_text(&self) -> Option<&str> {
        self.widgets.iter().find_map(|w| match w {
            Widget::Remainder(r) => Some(r.text.as_str()),
            _ => None,
        })
    }

    /// The endgame button.
    #[must_use]
    pub fn endgame(&self) -> Option<&EndgameButton> {
        self.widgets.iter().find_map(|w| match w {
            Widget::Endgame(e) => Some(e),
            _ => None,
        })
    }

    /// Index of the bucket whose footprint strictly contains `at`.
    #[must_use]
    pub fn bucket_at(&self, at: Point) -> Option<usize> {
        self.widgets.iter().find_map(|w| match w {
            Widget::Bucket(b) if w.bounds().is_some_and(|r| r.contains(at)) => Some(b.index),
            _ => None,
        })
    }

    /// Refresh every widget from the ledger.
    pub fn update(&mut self, ledger: &AllocationState) {
        for widget in &mut self.widgets {
            widget.update(ledger);
        }
    }

    /// Lay out every widget for `viewport`.
    pub fn reflow(&mut self, viewport: Size) -> Result<(), SceneError> {
        let bucket_count = self.buckets().count();
        let bucket_points = if bucket_count >= 2 {
            let layout = ArcRequest::for_viewport(viewport, bucket_count)
                .with_tolerance(self.arc_tolerance)
                .with_max_iterations(self.arc_max_iterations)
                .solve()?;
            self.last_arc_converged = layout.converged;
            layout.into_points()
        } else {
            vec![Point::new(viewport.width / 2.0, viewport.height * 5.0 / 6.0); bucket_count]
        };

        let stack_count = self.cash_stacks().count();
        let bucket_scale = bucket_scale(viewport);
        let cash_scale = cash_scale(viewport);
        let mut stack_index = 0;

        for widget in &mut self.widgets {
            let placement = match widget {
                Widget::Bucket(b) => Placement::new(
                    bucket_points
                        .get(b.index)
                        .copied()
                        .unwrap_or(Point::ORIGIN),
                    bucket_scale,
                ),
                Widget::CashStack(_) => {
                    let at = cash_location(viewport, stack_index, stack_count);
                    stack_index += 1;
                    Placement::new(at, cash_scale)
                }
                Widget::Remainder(_) => Placement::new(
                    Point::new(viewport.width / 2.0, viewport.height / 2.0),
                    remainder_scale(viewport),
                ),
                Widget::Endgame(_) => Placement::new(
                    Point::new(viewport.width / 2.0, viewport.height / 3.0),
                    1.0,
                ),
                Widget::CancelSession(_) => Placement::new(CANCEL_BUTTON_POSITION, 1.0),
            };
            widget.move_to(placement);
        }

        self.viewport = viewport;
        tracing::debug!(
            width = viewport.width,
            height = viewport.height,
            buckets = bucket_count,
            arc_converged = self.last_arc_converged,
            "scene reflowed"
        );
        Ok(())
    }

    /// Apply an intent to `store` and refresh the widgets.
    pub fn handle(
        &mut self,
        intent: Intent,
        store: &mut SessionStore,
    ) -> Result<SceneOutcome, SceneError> {
        tracing::trace!(intent = intent.name(), "scene intent");
        let outcome = match intent {
            Intent::DropCash { denomination, at } => match self.bucket_at(at) {
                Some(bucket) => drop_cash(store, denomination, bucket)?,
                None => SceneOutcome::Ignored {
                    reason: "drop missed every bucket",
                },
            },
            Intent::DropCashOnBucket {
                denomination,
                bucket,
            } => drop_cash(store, denomination, bucket)?,
            Intent::Slide { bucket, fraction } => {
                let capacity = store
                    .allocation()
                    .bucket_capacity(bucket)
                    .map_err(SessionError::from)?;
                let amount = store.set_bucket(bucket, slider_amount(fraction, capacity))?;
                SceneOutcome::Allocated { bucket, amount }
            }
            Intent::SubmitSession
                if self.mode.is_multi_user() && !self.endgame().is_some_and(|e| e.visible) =>
            {
                SceneOutcome::Ignored {
                    reason: "cash remains to be allocated",
                }
            }
            Intent::SubmitSession => {
                store.submit()?;
                SceneOutcome::Submitted {
                    submissions: store.all_history_records().len(),
                }
            }
            Intent::CancelSession => {
                store.cancel_session();
                SceneOutcome::SessionCancelled
            }
            Intent::ClearHistory => {
                store.clear_history();
                SceneOutcome::HistoryCleared
            }
            Intent::AttachMetadata {
                region,
                postal_code,
            } => {
                store.attach_metadata(region, postal_code)?;
                SceneOutcome::MetadataAttached
            }
            Intent::Screenshot => {
                if self.mode.is_multi_user() {
                    return Err(SessionError::InvalidModeOperation {
                        operation: "screenshot",
                        mode: self.mode,
                    }
                    .into());
                }
                SceneOutcome::ScreenshotRequested {
                    filename: screenshot_filename(),
                }
            }
            Intent::Resize { width, height } => {
                self.reflow(Size::new(width, height))?;
                SceneOutcome::Reflowed
            }
        };
        self.update(store.allocation());
        Ok(outcome)
    }
}

/// Drop one bill on a bucket. Bills larger than the remaining cash are
/// refused, mirroring a hidden stack that cannot be dragged.
fn drop_cash(
    store: &mut SessionStore,
    denomination: Amount,
    bucket: usize,
) -> Result<SceneOutcome, SceneError> {
    if denomination == 0 || denomination > store.remaining_cash() {
        return Ok(SceneOutcome::Ignored {
            reason: "bill exceeds remaining cash",
        });
    }
    let amount = store.add_to_bucket(bucket, denomination)?;
    Ok(SceneOutcome::Allocated { bucket, amount })
}

fn bucket_scale(viewport: Size) -> f64 {
    (viewport.width.min(940.0) / 940.0).min(viewport.height.min(940.0) / 940.0)
}

fn cash_scale(viewport: Size) -> f64 {
    (viewport.width.min(720.0) / 720.0).min(viewport.height.min(940.0) / 940.0)
}

fn remainder_scale(viewport: Size) -> f64 {
    (viewport.height.min(700.0) / 700.0).min(viewport.width.min(800.0) / 800.0)
}

fn cash_location(viewport: Size, index: usize, count: usize) -> Point {
    let x = if count <= 1 {
        viewport.width / 2.0
    } else {
        viewport.width * 0.1 + viewport.width * 0.8 * index as f64 / (count - 1) as f64
    };
    Point::new(x, viewport.height * 0.3)
}
