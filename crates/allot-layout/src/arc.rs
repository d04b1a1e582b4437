#![forbid(unsafe_code)]

//! Equal-chord point placement along an elliptical arc.
//!
//! Buckets sit on an arc of an ellipse. Spacing them at equal *angles* looks
//! uneven on an eccentric ellipse, so the solver instead equalizes the
//! straight-line (chord) distance between consecutive points.
//!
//! # Algorithm
//!
//! Iterative angular relaxation:
//!
//! 1. Start with interior angles linearly interpolated between the pinned
//!    start and end angles.
//! 2. Measure consecutive chord lengths and the cumulative chord length from
//!    point 0.
//! 3. Point `i` should sit at fraction `i / (n - 1)` of the total. A point
//!    that is behind moves toward its right neighbour by the cumulative error
//!    relative to the right chord; a point that is ahead moves toward its left
//!    neighbour relative to the left chord. The step is capped at
//!    [`MAX_NUDGE`] of the angular gap so two neighbours moving toward each
//!    other can never cross.
//! 4. Repeat until `max(chord) - min(chord) <= tolerance`.
//!
//! # Invariants
//!
//! - Points 0 and `n - 1` are exactly `center + (h·cos θ, v·sin θ)` for the
//!   start and end angles. Only interior angles move.
//! - **Deterministic**: identical requests yield identical layouts.
//! - **Bounded**: at most `max_iterations` relaxation passes. When the cap is
//!   hit, the configuration with the smallest spread seen is returned with
//!   `converged == false`.
//!
//! # Failure Modes
//!
//! | Condition | Behavior |
//! |-----------|----------|
//! | `count < 2` | `ArcError::InvalidArgument` |
//! | non-finite geometry or tolerance ≤ 0 | `ArcError::InvalidArgument` |
//! | zero radii (all points coincide) | converged, spread 0 |
//! | oscillation | best-seen layout, `converged == false`, logged |

use std::f64::consts::PI;
use std::fmt;

use allot_core::config::{DEFAULT_ARC_MAX_ITERATIONS, DEFAULT_ARC_TOLERANCE};
use allot_core::geometry::{Point, Size};

/// Largest fraction of the angular gap a point may move in one pass.
pub const MAX_NUDGE: f64 = 0.499;

/// Start angle of the reference bucket arc.
pub const BUCKET_ARC_START: f64 = -PI * 1.125;
/// End angle of the reference bucket arc.
pub const BUCKET_ARC_END: f64 = -PI * 1.875;

/// Errors from the arc solver.
#[derive(Debug, Clone, PartialEq)]
pub enum ArcError {
    /// The request cannot be solved; the caller produced bad input.
    InvalidArgument(String),
}

impl fmt::Display for ArcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument(msg) => write!(f, "invalid arc request: {msg}"),
        }
    }
}

impl std::error::Error for ArcError {}

/// A request to place `count` points on an elliptical arc.
#[derive(Debug, Clone, PartialEq)]
pub struct ArcRequest {
    /// Number of points, at least 2.
    pub count: usize,
    /// Horizontal radius.
    pub h_radius: f64,
    /// Vertical radius.
    pub v_radius: f64,
    /// Ellipse center.
    pub center: Point,
    /// Parametric angle of the first point (radians).
    pub start_angle: f64,
    /// Parametric angle of the last point (radians).
    pub end_angle: f64,
    /// Allowed `max - min` chord spread.
    pub tolerance: f64,
    /// Relaxation pass cap.
    pub max_iterations: usize,
}

impl ArcRequest {
    /// Create a request centered at the origin spanning the reference bucket
    /// arc, with default tolerance and iteration cap.
    #[must_use]
    pub fn new(count: usize, h_radius: f64, v_radius: f64) -> Self {
        Self {
            count,
            h_radius,
            v_radius,
            center: Point::ORIGIN,
            start_angle: BUCKET_ARC_START,
            end_angle: BUCKET_ARC_END,
            tolerance: DEFAULT_ARC_TOLERANCE,
            max_iterations: DEFAULT_ARC_MAX_ITERATIONS,
        }
    }

    /// Arc used to lay out `count` buckets in a viewport.
    ///
    /// The ellipse is centered at `(W/2, H/3)` with vertical radius `H/2`; the
    /// horizontal radius is chosen so the end buckets land at `0.1·W` and
    /// `0.9·W`.
    #[must_use]
    pub fn for_viewport(viewport: Size, count: usize) -> Self {
        let half_span = (BUCKET_ARC_START.cos()).abs();
        Self::new(count, viewport.width * 0.4 / half_span, viewport.height / 2.0)
            .with_center(Point::new(viewport.width / 2.0, viewport.height / 3.0))
    }

    /// Set the ellipse center.
    #[must_use]
    pub fn with_center(mut self, center: Point) -> Self {
        self.center = center;
        self
    }

    /// Set the start and end angles.
    #[must_use]
    pub fn with_span(mut self, start_angle: f64, end_angle: f64) -> Self {
        self.start_angle = start_angle;
        self.end_angle = end_angle;
        self
    }

    /// Set the chord spread tolerance.
    #[must_use]
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Set the relaxation pass cap.
    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    fn validate(&self) -> Result<(), ArcError> {
        if self.count < 2 {
            return Err(ArcError::InvalidArgument(format!(
                "cannot arrange fewer than two points (got {})",
                self.count
            )));
        }
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(ArcError::InvalidArgument(format!(
                "tolerance must be positive and finite (got {})",
                self.tolerance
            )));
        }
        let finite = [
            self.h_radius,
            self.v_radius,
            self.start_angle,
            self.end_angle,
        ]
        .iter()
        .all(|v| v.is_finite())
            && self.center.is_finite();
        if !finite {
            return Err(ArcError::InvalidArgument(
                "geometry must be finite".to_string(),
            ));
        }
        Ok(())
    }

    #[inline]
    fn point_at(&self, theta: f64) -> Point {
        Point::on_ellipse(self.center, self.h_radius, self.v_radius, theta)
    }

    fn points_for(&self, angles: &[f64]) -> Vec<Point> {
        angles.iter().map(|&t| self.point_at(t)).collect()
    }

    fn initial_angles(&self) -> Vec<f64> {
        let last = self.count - 1;
        let span = self.end_angle - self.start_angle;
        (0..self.count)
            .map(|i| match i {
                0 => self.start_angle,
                i if i == last => self.end_angle,
                i => self.start_angle + span * i as f64 / last as f64,
            })
            .collect()
    }

    /// Run the solver.
    pub fn solve(&self) -> Result<ArcLayout, ArcError> {
        self.validate()?;

        let mut angles = self.initial_angles();
        let mut points = self.points_for(&angles);
        let mut chords = chord_lengths(&points);
        let mut spread = chord_spread(&chords);
        let mut iterations = 0usize;

        let mut best_points = points.clone();
        let mut best_spread = spread;
        let mut best_iteration = 0usize;

        while spread > self.tolerance {
            if iterations >= self.max_iterations {
                tracing::warn!(
                    count = self.count,
                    iterations,
                    best_spread,
                    best_iteration,
                    tolerance = self.tolerance,
                    "arc relaxation hit iteration cap, returning best layout"
                );
                return Ok(ArcLayout {
                    points: best_points,
                    spread: best_spread,
                    iterations,
                    converged: false,
                });
            }

            relax(&mut angles, &chords);
            iterations += 1;

            points = self.points_for(&angles);
            chords = chord_lengths(&points);
            spread = chord_spread(&chords);

            if spread < best_spread {
                best_spread = spread;
                best_points.clone_from(&points);
                best_iteration = iterations;
            }
        }

        tracing::trace!(count = self.count, iterations, spread, "arc relaxation converged");
        Ok(ArcLayout {
            points,
            spread,
            iterations,
            converged: true,
        })
    }
}

/// Result of an arc solve.
#[derive(Debug, Clone, PartialEq)]
pub struct ArcLayout {
    /// Placed points, first and last pinned to the span endpoints.
    pub points: Vec<Point>,
    /// `max - min` consecutive chord length of `points`.
    pub spread: f64,
    /// Relaxation passes performed.
    pub iterations: usize,
    /// Whether `spread` is within tolerance.
    pub converged: bool,
}

impl ArcLayout {
    /// Consecutive chord lengths of the placed points.
    #[must_use]
    pub fn chord_lengths(&self) -> Vec<f64> {
        chord_lengths(&self.points)
    }

    /// Consume the layout, keeping only the points.
    #[must_use]
    pub fn into_points(self) -> Vec<Point> {
        self.points
    }
}

/// Place `n` points on an elliptical arc with near-equal chord spacing.
///
/// Shorthand for building an [`ArcRequest`] with the default iteration cap
/// and returning only the points.
#[allow(clippy::too_many_arguments)]
pub fn compute_arc_points(
    n: usize,
    h_radius: f64,
    v_radius: f64,
    center_x: f64,
    center_y: f64,
    start_angle: f64,
    end_angle: f64,
    epsilon: f64,
) -> Result<Vec<Point>, ArcError> {
    ArcRequest::new(n, h_radius, v_radius)
        .with_center(Point::new(center_x, center_y))
        .with_span(start_angle, end_angle)
        .with_tolerance(epsilon)
        .solve()
        .map(ArcLayout::into_points)
}

fn chord_lengths(points: &[Point]) -> Vec<f64> {
    points.windows(2).map(|w| w[0].distance(&w[1])).collect()
}

fn chord_spread(chords: &[f64]) -> f64 {
    let (min, max) = chords
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &c| {
            (lo.min(c), hi.max(c))
        });
    if chords.is_empty() { 0.0 } else { max - min }
}

#[inline]
fn nudge_ratio(error: f64, side: f64) -> f64 {
    if side <= f64::EPSILON {
        MAX_NUDGE
    } else {
        (error / side).min(MAX_NUDGE)
    }
}

/// One relaxation pass. Every step is computed from the same snapshot of
/// angles so the pass does not depend on iteration order.
fn relax(angles: &mut [f64], chords: &[f64]) {
    let n = angles.len();
    let total: f64 = chords.iter().sum();
    if n < 3 || total <= f64::EPSILON {
        return;
    }

    let snapshot = angles.to_vec();
    let last = (n - 1) as f64;
    let mut cumulative = 0.0;
    for i in 1..n - 1 {
        cumulative += chords[i - 1];
        // Signed shortfall in distance units; positive means behind.
        let error = (i as f64 / last) * total - cumulative;
        if error > 0.0 {
            let ratio = nudge_ratio(error, chords[i]);
            angles[i] = snapshot[i] + ratio * (snapshot[i + 1] - snapshot[i]);
        } else if error < 0.0 {
            let ratio = nudge_ratio(-error, chords[i - 1]);
            angles[i] = snapshot[i] + ratio * (snapshot[i - 1] - snapshot[i]);
        }
    }
}
