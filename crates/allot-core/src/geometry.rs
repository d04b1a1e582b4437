#![forbid(unsafe_code)]

//! Geometric primitives.
//!
//! Scene coordinates are floating point with the origin at the top-left of
//! the viewport and `y` growing downwards.

/// A point in scene coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    /// Horizontal position.
    pub x: f64,
    /// Vertical position.
    pub y: f64,
}

impl Point {
    /// The origin.
    pub const ORIGIN: Self = Self::new(0.0, 0.0);

    /// Create a new point.
    #[inline]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Point on an ellipse centered at `center` for parametric angle `theta`.
    #[inline]
    pub fn on_ellipse(center: Point, h_radius: f64, v_radius: f64, theta: f64) -> Self {
        Self {
            x: center.x + h_radius * theta.cos(),
            y: center.y + v_radius * theta.sin(),
        }
    }

    /// Straight-line distance to another point.
    #[inline]
    pub fn distance(&self, other: &Point) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }

    /// Check that both coordinates are finite.
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self::new(x, y)
    }
}

/// A viewport or widget size.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Size {
    /// Width in scene units.
    pub width: f64,
    /// Height in scene units.
    pub height: f64,
}

impl Size {
    /// Create a new size.
    #[inline]
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Check if either dimension is zero or negative.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// Scale both dimensions by `factor`.
    #[inline]
    pub fn scaled(&self, factor: f64) -> Size {
        Size::new(self.width * factor, self.height * factor)
    }
}

/// An axis-aligned bounding box used for hit testing.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Bounds {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Width.
    pub width: f64,
    /// Height.
    pub height: f64,
}

impl Bounds {
    /// Create bounds from the top-left corner and size.
    #[inline]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Bounds of a box of `size` whose center sits at `center`.
    #[inline]
    pub fn centered_at(center: Point, size: Size) -> Self {
        Self::new(
            center.x - size.width / 2.0,
            center.y - size.height / 2.0,
            size.width,
            size.height,
        )
    }

    /// Right edge (exclusive).
    #[inline]
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    /// Bottom edge (exclusive).
    #[inline]
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Center point.
    #[inline]
    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Strict point-in-box test.
    ///
    /// Points on the boundary are outside, matching how drops landing exactly
    /// on an edge are ignored.
    #[inline]
    pub fn contains(&self, p: Point) -> bool {
        p.x > self.x && p.x < self.right() && p.y > self.y && p.y < self.bottom()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ellipse_point_at_cardinal_angles() {
        let c = Point::new(10.0, 20.0);
        let p = Point::on_ellipse(c, 4.0, 2.0, 0.0);
        assert_eq!(p, Point::new(14.0, 20.0));

        let p = Point::on_ellipse(c, 4.0, 2.0, std::f64::consts::FRAC_PI_2);
        assert!((p.x - 10.0).abs() < 1e-12);
        assert!((p.y - 22.0).abs() < 1e-12);
    }

    #[test]
    fn distance_is_euclidean() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert_eq!(a.distance(&b), 5.0);
        assert_eq!(b.distance(&a), 5.0);
    }

    #[test]
    fn bounds_contains_is_strict() {
        let b = Bounds::centered_at(Point::new(50.0, 50.0), Size::new(20.0, 10.0));
        assert_eq!(b, Bounds::new(40.0, 45.0, 20.0, 10.0));
        assert!(b.contains(Point::new(50.0, 50.0)));
        assert!(!b.contains(Point::new(40.0, 50.0)));
        assert!(!b.contains(Point::new(60.0, 50.0)));
        assert!(!b.contains(Point::new(50.0, 56.0)));
        assert_eq!(b.center(), Point::new(50.0, 50.0));
    }

    #[test]
    fn empty_size() {
        assert!(Size::new(0.0, 10.0).is_empty());
        assert!(!Size::new(1.0, 1.0).is_empty());
        assert_eq!(Size::new(2.0, 3.0).scaled(0.5), Size::new(1.0, 1.5));
    }
}
