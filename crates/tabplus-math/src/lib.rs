#![warn(missing_docs)]

//! Math types for the tabplus crates.
//!
//! Thin wrappers around nalgebra. The scene uses Y-up world coordinates:
//! the build plate is the XZ plane and footprint polygons are expressed as
//! 2D points `(x, z)` on that plane.

use nalgebra::Vector3;

/// A point in 3D world space (Y-up).
pub type Point3 = nalgebra::Point3<f64>;

/// A vector in 3D space.
pub type Vec3 = Vector3<f64>;

/// A point on the build plate.
pub type Point2 = nalgebra::Point2<f64>;

/// Lift a build-plate point into world space at bed height.
pub fn bed_point(p: &Point2) -> Point3 {
    Point3::new(p.x, 0.0, p.y)
}

/// Point on a horizontal circle of `radius` around the Y axis at height `y`.
///
/// Angles grow from +X towards +Z.
pub fn ring_point(radius: f64, angle: f64, y: f64) -> Point3 {
    let (s, c) = angle.sin_cos();
    Point3::new(radius * c, y, radius * s)
}

/// Length of a closed polygon, including the closing edge.
pub fn closed_perimeter(points: &[Point2]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }
    let open: f64 = points.windows(2).map(|w| (w[1] - w[0]).norm()).sum();
    open + (points[0] - points[points.len() - 1]).norm()
}

/// Tolerance constants for geometric comparisons.
#[derive(Debug, Clone, Copy)]
pub struct Tolerance {
    /// Linear distance tolerance in mm.
    pub linear: f64,
}

impl Tolerance {
    /// Default tolerance (1e-6 mm).
    pub const DEFAULT: Self = Self { linear: 1e-6 };

    /// Tolerance suited to coordinates printed in G-code (5 decimals).
    pub const GCODE: Self = Self { linear: 1e-5 };

    /// Check if two points are coincident within tolerance.
    pub fn points_equal(&self, a: &Point3, b: &Point3) -> bool {
        (a - b).norm() < self.linear
    }

    /// Check if a scalar distance is effectively zero.
    pub fn is_zero(&self, d: f64) -> bool {
        d.abs() < self.linear
    }

    /// Check if two scalars are effectively equal.
    pub fn values_equal(&self, a: f64, b: f64) -> bool {
        self.is_zero(a - b)
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::DEFAULT
    }
}
