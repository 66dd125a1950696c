//! Model footprints and the greedy tab spacing rule.

use serde::{Deserialize, Serialize};
use tabplus_math::{closed_perimeter, Point2};

/// Distance from any real coordinate; guarantees the first point passes.
const FAR_AWAY: f64 = 99_999.99;

/// Closed outline of a model on the build plate, as `(x, z)` points.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Footprint {
    points: Vec<Point2>,
}

impl Footprint {
    /// Wrap an ordered point list. The closing edge is implicit.
    pub fn new(points: Vec<Point2>) -> Self {
        Self { points }
    }

    /// Regular `n`-gon of circumradius `radius` around `center`.
    pub fn regular(center: Point2, radius: f64, n: usize) -> Self {
        let step = std::f64::consts::TAU / n as f64;
        let points = (0..n)
            .map(|i| {
                let (s, c) = (i as f64 * step).sin_cos();
                Point2::new(center.x + radius * c, center.y + radius * s)
            })
            .collect();
        Self { points }
    }

    /// Outline points in order.
    pub fn points(&self) -> &[Point2] {
        &self.points
    }

    /// True when there is nothing to sample.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Length of the closed outline.
    pub fn perimeter(&self) -> f64 {
        closed_perimeter(&self.points)
    }
}

/// Pick the footprint points that receive a tab.
///
/// Walks the outline once, keeping a point when it is at least
/// `min_spacing` away from the previously kept one. The last point must
/// also clear the first kept point, so tabs do not pile up at the seam.
pub fn spaced_points(footprint: &Footprint, min_spacing: f64) -> Vec<Point2> {
    let points = footprint.points();
    let mut kept: Vec<Point2> = Vec::new();
    let mut last = Point2::new(FAR_AWAY, FAR_AWAY);

    for (i, &p) in points.iter().enumerate() {
        if (p - last).norm() < min_spacing {
            continue;
        }
        let is_final = i + 1 == points.len();
        if is_final {
            if let Some(first) = kept.first() {
                if (p - first).norm() < min_spacing {
                    continue;
                }
            }
        }
        kept.push(p);
        last = p;
    }
    kept
}
