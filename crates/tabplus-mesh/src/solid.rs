//! Anti-warping tab solids.
//!
//! Both solids are surfaces of revolution around the Y axis, built wedge by
//! wedge with unshared vertices so every triangle gets a flat normal. The
//! solid's origin is the picked point: its bottom sits `height_below_pick`
//! below the origin (on the bed) and it rises `layer_height` from there.

use serde::{Deserialize, Serialize};
use tabplus_math::{ring_point, Point3};
use tracing::debug;

use crate::error::{MeshError, Result};
use crate::mesh::{MeshBuilder, TriangleMesh};

/// Inward offset of the capsule flange, in line widths.
///
/// Keeps the flange rim away from the slicer's rounding of thin walls.
pub const FLANGE_INSET_LINE_WIDTHS: f64 = 1.8;

/// Taper angle of the capsule flange (degrees).
pub const FLANGE_TAPER_DEGREES: f64 = 45.0;

/// Finest accepted angular increment (degrees).
pub const MIN_ANGLE_STEP: f64 = 0.1;

/// Vertices emitted per angular increment for the plain cylinder.
pub const PASTILLE_VERTICES_PER_STEP: usize = 12;

/// Vertices emitted per angular increment for the capsule.
pub const CAPSULE_VERTICES_PER_STEP: usize = 24;

/// Shape of a generated tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TabShape {
    /// Plain flat cylinder.
    #[default]
    Pastille,
    /// Cylinder with a tapered flange and a recessed top.
    Capsule,
}

/// Full parameter set for a tab solid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TabSolid {
    /// Shape to generate.
    pub shape: TabShape,
    /// Tab diameter (mm).
    pub diameter: f64,
    /// Angular increment (degrees), at least [`MIN_ANGLE_STEP`]. Should divide 360.
    pub angle_step: f64,
    /// Height of the picked point above the bed (mm).
    pub height_below_pick: f64,
    /// Tab thickness (mm).
    pub layer_height: f64,
    /// Extrusion line width (mm). Capsule only.
    pub line_width: f64,
    /// Layer-count multiplier. Capsule only; selects the flange height.
    pub layer_count: u32,
}

impl Default for TabSolid {
    fn default() -> Self {
        Self {
            shape: TabShape::Pastille,
            diameter: 10.0,
            angle_step: 10.0,
            height_below_pick: 0.0,
            layer_height: 0.24,
            line_width: 0.48,
            layer_count: 1,
        }
    }
}

impl TabSolid {
    /// Validate the parameters for the selected shape.
    pub fn validate(&self) -> Result<()> {
        if !(self.diameter.is_finite() && self.diameter > 0.0) {
            return Err(MeshError::InvalidParams(
                "diameter must be positive".into(),
            ));
        }
        if !(MIN_ANGLE_STEP..=360.0).contains(&self.angle_step) {
            return Err(MeshError::InvalidParams(format!(
                "angle_step must be in [{MIN_ANGLE_STEP}, 360] degrees, got {}",
                self.angle_step
            )));
        }
        if !(self.layer_height.is_finite() && self.layer_height > 0.0) {
            return Err(MeshError::InvalidParams(
                "layer_height must be positive".into(),
            ));
        }
        if !self.height_below_pick.is_finite() {
            return Err(MeshError::InvalidParams(
                "height_below_pick must be finite".into(),
            ));
        }
        if self.shape == TabShape::Capsule {
            if !(self.line_width.is_finite() && self.line_width > 0.0) {
                return Err(MeshError::InvalidParams(
                    "line_width must be positive".into(),
                ));
            }
            if self.diameter / 2.0 <= FLANGE_INSET_LINE_WIDTHS * self.line_width {
                return Err(MeshError::InvalidParams(format!(
                    "diameter {} too small for line width {}",
                    self.diameter, self.line_width
                )));
            }
        }
        Ok(())
    }

    /// Number of angular increments (truncated when the step does not divide 360).
    pub fn segments(&self) -> usize {
        (360.0 / self.angle_step) as usize
    }

    /// Build the mesh for these parameters.
    pub fn build(&self) -> Result<TriangleMesh> {
        self.validate()?;
        let mesh = match self.shape {
            TabShape::Pastille => pastille_mesh(self),
            TabShape::Capsule => capsule_mesh(self),
        };
        debug!(
            shape = ?self.shape,
            vertices = mesh.num_vertices(),
            triangles = mesh.num_triangles(),
            "Built tab solid"
        );
        Ok(mesh)
    }
}

/// Build a plain cylinder tab ("pastille").
///
/// Each angular increment emits a top wedge, two wall triangles and a bottom
/// wedge: 12 vertices, 4 triangles.
pub fn make_pastille(
    diameter: f64,
    angle_step: f64,
    height_below_pick: f64,
    layer_height: f64,
) -> Result<TriangleMesh> {
    TabSolid {
        shape: TabShape::Pastille,
        diameter,
        angle_step,
        height_below_pick,
        layer_height,
        ..Default::default()
    }
    .build()
}

/// Build a capsule tab: a cylinder whose top carries a 45° flange and a
/// recessed cap.
///
/// Each angular increment emits 8 triangles (24 vertices): flange top ring
/// (2), outer taper (2), inner taper (2), recessed cap (1), bottom (1).
pub fn make_capsule(
    diameter: f64,
    angle_step: f64,
    height_below_pick: f64,
    layer_height: f64,
    line_width: f64,
    layer_count: u32,
) -> Result<TriangleMesh> {
    TabSolid {
        shape: TabShape::Capsule,
        diameter,
        angle_step,
        height_below_pick,
        layer_height,
        line_width,
        layer_count,
    }
    .build()
}

fn pastille_mesh(p: &TabSolid) -> TriangleMesh {
    let r = p.diameter / 2.0;
    let bottom = -p.height_below_pick;
    let top = bottom + p.layer_height;
    let step = p.angle_step.to_radians();
    let segments = p.segments();

    let mut b = MeshBuilder::with_capacity(segments * 4);
    let top_center = Point3::new(0.0, top, 0.0);
    let bottom_center = Point3::new(0.0, bottom, 0.0);

    for i in 0..segments {
        let a0 = i as f64 * step;
        let a1 = (i + 1) as f64 * step;
        let t0 = ring_point(r, a0, top);
        let t1 = ring_point(r, a1, top);
        let b0 = ring_point(r, a0, bottom);
        let b1 = ring_point(r, a1, bottom);

        b.push_triangle(top_center, t1, t0);
        b.push_triangle(t0, t1, b1);
        b.push_triangle(b1, b0, t0);
        b.push_triangle(bottom_center, b0, b1);
    }

    b.build()
}

fn capsule_mesh(p: &TabSolid) -> TriangleMesh {
    let r = p.diameter / 2.0;
    let h = p.layer_height;
    let bottom = -p.height_below_pick;
    // Floor of the recess.
    let cap = bottom + h;
    // Top of the flange.
    let rim = if p.layer_count > 1 {
        bottom + h * 2.0
    } else {
        bottom + h * 3.0
    };

    let r_outer = FLANGE_TAPER_DEGREES.to_radians().tan() * (h * 3.0) + r;
    let inset = FLANGE_INSET_LINE_WIDTHS * p.line_width;
    let r_inner = r_outer - inset;
    let r_cap = r - inset;

    let step = p.angle_step.to_radians();
    let segments = p.segments();

    let mut b = MeshBuilder::with_capacity(segments * 8);
    let cap_center = Point3::new(0.0, cap, 0.0);
    let bottom_center = Point3::new(0.0, bottom, 0.0);

    for i in 0..segments {
        let a0 = i as f64 * step;
        let a1 = (i + 1) as f64 * step;

        let outer0 = ring_point(r_outer, a0, rim);
        let outer1 = ring_point(r_outer, a1, rim);
        let inner0 = ring_point(r_inner, a0, rim);
        let inner1 = ring_point(r_inner, a1, rim);
        let cap0 = ring_point(r_cap, a0, cap);
        let cap1 = ring_point(r_cap, a1, cap);
        let base0 = ring_point(r, a0, bottom);
        let base1 = ring_point(r, a1, bottom);

        // flange top ring
        b.push_triangle(inner0, outer1, outer0);
        b.push_triangle(inner1, outer1, inner0);
        // outer taper down to the base
        b.push_triangle(outer0, outer1, base1);
        b.push_triangle(base1, base0, outer0);
        // inner taper down into the recess
        b.push_triangle(cap1, inner1, inner0);
        b.push_triangle(inner0, cap0, cap1);
        // recessed cap
        b.push_triangle(cap_center, cap1, cap0);
        // bottom
        b.push_triangle(bottom_center, base0, base1);
    }

    b.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_pastille_counts() {
        let mesh = make_pastille(10.0, 10.0, 1.0, 0.2).unwrap();
        assert_eq!(mesh.num_vertices(), 432);
        assert_eq!(mesh.num_triangles(), 144);
    }

    #[test]
    fn test_capsule_counts() {
        let mesh = make_capsule(10.0, 10.0, 1.0, 0.24, 0.48, 1).unwrap();
        assert_eq!(mesh.num_vertices(), 36 * CAPSULE_VERTICES_PER_STEP);
        assert_eq!(mesh.num_triangles(), 36 * 8);
    }

    #[test]
    fn test_pastille_sits_on_bed() {
        let mesh = make_pastille(10.0, 10.0, 1.0, 0.2).unwrap();
        let (min, max) = mesh.bounds().unwrap();
        assert_relative_eq!(min[1], -1.0, epsilon = 1e-6);
        assert_relative_eq!(max[1], -0.8, epsilon = 1e-6);
        assert_relative_eq!(max[0], 5.0, epsilon = 1e-6);
    }

    #[test]
    fn test_pastille_volume_is_positive() {
        let mesh = make_pastille(10.0, 10.0, 0.0, 1.0).unwrap();
        // 36-gon area = n/2 r^2 sin(2pi/n)
        let n = 36.0f64;
        let area = n / 2.0 * 25.0 * (2.0 * std::f64::consts::PI / n).sin();
        assert_relative_eq!(mesh.signed_volume(), area, epsilon = 1e-3);
    }

    #[test]
    fn test_negative_pick_height_extends_upward() {
        let mesh = make_pastille(4.0, 30.0, -2.0, 0.5).unwrap();
        let (min, max) = mesh.bounds().unwrap();
        assert_relative_eq!(min[1], 2.0, epsilon = 1e-6);
        assert_relative_eq!(max[1], 2.5, epsilon = 1e-6);
    }

    #[test]
    fn test_capsule_flange_height_depends_on_layer_count() {
        let single = make_capsule(10.0, 10.0, 0.0, 0.2, 0.4, 1).unwrap();
        let double = make_capsule(10.0, 10.0, 0.0, 0.2, 0.4, 2).unwrap();
        assert_relative_eq!(single.bounds().unwrap().1[1], 0.6, epsilon = 1e-6);
        assert_relative_eq!(double.bounds().unwrap().1[1], 0.4, epsilon = 1e-6);
        // flange reaches r + 3h regardless
        assert_relative_eq!(double.bounds().unwrap().1[0], 5.6, epsilon = 1e-5);
        assert!(single.signed_volume() > 0.0);
    }

    #[test]
    fn test_uneven_step_truncates_last_wedge() {
        let mesh = make_pastille(10.0, 7.0, 0.0, 0.2).unwrap();
        assert_eq!(mesh.num_triangles(), 51 * 4);
        assert!(!mesh.is_closed(1e-4));
    }

    #[test]
    fn test_invalid_params_rejected() {
        assert!(make_pastille(0.0, 10.0, 0.0, 0.2).is_err());
        assert!(make_pastille(-3.0, 10.0, 0.0, 0.2).is_err());
        assert!(make_pastille(10.0, 0.0, 0.0, 0.2).is_err());
        assert!(make_pastille(10.0, 1e-9, 0.0, 0.2).is_err());
        assert!(make_pastille(10.0, f64::NAN, 0.0, 0.2).is_err());
        assert!(make_pastille(10.0, 10.0, 0.0, 0.0).is_err());
        assert!(make_capsule(10.0, 10.0, 0.0, 0.2, 0.0, 1).is_err());
        // flange inset swallows the whole radius
        assert!(make_capsule(1.0, 10.0, 0.0, 0.2, 0.4, 1).is_err());
    }
}
