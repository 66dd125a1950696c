//! Triangle mesh storage, normal computation and edge-adjacency checks.

use std::collections::HashMap;

use tabplus_math::{Point3, Vec3};

/// Output triangle mesh handed to the host scene.
///
/// Positions are Y-up world-space offsets from the node origin.
#[derive(Debug, Clone, PartialEq)]
pub struct TriangleMesh {
    /// Packed xyz triples, one per corner; tab solids give each triangle its own three.
    pub vertices: Vec<f32>,
    /// Corner indices into `vertices`, three per triangle, counter-clockwise seen from outside.
    pub indices: Vec<u32>,
    /// Packed unit normals matching `vertices`, or empty until [`TriangleMesh::compute_normals`] runs.
    pub normals: Vec<f32>,
}

impl TriangleMesh {
    /// Create an empty mesh.
    pub fn new() -> Self {
        Self {
            vertices: Vec::new(),
            indices: Vec::new(),
            normals: Vec::new(),
        }
    }

    /// Number of triangles.
    pub fn num_triangles(&self) -> usize {
        self.indices.len() / 3
    }

    /// Number of vertices.
    pub fn num_vertices(&self) -> usize {
        self.vertices.len() / 3
    }

    /// Position of vertex `i`.
    pub fn vertex(&self, i: usize) -> [f32; 3] {
        [
            self.vertices[i * 3],
            self.vertices[i * 3 + 1],
            self.vertices[i * 3 + 2],
        ]
    }

    /// Normal of vertex `i`, if normals have been computed.
    pub fn normal(&self, i: usize) -> Option<[f32; 3]> {
        if self.normals.len() < (i + 1) * 3 {
            return None;
        }
        Some([
            self.normals[i * 3],
            self.normals[i * 3 + 1],
            self.normals[i * 3 + 2],
        ])
    }

    /// Iterate over triangles as index triples.
    pub fn triangles(&self) -> impl Iterator<Item = [u32; 3]> + '_ {
        self.indices.chunks_exact(3).map(|t| [t[0], t[1], t[2]])
    }

    /// Axis-aligned bounds as `(min, max)`, or `None` for an empty mesh.
    pub fn bounds(&self) -> Option<([f32; 3], [f32; 3])> {
        if self.vertices.is_empty() {
            return None;
        }
        let mut min = [f32::MAX; 3];
        let mut max = [f32::MIN; 3];
        for v in self.vertices.chunks_exact(3) {
            for k in 0..3 {
                min[k] = min[k].min(v[k]);
                max[k] = max[k].max(v[k]);
            }
        }
        Some((min, max))
    }

    /// Recompute per-vertex normals from triangle geometry.
    ///
    /// Face normals are accumulated area-weighted onto each referenced vertex,
    /// then normalized. With per-triangle vertex duplication this yields flat
    /// shading.
    pub fn compute_normals(&mut self) {
        let mut acc = vec![Vec3::zeros(); self.num_vertices()];
        for [a, b, c] in self.triangles() {
            let pa = self.position(a as usize);
            let pb = self.position(b as usize);
            let pc = self.position(c as usize);
            let n = (pb - pa).cross(&(pc - pa));
            acc[a as usize] += n;
            acc[b as usize] += n;
            acc[c as usize] += n;
        }

        self.normals.clear();
        self.normals.reserve(acc.len() * 3);
        for n in acc {
            let len = n.norm();
            let n = if len > 1e-12 { n / len } else { Vec3::y() };
            self.normals.extend_from_slice(&[n.x as f32, n.y as f32, n.z as f32]);
        }
    }

    /// Count how many triangles use each undirected edge.
    ///
    /// Vertices are welded on a grid of size `weld` first, so duplicated
    /// vertices (flat shading) still share edges.
    pub fn edge_use_counts(&self, weld: f64) -> HashMap<(WeldKey, WeldKey), usize> {
        let mut counts = HashMap::new();
        for tri in self.triangles() {
            let keys = tri.map(|i| weld_key(self.vertex(i as usize), weld));
            for (p, q) in [(0, 1), (1, 2), (2, 0)] {
                let edge = if keys[p] <= keys[q] {
                    (keys[p], keys[q])
                } else {
                    (keys[q], keys[p])
                };
                *counts.entry(edge).or_insert(0) += 1;
            }
        }
        counts
    }

    /// True when every edge is shared by exactly two triangles.
    pub fn is_closed(&self, weld: f64) -> bool {
        let counts = self.edge_use_counts(weld);
        !counts.is_empty() && counts.values().all(|&n| n == 2)
    }

    /// Signed volume enclosed by the mesh (positive for outward winding).
    pub fn signed_volume(&self) -> f64 {
        self.triangles()
            .map(|[a, b, c]| {
                let pa = self.position(a as usize).coords;
                let pb = self.position(b as usize).coords;
                let pc = self.position(c as usize).coords;
                pa.dot(&pb.cross(&pc)) / 6.0
            })
            .sum()
    }

    fn position(&self, i: usize) -> Point3 {
        let [x, y, z] = self.vertex(i);
        Point3::new(x as f64, y as f64, z as f64)
    }
}

impl Default for TriangleMesh {
    fn default() -> Self {
        Self::new()
    }
}

/// Integer grid coordinates of a welded vertex.
pub type WeldKey = [i64; 3];

fn weld_key(v: [f32; 3], weld: f64) -> WeldKey {
    v.map(|c| (c as f64 / weld).round() as i64)
}

/// Accumulates unshared triangles and produces an immutable [`TriangleMesh`].
#[derive(Debug, Default)]
pub struct MeshBuilder {
    mesh: TriangleMesh,
}

impl MeshBuilder {
    /// Start an empty builder with room for `triangles` triangles.
    pub fn with_capacity(triangles: usize) -> Self {
        let mut mesh = TriangleMesh::new();
        mesh.vertices.reserve(triangles * 9);
        mesh.indices.reserve(triangles * 3);
        Self { mesh }
    }

    /// Append a triangle with its own three vertices (counter-clockwise seen from outside).
    pub fn push_triangle(&mut self, a: Point3, b: Point3, c: Point3) {
        let base = self.mesh.num_vertices() as u32;
        for p in [a, b, c] {
            self.mesh
                .vertices
                .extend_from_slice(&[p.x as f32, p.y as f32, p.z as f32]);
        }
        self.mesh.indices.extend_from_slice(&[base, base + 1, base + 2]);
    }

    /// Finish the mesh, computing vertex normals.
    pub fn build(mut self) -> TriangleMesh {
        self.mesh.compute_normals();
        self.mesh
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn tetrahedron() -> TriangleMesh {
        let o = Point3::new(0.0, 0.0, 0.0);
        let x = Point3::new(1.0, 0.0, 0.0);
        let y = Point3::new(0.0, 1.0, 0.0);
        let z = Point3::new(0.0, 0.0, 1.0);
        let mut b = MeshBuilder::with_capacity(4);
        b.push_triangle(o, y, x);
        b.push_triangle(o, x, z);
        b.push_triangle(o, z, y);
        b.push_triangle(x, y, z);
        b.build()
    }

    #[test]
    fn test_builder_duplicates_vertices() {
        let mesh = tetrahedron();
        assert_eq!(mesh.num_triangles(), 4);
        assert_eq!(mesh.num_vertices(), 12);
        assert_eq!(mesh.normals.len(), mesh.vertices.len());
    }

    #[test]
    fn test_flat_normals() {
        let mesh = tetrahedron();
        // First triangle lies in z=0 and faces -Z.
        let n = mesh.normal(0).unwrap();
        assert_relative_eq!(n[2], -1.0, epsilon = 1e-6);
        let n = mesh.normal(9).unwrap();
        let s = 1.0 / 3.0f32.sqrt();
        assert_relative_eq!(n[0], s, epsilon = 1e-6);
    }

    #[test]
    fn test_tetrahedron_is_closed() {
        let mesh = tetrahedron();
        assert!(mesh.is_closed(1e-4));
        assert_relative_eq!(mesh.signed_volume(), 1.0 / 6.0, epsilon = 1e-9);
    }

    #[test]
    fn test_open_mesh_detected() {
        let mut mesh = tetrahedron();
        mesh.indices.truncate(9);
        assert!(!mesh.is_closed(1e-4));
        assert!(!TriangleMesh::new().is_closed(1e-4));
    }

    #[test]
    fn test_bounds() {
        let mesh = tetrahedron();
        let (min, max) = mesh.bounds().unwrap();
        assert_eq!(min, [0.0, 0.0, 0.0]);
        assert_eq!(max, [1.0, 1.0, 1.0]);
        assert!(TriangleMesh::new().bounds().is_none());
    }
}
