//! Binary STL export.
//!
//! STL files are conventionally Z-up, so positions are rotated from the
//! Y-up scene frame on the way out: `(x, y, z) -> (x, -z, y)`.

use std::borrow::Cow;
use std::fs;
use std::path::Path;

use crate::error::{MeshError, Result};
use crate::mesh::TriangleMesh;

/// Encode a mesh as binary STL.
pub fn stl_bytes(mesh: &TriangleMesh, header: &str) -> Result<Vec<u8>> {
    if mesh.num_triangles() == 0 {
        return Err(MeshError::EmptyMesh);
    }
    let num_triangles = mesh.num_triangles();
    let mut data = Vec::with_capacity(84 + num_triangles * 50);

    let mut head = [b' '; 80];
    for (dst, src) in head.iter_mut().zip(header.bytes()) {
        *dst = src;
    }
    data.extend_from_slice(&head);
    data.extend_from_slice(&(num_triangles as u32).to_le_bytes());

    // Tab solids never share vertices between triangles, so the normal of a
    // triangle's first corner is its facet normal.
    let mesh = with_normals(mesh);
    for tri in mesh.triangles() {
        let [v0, v1, v2] = tri.map(|i| z_up(mesh.vertex(i as usize)));
        let [nx, ny, nz] = mesh
            .normal(tri[0] as usize)
            .map_or([0.0, 0.0, 1.0], z_up);

        data.extend_from_slice(&nx.to_le_bytes());
        data.extend_from_slice(&ny.to_le_bytes());
        data.extend_from_slice(&nz.to_le_bytes());
        for v in [v0, v1, v2] {
            data.extend_from_slice(&v[0].to_le_bytes());
            data.extend_from_slice(&v[1].to_le_bytes());
            data.extend_from_slice(&v[2].to_le_bytes());
        }
        // Attribute byte count
        data.extend_from_slice(&0u16.to_le_bytes());
    }

    Ok(data)
}

/// Write a mesh to `path` as binary STL.
pub fn write_stl(mesh: &TriangleMesh, path: impl AsRef<Path>) -> Result<()> {
    let bytes = stl_bytes(mesh, "tabplus STL export")?;
    fs::write(path, bytes)?;
    Ok(())
}

fn with_normals(mesh: &TriangleMesh) -> Cow<'_, TriangleMesh> {
    if mesh.normals.len() == mesh.vertices.len() {
        Cow::Borrowed(mesh)
    } else {
        let mut owned = mesh.clone();
        owned.compute_normals();
        Cow::Owned(owned)
    }
}

fn z_up(v: [f32; 3]) -> [f32; 3] {
    [v[0], -v[2], v[1]]
}
