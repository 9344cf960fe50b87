//! Signed mean-ratio shape quality for simplex cells.
//!
//! Quality is 1 for the regular simplex, approaches 0 for degenerate shapes,
//! and carries the sign of the cell's orientation so inverted elements score
//! negative and fail any non-negative acceptance threshold.

use crate::mesh_error::MeshCoarsenError;
use crate::topology::mesh::Mesh;

/// Mean-ratio quality of a triangle with 2-d vertex positions.
///
/// `4 sqrt(3) A / sum(l^2)` with `A` the signed area.
pub fn tri_quality(p: &[[f64; 2]; 3]) -> f64 {
    let u = [p[1][0] - p[0][0], p[1][1] - p[0][1]];
    let v = [p[2][0] - p[0][0], p[2][1] - p[0][1]];
    let area = 0.5 * (u[0] * v[1] - u[1] * v[0]);
    let mut sum_lsq = 0.0;
    for (a, b) in [(0, 1), (1, 2), (2, 0)] {
        let dx = p[b][0] - p[a][0];
        let dy = p[b][1] - p[a][1];
        sum_lsq += dx * dx + dy * dy;
    }
    if sum_lsq == 0.0 {
        return 0.0;
    }
    4.0 * 3.0_f64.sqrt() * area / sum_lsq
}

/// Mean-ratio quality of a tetrahedron with 3-d vertex positions.
///
/// `(6 sqrt(2))^(2/3) sgn(V) |V|^(2/3) / msl` with `V` the signed volume and
/// `msl` the mean squared edge length.
pub fn tet_quality(p: &[[f64; 3]; 4]) -> f64 {
    let u = sub3(p[1], p[0]);
    let v = sub3(p[2], p[0]);
    let w = sub3(p[3], p[0]);
    let cross = [
        u[1] * v[2] - u[2] * v[1],
        u[2] * v[0] - u[0] * v[2],
        u[0] * v[1] - u[1] * v[0],
    ];
    let volume = (cross[0] * w[0] + cross[1] * w[1] + cross[2] * w[2]) / 6.0;
    let mut msl = 0.0;
    for (a, b) in [(0, 1), (1, 2), (2, 0), (0, 3), (1, 3), (2, 3)] {
        let d = sub3(p[b], p[a]);
        msl += d[0] * d[0] + d[1] * d[1] + d[2] * d[2];
    }
    msl /= 6.0;
    if msl == 0.0 {
        return 0.0;
    }
    let scale = (6.0 * 2.0_f64.sqrt()).powf(2.0 / 3.0);
    volume.signum() * scale * volume.abs().powf(2.0 / 3.0) / msl
}

fn sub3(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

/// Quality of one cell given its vertex locals and the coordinate array.
pub fn cell_quality(
    dim: usize,
    spatial_dim: usize,
    coords: &[f64],
    cell_verts: &[usize],
) -> Result<f64, MeshCoarsenError> {
    match (dim, spatial_dim) {
        (2, 2) => {
            let mut p = [[0.0; 2]; 3];
            for (slot, &v) in p.iter_mut().zip(cell_verts) {
                slot.copy_from_slice(&coords[v * 2..v * 2 + 2]);
            }
            Ok(tri_quality(&p))
        }
        (3, 3) => {
            let mut p = [[0.0; 3]; 4];
            for (slot, &v) in p.iter_mut().zip(cell_verts) {
                slot.copy_from_slice(&coords[v * 3..v * 3 + 3]);
            }
            Ok(tet_quality(&p))
        }
        _ => Err(MeshCoarsenError::UnsupportedSpatialDim(spatial_dim)),
    }
}

/// Quality of every cell in the mesh.
pub fn mesh_qualities(mesh: &Mesh) -> Result<Vec<f64>, MeshCoarsenError> {
    let dim = mesh.dim();
    let spatial = mesh.spatial_dim()?;
    let coords = mesh.coords()?;
    let arity = Mesh::arity(dim);
    mesh.verts_of(dim)?
        .chunks_exact(arity)
        .map(|cell| cell_quality(dim, spatial, coords, cell))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equilateral_triangle_scores_one() {
        let h = 3.0_f64.sqrt() / 2.0;
        let q = tri_quality(&[[0.0, 0.0], [1.0, 0.0], [0.5, h]]);
        assert!((q - 1.0).abs() < 1e-12, "q = {q}");
    }

    #[test]
    fn right_isoceles_triangle_quality() {
        let q = tri_quality(&[[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]]);
        assert!((q - 0.866_025_403_784_438_6).abs() < 1e-15, "q = {q}");
    }

    #[test]
    fn inverted_triangle_scores_negative() {
        let q = tri_quality(&[[0.0, 0.0], [0.0, 1.0], [1.0, 0.0]]);
        assert!(q < 0.0);
    }

    #[test]
    fn degenerate_triangle_scores_zero() {
        let q = tri_quality(&[[0.0, 0.0], [1.0, 0.0], [2.0, 0.0]]);
        assert_eq!(q, 0.0);
    }

    #[test]
    fn regular_tet_scores_one() {
        // Alternate vertices of the unit cube form a regular tetrahedron;
        // this ordering has positive signed volume.
        let q = tet_quality(&[
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 1.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 1.0],
        ]);
        assert!((q - 1.0).abs() < 1e-12, "q = {q}");
    }

    #[test]
    fn inverted_tet_scores_negative() {
        // Same tetrahedron with two vertices swapped, so the signed volume
        // flips and the quality comes back negated.
        let q = tet_quality(&[
            [0.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [1.0, 0.0, 1.0],
            [0.0, 1.0, 1.0],
        ]);
        assert!((q + 1.0).abs() < 1e-12, "q = {q}");
    }

    #[test]
    fn flat_tet_scores_zero() {
        let q = tet_quality(&[
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [1.0, 1.0, 0.0],
        ]);
        assert_eq!(q, 0.0);
    }

    #[test]
    fn mismatched_embedding_is_rejected() {
        let err = cell_quality(2, 3, &[0.0; 9], &[0, 1, 2]).unwrap_err();
        assert_eq!(err, MeshCoarsenError::UnsupportedSpatialDim(3));
    }
}
