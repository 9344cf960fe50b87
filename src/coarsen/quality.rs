//! Predicted cavity quality per collapse direction, and the filters that
//! clear directions failing a floor or an improvement requirement.

use crate::coarsen::collapse::{collapses, dont_collapse};
use crate::geometry::quality::cell_quality;
use crate::mesh_error::MeshCoarsenError;
use crate::topology::mesh::Mesh;

/// Filler for directions a code does not permit.
pub const NO_QUALITY: f64 = -1.0;

/// Predict, for each permitted direction of each candidate, the minimum
/// quality of the cells that remain after the collapse (the cells around
/// the removed vertex outside the collapsing edge's cavity, re-evaluated
/// with the removed vertex at the opposite endpoint's position).
///
/// A direction that leaves no cell at all scores 0, so it passes only a
/// zero acceptance floor. Output is two values per candidate, the
/// non-permitted slots holding [`NO_QUALITY`].
pub fn coarsen_qualities(
    mesh: &Mesh,
    cands2edges: &[usize],
    cand_codes: &[i8],
) -> Result<Vec<f64>, MeshCoarsenError> {
    let dim = mesh.dim();
    let spatial = mesh.spatial_dim()?;
    let coords = mesh.coords()?;
    let edges2verts = mesh.verts_of(1)?;
    let cells2verts = mesh.verts_of(dim)?;
    let cell_arity = Mesh::arity(dim);
    let verts2cells = mesh.ask_up(dim)?;

    let mut quals = vec![NO_QUALITY; cands2edges.len() * 2];
    let mut moved = vec![0.0; cell_arity * spatial];
    for (cand, &edge) in cands2edges.iter().enumerate() {
        for eev in 0..2 {
            if !collapses(cand_codes[cand], eev) {
                continue;
            }
            let v = edges2verts[edge * 2 + eev];
            let o = edges2verts[edge * 2 + (1 - eev)];
            let mut min_qual = f64::INFINITY;
            let mut any = false;
            for &c in verts2cells.row(v) {
                let cell = &cells2verts[c * cell_arity..(c + 1) * cell_arity];
                if cell.contains(&o) {
                    continue;
                }
                for (k, &x) in cell.iter().enumerate() {
                    let src = if x == v { o } else { x };
                    moved[k * spatial..(k + 1) * spatial]
                        .copy_from_slice(&coords[src * spatial..(src + 1) * spatial]);
                }
                let q = moved_cell_quality(dim, spatial, &moved)?;
                min_qual = min_qual.min(q);
                any = true;
            }
            quals[cand * 2 + eev] = if any { min_qual } else { 0.0 };
        }
    }
    Ok(quals)
}

fn moved_cell_quality(
    dim: usize,
    spatial: usize,
    moved: &[f64],
) -> Result<f64, MeshCoarsenError> {
    // Positions are already gathered; feed them through with identity locals.
    let idx: [usize; 4] = [0, 1, 2, 3];
    cell_quality(dim, spatial, moved, &idx[..dim + 1])
}

/// Clear every direction whose predicted quality falls below the floor.
pub fn filter_coarsen_min_qual(
    min_qual: f64,
    cand_codes: &[i8],
    cand_quals: &[f64],
) -> Vec<i8> {
    cand_codes
        .iter()
        .enumerate()
        .map(|(cand, &code)| {
            let mut out = code;
            for eev in 0..2 {
                if collapses(out, eev) && cand_quals[cand * 2 + eev] < min_qual {
                    out = dont_collapse(out, eev);
                }
            }
            out
        })
        .collect()
}

/// Clear every direction that does not strictly improve on the present
/// minimum quality of the cells around the vertex it would remove.
pub fn filter_coarsen_improve(
    mesh: &Mesh,
    cands2edges: &[usize],
    cand_codes: &[i8],
    cand_quals: &[f64],
) -> Result<Vec<i8>, MeshCoarsenError> {
    let dim = mesh.dim();
    let spatial = mesh.spatial_dim()?;
    let coords = mesh.coords()?;
    let edges2verts = mesh.verts_of(1)?;
    let cells2verts = mesh.verts_of(dim)?;
    let cell_arity = Mesh::arity(dim);
    let verts2cells = mesh.ask_up(dim)?;

    let mut out = cand_codes.to_vec();
    for (cand, &edge) in cands2edges.iter().enumerate() {
        for eev in 0..2 {
            if !collapses(out[cand], eev) {
                continue;
            }
            let v = edges2verts[edge * 2 + eev];
            let mut old_min = f64::INFINITY;
            for &c in verts2cells.row(v) {
                let cell = &cells2verts[c * cell_arity..(c + 1) * cell_arity];
                old_min = old_min.min(cell_quality(dim, spatial, coords, cell)?);
            }
            if !(cand_quals[cand * 2 + eev] > old_min) {
                out[cand] = dont_collapse(out[cand], eev);
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::NoComm;
    use crate::coarsen::collapse::{COLLAPSE_BOTH, DONT_COLLAPSE};
    use crate::topology::mesh::COORDINATES;
    use std::sync::Arc;

    fn quad_mesh() -> Mesh {
        let mut mesh =
            Mesh::from_cells(Arc::new(NoComm), 2, 4, vec![0, 1, 2, 0, 2, 3]).unwrap();
        mesh.add_tag(
            0,
            COORDINATES,
            2,
            vec![0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0],
        )
        .unwrap();
        mesh
    }

    fn fan_mesh(center: [f64; 2]) -> Mesh {
        let mut mesh = Mesh::from_cells(
            Arc::new(NoComm),
            2,
            5,
            vec![0, 1, 4, 1, 2, 4, 2, 3, 4, 3, 0, 4],
        )
        .unwrap();
        mesh.add_tag(
            0,
            COORDINATES,
            2,
            vec![0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0, center[0], center[1]],
        )
        .unwrap();
        mesh
    }

    #[test]
    fn empty_cavity_scores_zero() {
        // Collapsing the quad diagonal in either direction leaves no cell.
        let mesh = quad_mesh();
        let quals = coarsen_qualities(&mesh, &[2], &[COLLAPSE_BOTH]).unwrap();
        assert_eq!(quals, vec![0.0, 0.0]);
    }

    #[test]
    fn fan_collapse_scores_remaining_ring() {
        let mesh = fan_mesh([0.5, 0.5]);
        // Edge (0,4) is index 2 in first-seen order (0-1, 1-4, 4-0, ...).
        let edges2verts = mesh.verts_of(1).unwrap();
        let e = edges2verts
            .chunks_exact(2)
            .position(|ev| {
                let mut s = [ev[0], ev[1]];
                s.sort_unstable();
                s == [0, 4]
            })
            .unwrap();
        let eev = if edges2verts[e * 2] == 4 { 0 } else { 1 };
        let code = 1 << eev;
        let quals = coarsen_qualities(&mesh, &[e], &[code]).unwrap();
        // Removing the symmetric center leaves two right isoceles halves.
        assert!((quals[eev] - 0.866_025_403_784_438_6).abs() < 1e-15);
        assert_eq!(quals[1 - eev], NO_QUALITY);
    }

    #[test]
    fn min_qual_filter_uses_a_strict_floor() {
        let codes = vec![COLLAPSE_BOTH];
        let quals = vec![0.0, 0.0];
        assert_eq!(filter_coarsen_min_qual(0.0, &codes, &quals), vec![COLLAPSE_BOTH]);
        assert_eq!(filter_coarsen_min_qual(0.99, &codes, &quals), vec![DONT_COLLAPSE]);
    }

    #[test]
    fn improve_filter_blocks_lateral_moves() {
        // Center exactly at the quad midpoint: the predicted quality equals
        // the present one bit for bit, so no direction strictly improves.
        let mesh = fan_mesh([0.5, 0.5]);
        let edges2verts = mesh.verts_of(1).unwrap();
        let mut cands = Vec::new();
        let mut codes = Vec::new();
        for (e, ev) in edges2verts.chunks_exact(2).enumerate() {
            for eev in 0..2 {
                if ev[eev] == 4 {
                    cands.push(e);
                    codes.push(1i8 << eev);
                }
            }
        }
        let quals = coarsen_qualities(&mesh, &cands, &codes).unwrap();
        let filtered = filter_coarsen_improve(&mesh, &cands, &codes, &quals).unwrap();
        assert!(filtered.iter().all(|&c| c == DONT_COLLAPSE));
    }

    #[test]
    fn improve_filter_admits_genuine_gains() {
        // An off-center vertex makes slivers; removing it improves the ring.
        let mesh = fan_mesh([0.5, 0.05]);
        let edges2verts = mesh.verts_of(1).unwrap();
        let mut cands = Vec::new();
        let mut codes = Vec::new();
        for (e, ev) in edges2verts.chunks_exact(2).enumerate() {
            for eev in 0..2 {
                if ev[eev] == 4 && ev[1 - eev] == 2 {
                    cands.push(e);
                    codes.push(1i8 << eev);
                }
            }
        }
        assert_eq!(cands.len(), 1);
        let quals = coarsen_qualities(&mesh, &cands, &codes).unwrap();
        let filtered = filter_coarsen_improve(&mesh, &cands, &codes, &quals).unwrap();
        assert_ne!(filtered[0], DONT_COLLAPSE);
    }
}
