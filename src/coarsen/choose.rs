//! Fold per-direction edge candidates down to per-vertex collapse marks.

use crate::coarsen::collapse::collapses;
use crate::coarsen::quality::NO_QUALITY;
use crate::mesh_error::MeshCoarsenError;
use crate::topology::mesh::Mesh;

/// For each vertex, whether any surviving candidate direction removes it,
/// and the best (highest) predicted quality among those directions.
///
/// Vertices with no direction keep a quality of [`NO_QUALITY`].
pub fn choose_vertex_collapses(
    mesh: &Mesh,
    cands2edges: &[usize],
    cand_codes: &[i8],
    cand_quals: &[f64],
) -> Result<(Vec<bool>, Vec<f64>), MeshCoarsenError> {
    let edges2verts = mesh.verts_of(1)?;
    let nverts = mesh.nverts();
    let mut marks = vec![false; nverts];
    let mut quals = vec![NO_QUALITY; nverts];
    for (cand, &edge) in cands2edges.iter().enumerate() {
        for eev in 0..2 {
            if !collapses(cand_codes[cand], eev) {
                continue;
            }
            let v = edges2verts[edge * 2 + eev];
            marks[v] = true;
            if cand_quals[cand * 2 + eev] > quals[v] {
                quals[v] = cand_quals[cand * 2 + eev];
            }
        }
    }
    Ok((marks, quals))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::NoComm;
    use crate::coarsen::collapse::COLLAPSE_BOTH;
    use std::sync::Arc;

    #[test]
    fn best_direction_wins_per_vertex() {
        let mesh = Mesh::from_cells(Arc::new(NoComm), 2, 4, vec![0, 1, 2, 0, 2, 3]).unwrap();
        // Candidates on edges (0,1) and (2,0): vertex 0 appears twice.
        let cands = vec![0, 2];
        let codes = vec![COLLAPSE_BOTH, COLLAPSE_BOTH];
        let quals = vec![0.3, 0.5, 0.7, 0.2];
        let (marks, vq) = choose_vertex_collapses(&mesh, &cands, &codes, &quals).unwrap();
        assert_eq!(marks, vec![true, true, true, false]);
        // Edge 0 is (0,1), edge 2 is (2,0): vertex 0 takes max(0.3, 0.2).
        assert_eq!(vq[0], 0.3);
        assert_eq!(vq[1], 0.5);
        assert_eq!(vq[2], 0.7);
        assert_eq!(vq[3], NO_QUALITY);
    }
}
