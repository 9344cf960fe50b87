//! Collapse codes and the per-direction admissibility checks.
//!
//! Each edge carries a 2-bit code: bit `eev` set means the endpoint at edge
//! position `eev` may be removed, sliding onto the opposite endpoint. The
//! checks in this module only ever *clear* bits; a candidate whose code
//! reaches [`DONT_COLLAPSE`] is dropped by
//! [`filter_coarsen_candidates`].

use hashbrown::HashSet;

use crate::mesh_error::MeshCoarsenError;
use crate::topology::mesh::Mesh;

/// Neither endpoint may collapse.
pub const DONT_COLLAPSE: i8 = 0;
/// Both endpoints may collapse.
pub const COLLAPSE_BOTH: i8 = 3;

/// Geometric classification tag: the dimension of the model entity each
/// mesh entity lies on.
pub const CLASS_DIM: &str = "class_dim";

/// Whether the code permits removing the endpoint at position `eev`.
#[inline]
pub fn collapses(code: i8, eev: usize) -> bool {
    code & (1 << eev) != 0
}

/// Clear the permission to remove the endpoint at position `eev`.
#[inline]
pub fn dont_collapse(code: i8, eev: usize) -> i8 {
    code & !(1 << eev)
}

/// Classification check: an endpoint may only slide along an edge that lies
/// on the same model entity it does. Meshes without classification tags
/// pass through unchanged.
pub fn check_collapse_class(
    mesh: &Mesh,
    cands2edges: &[usize],
    cand_codes: &[i8],
) -> Result<Vec<i8>, MeshCoarsenError> {
    if !(mesh.has_tag(0, CLASS_DIM) && mesh.has_tag(1, CLASS_DIM)) {
        return Ok(cand_codes.to_vec());
    }
    let vert_class = mesh.get_array::<i8>(0, CLASS_DIM)?;
    let edge_class = mesh.get_array::<i8>(1, CLASS_DIM)?;
    let edges2verts = mesh.verts_of(1)?;
    let mut out = cand_codes.to_vec();
    for (cand, &edge) in cands2edges.iter().enumerate() {
        for eev in 0..2 {
            if !collapses(out[cand], eev) {
                continue;
            }
            let vert = edges2verts[edge * 2 + eev];
            if vert_class[vert] != edge_class[edge] {
                out[cand] = dont_collapse(out[cand], eev);
            }
        }
    }
    Ok(out)
}

/// Topological admissibility of each collapse direction.
///
/// Removing `v` onto `o` is refused when it would pinch the cavity (a vertex
/// adjacent to both endpoints outside any cell spanning the collapsing edge)
/// or make a surviving side through `v` coincide with an existing side. The
/// side condition covers both folds of the exposed surface onto itself and
/// interior face duplication, where sides `{v, ...}` and `{o, ...}` share
/// their other vertices without a cell spanning the whole set.
pub fn check_collapse_exposure(
    mesh: &Mesh,
    cands2edges: &[usize],
    cand_codes: &[i8],
) -> Result<Vec<i8>, MeshCoarsenError> {
    let dim = mesh.dim();
    let edges2verts = mesh.verts_of(1)?;
    let cells2verts = mesh.verts_of(dim)?;
    let cell_arity = Mesh::arity(dim);
    let verts2edges = mesh.ask_up(1)?;
    let verts2cells = mesh.ask_up(dim)?;

    let side_dim = dim - 1;
    let sides2verts = mesh.verts_of(side_dim)?;
    let side_arity = Mesh::arity(side_dim);
    let verts2sides = mesh.ask_up(side_dim)?;
    let cells2sides = mesh.ask_down(dim, side_dim)?;
    let nsides_per_cell = Mesh::arity(dim);

    // Sorted vertex sets of every side, for collision detection.
    let side_sets: HashSet<Vec<usize>> = (0..mesh.nents(side_dim)?)
        .map(|s| {
            let mut set = sides2verts[s * side_arity..(s + 1) * side_arity].to_vec();
            set.sort_unstable();
            set
        })
        .collect();

    let mut out = cand_codes.to_vec();
    for (cand, &edge) in cands2edges.iter().enumerate() {
        for eev in 0..2 {
            if !collapses(out[cand], eev) {
                continue;
            }
            let v = edges2verts[edge * 2 + eev];
            let o = edges2verts[edge * 2 + (1 - eev)];
            if !direction_is_admissible(
                v,
                o,
                cells2verts,
                cell_arity,
                &verts2edges,
                &verts2cells,
                edges2verts,
                sides2verts,
                side_arity,
                &verts2sides,
                &cells2sides,
                nsides_per_cell,
                &side_sets,
            ) {
                out[cand] = dont_collapse(out[cand], eev);
            }
        }
    }
    Ok(out)
}

#[allow(clippy::too_many_arguments)]
fn direction_is_admissible(
    v: usize,
    o: usize,
    cells2verts: &[usize],
    cell_arity: usize,
    verts2edges: &crate::topology::Csr,
    verts2cells: &crate::topology::Csr,
    edges2verts: &[usize],
    sides2verts: &[usize],
    side_arity: usize,
    verts2sides: &crate::topology::Csr,
    cells2sides: &[usize],
    nsides_per_cell: usize,
    side_sets: &HashSet<Vec<usize>>,
) -> bool {
    let cell_verts = |c: usize| &cells2verts[c * cell_arity..(c + 1) * cell_arity];
    // Cells spanning the collapsing edge, i.e. containing both endpoints.
    let edge_cells: Vec<usize> = verts2cells
        .row(v)
        .iter()
        .copied()
        .filter(|&c| cell_verts(c).contains(&o))
        .collect();
    // Link condition: every vertex edge-adjacent to both endpoints must sit
    // in a cell spanning the edge, else the collapse pinches the mesh.
    let mut cavity_link: HashSet<usize> = HashSet::new();
    for &c in &edge_cells {
        cavity_link.extend(cell_verts(c).iter().copied());
    }
    let o_nbrs: HashSet<usize> = verts2edges
        .row(o)
        .iter()
        .map(|&e| {
            let a = edges2verts[e * 2];
            let b = edges2verts[e * 2 + 1];
            if a == o { b } else { a }
        })
        .collect();
    for &e in verts2edges.row(v) {
        let a = edges2verts[e * 2];
        let b = edges2verts[e * 2 + 1];
        let x = if a == v { b } else { a };
        if x != o && o_nbrs.contains(&x) && !cavity_link.contains(&x) {
            return false;
        }
    }
    // Side condition: a side through `v` outside the cavity survives with
    // `v` replaced by `o`; that vertex set must not already be a side. A
    // side containing both endpoints is always a face of a cavity cell, so
    // the image never degenerates here.
    let mut cavity_sides: HashSet<usize> = HashSet::new();
    for &c in &edge_cells {
        cavity_sides.extend(
            cells2sides[c * nsides_per_cell..(c + 1) * nsides_per_cell]
                .iter()
                .copied(),
        );
    }
    for &s in verts2sides.row(v) {
        if cavity_sides.contains(&s) {
            continue;
        }
        let verts = &sides2verts[s * side_arity..(s + 1) * side_arity];
        let mut image: Vec<usize> = verts
            .iter()
            .map(|&x| if x == v { o } else { x })
            .collect();
        image.sort_unstable();
        if side_sets.contains(&image) {
            return false;
        }
    }
    true
}

/// Drop candidates whose code reached [`DONT_COLLAPSE`], compacting the
/// parallel arrays in place.
pub fn filter_coarsen_candidates(
    cands2edges: &mut Vec<usize>,
    cand_codes: &mut Vec<i8>,
    mut cand_quals: Option<&mut Vec<f64>>,
) {
    let mut keep = 0;
    for i in 0..cand_codes.len() {
        if cand_codes[i] != DONT_COLLAPSE {
            cands2edges[keep] = cands2edges[i];
            cand_codes[keep] = cand_codes[i];
            if let Some(quals) = cand_quals.as_deref_mut() {
                quals[keep * 2] = quals[i * 2];
                quals[keep * 2 + 1] = quals[i * 2 + 1];
            }
            keep += 1;
        }
    }
    cands2edges.truncate(keep);
    cand_codes.truncate(keep);
    if let Some(quals) = cand_quals {
        quals.truncate(keep * 2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::NoComm;
    use std::sync::Arc;

    fn quad_mesh() -> Mesh {
        let mut mesh =
            Mesh::from_cells(Arc::new(NoComm), 2, 4, vec![0, 1, 2, 0, 2, 3]).unwrap();
        mesh.add_tag(
            0,
            crate::topology::mesh::COORDINATES,
            2,
            vec![0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0],
        )
        .unwrap();
        mesh
    }

    #[test]
    fn code_bits() {
        assert!(collapses(COLLAPSE_BOTH, 0));
        assert!(collapses(COLLAPSE_BOTH, 1));
        assert!(!collapses(DONT_COLLAPSE, 0));
        assert_eq!(dont_collapse(COLLAPSE_BOTH, 0), 2);
        assert_eq!(dont_collapse(COLLAPSE_BOTH, 1), 1);
    }

    #[test]
    fn class_check_passes_through_unclassified() {
        let mesh = quad_mesh();
        let cands = vec![2];
        let codes = check_collapse_class(&mesh, &cands, &[COLLAPSE_BOTH]).unwrap();
        assert_eq!(codes, vec![COLLAPSE_BOTH]);
    }

    #[test]
    fn class_check_pins_model_vertices() {
        let mut mesh = quad_mesh();
        // All four corners pinned to model vertices, edges to model edges.
        mesh.add_tag(0, CLASS_DIM, 1, vec![0i8, 0, 0, 0]).unwrap();
        mesh.add_tag(1, CLASS_DIM, 1, vec![1i8; 5]).unwrap();
        let cands = vec![2];
        let codes = check_collapse_class(&mesh, &cands, &[COLLAPSE_BOTH]).unwrap();
        assert_eq!(codes, vec![DONT_COLLAPSE]);
    }

    #[test]
    fn diagonal_collapse_is_exposed_safe() {
        let mesh = quad_mesh();
        // Edge 2 is the 0-2 diagonal; both directions survive.
        let codes = check_collapse_exposure(&mesh, &[2], &[COLLAPSE_BOTH]).unwrap();
        assert_eq!(codes, vec![COLLAPSE_BOTH]);
    }

    fn edge_index(mesh: &Mesh, a: usize, b: usize) -> usize {
        mesh.verts_of(1)
            .unwrap()
            .chunks_exact(2)
            .position(|e| {
                let mut s = [e[0], e[1]];
                s.sort_unstable();
                s == [a.min(b), a.max(b)]
            })
            .unwrap()
    }

    #[test]
    fn pinch_is_refused() {
        // Triangles {0,1,2}, {0,3,1}, {0,2,4}, {1,4,2}: vertex 4 borders
        // both endpoints of edge (0,1) but no cell contains 0, 1 and 4
        // together, so joining the endpoints would pinch the mesh at 4.
        let mut mesh = Mesh::from_cells(
            Arc::new(NoComm),
            2,
            5,
            vec![0, 1, 2, 0, 3, 1, 0, 2, 4, 1, 4, 2],
        )
        .unwrap();
        mesh.add_tag(
            0,
            crate::topology::mesh::COORDINATES,
            2,
            vec![0.0, 0.0, 1.0, 0.0, 0.5, 1.0, 0.5, -1.0, 0.5, 2.0],
        )
        .unwrap();
        let e01 = edge_index(&mesh, 0, 1);
        let codes = check_collapse_exposure(&mesh, &[e01], &[COLLAPSE_BOTH]).unwrap();
        assert_eq!(codes, vec![DONT_COLLAPSE]);
    }

    #[test]
    fn boundary_fold_is_refused() {
        // Triangulated diamond with an interior vertex 2: cells {0,1,2},
        // {0,2,3}, {1,3,2}. Collapsing either endpoint of boundary edge
        // (0,1) would land exposed side (0,3) or (1,3) onto the other,
        // flattening the ring.
        let mut mesh = Mesh::from_cells(
            Arc::new(NoComm),
            2,
            4,
            vec![0, 1, 2, 0, 2, 3, 1, 3, 2],
        )
        .unwrap();
        mesh.add_tag(
            0,
            crate::topology::mesh::COORDINATES,
            2,
            vec![0.0, 0.0, 2.0, 0.0, 1.0, 1.0, 1.0, 2.0],
        )
        .unwrap();
        let e01 = edge_index(&mesh, 0, 1);
        let codes = check_collapse_exposure(&mesh, &[e01], &[COLLAPSE_BOTH]).unwrap();
        assert_eq!(codes, vec![DONT_COLLAPSE]);
        // The interior vertex collapses freely in any direction.
        let e02 = edge_index(&mesh, 0, 2);
        let codes = check_collapse_exposure(&mesh, &[e02], &[COLLAPSE_BOTH]).unwrap();
        assert!(collapses(codes[0], 1));
    }

    #[test]
    fn duplicate_face_collapse_is_refused() {
        // Tets stacked around triangles {0,2,3} and {1,2,3}: faces {0,x,y}
        // and {1,x,y} coexist for every pair x, y drawn from {1,2,3} resp.
        // {0,2,3}, yet no tet contains all four of 0, 1, x, y. Sliding
        // either endpoint of edge (0,1) onto the other, or along (0,2) or
        // (0,3), would give two sides the same vertex set.
        let mesh = Mesh::from_cells(
            Arc::new(NoComm),
            3,
            10,
            vec![
                0, 1, 2, 4, 0, 1, 3, 5, 0, 2, 3, 6, 0, 2, 3, 8, 1, 2, 3, 7, 1, 2, 3, 9,
            ],
        )
        .unwrap();
        let cands = vec![
            edge_index(&mesh, 0, 1),
            edge_index(&mesh, 0, 2),
            edge_index(&mesh, 0, 3),
            edge_index(&mesh, 0, 4),
        ];
        let codes = check_collapse_exposure(&mesh, &cands, &[COLLAPSE_BOTH; 4]).unwrap();
        // Edge (0,4) has no colliding faces; vertex 4's sides all sit in
        // the cavity of its only tet.
        assert_eq!(
            codes,
            vec![DONT_COLLAPSE, DONT_COLLAPSE, DONT_COLLAPSE, COLLAPSE_BOTH]
        );
    }

    #[test]
    fn filter_compacts_parallel_arrays() {
        let mut cands = vec![0, 1, 2, 3];
        let mut codes = vec![1, 0, 3, 0];
        let mut quals = vec![0.1, -1.0, 0.2, 0.3, 0.6, 0.7, 0.4, 0.5];
        filter_coarsen_candidates(&mut cands, &mut codes, Some(&mut quals));
        assert_eq!(cands, vec![0, 2]);
        assert_eq!(codes, vec![1, 3]);
        assert_eq!(quals, vec![0.1, -1.0, 0.6, 0.7]);
    }
}
