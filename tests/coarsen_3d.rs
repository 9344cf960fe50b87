//! Tetrahedral coarsening: a cap tet collapses away, leaving its neighbor.

use std::sync::Arc;

use mesh_coarsen::algs::communicator::NoComm;
use mesh_coarsen::coarsen::coarsen_by_vertex_marks;
use mesh_coarsen::compare::verify_global_partition;
use mesh_coarsen::topology::mesh::{Mesh, COORDINATES};

/// Two tets sharing the face (1,2,3), with vertex 4 capping the second.
fn double_tet() -> Mesh {
    let mut mesh = Mesh::from_cells(
        Arc::new(NoComm),
        3,
        5,
        vec![0, 1, 2, 3, 1, 2, 3, 4],
    )
    .unwrap();
    mesh.add_tag(
        0,
        COORDINATES,
        3,
        vec![
            0.0, 0.0, 0.0, //
            1.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, //
            0.0, 0.0, 1.0, //
            1.0, 1.0, 1.0,
        ],
    )
    .unwrap();
    mesh
}

#[test]
fn cap_vertex_collapses_into_the_shared_face() {
    let mut mesh = double_tet();
    assert_eq!(mesh.nents(1).unwrap(), 9);
    assert_eq!(mesh.nents(2).unwrap(), 7);
    // Removing the cap leaves no cell around it outside the collapsing
    // edge's cavity, so the prediction is zero and only a zero floor
    // admits it.
    let marks = [false, false, false, false, true];
    assert!(coarsen_by_vertex_marks(&mut mesh, &marks, 0.0, false).unwrap());
    assert_eq!(mesh.nverts(), 4);
    assert_eq!(mesh.nents(1).unwrap(), 6);
    assert_eq!(mesh.nents(2).unwrap(), 4);
    assert_eq!(mesh.ncells(), 1);
    assert_eq!(mesh.verts_of(3).unwrap(), &[0, 1, 2, 3]);
    for d in 0..=3 {
        verify_global_partition(&mesh, d).unwrap();
    }
}

#[test]
fn floor_blocks_the_cap_collapse() {
    let mut mesh = double_tet();
    let marks = [false, false, false, false, true];
    assert!(!coarsen_by_vertex_marks(&mut mesh, &marks, 0.5, false).unwrap());
    assert_eq!(mesh.nverts(), 5);
    assert_eq!(mesh.ncells(), 2);
}
