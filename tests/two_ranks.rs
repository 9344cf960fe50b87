//! The coarse mesh must not depend on how the fine mesh was partitioned:
//! a fully replicated two-rank run agrees with the single-rank result.

use std::sync::Arc;
use std::thread;

use serial_test::serial;

use mesh_coarsen::algs::communicator::{Communicator, NoComm, ThreadComm};
use mesh_coarsen::coarsen::{coarsen, COLLAPSE_CODE};
use mesh_coarsen::compare::{meshes_topologically_equal, verify_global_partition};
use mesh_coarsen::topology::mesh::{Mesh, COORDINATES};
use mesh_coarsen::topology::ownership::Owners;

fn quad_mesh(comm: Arc<dyn Communicator>) -> Mesh {
    let mut mesh = Mesh::from_cells(comm, 2, 4, vec![0, 1, 2, 0, 2, 3]).unwrap();
    mesh.add_tag(
        0,
        COORDINATES,
        2,
        vec![0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0],
    )
    .unwrap();
    // Offer the diagonal (edge 2) in both directions.
    mesh.add_tag(1, COLLAPSE_CODE, 1, vec![0i8, 0, 3, 0, 0])
        .unwrap();
    mesh
}

/// Every rank holds the whole quad; ownership is split down the middle.
fn replicated_quad(comm: Arc<dyn Communicator>) -> Mesh {
    let mut mesh = quad_mesh(comm);
    mesh.set_owners(0, Owners::from_ranks(vec![0, 0, 1, 1])).unwrap();
    mesh.set_owners(1, Owners::from_ranks(vec![0, 0, 0, 1, 1])).unwrap();
    mesh.set_owners(2, Owners::from_ranks(vec![0, 1])).unwrap();
    mesh
}

#[test]
#[serial]
fn two_ranks_match_the_serial_result() {
    let mut serial_mesh = quad_mesh(Arc::new(NoComm));
    assert!(coarsen(&mut serial_mesh, 0.0, false).unwrap());

    let handles: Vec<_> = ThreadComm::create(2)
        .into_iter()
        .map(|comm| {
            thread::spawn(move || {
                let mut mesh = replicated_quad(Arc::new(comm));
                let changed = coarsen(&mut mesh, 0.0, false).unwrap();
                assert!(changed);
                for d in 0..=2 {
                    verify_global_partition(&mesh, d).unwrap();
                }
                mesh
            })
        })
        .collect();
    for handle in handles {
        let mesh = handle.join().unwrap();
        assert_eq!(mesh.nverts(), 3);
        assert_eq!(mesh.nedges(), 2);
        assert_eq!(mesh.ncells(), 0);
        assert!(meshes_topologically_equal(&serial_mesh, &mesh).unwrap());
    }
}

#[test]
#[serial]
fn two_ranks_agree_on_refusal() {
    let handles: Vec<_> = ThreadComm::create(2)
        .into_iter()
        .map(|comm| {
            thread::spawn(move || {
                let mut mesh = replicated_quad(Arc::new(comm));
                // A floor no empty cavity can reach: both ranks back out.
                assert!(!coarsen(&mut mesh, 0.99, false).unwrap());
                mesh.nverts()
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), 4);
    }
}
