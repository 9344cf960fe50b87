//! Distributed simplex mesh coarsening by independent edge collapse.
//!
//! The crate owns a small distributed [`Mesh`](topology::Mesh) container
//! (entity connectivity, global numbering, ownership, named tags) and a
//! three-phase [`coarsen`](coarsen::coarsen) pass over it: screen collapse
//! candidates element-based, select a maximal independent set of key
//! vertices under quality filters while ghosted, then collapse each key
//! along its rail and rebuild the mesh with fresh global ids.
//!
//! The pass is deterministic and partition independent: running it on one
//! rank or on many produces the same coarse mesh, which
//! [`compare::meshes_topologically_equal`] can check.
//!
//! ```
//! use std::sync::Arc;
//! use mesh_coarsen::algs::communicator::NoComm;
//! use mesh_coarsen::coarsen::{coarsen, COLLAPSE_CODE};
//! use mesh_coarsen::topology::mesh::{Mesh, COORDINATES};
//!
//! // A unit quad split along its diagonal.
//! let mut mesh = Mesh::from_cells(Arc::new(NoComm), 2, 4,
//!     vec![0, 1, 2, 0, 2, 3]).unwrap();
//! mesh.add_tag(0, COORDINATES, 2,
//!     vec![0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0]).unwrap();
//! // Offer the diagonal (edge 2) in both directions.
//! mesh.add_tag(1, COLLAPSE_CODE, 1, vec![0i8, 0, 3, 0, 0]).unwrap();
//! let changed = coarsen(&mut mesh, 0.0, false).unwrap();
//! assert!(changed);
//! assert_eq!(mesh.nverts(), 3);
//! assert_eq!(mesh.ncells(), 0);
//! ```

pub mod algs;
pub mod coarsen;
pub mod compare;
pub mod data;
pub mod geometry;
pub mod mesh_error;
pub mod topology;

pub use mesh_error::MeshCoarsenError;

/// Commonly used types and entry points.
pub mod prelude {
    pub use crate::algs::communicator::{Communicator, NoComm, ThreadComm};
    pub use crate::coarsen::{coarsen, coarsen_by_vertex_marks};
    pub use crate::compare::{meshes_topologically_equal, verify_global_partition};
    pub use crate::geometry::quality::mesh_qualities;
    pub use crate::mesh_error::MeshCoarsenError;
    pub use crate::topology::global::GlobalId;
    pub use crate::topology::mesh::{Mesh, Partition, COORDINATES};
    pub use crate::topology::ownership::Owners;
}
