//! Mesh topology: entity identity, connectivity, adjacency, ownership.

pub mod adjacency;
pub mod global;
pub mod mesh;
pub mod ownership;

pub use adjacency::Csr;
pub use global::GlobalId;
pub use mesh::{Mesh, Partition};
pub use ownership::Owners;
