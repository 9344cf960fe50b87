//! Geometric measures over mesh entities.

pub mod quality;

pub use quality::{cell_quality, mesh_qualities, tet_quality, tri_quality};
