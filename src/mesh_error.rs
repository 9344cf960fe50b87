//! MeshCoarsenError: unified error type for mesh-coarsen public APIs.
//!
//! Every fallible operation in the crate reports through this enum. Benign
//! non-progress (no eligible collapse candidates) is *not* an error; it is the
//! `Ok(false)` return of the coarsening driver. The variants here represent
//! caller contract violations or internal invariant breaches, after which the
//! mesh must be considered suspect.

use thiserror::Error;

use crate::topology::global::GlobalId;

/// Unified error type for mesh-coarsen operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MeshCoarsenError {
    /// An entity dimension outside `0..=mesh.dim()` was requested.
    #[error("entity dimension {dim} out of range for a {mesh_dim}-dimensional mesh")]
    InvalidDimension { dim: usize, mesh_dim: usize },
    /// A connectivity array length is not a multiple of the entity arity.
    #[error("connectivity for dimension {dim} has length {len}, not a multiple of arity {arity}")]
    ConnectivityLengthMismatch { dim: usize, arity: usize, len: usize },
    /// A connectivity entry references a vertex beyond the vertex count.
    #[error("dimension-{dim} entity references vertex {vert}, but the mesh has {nverts} vertices")]
    VertexOutOfBounds { dim: usize, vert: usize, nverts: usize },
    /// A per-entity array's length disagrees with the mesh's entity count.
    #[error("array `{name}` on dimension {dim} has length {found}, expected {expected}")]
    ArrayLengthMismatch {
        dim: usize,
        name: String,
        expected: usize,
        found: usize,
    },
    /// No tag with the given name exists on the given dimension.
    #[error("no tag `{name}` on dimension {dim}")]
    MissingTag { dim: usize, name: String },
    /// A tag with the given name already exists on the given dimension.
    #[error("tag `{name}` already exists on dimension {dim}")]
    DuplicateTag { dim: usize, name: String },
    /// A tag exists but holds a different element type than requested.
    #[error("tag `{name}` on dimension {dim} holds {found} values, expected {expected}")]
    TagTypeMismatch {
        dim: usize,
        name: String,
        expected: &'static str,
        found: &'static str,
    },
    /// The vertex coordinates tag is absent and a quality evaluation needs it.
    #[error("mesh has no `coordinates` tag on its vertices")]
    MissingCoordinates,
    /// The spatial dimension of the coordinates tag is unsupported.
    #[error("unsupported spatial dimension {0} (expected 2 or 3)")]
    UnsupportedSpatialDim(usize),
    /// A lower-dimensional entity implied by higher-dimensional connectivity
    /// does not exist in the mesh.
    #[error("dimension-{high_dim} entity has a dimension-{low_dim} face absent from the mesh")]
    MissingLowerEntity { high_dim: usize, low_dim: usize },
    /// Candidate qualities were published without a matching candidate list.
    #[error("collapse qualities are present without collapse codes")]
    QualitiesWithoutCodes,
    /// A key vertex has no incident candidate edge realizing its recorded
    /// collapse quality.
    #[error("key vertex {vert} has no rail edge matching its collapse quality")]
    NoRailForKey { vert: usize },
    /// A coarsen domain references a vertex that is itself collapsed away.
    #[error("coarsen domain for key vertex {key} references collapsed vertex {vert}")]
    CollapsedVertexInDomain { key: usize, vert: usize },
    /// A collective exchange produced a payload whose size does not match the
    /// agreed record layout.
    #[error("collective payload of {len} bytes is not a multiple of the {record} byte record")]
    CollectiveSizeMismatch { len: usize, record: usize },
    /// A ghost entity's identity was not found among any owner's records
    /// during global-number reconciliation.
    #[error("ghost entity of dimension {dim} has no owner record during synchronization")]
    UnresolvedGhost { dim: usize },
    /// Two ranks claim ownership of the same global id, or an id is unowned.
    #[error("global id {gid} of dimension {dim} is owned by {claims} ranks")]
    GlobalNumberingConflict {
        dim: usize,
        gid: GlobalId,
        claims: usize,
    },
}
