//! The distributed simplex mesh container.
//!
//! A [`Mesh`] holds, per entity dimension `0..=dim`: the entity count, flat
//! vertex connectivity (`d + 1` vertex locals per `d`-entity), one
//! [`GlobalId`] per entity, an [`Owners`] table, and a [`TagStore`] of named
//! attribute arrays. Connectivity to intermediate dimensions and upward
//! adjacency are derived on demand.
//!
//! This container keeps all locally known copies (owned and ghost) resident;
//! [`Mesh::set_partition`] switches the partition *view* the algorithms
//! assume, and the explicit [`Mesh::sync_tag`] collective reconciles ghost
//! attribute values from their owners.

use std::fmt;
use std::sync::Arc;

use hashbrown::HashMap;

use crate::algs::communicator::Communicator;
use crate::data::tags::{TagData, TagStore, TagValue};
use crate::mesh_error::MeshCoarsenError;
use crate::topology::adjacency::{Csr, derive_down, invert_connectivity, simplex_subs};
use crate::topology::global::GlobalId;
use crate::topology::ownership::Owners;

/// Name of the vertex coordinates tag.
pub const COORDINATES: &str = "coordinates";

/// Which partition view the mesh currently presents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Partition {
    /// Disjoint ownership: every entity counted on exactly one rank.
    ElementBased,
    /// Halo-replicated: boundary neighborhoods visible on adjacent ranks.
    Ghosted,
}

#[derive(Clone)]
struct DimData {
    n: usize,
    /// Flat vertex connectivity, `dim + 1` locals per entity; empty for
    /// dimension 0.
    verts: Vec<usize>,
    globals: Vec<GlobalId>,
    owners: Owners,
    tags: TagStore,
}

impl DimData {
    fn empty(dim: usize) -> Self {
        Self {
            n: 0,
            verts: Vec::new(),
            globals: Vec::new(),
            owners: Owners::default(),
            tags: TagStore::new(dim),
        }
    }
}

/// A distributed simplex mesh of topological dimension 2 or 3.
#[derive(Clone)]
pub struct Mesh {
    comm: Arc<dyn Communicator>,
    dim: usize,
    partition: Partition,
    dims: Vec<DimData>,
}

impl fmt::Debug for Mesh {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: Vec<usize> = self.dims.iter().map(|d| d.n).collect();
        f.debug_struct("Mesh")
            .field("dim", &self.dim)
            .field("partition", &self.partition)
            .field("counts", &counts)
            .finish()
    }
}

impl Mesh {
    /// An empty mesh of topological dimension `dim` (2 or 3).
    pub fn new(comm: Arc<dyn Communicator>, dim: usize) -> Result<Self, MeshCoarsenError> {
        if !(2..=3).contains(&dim) {
            return Err(MeshCoarsenError::InvalidDimension { dim, mesh_dim: dim });
        }
        Ok(Self {
            comm,
            dim,
            partition: Partition::ElementBased,
            dims: (0..=dim).map(DimData::empty).collect(),
        })
    }

    /// An empty mesh sharing this mesh's communicator, dimension and
    /// partition mode; used to accumulate a reconstruction.
    pub fn new_like(&self) -> Self {
        Self {
            comm: self.comm.clone(),
            dim: self.dim,
            partition: self.partition,
            dims: (0..=self.dim).map(DimData::empty).collect(),
        }
    }

    /// Build a mesh from cells alone, deriving every intermediate dimension
    /// in deterministic first-seen order. All entities start owned by the
    /// local rank with local-index globals; multi-rank callers override both
    /// via [`Mesh::set_globals`] and [`Mesh::set_owners`].
    pub fn from_cells(
        comm: Arc<dyn Communicator>,
        dim: usize,
        nverts: usize,
        cells2verts: Vec<usize>,
    ) -> Result<Self, MeshCoarsenError> {
        let mut mesh = Mesh::new(comm, dim)?;
        let rank = mesh.comm.rank();
        mesh.set_ents(
            0,
            nverts,
            Vec::new(),
            (0..nverts as u64).map(GlobalId::new).collect(),
            Owners::all_owned_by(nverts, rank),
        )?;
        for sub_dim in 1..dim {
            let subs2verts = first_seen_subs(dim, sub_dim, &cells2verts)?;
            let n = subs2verts.len() / (sub_dim + 1);
            mesh.set_ents(
                sub_dim,
                n,
                subs2verts,
                (0..n as u64).map(GlobalId::new).collect(),
                Owners::all_owned_by(n, rank),
            )?;
        }
        let ncells = cells2verts.len() / (dim + 1);
        mesh.set_ents(
            dim,
            ncells,
            cells2verts,
            (0..ncells as u64).map(GlobalId::new).collect(),
            Owners::all_owned_by(ncells, rank),
        )?;
        Ok(mesh)
    }

    fn dim_data(&self, d: usize) -> Result<&DimData, MeshCoarsenError> {
        self.dims.get(d).ok_or(MeshCoarsenError::InvalidDimension {
            dim: d,
            mesh_dim: self.dim,
        })
    }

    fn dim_data_mut(&mut self, d: usize) -> Result<&mut DimData, MeshCoarsenError> {
        let mesh_dim = self.dim;
        self.dims
            .get_mut(d)
            .ok_or(MeshCoarsenError::InvalidDimension { dim: d, mesh_dim })
    }

    /// Topological dimension.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// The communicator handle.
    pub fn comm(&self) -> &Arc<dyn Communicator> {
        &self.comm
    }

    /// Current partition view.
    pub fn partition(&self) -> Partition {
        self.partition
    }

    /// Switch the partition view. Collective.
    pub fn set_partition(&mut self, partition: Partition) {
        if self.partition != partition {
            log::trace!("switching partition view to {:?}", partition);
            self.partition = partition;
        }
        self.comm.barrier();
    }

    /// Entity count for one dimension.
    pub fn nents(&self, d: usize) -> Result<usize, MeshCoarsenError> {
        Ok(self.dim_data(d)?.n)
    }

    /// Vertex count.
    pub fn nverts(&self) -> usize {
        self.dims[0].n
    }

    /// Edge count.
    pub fn nedges(&self) -> usize {
        self.dims[1].n
    }

    /// Top-dimensional cell count.
    pub fn ncells(&self) -> usize {
        self.dims[self.dim].n
    }

    /// Vertices per entity of dimension `d`.
    pub fn arity(d: usize) -> usize {
        d + 1
    }

    /// Flat vertex connectivity of dimension `d` (`d >= 1`).
    pub fn verts_of(&self, d: usize) -> Result<&[usize], MeshCoarsenError> {
        Ok(&self.dim_data(d)?.verts)
    }

    /// Upward adjacency: for each vertex, the `d`-entities containing it.
    pub fn ask_up(&self, d: usize) -> Result<Csr, MeshCoarsenError> {
        let data = self.dim_data(d)?;
        Ok(invert_connectivity(self.nverts(), Mesh::arity(d), &data.verts))
    }

    /// Derived `high -> low` connectivity by vertex-tuple matching.
    pub fn ask_down(&self, high: usize, low: usize) -> Result<Vec<usize>, MeshCoarsenError> {
        let high_verts = self.verts_of(high)?;
        let low_verts = self.verts_of(low)?;
        derive_down(high, low, high_verts, low_verts)
    }

    /// Replace dimension `d` wholesale: count, connectivity, globals, owners.
    pub fn set_ents(
        &mut self,
        d: usize,
        n: usize,
        verts: Vec<usize>,
        globals: Vec<GlobalId>,
        owners: Owners,
    ) -> Result<(), MeshCoarsenError> {
        let arity = Mesh::arity(d);
        if d > 0 {
            if verts.len() != n * arity {
                return Err(MeshCoarsenError::ConnectivityLengthMismatch {
                    dim: d,
                    arity,
                    len: verts.len(),
                });
            }
            let nverts = self.nverts();
            if let Some(&v) = verts.iter().find(|&&v| v >= nverts) {
                return Err(MeshCoarsenError::VertexOutOfBounds {
                    dim: d,
                    vert: v,
                    nverts,
                });
            }
        }
        if globals.len() != n {
            return Err(MeshCoarsenError::ArrayLengthMismatch {
                dim: d,
                name: "globals".into(),
                expected: n,
                found: globals.len(),
            });
        }
        if owners.len() != n {
            return Err(MeshCoarsenError::ArrayLengthMismatch {
                dim: d,
                name: "owners".into(),
                expected: n,
                found: owners.len(),
            });
        }
        let data = self.dim_data_mut(d)?;
        data.n = n;
        data.verts = verts;
        data.globals = globals;
        data.owners = owners;
        Ok(())
    }

    /// Global ids of dimension `d`.
    pub fn globals(&self, d: usize) -> Result<&[GlobalId], MeshCoarsenError> {
        Ok(&self.dim_data(d)?.globals)
    }

    /// Replace the global ids of dimension `d`.
    pub fn set_globals(&mut self, d: usize, globals: Vec<GlobalId>) -> Result<(), MeshCoarsenError> {
        let n = self.dim_data(d)?.n;
        if globals.len() != n {
            return Err(MeshCoarsenError::ArrayLengthMismatch {
                dim: d,
                name: "globals".into(),
                expected: n,
                found: globals.len(),
            });
        }
        self.dim_data_mut(d)?.globals = globals;
        Ok(())
    }

    /// Ownership table of dimension `d`.
    pub fn owners(&self, d: usize) -> Result<&Owners, MeshCoarsenError> {
        Ok(&self.dim_data(d)?.owners)
    }

    /// Replace the ownership table of dimension `d`.
    pub fn set_owners(&mut self, d: usize, owners: Owners) -> Result<(), MeshCoarsenError> {
        let n = self.dim_data(d)?.n;
        if owners.len() != n {
            return Err(MeshCoarsenError::ArrayLengthMismatch {
                dim: d,
                name: "owners".into(),
                expected: n,
                found: owners.len(),
            });
        }
        self.dim_data_mut(d)?.owners = owners;
        Ok(())
    }

    /// Add a typed tag on dimension `d`.
    pub fn add_tag<T: TagValue>(
        &mut self,
        d: usize,
        name: &str,
        ncomps: usize,
        values: Vec<T>,
    ) -> Result<(), MeshCoarsenError> {
        let n = self.dim_data(d)?.n;
        self.dim_data_mut(d)?.tags.add(name, ncomps, n, values)
    }

    /// Borrow a tag's values.
    pub fn get_array<T: TagValue>(&self, d: usize, name: &str) -> Result<&[T], MeshCoarsenError> {
        self.dim_data(d)?.tags.get(name)
    }

    /// Remove a tag, returning its values.
    pub fn remove_tag<T: TagValue>(
        &mut self,
        d: usize,
        name: &str,
    ) -> Result<Vec<T>, MeshCoarsenError> {
        self.dim_data_mut(d)?.tags.remove(name)
    }

    /// Whether a tag exists on dimension `d`.
    pub fn has_tag(&self, d: usize, name: &str) -> bool {
        self.dim_data(d).map(|dd| dd.tags.has(name)).unwrap_or(false)
    }

    /// Component count of a tag.
    pub fn tag_ncomps(&self, d: usize, name: &str) -> Result<usize, MeshCoarsenError> {
        self.dim_data(d)?.tags.ncomps(name)
    }

    /// The tag store of dimension `d`.
    pub fn tags(&self, d: usize) -> Result<&TagStore, MeshCoarsenError> {
        Ok(&self.dim_data(d)?.tags)
    }

    /// Vertex coordinates (flat, `spatial_dim` components per vertex).
    pub fn coords(&self) -> Result<&[f64], MeshCoarsenError> {
        self.get_array::<f64>(0, COORDINATES)
            .map_err(|_| MeshCoarsenError::MissingCoordinates)
    }

    /// Spatial dimension of the coordinates tag.
    pub fn spatial_dim(&self) -> Result<usize, MeshCoarsenError> {
        self.tag_ncomps(0, COORDINATES)
            .map_err(|_| MeshCoarsenError::MissingCoordinates)
    }

    /// Overwrite ghost copies' values of a per-entity word array from their
    /// owners. Collective; record layout is `(global id, words...)`.
    pub(crate) fn sync_words(
        &self,
        d: usize,
        width: usize,
        words: &mut [u64],
    ) -> Result<(), MeshCoarsenError> {
        if self.comm.size() == 1 {
            return Ok(());
        }
        let data = self.dim_data(d)?;
        if words.len() != data.n * width {
            return Err(MeshCoarsenError::ArrayLengthMismatch {
                dim: d,
                name: "sync".into(),
                expected: data.n * width,
                found: words.len(),
            });
        }
        let my_rank = self.comm.rank();
        let record = (1 + width) * 8;
        let mut buf = Vec::new();
        for i in data.owners.owned(my_rank) {
            buf.extend_from_slice(&data.globals[i].get().to_le_bytes());
            for k in 0..width {
                buf.extend_from_slice(&words[i * width + k].to_le_bytes());
            }
        }
        let payloads = self.comm.allgather_bytes(&buf);
        let mut by_gid: HashMap<u64, Vec<u64>> = HashMap::new();
        for payload in &payloads {
            if payload.len() % record != 0 {
                return Err(MeshCoarsenError::CollectiveSizeMismatch {
                    len: payload.len(),
                    record,
                });
            }
            for chunk in payload.chunks_exact(record) {
                let mut word = [0u8; 8];
                word.copy_from_slice(&chunk[..8]);
                let gid = u64::from_le_bytes(word);
                let vals = chunk[8..]
                    .chunks_exact(8)
                    .map(|c| {
                        word.copy_from_slice(c);
                        u64::from_le_bytes(word)
                    })
                    .collect();
                by_gid.insert(gid, vals);
            }
        }
        for i in 0..data.n {
            if data.owners.is_ghost(i, my_rank) {
                let vals = by_gid
                    .get(&data.globals[i].get())
                    .ok_or(MeshCoarsenError::UnresolvedGhost { dim: d })?;
                words[i * width..(i + 1) * width].copy_from_slice(vals);
            }
        }
        Ok(())
    }

    /// Reconcile a tag's ghost values from their owners. Collective.
    pub fn sync_tag(&mut self, d: usize, name: &str) -> Result<(), MeshCoarsenError> {
        if self.comm.size() == 1 {
            return Ok(());
        }
        let width = self.tag_ncomps(d, name)?;
        let mut words: Vec<u64> = match self.dim_data(d)?.tags.data_ref(name)? {
            TagData::I8(v) => v.iter().map(|&x| (x as i64) as u64).collect(),
            TagData::I32(v) => v.iter().map(|&x| (x as i64) as u64).collect(),
            TagData::I64(v) => v.iter().map(|&x| x as u64).collect(),
            TagData::F64(v) => v.iter().map(|&x| x.to_bits()).collect(),
        };
        self.sync_words(d, width, &mut words)?;
        match self.dim_data_mut(d)?.tags.data_mut(name)? {
            TagData::I8(v) => {
                for (x, &w) in v.iter_mut().zip(&words) {
                    *x = w as i64 as i8;
                }
            }
            TagData::I32(v) => {
                for (x, &w) in v.iter_mut().zip(&words) {
                    *x = w as i64 as i32;
                }
            }
            TagData::I64(v) => {
                for (x, &w) in v.iter_mut().zip(&words) {
                    *x = w as i64;
                }
            }
            TagData::F64(v) => {
                for (x, &w) in v.iter_mut().zip(&words) {
                    *x = f64::from_bits(w);
                }
            }
        }
        Ok(())
    }

    /// Commit the ownership reassignment implied by an independent set of
    /// key vertices: each key, and every entity adjacent to it, becomes
    /// owned by the lowest rank holding a copy of the key. Collective.
    pub fn set_owners_by_indset(
        &mut self,
        d: usize,
        keys2verts: &[usize],
    ) -> Result<(), MeshCoarsenError> {
        if d != 0 {
            return Err(MeshCoarsenError::InvalidDimension {
                dim: d,
                mesh_dim: self.dim,
            });
        }
        if self.comm.size() == 1 {
            return Ok(());
        }
        let my_rank = self.comm.rank();
        // Advertise every locally held key copy, then agree on the lowest
        // rank per key global id.
        let mut buf = Vec::new();
        for &v in keys2verts {
            buf.extend_from_slice(&self.dims[0].globals[v].get().to_le_bytes());
            buf.extend_from_slice(&(my_rank as u64).to_le_bytes());
        }
        let payloads = self.comm.allgather_bytes(&buf);
        let mut lowest: HashMap<u64, usize> = HashMap::new();
        for payload in &payloads {
            if payload.len() % 16 != 0 {
                return Err(MeshCoarsenError::CollectiveSizeMismatch {
                    len: payload.len(),
                    record: 16,
                });
            }
            for chunk in payload.chunks_exact(16) {
                let mut word = [0u8; 8];
                word.copy_from_slice(&chunk[..8]);
                let gid = u64::from_le_bytes(word);
                word.copy_from_slice(&chunk[8..]);
                let rank = u64::from_le_bytes(word) as usize;
                lowest
                    .entry(gid)
                    .and_modify(|r| *r = (*r).min(rank))
                    .or_insert(rank);
            }
        }
        let ups: Vec<Csr> = (1..=self.dim)
            .map(|ent_dim| self.ask_up(ent_dim))
            .collect::<Result<_, _>>()?;
        for &v in keys2verts {
            let gid = self.dims[0].globals[v].get();
            let winner = lowest.get(&gid).copied().unwrap_or(my_rank);
            self.dims[0].owners.set_rank(v, winner);
            for (ent_dim, up) in ups.iter().enumerate() {
                for &e in up.row(v) {
                    self.dims[ent_dim + 1].owners.set_rank(e, winner);
                }
            }
        }
        Ok(())
    }
}

/// Enumerate the `sub_dim`-faces of all cells in deterministic first-seen
/// order, deduplicated by sorted vertex tuple.
fn first_seen_subs(
    cell_dim: usize,
    sub_dim: usize,
    cells2verts: &[usize],
) -> Result<Vec<usize>, MeshCoarsenError> {
    let cell_arity = cell_dim + 1;
    let subs = simplex_subs(cell_dim, sub_dim).ok_or(MeshCoarsenError::InvalidDimension {
        dim: sub_dim,
        mesh_dim: cell_dim,
    })?;
    let mut seen: HashMap<Vec<usize>, usize> = HashMap::new();
    let mut out = Vec::new();
    for cell in cells2verts.chunks_exact(cell_arity) {
        for sub in subs {
            let verts: Vec<usize> = sub.iter().map(|&i| cell[i]).collect();
            let mut key = verts.clone();
            key.sort_unstable();
            let next = seen.len();
            if let hashbrown::hash_map::Entry::Vacant(e) = seen.entry(key) {
                e.insert(next);
                out.extend_from_slice(&verts);
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::NoComm;

    fn quad_mesh() -> Mesh {
        // Unit quad split by the 0-2 diagonal into two triangles.
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

    #[test]
    fn from_cells_derives_edges() {
        let mesh = quad_mesh();
        assert_eq!(mesh.nverts(), 4);
        assert_eq!(mesh.nedges(), 5);
        assert_eq!(mesh.ncells(), 2);
        // First-seen order: (0,1),(1,2),(2,0),(2,3),(3,0).
        assert_eq!(
            mesh.verts_of(1).unwrap(),
            &[0, 1, 1, 2, 2, 0, 2, 3, 3, 0]
        );
    }

    #[test]
    fn up_adjacency_is_consistent() {
        let mesh = quad_mesh();
        let v2c = mesh.ask_up(2).unwrap();
        assert_eq!(v2c.row(0), &[0, 1]);
        assert_eq!(v2c.row(1), &[0]);
        let v2e = mesh.ask_up(1).unwrap();
        assert_eq!(v2e.row(2), &[1, 2, 3]);
    }

    #[test]
    fn down_adjacency_matches_templates() {
        let mesh = quad_mesh();
        let c2e = mesh.ask_down(2, 1).unwrap();
        // Triangle 0 = {0,1,2}: edges (0,1),(1,2),(2,0) -> 0,1,2.
        assert_eq!(&c2e[..3], &[0, 1, 2]);
        // Triangle 1 = {0,2,3}: edges (0,2),(2,3),(3,0) -> 2,3,4.
        assert_eq!(&c2e[3..], &[2, 3, 4]);
    }

    #[test]
    fn down_adjacency_rejects_untemplated_pairs() {
        let mesh = quad_mesh();
        let err = mesh.ask_down(2, 2).unwrap_err();
        assert_eq!(
            err,
            MeshCoarsenError::InvalidDimension {
                dim: 2,
                mesh_dim: 2
            }
        );
    }

    #[test]
    fn coords_roundtrip() {
        let mesh = quad_mesh();
        assert_eq!(mesh.spatial_dim().unwrap(), 2);
        assert_eq!(mesh.coords().unwrap().len(), 8);
        let bare = Mesh::new(Arc::new(NoComm), 2).unwrap();
        assert_eq!(bare.coords().unwrap_err(), MeshCoarsenError::MissingCoordinates);
    }

    #[test]
    fn bad_connectivity_is_rejected() {
        let err = Mesh::from_cells(Arc::new(NoComm), 2, 2, vec![0, 1, 2]).unwrap_err();
        assert!(matches!(err, MeshCoarsenError::VertexOutOfBounds { .. }));
    }

    #[test]
    fn partition_switch_is_sticky() {
        let mut mesh = quad_mesh();
        assert_eq!(mesh.partition(), Partition::ElementBased);
        mesh.set_partition(Partition::Ghosted);
        assert_eq!(mesh.partition(), Partition::Ghosted);
    }
}
