//! Structural mesh comparison and partition verification, used by tests
//! and by callers checking that differently partitioned runs agree.

use hashbrown::{HashMap, HashSet};
use itertools::Itertools;

use crate::algs::arrays::map_index;
use crate::mesh_error::MeshCoarsenError;
use crate::topology::mesh::Mesh;

/// Canonical form of one mesh: vertices keyed by coordinate bit patterns,
/// entities by the sorted canonical ranks of their vertices.
fn canonical_ents(mesh: &Mesh, d: usize) -> Result<Vec<Vec<usize>>, MeshCoarsenError> {
    let keys = vert_keys(mesh)?;
    let ranked: HashMap<&Vec<u64>, usize> = keys
        .iter()
        .unique()
        .sorted()
        .enumerate()
        .map(|(r, k)| (k, r))
        .collect();
    let arity = Mesh::arity(d);
    let mut ents: Vec<Vec<usize>> = mesh
        .verts_of(d)?
        .chunks_exact(arity)
        .map(|ev| {
            let mut ranks: Vec<usize> = ev.iter().map(|&v| ranked[&keys[v]]).collect();
            ranks.sort_unstable();
            ranks
        })
        .collect();
    ents.sort();
    Ok(ents)
}

/// Whether two meshes have the same entities at every dimension, matching
/// vertices by their coordinates. Local indices and entity order are free
/// to differ.
pub fn meshes_topologically_equal(a: &Mesh, b: &Mesh) -> Result<bool, MeshCoarsenError> {
    if a.dim() != b.dim() || a.nverts() != b.nverts() {
        return Ok(false);
    }
    let mut va: Vec<Vec<u64>> = vert_keys(a)?;
    let mut vb: Vec<Vec<u64>> = vert_keys(b)?;
    va.sort();
    vb.sort();
    if va != vb {
        return Ok(false);
    }
    for d in 1..=a.dim() {
        if canonical_ents(a, d)? != canonical_ents(b, d)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn vert_keys(mesh: &Mesh) -> Result<Vec<Vec<u64>>, MeshCoarsenError> {
    let spatial = mesh.spatial_dim()?;
    let coords = mesh.coords()?;
    Ok(map_index(mesh.nverts(), |v| {
        coords[v * spatial..(v + 1) * spatial]
            .iter()
            .map(|x| x.to_bits())
            .collect()
    }))
}

/// Check that dimension `d`'s global numbering is a valid partition: every
/// global id owned by exactly one rank and every ghost backed by an owner.
/// Collective.
pub fn verify_global_partition(mesh: &Mesh, d: usize) -> Result<(), MeshCoarsenError> {
    let comm = mesh.comm();
    let my_rank = comm.rank();
    let globals = mesh.globals(d)?;
    let owners = mesh.owners(d)?;
    let mut buf = Vec::new();
    for i in owners.owned(my_rank) {
        buf.extend_from_slice(&globals[i].get().to_le_bytes());
    }
    let payloads = comm.allgather_bytes(&buf);
    let mut owned_gids: HashSet<u64> = HashSet::new();
    for payload in &payloads {
        if payload.len() % 8 != 0 {
            return Err(MeshCoarsenError::CollectiveSizeMismatch {
                len: payload.len(),
                record: 8,
            });
        }
        for chunk in payload.chunks_exact(8) {
            let mut word = [0u8; 8];
            word.copy_from_slice(chunk);
            let gid = u64::from_le_bytes(word);
            if !owned_gids.insert(gid) {
                return Err(MeshCoarsenError::GlobalNumberingConflict {
                    dim: d,
                    gid: crate::topology::GlobalId::new(gid),
                    claims: 2,
                });
            }
        }
    }
    for i in 0..mesh.nents(d)? {
        if owners.is_ghost(i, my_rank) && !owned_gids.contains(&globals[i].get()) {
            return Err(MeshCoarsenError::UnresolvedGhost { dim: d });
        }
    }
    Ok(())
}
