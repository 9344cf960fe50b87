//! Rebuilding one entity dimension after the collapses are decided.
//!
//! The new dimension is the surviving old entities in their old order,
//! followed by the products grouped by key. Owned entities receive fresh
//! contiguous global ids through an exclusive scan of owned counts; ghost
//! copies then learn their ids from the owning rank, matched by identity
//! (the old global id for vertices, the sorted new vertex id tuple above).

use hashbrown::HashMap;

use crate::mesh_error::MeshCoarsenError;
use crate::topology::global::GlobalId;
use crate::topology::mesh::Mesh;
use crate::topology::ownership::Owners;

/// Index maps out of one [`modify_ents`] pass.
pub struct ModifiedEnts {
    /// Surviving old entities, ascending.
    pub same_ents2old_ents: Vec<usize>,
    /// New index of each surviving entity, parallel to the above.
    pub same_ents2new_ents: Vec<usize>,
    /// New index of each product, grouped by key.
    pub prods2new_ents: Vec<usize>,
    /// Old index to new index; `None` for entities that did not survive.
    pub old_ents2new_ents: Vec<Option<usize>>,
}

/// Install dimension `d` of the coarsened mesh.
///
/// `prod_offsets` groups `prods2new_verts` by key; both are empty at
/// dimension 0, where the products are none and the survivors are the
/// non-key vertices. Collective.
pub fn modify_ents(
    old: &Mesh,
    new: &mut Mesh,
    d: usize,
    keys2verts: &[usize],
    prod_offsets: &[usize],
    prods2new_verts: &[usize],
    old_verts2new_verts: Option<&[Option<usize>]>,
) -> Result<ModifiedEnts, MeshCoarsenError> {
    let nold = old.nents(d)?;
    let arity = Mesh::arity(d);
    let mut is_key_vert = vec![false; old.nverts()];
    for &v in keys2verts {
        is_key_vert[v] = true;
    }
    // Entities not touching any key carry over unchanged.
    let same_ents2old_ents: Vec<usize> = if d == 0 {
        (0..nold).filter(|&v| !is_key_vert[v]).collect()
    } else {
        let ents2verts = old.verts_of(d)?;
        (0..nold)
            .filter(|&e| {
                !ents2verts[e * arity..(e + 1) * arity]
                    .iter()
                    .any(|&v| is_key_vert[v])
            })
            .collect()
    };
    let nsame = same_ents2old_ents.len();
    let nprods = *prod_offsets.last().unwrap_or(&0);
    let nnew = nsame + nprods;

    let mut old_ents2new_ents = vec![None; nold];
    for (new_ent, &old_ent) in same_ents2old_ents.iter().enumerate() {
        old_ents2new_ents[old_ent] = Some(new_ent);
    }
    let same_ents2new_ents: Vec<usize> = (0..nsame).collect();
    let prods2new_ents: Vec<usize> = (nsame..nnew).collect();

    let verts = if d == 0 {
        Vec::new()
    } else {
        let ents2verts = old.verts_of(d)?;
        let old2new = old_verts2new_verts.ok_or(MeshCoarsenError::MissingLowerEntity {
            high_dim: d,
            low_dim: 0,
        })?;
        let mut verts = Vec::with_capacity(nnew * arity);
        for &old_ent in &same_ents2old_ents {
            for &v in &ents2verts[old_ent * arity..(old_ent + 1) * arity] {
                verts.push(old2new[v].ok_or(MeshCoarsenError::CollapsedVertexInDomain {
                    key: v,
                    vert: v,
                })?);
            }
        }
        verts.extend_from_slice(prods2new_verts);
        verts
    };

    // Survivors keep their owner; a product belongs to its key's owner.
    let old_owners = old.owners(d)?;
    let vert_owners = old.owners(0)?;
    let mut ranks = Vec::with_capacity(nnew);
    for &old_ent in &same_ents2old_ents {
        ranks.push(old_owners.rank(old_ent));
    }
    for (k, &key) in keys2verts.iter().enumerate() {
        for _ in prod_offsets[k]..prod_offsets[k + 1] {
            ranks.push(vert_owners.rank(key));
        }
    }

    let comm = old.comm();
    let my_rank = comm.rank();
    let owned = ranks.iter().filter(|&&r| r == my_rank).count() as u64;
    let offset = comm.exscan_sum_u64(owned);
    let mut globals = vec![GlobalId::new(u64::MAX); nnew];
    let mut next = offset;
    for (i, &r) in ranks.iter().enumerate() {
        if r == my_rank {
            globals[i] = GlobalId::new(next);
            next += 1;
        }
    }
    if comm.size() > 1 {
        resolve_ghost_globals(
            old,
            new,
            d,
            &same_ents2old_ents,
            &verts,
            &ranks,
            &mut globals,
        )?;
    }
    new.set_ents(d, nnew, verts, globals, Owners::from_ranks(ranks))?;
    log::debug!(
        "dimension {}: {} kept, {} products, {} entities",
        d,
        nsame,
        nprods,
        nnew
    );
    Ok(ModifiedEnts {
        same_ents2old_ents,
        same_ents2new_ents,
        prods2new_ents,
        old_ents2new_ents,
    })
}

/// Fill in ghost entities' new global ids from their owners. The identity
/// key is the old vertex id at dimension 0 and the sorted tuple of new
/// vertex ids above, both of which every holder of a copy can compute.
fn resolve_ghost_globals(
    old: &Mesh,
    new: &Mesh,
    d: usize,
    same_ents2old_ents: &[usize],
    verts: &[usize],
    ranks: &[usize],
    globals: &mut [GlobalId],
) -> Result<(), MeshCoarsenError> {
    let comm = old.comm();
    let my_rank = comm.rank();
    let arity = Mesh::arity(d);
    let id_width = if d == 0 { 1 } else { arity };
    let record = (id_width + 1) * 8;

    let identity = |i: usize| -> Result<Vec<u64>, MeshCoarsenError> {
        if d == 0 {
            Ok(vec![old.globals(0)?[same_ents2old_ents[i]].get()])
        } else {
            let new_vert_gids = new.globals(0)?;
            let mut id: Vec<u64> = verts[i * arity..(i + 1) * arity]
                .iter()
                .map(|&v| new_vert_gids[v].get())
                .collect();
            id.sort_unstable();
            Ok(id)
        }
    };

    let mut buf = Vec::new();
    for (i, &r) in ranks.iter().enumerate() {
        if r != my_rank {
            continue;
        }
        for word in identity(i)? {
            buf.extend_from_slice(&word.to_le_bytes());
        }
        buf.extend_from_slice(&globals[i].get().to_le_bytes());
    }
    let payloads = comm.allgather_bytes(&buf);
    let mut by_identity: HashMap<Vec<u64>, u64> = HashMap::new();
    for payload in &payloads {
        if payload.len() % record != 0 {
            return Err(MeshCoarsenError::CollectiveSizeMismatch {
                len: payload.len(),
                record,
            });
        }
        for chunk in payload.chunks_exact(record) {
            let mut word = [0u8; 8];
            let id: Vec<u64> = chunk[..id_width * 8]
                .chunks_exact(8)
                .map(|c| {
                    word.copy_from_slice(c);
                    u64::from_le_bytes(word)
                })
                .collect();
            word.copy_from_slice(&chunk[id_width * 8..]);
            let gid = u64::from_le_bytes(word);
            if let Some(&prior) = by_identity.get(&id) {
                if prior != gid {
                    return Err(MeshCoarsenError::GlobalNumberingConflict {
                        dim: d,
                        gid: GlobalId::new(gid),
                        claims: 2,
                    });
                }
            } else {
                by_identity.insert(id, gid);
            }
        }
    }
    for (i, &r) in ranks.iter().enumerate() {
        if r != my_rank {
            let gid = by_identity
                .get(&identity(i)?)
                .ok_or(MeshCoarsenError::UnresolvedGhost { dim: d })?;
            globals[i] = GlobalId::new(*gid);
        }
    }
    Ok(())
}
