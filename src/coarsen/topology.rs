//! Per-key cavity domains and the substituted connectivity of their
//! replacement entities.

use crate::algs::arrays::offset_scan;
use crate::mesh_error::MeshCoarsenError;
use crate::topology::adjacency::Csr;
use crate::topology::mesh::Mesh;

/// The surviving `d`-entities around each key: they are replaced one for
/// one by products with the key substituted away. Row `k` lists old entity
/// indices for key `k`.
pub fn find_coarsen_domains(
    mesh: &Mesh,
    d: usize,
    keys2verts: &[usize],
    dead: &[bool],
) -> Result<Csr, MeshCoarsenError> {
    let verts2ents = mesh.ask_up(d)?;
    let counts: Vec<usize> = keys2verts
        .iter()
        .map(|&v| verts2ents.row(v).iter().filter(|&&e| !dead[e]).count())
        .collect();
    let offsets = offset_scan(&counts);
    let mut ents = Vec::with_capacity(*offsets.last().unwrap_or(&0));
    for &v in keys2verts {
        ents.extend(verts2ents.row(v).iter().copied().filter(|&e| !dead[e]));
    }
    Ok(Csr::from_parts(offsets, ents))
}

/// Connectivity of the product entities, in new vertex indices: each domain
/// entity with its key replaced by the key's onto vertex.
pub fn coarsen_topology(
    mesh: &Mesh,
    d: usize,
    keys2verts: &[usize],
    verts_onto: &[usize],
    domains: &Csr,
    old_verts2new_verts: &[Option<usize>],
) -> Result<Vec<usize>, MeshCoarsenError> {
    let arity = Mesh::arity(d);
    let ents2verts = mesh.verts_of(d)?;
    let mut prods2new_verts = Vec::with_capacity(domains.items().len() * arity);
    for (k, &key) in keys2verts.iter().enumerate() {
        let onto = verts_onto[k];
        for &ent in domains.row(k) {
            for &old in &ents2verts[ent * arity..(ent + 1) * arity] {
                let subst = if old == key { onto } else { old };
                let new = old_verts2new_verts[subst].ok_or(
                    MeshCoarsenError::CollapsedVertexInDomain { key, vert: subst },
                )?;
                prods2new_verts.push(new);
            }
        }
    }
    Ok(prods2new_verts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::NoComm;
    use crate::coarsen::rails::mark_dead_ents;
    use std::sync::Arc;

    fn fan_mesh() -> Mesh {
        Mesh::from_cells(
            Arc::new(NoComm),
            2,
            5,
            vec![0, 1, 4, 1, 2, 4, 2, 3, 4, 3, 0, 4],
        )
        .unwrap()
    }

    #[test]
    fn domains_are_the_surviving_cavity() {
        let mesh = fan_mesh();
        // Key 4 collapses onto 0 along edge (4,0); the rail edge is stored
        // as (4,0) with the key at position 0.
        let edges2verts = mesh.verts_of(1).unwrap();
        let rail = edges2verts
            .chunks_exact(2)
            .position(|e| {
                let mut s = [e[0], e[1]];
                s.sort_unstable();
                s == [0, 4]
            })
            .unwrap();
        let eev = if edges2verts[rail * 2] == 4 { 0 } else { 1 };
        let dead = mark_dead_ents(&mesh, &[4], &[rail], &[eev]).unwrap();
        let cell_domains = find_coarsen_domains(&mesh, 2, &[4], &dead[1]).unwrap();
        // Cells {1,2,4} and {2,3,4} survive and become products.
        assert_eq!(cell_domains.row(0), &[1, 2]);
        let edge_domains = find_coarsen_domains(&mesh, 1, &[4], &dead[0]).unwrap();
        assert_eq!(edge_domains.row(0).len(), 1);

        // Vertex 4 dies; all others keep their order.
        let old2new: Vec<Option<usize>> =
            vec![Some(0), Some(1), Some(2), Some(3), None];
        let prods = coarsen_topology(&mesh, 2, &[4], &[0], &cell_domains, &old2new).unwrap();
        assert_eq!(prods, vec![1, 2, 0, 2, 3, 0]);
    }
}
