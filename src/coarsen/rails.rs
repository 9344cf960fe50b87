//! Rail selection and the dead-entity marking that follows from it.
//!
//! Each key vertex collapses along exactly one incident edge, its rail. The
//! rail is recovered from the stored per-edge qualities: among the edges
//! whose code removes the key at the stored best quality, the lowest global
//! id wins, so every rank holding copies of the cavity picks the same edge.

use crate::coarsen::collapse::collapses;
use crate::mesh_error::MeshCoarsenError;
use crate::topology::mesh::Mesh;

/// For each key, the rail edge and the key's position on it (0 or 1).
pub fn find_rails(
    mesh: &Mesh,
    keys2verts: &[usize],
    vert_quals: &[f64],
    edge_codes: &[i8],
    edge_quals: &[f64],
) -> Result<(Vec<usize>, Vec<usize>), MeshCoarsenError> {
    let verts2edges = mesh.ask_up(1)?;
    let edges2verts = mesh.verts_of(1)?;
    let edge_gids = mesh.globals(1)?;
    let mut rails2edges = Vec::with_capacity(keys2verts.len());
    let mut rails2eev = Vec::with_capacity(keys2verts.len());
    for &v in keys2verts {
        let mut best: Option<(u64, usize, usize)> = None;
        for &e in verts2edges.row(v) {
            for eev in 0..2 {
                if edges2verts[e * 2 + eev] != v {
                    continue;
                }
                if !collapses(edge_codes[e], eev) {
                    continue;
                }
                // The stored quality was computed from the same inputs, so
                // exact comparison recovers the chosen direction.
                if edge_quals[e * 2 + eev] != vert_quals[v] {
                    continue;
                }
                let gid = edge_gids[e].get();
                if best.map(|(g, _, _)| gid < g).unwrap_or(true) {
                    best = Some((gid, e, eev));
                }
            }
        }
        let (_, e, eev) = best.ok_or(MeshCoarsenError::NoRailForKey { vert: v })?;
        rails2edges.push(e);
        rails2eev.push(eev);
    }
    Ok((rails2edges, rails2eev))
}

/// The surviving endpoint of each key's rail.
pub fn get_verts_onto(
    mesh: &Mesh,
    rails2edges: &[usize],
    rails2eev: &[usize],
) -> Result<Vec<usize>, MeshCoarsenError> {
    let edges2verts = mesh.verts_of(1)?;
    Ok(rails2edges
        .iter()
        .zip(rails2eev)
        .map(|(&e, &eev)| edges2verts[e * 2 + (1 - eev)])
        .collect())
}

/// Mark the entities each collapse destroys, one flag array per dimension
/// `1..=dim`, indexed `[d - 1]`.
///
/// An entity dies when it spans a rail (contains both endpoints), or when it
/// contains a key and is a face of a dying higher entity. The marking runs
/// top down so faces inherit death from their cells.
pub fn mark_dead_ents(
    mesh: &Mesh,
    keys2verts: &[usize],
    rails2edges: &[usize],
    rails2eev: &[usize],
) -> Result<Vec<Vec<bool>>, MeshCoarsenError> {
    let dim = mesh.dim();
    let edges2verts = mesh.verts_of(1)?;
    let mut dead: Vec<Vec<bool>> = (1..=dim)
        .map(|d| mesh.nents(d).map(|n| vec![false; n]))
        .collect::<Result<_, _>>()?;

    // Entities spanning a rail die outright.
    for d in 1..=dim {
        let arity = Mesh::arity(d);
        let ents2verts = mesh.verts_of(d)?;
        let verts2ents = mesh.ask_up(d)?;
        for (rail, &e) in rails2edges.iter().enumerate() {
            let v = edges2verts[e * 2 + rails2eev[rail]];
            let o = edges2verts[e * 2 + (1 - rails2eev[rail])];
            for &ent in verts2ents.row(v) {
                let verts = &ents2verts[ent * arity..(ent + 1) * arity];
                if verts.contains(&o) {
                    dead[d - 1][ent] = true;
                }
            }
        }
    }
    // Faces of dead entities that touch a key die with them.
    let is_key = {
        let mut flags = vec![false; mesh.nverts()];
        for &v in keys2verts {
            flags[v] = true;
        }
        flags
    };
    for high in (2..=dim).rev() {
        let low = high - 1;
        let high2low = mesh.ask_down(high, low)?;
        let nlows_per_high = Mesh::arity(high);
        let low_arity = Mesh::arity(low);
        let lows2verts = mesh.verts_of(low)?;
        for high_ent in 0..mesh.nents(high)? {
            if !dead[high - 1][high_ent] {
                continue;
            }
            for &low_ent in
                &high2low[high_ent * nlows_per_high..(high_ent + 1) * nlows_per_high]
            {
                let verts = &lows2verts[low_ent * low_arity..(low_ent + 1) * low_arity];
                if verts.iter().any(|&v| is_key[v]) {
                    dead[low - 1][low_ent] = true;
                }
            }
        }
    }
    Ok(dead)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::NoComm;
    use crate::coarsen::collapse::DONT_COLLAPSE;
    use crate::coarsen::quality::NO_QUALITY;
    use std::sync::Arc;

    fn quad_mesh() -> Mesh {
        Mesh::from_cells(Arc::new(NoComm), 2, 4, vec![0, 1, 2, 0, 2, 3]).unwrap()
    }

    #[test]
    fn rail_recovers_stored_direction() {
        let mesh = quad_mesh();
        // Key is vertex 2, collapsing onto 0 along the diagonal (edge 2,
        // stored as (2,0), so the key sits at position 0).
        let mut edge_codes = vec![DONT_COLLAPSE; 5];
        edge_codes[2] = 1;
        let mut edge_quals = vec![NO_QUALITY; 10];
        edge_quals[4] = 0.0;
        let mut vert_quals = vec![NO_QUALITY; 4];
        vert_quals[2] = 0.0;
        let (rails, eevs) =
            find_rails(&mesh, &[2], &vert_quals, &edge_codes, &edge_quals).unwrap();
        assert_eq!(rails, vec![2]);
        assert_eq!(eevs, vec![0]);
        let onto = get_verts_onto(&mesh, &rails, &eevs).unwrap();
        assert_eq!(onto, vec![0]);
    }

    #[test]
    fn missing_rail_is_an_error() {
        let mesh = quad_mesh();
        let err = find_rails(
            &mesh,
            &[2],
            &[NO_QUALITY; 4],
            &[DONT_COLLAPSE; 5],
            &[NO_QUALITY; 10],
        )
        .unwrap_err();
        assert_eq!(err, MeshCoarsenError::NoRailForKey { vert: 2 });
    }

    #[test]
    fn rail_collapse_kills_the_cavity() {
        let mesh = quad_mesh();
        let dead = mark_dead_ents(&mesh, &[2], &[2], &[0]).unwrap();
        // Both cells span the 0-2 diagonal.
        assert_eq!(dead[1], vec![true, true]);
        // The diagonal spans the rail; edges (1,2) and (2,3) touch the key
        // and face dead cells; boundary edges (0,1) and (3,0) survive.
        assert_eq!(dead[0], vec![false, true, true, true, false]);
    }
}
