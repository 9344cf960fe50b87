//! Greedy distributed independent set over the vertex adjacency graph.
//!
//! Sweeps run against a snapshot of the previous round's states, so every
//! rank makes identical decisions about the entities it can see; ghost
//! states are reconciled from owners between sweeps and the loop ends at a
//! global fixed point. Priority is predicted quality with the higher global
//! id breaking ties, which makes the result independent of partitioning.

use crate::mesh_error::MeshCoarsenError;
use crate::topology::mesh::Mesh;

const UNKNOWN: i8 = 0;
const IN: i8 = 1;
const NOT_IN: i8 = -1;

#[inline]
fn priority(quals: &[f64], gids: &[crate::topology::GlobalId], v: usize) -> (f64, u64) {
    (quals[v], gids[v].get())
}

/// Select a maximal independent set among the marked vertices, preferring
/// higher predicted quality. Collective. Returns one flag per vertex.
pub fn find_indset(
    mesh: &Mesh,
    cand_marks: &[bool],
    cand_quals: &[f64],
) -> Result<Vec<bool>, MeshCoarsenError> {
    let nverts = mesh.nverts();
    if cand_marks.len() != nverts || cand_quals.len() != nverts {
        return Err(MeshCoarsenError::ArrayLengthMismatch {
            dim: 0,
            name: "indset candidates".into(),
            expected: nverts,
            found: cand_marks.len().min(cand_quals.len()),
        });
    }
    let verts2edges = mesh.ask_up(1)?;
    let edges2verts = mesh.verts_of(1)?;
    let gids = mesh.globals(0)?;
    let comm = mesh.comm();

    let mut state: Vec<i8> = cand_marks
        .iter()
        .map(|&m| if m { UNKNOWN } else { NOT_IN })
        .collect();
    loop {
        let snapshot = state.clone();
        for v in 0..nverts {
            if snapshot[v] != UNKNOWN {
                continue;
            }
            let mut best = true;
            let mut blocked = false;
            for &e in verts2edges.row(v) {
                let a = edges2verts[e * 2];
                let b = edges2verts[e * 2 + 1];
                let u = if a == v { b } else { a };
                match snapshot[u] {
                    IN => {
                        blocked = true;
                        break;
                    }
                    UNKNOWN => {
                        if priority(cand_quals, gids, u) > priority(cand_quals, gids, v) {
                            best = false;
                        }
                    }
                    _ => {}
                }
            }
            if blocked {
                state[v] = NOT_IN;
            } else if best {
                state[v] = IN;
            }
        }
        if comm.size() > 1 {
            let mut words: Vec<u64> = state.iter().map(|&s| (s as i64) as u64).collect();
            mesh.sync_words(0, 1, &mut words)?;
            for (s, &w) in state.iter_mut().zip(&words) {
                *s = w as i64 as i8;
            }
        }
        let settled = state.iter().all(|&s| s != UNKNOWN);
        if comm.allreduce_and(settled) {
            break;
        }
    }
    Ok(state.iter().map(|&s| s == IN).collect())
}
