//! Flat adjacency structures: CSR graphs, connectivity inversion, and the
//! sub-simplex templates used to derive intermediate-dimension connectivity.

use hashbrown::HashMap;

use crate::algs::arrays::offset_scan;
use crate::mesh_error::MeshCoarsenError;

/// Compressed sparse rows over entity indices.
///
/// Rows are stored back to back in `items`; `offsets` has one extra entry
/// holding the total. Rows are kept sorted ascending so traversal order is
/// deterministic.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Csr {
    offsets: Vec<usize>,
    items: Vec<usize>,
}

impl Csr {
    /// Build from `(row, item)` entries; rows end up sorted ascending.
    pub fn from_entries(nrows: usize, entries: impl IntoIterator<Item = (usize, usize)>) -> Self {
        let mut rows: Vec<Vec<usize>> = vec![Vec::new(); nrows];
        for (row, item) in entries {
            rows[row].push(item);
        }
        for row in &mut rows {
            row.sort_unstable();
        }
        let counts: Vec<usize> = rows.iter().map(|r| r.len()).collect();
        let offsets = offset_scan(&counts);
        let items = rows.into_iter().flatten().collect();
        Csr { offsets, items }
    }

    /// Build directly from offsets and items (offsets must be monotone with
    /// the total appended).
    pub fn from_parts(offsets: Vec<usize>, items: Vec<usize>) -> Self {
        debug_assert_eq!(*offsets.last().unwrap_or(&0), items.len());
        Csr { offsets, items }
    }

    /// Number of rows.
    pub fn nrows(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    /// Items of row `i`.
    pub fn row(&self, i: usize) -> &[usize] {
        &self.items[self.offsets[i]..self.offsets[i + 1]]
    }

    /// Row offsets (length `nrows + 1`).
    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    /// All items, row by row.
    pub fn items(&self) -> &[usize] {
        &self.items
    }
}

/// Invert flat downward connectivity into upward adjacency:
/// for each vertex, the entities that contain it, ascending.
pub fn invert_connectivity(nverts: usize, arity: usize, ents2verts: &[usize]) -> Csr {
    let nents = if arity == 0 { 0 } else { ents2verts.len() / arity };
    Csr::from_entries(
        nverts,
        (0..nents).flat_map(|e| {
            ents2verts[e * arity..(e + 1) * arity]
                .iter()
                .map(move |&v| (v, e))
        }),
    )
}

/// Local vertex index lists of the `sub_dim`-dimensional faces of a
/// `cell_dim`-dimensional simplex, or `None` for a pair with no template.
pub fn simplex_subs(cell_dim: usize, sub_dim: usize) -> Option<&'static [&'static [usize]]> {
    const EDGE_VERTS: [&[usize]; 2] = [&[0], &[1]];
    const TRI_VERTS: [&[usize]; 3] = [&[0], &[1], &[2]];
    const TRI_EDGES: [&[usize]; 3] = [&[0, 1], &[1, 2], &[2, 0]];
    const TET_VERTS: [&[usize]; 4] = [&[0], &[1], &[2], &[3]];
    const TET_EDGES: [&[usize]; 6] = [&[0, 1], &[1, 2], &[2, 0], &[0, 3], &[1, 3], &[2, 3]];
    const TET_TRIS: [&[usize]; 4] = [&[0, 1, 2], &[0, 1, 3], &[1, 2, 3], &[2, 0, 3]];
    match (cell_dim, sub_dim) {
        (1, 0) => Some(&EDGE_VERTS),
        (2, 0) => Some(&TRI_VERTS),
        (2, 1) => Some(&TRI_EDGES),
        (3, 0) => Some(&TET_VERTS),
        (3, 1) => Some(&TET_EDGES),
        (3, 2) => Some(&TET_TRIS),
        _ => None,
    }
}

/// Derive `high_dim -> low_dim` connectivity by matching each face's sorted
/// vertex tuple against the existing `low_dim` entities.
pub fn derive_down(
    high_dim: usize,
    low_dim: usize,
    high2verts: &[usize],
    low2verts: &[usize],
) -> Result<Vec<usize>, MeshCoarsenError> {
    let low_arity = low_dim + 1;
    let nlow = low2verts.len() / low_arity;
    let mut lookup: HashMap<Vec<usize>, usize> = HashMap::with_capacity(nlow);
    for l in 0..nlow {
        let mut key = low2verts[l * low_arity..(l + 1) * low_arity].to_vec();
        key.sort_unstable();
        lookup.insert(key, l);
    }
    let high_arity = high_dim + 1;
    let nhigh = high2verts.len() / high_arity;
    let subs = simplex_subs(high_dim, low_dim).ok_or(MeshCoarsenError::InvalidDimension {
        dim: low_dim,
        mesh_dim: high_dim,
    })?;
    let mut out = Vec::with_capacity(nhigh * subs.len());
    for h in 0..nhigh {
        let verts = &high2verts[h * high_arity..(h + 1) * high_arity];
        for sub in subs {
            let mut key: Vec<usize> = sub.iter().map(|&i| verts[i]).collect();
            key.sort_unstable();
            let low = lookup
                .get(&key)
                .copied()
                .ok_or(MeshCoarsenError::MissingLowerEntity { high_dim, low_dim })?;
            out.push(low);
        }
    }
    Ok(out)
}
