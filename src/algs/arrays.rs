//! Data-parallel array primitives: map, compaction, gather/scatter, scan.
//!
//! Every per-entity pass in the coarsening pipeline is expressed through this
//! layer so that the backend can be swapped without touching algorithm code.
//! The default backend is a serial loop; enabling the `rayon` feature routes
//! the independent-iteration passes through Rayon. Algorithms never branch on
//! the backend themselves.
//!
//! The compaction idiom used throughout the crate is
//! `collect_marked(each_neq_to(codes, SENTINEL))`: mark the survivors, then
//! gather their indices into a dense `new2old` map that drives `unmap`.

use std::ops::AddAssign;

/// Apply `f` to every index in `0..n`, collecting the results.
///
/// Iterations must be independent; order of evaluation is unspecified under
/// the `rayon` feature, but the result vector is always in index order.
#[cfg(feature = "rayon")]
pub fn map_index<R, F>(n: usize, f: F) -> Vec<R>
where
    R: Send,
    F: Fn(usize) -> R + Send + Sync,
{
    use rayon::prelude::*;
    (0..n).into_par_iter().map(f).collect()
}

/// Apply `f` to every index in `0..n`, collecting the results.
#[cfg(not(feature = "rayon"))]
pub fn map_index<R, F>(n: usize, f: F) -> Vec<R>
where
    F: Fn(usize) -> R,
{
    (0..n).map(f).collect()
}

/// Mark every element of `a` that differs from `b`.
pub fn each_neq_to<T: PartialEq>(a: &[T], b: &T) -> Vec<bool> {
    a.iter().map(|x| x != b).collect()
}

/// Gather the indices of all `true` marks, in index order.
pub fn collect_marked(marks: &[bool]) -> Vec<usize> {
    marks
        .iter()
        .enumerate()
        .filter_map(|(i, &m)| if m { Some(i) } else { None })
        .collect()
}

/// Gather `width`-wide records of `data` selected by `new2old`.
///
/// `out[i * width + k] = data[new2old[i] * width + k]`.
pub fn unmap<T: Clone>(new2old: &[usize], data: &[T], width: usize) -> Vec<T> {
    let mut out = Vec::with_capacity(new2old.len() * width);
    for &old in new2old {
        out.extend_from_slice(&data[old * width..(old + 1) * width]);
    }
    out
}

/// Scatter `width`-wide records of `data` into `out` at positions `a2b`.
///
/// `out[a2b[i] * width + k] = data[i * width + k]`. The inverse of [`unmap`].
pub fn map_into<T: Clone>(data: &[T], a2b: &[usize], out: &mut [T], width: usize) {
    for (i, &b) in a2b.iter().enumerate() {
        out[b * width..(b + 1) * width].clone_from_slice(&data[i * width..(i + 1) * width]);
    }
}

/// Exclusive prefix sum with the grand total appended: the result has
/// `counts.len() + 1` entries and `result[i+1] - result[i] == counts[i]`.
///
/// This is the offset form used to lay out variable-sized groups (CSR rows,
/// products per key) in one flat array.
pub fn offset_scan<T>(counts: &[T]) -> Vec<T>
where
    T: num_traits::Zero + AddAssign + Copy,
{
    let mut out = Vec::with_capacity(counts.len() + 1);
    let mut acc = T::zero();
    out.push(acc);
    for &c in counts {
        acc += c;
        out.push(acc);
    }
    out
}
