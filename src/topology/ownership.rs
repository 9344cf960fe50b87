//! Ownership metadata for mesh entities.
//!
//! Every entity of every dimension has exactly one owning rank; an entity
//! whose owner differs from the local rank is a ghost copy. The coarsening
//! pipeline reassigns ownership once per round (after the independent set is
//! chosen) and otherwise treats ghosts as read-only mirrors.

use serde::{Deserialize, Serialize};

/// Owning rank per entity of one dimension.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owners {
    ranks: Vec<usize>,
}

impl Owners {
    /// All `n` entities owned by `rank`.
    pub fn all_owned_by(n: usize, rank: usize) -> Self {
        Self {
            ranks: vec![rank; n],
        }
    }

    /// Explicit owner per entity.
    pub fn from_ranks(ranks: Vec<usize>) -> Self {
        Self { ranks }
    }

    /// Number of entities tracked.
    pub fn len(&self) -> usize {
        self.ranks.len()
    }

    /// Whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.ranks.is_empty()
    }

    /// Owning rank of entity `i`.
    pub fn rank(&self, i: usize) -> usize {
        self.ranks[i]
    }

    /// Whether entity `i` is a ghost on `my_rank`.
    pub fn is_ghost(&self, i: usize, my_rank: usize) -> bool {
        self.ranks[i] != my_rank
    }

    /// Reassign the owner of entity `i`.
    pub fn set_rank(&mut self, i: usize, rank: usize) {
        self.ranks[i] = rank;
    }

    /// Indices of entities owned by `my_rank`, ascending.
    pub fn owned(&self, my_rank: usize) -> impl Iterator<Item = usize> + '_ {
        self.ranks
            .iter()
            .enumerate()
            .filter_map(move |(i, &r)| (r == my_rank).then_some(i))
    }

    /// Number of entities owned by `my_rank`.
    pub fn owned_count(&self, my_rank: usize) -> usize {
        self.ranks.iter().filter(|&&r| r == my_rank).count()
    }

    /// Raw owner ranks.
    pub fn ranks(&self) -> &[usize] {
        &self.ranks
    }
}
