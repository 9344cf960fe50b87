//! `GlobalId`: a strong handle for an entity's position in the distributed
//! numbering of its dimension.
//!
//! Within one dimension, global ids form a partition across ranks: every
//! entity has exactly one id, ids are dense starting at zero, and a ghost
//! copy's id always equals its owner's. Unlike a local index, a `GlobalId`
//! is meaningful on every rank, which is what makes it usable as a
//! deterministic tie-break key for cross-rank decisions.

use std::fmt;

/// Position of an entity in the distributed numbering of its dimension.
///
/// # Memory layout
/// `repr(transparent)` over `u64`, so arrays of `GlobalId` can be exchanged
/// between ranks as plain 64-bit words.
#[derive(
    Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[repr(transparent)]
pub struct GlobalId(u64);

impl GlobalId {
    /// Wrap a raw id. Zero is a valid id; global numbering starts at zero.
    #[inline]
    pub const fn new(raw: u64) -> Self {
        GlobalId(raw)
    }

    /// The raw `u64` value.
    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for GlobalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("GlobalId").field(&self.0).finish()
    }
}

impl fmt::Display for GlobalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod layout_tests {
    use super::*;
    use static_assertions::{assert_eq_align, assert_eq_size};

    // If these fail, the repr(transparent) exchange guarantee is broken.
    assert_eq_size!(GlobalId, u64);

    #[test]
    fn alignment_matches_u64() {
        assert_eq_align!(GlobalId, u64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_and_get() {
        let g = GlobalId::new(42);
        assert_eq!(g.get(), 42);
        assert_eq!(GlobalId::new(0).get(), 0);
    }

    #[test]
    fn debug_and_display() {
        let g = GlobalId::new(7);
        assert_eq!(format!("{:?}", g), "GlobalId(7)");
        assert_eq!(format!("{}", g), "7");
    }

    #[test]
    fn ordering_is_numeric() {
        assert!(GlobalId::new(1) < GlobalId::new(2));
    }

    #[test]
    fn serde_roundtrip() {
        let g = GlobalId::new(123);
        let s = serde_json::to_string(&g).unwrap();
        let back: GlobalId = serde_json::from_str(&s).unwrap();
        assert_eq!(back, g);
    }
}
