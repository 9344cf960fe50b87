//! Per-entity attribute storage.

pub mod tags;

pub use tags::{Tag, TagData, TagStore, TagValue};
