//! TagStore: named, typed, fixed-width per-entity attribute arrays.
//!
//! A tag maps every entity of one dimension to `ncomps` values of a single
//! element type (`i8`, `i32`, `i64` or `f64`). Tags have explicit add, get
//! and remove operations; nothing about their lifetime is implicit. The
//! store preserves insertion order so iteration and serialization are
//! deterministic.

use crate::mesh_error::MeshCoarsenError;

/// Type-erased tag payload.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum TagData {
    I8(Vec<i8>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    F64(Vec<f64>),
}

impl TagData {
    /// Name of the held element type, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            TagData::I8(_) => "i8",
            TagData::I32(_) => "i32",
            TagData::I64(_) => "i64",
            TagData::F64(_) => "f64",
        }
    }

    /// Number of stored values (entities times components).
    pub fn len(&self) -> usize {
        match self {
            TagData::I8(v) => v.len(),
            TagData::I32(v) => v.len(),
            TagData::I64(v) => v.len(),
            TagData::F64(v) => v.len(),
        }
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Element types storable in a tag.
pub trait TagValue: Clone + 'static {
    /// Name of this element type, for diagnostics.
    const KIND: &'static str;
    /// Borrow the payload if it holds this type.
    fn view(data: &TagData) -> Option<&[Self]>;
    /// Wrap values into a payload.
    fn wrap(values: Vec<Self>) -> TagData;
    /// Take the payload if it holds this type.
    fn take(data: TagData) -> Option<Vec<Self>>;
}

macro_rules! impl_tag_value {
    ($t:ty, $variant:ident, $kind:literal) => {
        impl TagValue for $t {
            const KIND: &'static str = $kind;
            fn view(data: &TagData) -> Option<&[Self]> {
                match data {
                    TagData::$variant(v) => Some(v),
                    _ => None,
                }
            }
            fn wrap(values: Vec<Self>) -> TagData {
                TagData::$variant(values)
            }
            fn take(data: TagData) -> Option<Vec<Self>> {
                match data {
                    TagData::$variant(v) => Some(v),
                    _ => None,
                }
            }
        }
    };
}

impl_tag_value!(i8, I8, "i8");
impl_tag_value!(i32, I32, "i32");
impl_tag_value!(i64, I64, "i64");
impl_tag_value!(f64, F64, "f64");

/// One named attribute array.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Tag {
    name: String,
    ncomps: usize,
    data: TagData,
}

impl Tag {
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn ncomps(&self) -> usize {
        self.ncomps
    }
    pub fn data(&self) -> &TagData {
        &self.data
    }
}

/// Ordered collection of tags for one entity dimension.
///
/// # Invariants
/// - Tag names are unique within the store.
/// - Every payload length equals `entity count * ncomps` (checked on insert
///   against the count supplied by the mesh).
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct TagStore {
    dim: usize,
    tags: Vec<Tag>,
}

impl TagStore {
    /// An empty store for entities of dimension `dim` (`dim` is carried only
    /// for error messages).
    pub fn new(dim: usize) -> Self {
        Self { dim, tags: Vec::new() }
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.tags.iter().position(|t| t.name == name)
    }

    /// Whether a tag with this name exists.
    pub fn has(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Add a new tag. `nents` is the entity count of the dimension; the
    /// payload must hold exactly `nents * ncomps` values.
    pub fn add<T: TagValue>(
        &mut self,
        name: &str,
        ncomps: usize,
        nents: usize,
        values: Vec<T>,
    ) -> Result<(), MeshCoarsenError> {
        if self.has(name) {
            return Err(MeshCoarsenError::DuplicateTag {
                dim: self.dim,
                name: name.to_owned(),
            });
        }
        if values.len() != nents * ncomps {
            return Err(MeshCoarsenError::ArrayLengthMismatch {
                dim: self.dim,
                name: name.to_owned(),
                expected: nents * ncomps,
                found: values.len(),
            });
        }
        self.tags.push(Tag {
            name: name.to_owned(),
            ncomps,
            data: T::wrap(values),
        });
        Ok(())
    }

    /// Borrow a tag's values.
    pub fn get<T: TagValue>(&self, name: &str) -> Result<&[T], MeshCoarsenError> {
        let idx = self.position(name).ok_or_else(|| MeshCoarsenError::MissingTag {
            dim: self.dim,
            name: name.to_owned(),
        })?;
        let tag = &self.tags[idx];
        T::view(&tag.data).ok_or_else(|| MeshCoarsenError::TagTypeMismatch {
            dim: self.dim,
            name: name.to_owned(),
            expected: T::KIND,
            found: tag.data.kind(),
        })
    }

    /// Component count of a tag.
    pub fn ncomps(&self, name: &str) -> Result<usize, MeshCoarsenError> {
        self.position(name)
            .map(|i| self.tags[i].ncomps)
            .ok_or_else(|| MeshCoarsenError::MissingTag {
                dim: self.dim,
                name: name.to_owned(),
            })
    }

    /// Remove a tag and return its values.
    pub fn remove<T: TagValue>(&mut self, name: &str) -> Result<Vec<T>, MeshCoarsenError> {
        let idx = self.position(name).ok_or_else(|| MeshCoarsenError::MissingTag {
            dim: self.dim,
            name: name.to_owned(),
        })?;
        let kind = self.tags[idx].data.kind();
        if T::view(&self.tags[idx].data).is_none() {
            return Err(MeshCoarsenError::TagTypeMismatch {
                dim: self.dim,
                name: name.to_owned(),
                expected: T::KIND,
                found: kind,
            });
        }
        let tag = self.tags.remove(idx);
        // The type was checked above; take cannot fail.
        Ok(T::take(tag.data).unwrap_or_default())
    }

    /// Shared access to a tag's payload regardless of element type.
    pub(crate) fn data_ref(&self, name: &str) -> Result<&TagData, MeshCoarsenError> {
        let idx = self.position(name).ok_or_else(|| MeshCoarsenError::MissingTag {
            dim: self.dim,
            name: name.to_owned(),
        })?;
        Ok(&self.tags[idx].data)
    }

    /// Mutable access to a tag's payload (for owner/ghost synchronization).
    pub(crate) fn data_mut(&mut self, name: &str) -> Result<&mut TagData, MeshCoarsenError> {
        let dim = self.dim;
        let idx = self.position(name).ok_or_else(|| MeshCoarsenError::MissingTag {
            dim,
            name: name.to_owned(),
        })?;
        Ok(&mut self.tags[idx].data)
    }

    /// Tags in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Tag> {
        self.tags.iter()
    }

    /// Number of tags.
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    /// Whether the store holds no tags.
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}
